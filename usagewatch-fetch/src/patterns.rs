//! Stateless matchers over raw terminal output.
//!
//! Two classes of signal are recognized in the character stream of an
//! interactive ssh session:
//!
//! - **ready**: the terminal was cleared, or the buffer ends in a prompt
//! - **data**: enough complete usage rows have arrived
//!
//! Ready matchers run on the raw buffer because the escape codes are part of
//! the signal. ANSI stripping is only applied to completed lines handed to
//! the parser or to diagnostics.
//!
//! # Usage Row Format
//!
//! ```text
//! 2024-01-01 00:01:00,15 KB,8 KB,51%,4%,41%
//! ```

use regex::Regex;
use std::sync::LazyLock;

// ============================================================================
// Constants
// ============================================================================

/// Clear-screen followed by cursor-home.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

// ============================================================================
// Regex Patterns
// ============================================================================

/// A prompt character at the end of the buffer, optionally followed by one
/// space and one final newline.
static PROMPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:#$] ?\n?\z").expect("Invalid regex"));

/// ESC followed by a single `@`-`_` byte, or a CSI sequence.
static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("Invalid regex")
});

/// Full usage row: timestamp, two sized fields, disk, cpu, and a trailing
/// percentage.
static CSV_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},[^,]* (?:B|KB|MB|GB),[^,]* (?:B|KB|MB|GB),[^,]*,[^,]*,.*%$",
    )
    .expect("Invalid regex")
});

/// Leading `YYYY-MM-DD HH:MM:SS,`.
static TIMESTAMP_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},").expect("Invalid regex")
});

// ============================================================================
// Ready Signals
// ============================================================================

/// Returns true if the buffer contains the clear-and-home sequence.
pub fn is_clear_screen(buffer: &str) -> bool {
    buffer.contains(CLEAR_SCREEN)
}

/// Returns true if the buffer ends with a line terminated by `:`, `#` or `$`.
///
/// This is a heuristic: it also fires on `Password:` prompts and banners
/// that happen to end in a colon.
pub fn is_prompt(buffer: &str) -> bool {
    PROMPT_RE.is_match(buffer)
}

/// Ready predicate used while waiting for a shell.
pub fn is_ready(buffer: &str) -> bool {
    is_clear_screen(buffer) || is_prompt(buffer)
}

// ============================================================================
// ANSI Stripping
// ============================================================================

/// Removes ANSI escape sequences.
///
/// Removal is repeated until nothing matches, so a sequence that only forms
/// after an inner one is removed is stripped too. The result is a fixed
/// point: stripping it again changes nothing.
pub fn strip_ansi(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = ANSI_RE.replace_all(&current, "");
        if next.len() == current.len() {
            return current;
        }
        current = next.into_owned();
    }
}

/// What a terminal would leave visible for one completed line: trailing
/// line terminators removed, anything before an interior carriage return
/// overwritten, escape sequences stripped.
pub fn visible_line(line: &str) -> String {
    let line = line.trim_end_matches(['\r', '\n']);
    let tail = line.rsplit('\r').next().unwrap_or(line);
    strip_ansi(tail)
}

// ============================================================================
// Data Signals
// ============================================================================

/// Returns true if the line is a complete usage row.
pub fn is_valid_csv_line(line: &str) -> bool {
    CSV_LINE_RE.is_match(line)
}

/// Returns true if the line starts with a row timestamp.
pub fn has_timestamp_prefix(line: &str) -> bool {
    TIMESTAMP_PREFIX_RE.is_match(line)
}

/// Data-ready predicate: the buffer holds `count` consecutive
/// newline-terminated lines that are valid usage rows.
///
/// A line still being written (no trailing newline yet) never counts.
pub fn has_csv_rows(buffer: &str, count: usize) -> bool {
    if count == 0 {
        return true;
    }
    let mut run = 0;
    for segment in buffer.split_inclusive('\n') {
        if !segment.ends_with('\n') {
            break;
        }
        if is_valid_csv_line(&visible_line(segment)) {
            run += 1;
            if run >= count {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Extracts usage rows from a capture: visible lines with a leading
/// timestamp, keeping only the last `count`.
pub fn extract_rows(capture: &str, count: usize) -> Vec<String> {
    let rows: Vec<String> = capture
        .lines()
        .map(visible_line)
        .filter(|line| has_timestamp_prefix(line))
        .collect();
    let skip = rows.len().saturating_sub(count);
    rows.into_iter().skip(skip).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROW_A: &str = "2024-01-01 00:00:00,10 KB,5 KB,50%,3%,40%";
    const ROW_B: &str = "2024-01-01 00:01:00,15 KB,8 KB,51%,4%,41%";

    #[test]
    fn test_clear_screen() {
        assert!(is_clear_screen("\x1b[2J\x1b[H"));
        assert!(is_clear_screen("Last login: today\r\n\x1b[2J\x1b[Hwelcome"));
        assert!(!is_clear_screen("\x1b[2J"));
        assert!(!is_clear_screen("\x1b[H\x1b[2J"));
    }

    #[test]
    fn test_prompt_endings() {
        assert!(is_prompt("ops@bastion:~$ "));
        assert!(is_prompt("root@box:/# "));
        assert!(is_prompt("password:"));
        assert!(is_prompt("ops@bastion:~$\n"));
        assert!(is_prompt("$"));
        assert!(!is_prompt("ops@bastion:~$  "));
        assert!(!is_prompt("Welcome to Ubuntu\r\n"));
        assert!(!is_prompt(""));
    }

    #[test]
    fn test_ready_combines_signals() {
        assert!(is_ready("motd\x1b[2J\x1b[Hmore text"));
        assert!(is_ready("app@inner:~$ "));
        assert!(!is_ready("connecting..."));
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m Normal"), "Red Normal");
        assert_eq!(strip_ansi("\x1b[2J\x1b[HHello"), "Hello");
        assert_eq!(strip_ansi("\x1b[?2004hprompt$ "), "prompt$ ");
        assert_eq!(strip_ansi("\x1bMreverse"), "reverse");
        assert_eq!(strip_ansi("Just plain text"), "Just plain text");
    }

    #[test]
    fn test_strip_ansi_nested_sequence() {
        // Removing the inner CSI leaves ESC + "[0m", which is stripped too.
        assert_eq!(strip_ansi("a\x1b\x1b[1m[0mb"), "ab");
    }

    #[test]
    fn test_visible_line() {
        assert_eq!(visible_line(&format!("{ROW_A}\r\n")), ROW_A);
        assert_eq!(visible_line(&format!("\x1b[?2004l\r{ROW_B}\r\n")), ROW_B);
        assert_eq!(visible_line("\x1b[32mok\x1b[0m"), "ok");
    }

    #[test]
    fn test_valid_csv_line() {
        assert!(is_valid_csv_line(ROW_A));
        assert!(is_valid_csv_line("2024-01-01 00:00:00,1.5 MB,2 GB,50%,3%,40%"));
        assert!(is_valid_csv_line("2024-01-01 00:00:00,N/A KB,2 B,50%,3%,40%"));
        assert!(!is_valid_csv_line("2024-01-01 00:00:00,10,5,50%,3%,40%"));
        assert!(!is_valid_csv_line("2024-01-01 00:00:00,10 KB,5 KB,50%,3%,40"));
        assert!(!is_valid_csv_line("2024-01-01,10 KB,5 KB,50%,3%,40%"));
        assert!(!is_valid_csv_line("tail -2 ~/usage.csv 2>/dev/null"));
    }

    #[test]
    fn test_timestamp_prefix() {
        assert!(has_timestamp_prefix(ROW_A));
        assert!(!has_timestamp_prefix("app@inner:~$ tail -2 ~/usage.csv"));
    }

    #[test]
    fn test_has_csv_rows_needs_complete_lines() {
        let partial = format!("{ROW_A}\r\n{ROW_B}");
        assert!(!has_csv_rows(&partial, 2));

        let complete = format!("{partial}\r\n");
        assert!(has_csv_rows(&complete, 2));
    }

    #[test]
    fn test_has_csv_rows_skips_echo_and_prompt() {
        let capture = format!(
            "tail -2 ~/usage.csv 2>/dev/null\r\n\x1b[?2004l\r{ROW_A}\r\n{ROW_B}\r\napp@inner:~$ "
        );
        assert!(has_csv_rows(&capture, 2));
    }

    #[test]
    fn test_has_csv_rows_requires_consecutive() {
        let capture = format!("{ROW_A}\r\nnoise\r\n{ROW_B}\r\n");
        assert!(!has_csv_rows(&capture, 2));
        assert!(has_csv_rows(&capture, 1));
    }

    #[test]
    fn test_extract_rows_keeps_last_two() {
        let capture = format!(
            "2023-12-31 23:59:00,1 KB,1 KB,1%,1%,1%\r\n{ROW_A}\r\n\x1b[1m{ROW_B}\x1b[0m\r\napp@inner:~$ "
        );
        assert_eq!(extract_rows(&capture, 2), vec![ROW_A, ROW_B]);
    }

    #[test]
    fn test_extract_rows_short_capture() {
        assert_eq!(extract_rows(&format!("{ROW_A}\n"), 2), vec![ROW_A]);
        assert!(extract_rows("nothing here", 2).is_empty());
    }

    proptest! {
        #[test]
        fn prop_strip_ansi_idempotent(s in "[a-z \\x1b\\[0-9;?m=HJ]{0,40}") {
            let once = strip_ansi(&s);
            prop_assert_eq!(strip_ansi(&once), once);
        }

        #[test]
        fn prop_strip_ansi_keeps_plain_text(s in "[^\\x1b]{0,60}") {
            prop_assert_eq!(strip_ansi(&s), s);
        }

        #[test]
        fn prop_clear_screen_anywhere(prefix in ".{0,20}", suffix in ".{0,20}") {
            let buffer = format!("{prefix}{CLEAR_SCREEN}{suffix}");
            prop_assert!(is_clear_screen(&buffer));
        }
    }
}
