//! Parser edge cases: noisy, partial and malformed rows.

use crate::error::MonitorError;
use crate::parser::parse_usage;

const PREVIOUS: &str = "2024-01-01 00:00:00,10 KB,5 KB,50%,3%,40%";
const LAST: &str = "2024-01-01 00:01:00,15 KB,8 KB,51%,4%,41%";

// ========================================================================
// Row Selection
// ========================================================================

#[test]
fn test_empty_input() {
    let lines: [&str; 0] = [];
    let err = parse_usage(&lines).unwrap_err();
    assert!(matches!(err, MonitorError::Parse(ref m) if m.contains("Found 0 valid lines out of 0")));
}

#[test]
fn test_noise_between_rows_is_ignored() {
    let lines = [
        "tail -2 ~/usage.csv 2>/dev/null",
        PREVIOUS,
        "",
        LAST,
        "app@inner:~$",
    ];
    let record = parse_usage(&lines).unwrap();
    assert_eq!(record.last_update, "2024-01-01 00:01:00");
}

#[test]
fn test_owned_strings_accepted() {
    let lines = vec![PREVIOUS.to_string(), LAST.to_string()];
    assert!(parse_usage(&lines).is_ok());
}

#[test]
fn test_extra_fields_are_tolerated() {
    let lines = [
        "2024-01-01 00:00:00,10 KB,5 KB,50%,3%,40%,extra",
        "2024-01-01 00:01:00,15 KB,8 KB,51%,4%,41%,extra,more",
    ];
    let record = parse_usage(&lines).unwrap();
    assert_eq!(record.ram, "41%");
}

#[test]
fn test_fields_are_trimmed() {
    let lines = [
        " 2024-01-01 00:00:00 , 10 KB , 5 KB , 50% , 3% , 40% ",
        "2024-01-01 00:01:00,  15 KB,8 KB ,51%, 4%,41%\r",
    ];
    let record = parse_usage(&lines).unwrap();
    assert_eq!(record.last_update, "2024-01-01 00:01:00");
    assert_eq!(record.cpu, "4%");
    assert_eq!(record.ram, "41%");
    assert_eq!(record.upload_delta, Some(5.0));
}

// ========================================================================
// Numeric Degradation
// ========================================================================

#[test]
fn test_both_counters_unreadable() {
    let lines = [
        "2024-01-01 00:00:00,?? KB,?? KB,50%,3%,40%",
        "2024-01-01 00:01:00,15 KB,8 KB,51%,4%,41%",
    ];
    let record = parse_usage(&lines).unwrap();
    assert_eq!(record.upload_delta, None);
    assert_eq!(record.download_delta, None);
}

#[test]
fn test_missing_unit_nulls_delta() {
    let lines = [
        "2024-01-01 00:00:00,10,5 KB,50%,3%,40%",
        "2024-01-01 00:01:00,15,8 KB,51%,4%,41%",
    ];
    let record = parse_usage(&lines).unwrap();
    assert_eq!(record.upload_delta, None);
    assert_eq!(record.download_delta, Some(3.0));
}

#[test]
fn test_counter_reset_gives_negative_delta() {
    let lines = [
        "2024-01-01 00:00:00,900 KB,5 KB,50%,3%,40%",
        "2024-01-01 00:01:00,12 KB,8 KB,51%,4%,41%",
    ];
    let record = parse_usage(&lines).unwrap();
    assert_eq!(record.upload_delta, Some(-888.0));
}

#[test]
fn test_fractional_counters() {
    let lines = [
        "2024-01-01 00:00:00,1.25 MB,0.5 MB,50%,3%,40%",
        "2024-01-01 00:01:00,1.75 MB,0.75 MB,51%,4%,41%",
    ];
    let record = parse_usage(&lines).unwrap();
    assert_eq!(record.upload_delta, Some(0.5));
    assert_eq!(record.download_delta, Some(0.25));
}

#[test]
fn test_units_are_not_normalized() {
    // Deltas are taken on the raw numbers; the unit is ignored.
    let lines = [
        "2024-01-01 00:00:00,900 KB,5 KB,50%,3%,40%",
        "2024-01-01 00:01:00,1 MB,8 KB,51%,4%,41%",
    ];
    let record = parse_usage(&lines).unwrap();
    assert_eq!(record.upload_delta, Some(-899.0));
}
