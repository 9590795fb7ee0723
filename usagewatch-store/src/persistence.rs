//! File persistence helpers.
//!
//! The inventory holds passwords, so files are written owner-only.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StoreError;

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - Linux: `~/.config/usagewatch`
/// - macOS: `~/Library/Application Support/usagewatch`
/// - Windows: `%APPDATA%\usagewatch`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|c| c.join("usagewatch"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default inventory file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("servers.json")
}

// ============================================================================
// Security: File Permissions
// ============================================================================

/// Sets owner-only file permissions (0o600) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0600", "Set restrictive permissions");
    Ok(())
}

/// Sets owner-only directory permissions (0o700) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o700);
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0700", "Set restrictive directory permissions");
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Ensures a directory exists; a newly created one is owner-only.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        set_restrictive_dir_permissions(path).await?;
    }
    Ok(())
}

/// Writes `content` atomically (temp file + rename) with owner-only
/// permissions, creating the parent directory if needed.
///
/// # Errors
///
/// Returns an IO error if any step fails.
pub async fn save_private(path: &Path, content: &str) -> Result<(), StoreError> {
    debug!(path = %path.display(), bytes = content.len(), "Saving file");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent).await?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    tokio::fs::write(&temp_path, content).await?;
    set_restrictive_permissions(&temp_path).await?;
    tokio::fs::rename(&temp_path, path).await?;

    debug!(path = %path.display(), "File saved");
    Ok(())
}

/// Reads a whole file.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read.
pub async fn load_text(path: &Path) -> Result<String, StoreError> {
    debug!(path = %path.display(), "Loading file");
    Ok(tokio::fs::read_to_string(path).await?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("usagewatch/servers.json"));
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("deeply").join("nested").join("servers.json");

        save_private(&path, "{}").await.unwrap();

        assert_eq!(load_text(&path).await.unwrap(), "{}");
        assert!(!path.with_file_name("servers.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_not_found() {
        let err = load_text(Path::new("/nonexistent/usagewatch/servers.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_ensure_dir_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("config");

        ensure_dir(&dir).await.unwrap();
        ensure_dir(&dir).await.unwrap();

        assert!(dir.is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("servers.json");

        save_private(&path, r#"{"servers": []}"#).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
