use std::path::Path;
use std::time::SystemTime;

use log::{debug, warn};

/// Delete every file under `dir` whose modification time is strictly older
/// than `older_than`. Subdirectories are walked; directories themselves are
/// left in place. A missing `dir` is not an error.
///
/// Returns the number of files removed.
///
/// # Errors
/// Returns an error only when `dir` exists but cannot be read. Failures on
/// individual entries are logged and skipped.
pub fn delete_expired_files(dir: &Path, older_than: SystemTime) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("Failed to read entry in {}: {error}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        if metadata.is_dir() {
            match delete_expired_files(&path, older_than) {
                Ok(count) => removed += count,
                Err(error) => warn!("Failed to purge {}: {error}", path.display()),
            }
            continue;
        }

        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if modified >= older_than {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted expired file {}", path.display());
                removed += 1;
            }
            Err(error) => warn!("Failed to delete expired file {}: {error}", path.display()),
        }
    }

    Ok(removed)
}

/// Mark `path` as executable for owner, group and others.
///
/// # Errors
/// Returns an error when the file does not exist or its permissions cannot be
/// changed.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(path, permissions)
}

/// No-op on platforms without executable permission bits.
///
/// # Errors
/// Never fails.
#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
