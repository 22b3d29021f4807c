//! Primary sink creation and teardown

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::fs::{self, File};

/// How a delete attempt sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The file was removed
    Deleted,
    /// Nothing to remove (file or its directory missing)
    AlreadyAbsent,
    /// Every attempt failed; the file may still exist
    Abandoned,
}

/// Create (or truncate) the temp buffer, creating parent directories first
pub async fn create_buffer(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    File::create(path).await
}

/// Delete `path`, retrying up to `attempts` times with `delay` in between
///
/// Absence counts as success. Failures are logged, never returned.
pub async fn delete_with_retry(path: &Path, attempts: u32, delay: Duration) -> CleanupOutcome {
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Temp buffer deleted");
                return CleanupOutcome::Deleted;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return CleanupOutcome::AlreadyAbsent;
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    attempt = attempt,
                    error = %e,
                    "Failed to delete temp buffer"
                );
            }
        }

        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::error!(
        path = %path.display(),
        attempts = attempts,
        "Giving up on temp buffer deletion"
    );

    CleanupOutcome::Abandoned
}
