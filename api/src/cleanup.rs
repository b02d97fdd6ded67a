/// Periodic deletion of old downloads and temp files.
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

/// Delete regular files in `dirs` older than `retention`. Returns how many were removed.
///
/// Age is taken from the creation time where the platform records one, else
/// the modification time. Failures are logged and skipped.
pub async fn sweep(dirs: &[PathBuf], retention: Duration) -> usize {
    let now = SystemTime::now();
    let mut removed = 0;

    for dir in dirs {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cleanup cannot read {:?}: {}", dir, e);
                continue;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            match expired(&path, now, retention).await {
                Ok(true) => match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        info!("Cleaned up old file: {:?}", entry.file_name());
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to delete {:?}: {}", path, e),
                },
                Ok(false) => {}
                Err(e) => warn!("Cannot stat {:?}: {}", path, e),
            }
        }
    }

    removed
}

async fn expired(path: &Path, now: SystemTime, retention: Duration) -> std::io::Result<bool> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_file() {
        return Ok(false);
    }
    let stamp = meta.created().or_else(|_| meta.modified())?;
    Ok(now.duration_since(stamp).unwrap_or_default() > retention)
}
