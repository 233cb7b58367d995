use std::path::{Path, PathBuf};

use lofty::prelude::AudioFile;
use tracing::{debug, warn};

/// Length of the audio stream in `path`, in whole seconds.
///
/// `None` when the file can't be read or reports no length; callers treat
/// that as "unknown" rather than an error.
pub async fn probe_duration(path: &Path) -> Option<u64> {
    let path: PathBuf = path.to_path_buf();
    match tokio::task::spawn_blocking(move || read_duration(&path)).await {
        Ok(secs) => secs,
        Err(e) => {
            warn!("(probe) duration probe task failed: {e}");
            None
        }
    }
}

fn read_duration(path: &Path) -> Option<u64> {
    match lofty::read_from_path(path) {
        Ok(tagged) => {
            let secs = tagged.properties().duration().as_secs();
            (secs > 0).then_some(secs)
        }
        Err(e) => {
            debug!("(probe) could not read {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreadable_file_is_unknown_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        assert_eq!(probe_duration(&path).await, None);
        assert_eq!(probe_duration(&dir.path().join("missing.mp3")).await, None);
    }
}
