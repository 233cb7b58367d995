use std::path::{Path, PathBuf};
use std::time::Duration;

/// One resolved, fully downloaded, playable unit.
///
/// Never mutated after construction: it moves into a session queue on
/// enqueue, becomes the session's `current` while it plays, then is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    requester: String,
    filepath: PathBuf,
    duration_secs: u64,
    source_id: String,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        requester: impl Into<String>,
        filepath: impl Into<PathBuf>,
        duration_secs: u64,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            requester: requester.into(),
            filepath: filepath.into(),
            duration_secs,
            source_id: source_id.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    /// Reported length in seconds; `0` means unknown.
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Stable id from the media backend, also the stem of the downloaded file.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// How long the stream is held open: the reported duration, never less
    /// than one second.
    pub fn hold_duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs.max(1))
    }
}
