use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ResolutionError;
use crate::models::MediaInfo;

/// Extraction backend: finds the best match for a query and downloads it.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Metadata for the best match of `query` (a url or free-text search).
    async fn lookup(&self, query: &str) -> Result<MediaInfo, ResolutionError>;

    /// Download `media` into `dir` and return the path of the finished file.
    async fn download(&self, media: &MediaInfo, dir: &Path) -> Result<PathBuf, ResolutionError>;
}
