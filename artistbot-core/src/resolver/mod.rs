//! Turning a user query into a downloaded, playable [`Track`].

mod probe;
mod yt_dlp;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use artistbot_common::error::ResolutionError;
use artistbot_common::models::{MediaInfo, Track};
use artistbot_common::traits::MediaBackend;

pub use probe::probe_duration;
pub use yt_dlp::{YtDlpBackend, locate_yt_dlp};

/// Resolves queries through a [`MediaBackend`] into files under one shared
/// download directory.
///
/// Files are keyed by the backend's media id, so concurrent requests for
/// different media never collide; requests for the same id are serialized.
pub struct MediaResolver {
    backend: Arc<dyn MediaBackend>,
    download_dir: PathBuf,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl MediaResolver {
    pub fn new(backend: Arc<dyn MediaBackend>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            download_dir: download_dir.into(),
            in_flight: DashMap::new(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Creates the download directory if it is missing.
    pub async fn ensure_download_dir(&self) -> Result<(), ResolutionError> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        Ok(())
    }

    /// Looks up `query`, downloads the best match (or reuses an earlier
    /// download of it) and returns the finished track.
    ///
    /// Never returns a partially written file: on failure any leftovers for
    /// the media id are removed.
    pub async fn resolve(&self, query: &str, requester: &str) -> Result<Track, ResolutionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolutionError::EmptyQuery);
        }
        self.ensure_download_dir().await?;

        info!("(MediaResolver) resolving '{query}' for {requester}");
        let media = self.backend.lookup(query).await?;
        if !is_safe_id(&media.id) {
            return Err(ResolutionError::Extraction(format!(
                "backend returned an unusable media id {:?}",
                media.id
            )));
        }

        let lock = self.lock_for(&media.id);
        let path = {
            let _guard = lock.lock().await;
            self.fetch(&media).await
        };
        drop(lock);
        self.in_flight
            .remove_if(&media.id, |_, l| Arc::strong_count(l) == 1);
        let path = path?;

        let duration_secs = match media.duration_secs {
            Some(secs) if secs > 0 => secs,
            _ => probe_duration(&path).await.unwrap_or(0),
        };
        let title = media
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| media.id.clone())
            });

        info!(
            "(MediaResolver) resolved '{query}' => '{title}' ({duration_secs}s) at {}",
            path.display()
        );
        Ok(Track::new(title, requester, path, duration_secs, media.id))
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.in_flight
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    async fn fetch(&self, media: &MediaInfo) -> Result<PathBuf, ResolutionError> {
        if let Some(path) = locate_download(&self.download_dir, media).await {
            debug!(
                "(MediaResolver) reusing earlier download {}",
                path.display()
            );
            return Ok(path);
        }

        let path = match self.backend.download(media, &self.download_dir).await {
            Ok(path) => path,
            Err(e) => {
                discard_partial(&self.download_dir, &media.id).await;
                return Err(e);
            }
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(path),
            Ok(_) => {
                discard_partial(&self.download_dir, &media.id).await;
                Err(ResolutionError::Extraction(format!(
                    "download of {} produced an empty file",
                    media.id
                )))
            }
            Err(e) => {
                discard_partial(&self.download_dir, &media.id).await;
                Err(ResolutionError::Storage(e))
            }
        }
    }
}

/// Ids become file names, so anything that could escape the directory is refused.
fn is_safe_id(id: &str) -> bool {
    !id.trim().is_empty() && !id.contains(['/', '\\']) && id != "." && id != ".."
}

fn is_partial(name: &str) -> bool {
    name.ends_with(".part") || name.ends_with(".ytdl") || name.contains(".part-Frag")
}

/// Finds a completed, non-empty download for `media` in `dir`.
pub(crate) async fn locate_download(dir: &Path, media: &MediaInfo) -> Option<PathBuf> {
    if let Some(name) = media.file_name() {
        let path = dir.join(name);
        if let Ok(meta) = tokio::fs::metadata(&path).await {
            if meta.is_file() && meta.len() > 0 {
                return Some(path);
            }
        }
    }

    // The backend may have picked a different container than it reported.
    let prefix = format!("{}.", media.id);
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) || is_partial(&name) {
            continue;
        }
        if let Ok(meta) = entry.metadata().await {
            if meta.is_file() && meta.len() > 0 {
                return Some(entry.path());
            }
        }
    }
    None
}

/// Removes empty targets and partial-download leftovers for `id`.
async fn discard_partial(dir: &Path, id: &str) {
    let prefix = format!("{id}.");
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) {
            continue;
        }
        let empty = entry.metadata().await.map(|m| m.len() == 0).unwrap_or(false);
        if is_partial(&name) || empty {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!("(MediaResolver) could not remove leftover {name}: {e}");
            } else {
                debug!("(MediaResolver) removed leftover {name}");
            }
        }
    }
}
