use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};
use url::Url;
use which::which;
use youtube_dl::{SingleVideo, YoutubeDl, YoutubeDlOutput};

use artistbot_common::error::ResolutionError;
use artistbot_common::models::MediaInfo;
use artistbot_common::traits::MediaBackend;

use crate::resolver::locate_download;

const AUDIO_FORMAT: &str = "bestaudio/best";
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";
const SOCKET_TIMEOUT_SECS: &str = "20";

/// Path of the yt-dlp executable: the configured one, else whatever is on `PATH`.
pub fn locate_yt_dlp(configured: Option<&str>) -> Result<String, ResolutionError> {
    let path = match configured {
        Some(path) if !path.trim().is_empty() => path.to_string(),
        _ => which("yt-dlp")
            .map(|p| p.to_string_lossy().to_string())
            .map_err(|e| {
                error!("yt-dlp path not found: {e:?}");
                ResolutionError::Backend(format!("yt-dlp not found: {e}"))
            })?,
    };
    info!("Using yt-dlp path: {path:?}");
    Ok(path)
}

/// Urls are handed to yt-dlp as-is; anything else becomes a single-result search.
fn search_target(query: &str) -> String {
    match Url::parse(query) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
        _ => format!("ytsearch1:{query}"),
    }
}

fn duration_secs(value: &Value) -> Option<u64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(|secs| secs.round() as u64)
}

fn to_media(video: &SingleVideo) -> MediaInfo {
    MediaInfo {
        id: video.id.clone(),
        title: video.title.clone(),
        duration_secs: video.duration.as_ref().and_then(duration_secs),
        ext: video.ext.clone(),
        url: video.webpage_url.clone(),
    }
}

/// [`MediaBackend`] backed by the yt-dlp executable.
pub struct YtDlpBackend {
    exe: String,
}

impl YtDlpBackend {
    pub fn new(exe: impl Into<String>) -> Self {
        Self { exe: exe.into() }
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    async fn lookup(&self, query: &str) -> Result<MediaInfo, ResolutionError> {
        let target = search_target(query);
        info!("extracting metadata for {target} - this may take a few seconds");

        let output = YoutubeDl::new(target)
            .youtube_dl_path(&self.exe)
            .format(AUDIO_FORMAT)
            .socket_timeout(SOCKET_TIMEOUT_SECS)
            .extra_arg("--no-playlist")
            .run_async()
            .await
            .map_err(|e| ResolutionError::Extraction(format!("error running yt-dlp: {e}")))?;
        info!("metadata extraction complete");

        match output {
            YoutubeDlOutput::SingleVideo(video) => {
                info!("found single video: {:?}", video.title);
                Ok(to_media(&video))
            }
            YoutubeDlOutput::Playlist(playlist) => {
                info!("found playlist: {:?}", playlist.title);
                playlist
                    .entries
                    .as_ref()
                    .and_then(|entries| entries.first())
                    .map(to_media)
                    .ok_or_else(|| ResolutionError::NotFound(query.to_string()))
            }
        }
    }

    async fn download(&self, media: &MediaInfo, dir: &Path) -> Result<PathBuf, ResolutionError> {
        let source = media.url.clone().unwrap_or_else(|| media.id.clone());
        info!("downloading {source} into {}", dir.display());

        YoutubeDl::new(source)
            .youtube_dl_path(&self.exe)
            .format(AUDIO_FORMAT)
            .socket_timeout(SOCKET_TIMEOUT_SECS)
            .extra_arg("--no-playlist")
            .output_template(OUTPUT_TEMPLATE)
            .download_to_async(dir)
            .await
            .map_err(|e| ResolutionError::Extraction(format!("download failed: {e}")))?;

        locate_download(dir, media).await.ok_or_else(|| {
            ResolutionError::Extraction(format!(
                "yt-dlp finished but no file for {} was found",
                media.id
            ))
        })
    }
}
