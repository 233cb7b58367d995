/// Best match reported by a media backend for a query, before download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    /// Stable id from the source site; downloaded files are keyed by it.
    pub id: String,
    pub title: Option<String>,
    pub duration_secs: Option<u64>,
    pub ext: Option<String>,
    /// Canonical page url to download from, when the backend knows it.
    pub url: Option<String>,
}

impl MediaInfo {
    /// File name the download is expected to land under, e.g. `dQw4w9WgXcQ.m4a`.
    pub fn file_name(&self) -> Option<String> {
        self.ext.as_ref().map(|ext| format!("{}.{}", self.id, ext))
    }
}
