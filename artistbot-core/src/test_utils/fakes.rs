use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use artistbot_common::Error;
use artistbot_common::error::{CallError, ResolutionError};
use artistbot_common::models::{CallTarget, ChatId, MediaInfo};
use artistbot_common::traits::{CallTransport, ChatMessenger, MediaBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Join(CallTarget, PathBuf),
    Leave(CallTarget),
    Pause(CallTarget),
    Resume(CallTarget),
    Stop(CallTarget),
}

/// Call transport that records every request and can be told to refuse
/// joins for particular files.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_joins: Mutex<HashSet<PathBuf>>,
    join_delay: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_join_for(&self, source: impl AsRef<Path>) {
        self.fail_joins.lock().insert(source.as_ref().to_path_buf());
    }

    pub fn set_join_delay(&self, delay: Duration) {
        *self.join_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Sources of successful and failed joins, in request order.
    pub fn joined_sources(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Join(_, source) => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn join_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Join(..)))
    }

    pub fn leave_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Leave(_)))
    }

    pub fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl CallTransport for RecordingTransport {
    async fn join(&self, target: &CallTarget, source: &Path) -> Result<(), CallError> {
        self.calls
            .lock()
            .push(TransportCall::Join(*target, source.to_path_buf()));
        let delay = *self.join_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_joins.lock().contains(source) {
            return Err(CallError::Join(format!("refused {}", source.display())));
        }
        Ok(())
    }

    async fn leave(&self, target: &CallTarget) -> Result<(), CallError> {
        self.calls.lock().push(TransportCall::Leave(*target));
        Ok(())
    }

    async fn pause_stream(&self, target: &CallTarget) -> Result<(), CallError> {
        self.calls.lock().push(TransportCall::Pause(*target));
        Ok(())
    }

    async fn resume_stream(&self, target: &CallTarget) -> Result<(), CallError> {
        self.calls.lock().push(TransportCall::Resume(*target));
        Ok(())
    }

    async fn stop_stream(&self, target: &CallTarget) -> Result<(), CallError> {
        self.calls.lock().push(TransportCall::Stop(*target));
        Ok(())
    }
}

/// Messenger that keeps everything it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ChatId, String)>>,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl RecordingMessenger {
    /// The next `n` sends fail with a platform error.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().clone()
    }

    pub fn texts_for(&self, chat: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| *c == chat)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatMessenger for RecordingMessenger {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Platform("send refused".into()));
        }
        self.sent.lock().push((chat, text.to_string()));
        Ok(())
    }
}

/// Media backend answering from a fixed table and "downloading" by writing
/// bytes into the target directory.
#[derive(Debug, Default)]
pub struct FakeBackend {
    media: Mutex<HashMap<String, MediaInfo>>,
    failing_downloads: Mutex<HashSet<String>>,
    downloads: AtomicUsize,
    download_delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media(self, query: &str, media: MediaInfo) -> Self {
        self.media.lock().insert(query.to_string(), media);
        self
    }

    /// Downloads of `id` leave a partial file behind and then fail.
    pub fn fail_download_of(&self, id: &str) {
        self.failing_downloads.lock().insert(id.to_string());
    }

    pub fn set_download_delay(&self, delay: Duration) {
        *self.download_delay.lock() = Some(delay);
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn lookup(&self, query: &str) -> Result<MediaInfo, ResolutionError> {
        self.media
            .lock()
            .get(query)
            .cloned()
            .ok_or_else(|| ResolutionError::NotFound(query.to_string()))
    }

    async fn download(&self, media: &MediaInfo, dir: &Path) -> Result<PathBuf, ResolutionError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.download_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let ext = media.ext.clone().unwrap_or_else(|| "m4a".into());
        let target = dir.join(format!("{}.{ext}", media.id));

        if self.failing_downloads.lock().contains(&media.id) {
            tokio::fs::write(dir.join(format!("{}.{ext}.part", media.id)), b"half").await?;
            tokio::fs::write(&target, b"").await?;
            return Err(ResolutionError::Extraction("connection reset".into()));
        }

        tokio::fs::write(&target, b"not really audio").await?;
        Ok(target)
    }
}
