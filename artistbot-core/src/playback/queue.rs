use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use artistbot_common::models::Track;

/// Unbounded FIFO of tracks waiting to be played, drained by a single consumer.
///
/// Producers never block. The consumer suspends in [`SessionQueue::pop`]
/// while the queue is empty.
#[derive(Debug, Default)]
pub struct SessionQueue {
    tracks: Mutex<VecDeque<Track>>,
    available: Notify,
}

impl SessionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail and returns the track's 1-based position in line.
    pub fn push(&self, track: Track) -> usize {
        let position = {
            let mut tracks = self.tracks.lock();
            tracks.push_back(track);
            tracks.len()
        };
        // notify_one stores a permit when the consumer isn't parked yet,
        // so a push racing with `pop` is never lost.
        self.available.notify_one();
        position
    }

    pub fn try_pop(&self) -> Option<Track> {
        self.tracks.lock().pop_front()
    }

    /// Waits for the next track.
    pub async fn pop(&self) -> Track {
        loop {
            if let Some(track) = self.try_pop() {
                return track;
            }
            self.available.notified().await;
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout` with `None`.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<Track> {
        tokio::time::timeout(timeout, self.pop()).await.ok()
    }

    pub fn len(&self) -> usize {
        self.tracks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.lock().is_empty()
    }

    /// Waiting tracks in play order.
    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.lock().iter().cloned().collect()
    }

    pub fn clear(&self) -> usize {
        let mut tracks = self.tracks.lock();
        let n = tracks.len();
        tracks.clear();
        n
    }
}
