//! src/playback/session.rs
//!
//! One chat's playback: its waiting queue, the track being streamed, the call
//! it is bound to, and the single consumer loop that drives join/hold/leave.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use artistbot_common::error::{CallError, ControlError};
use artistbot_common::models::{
    CallTarget, ChatId, FinishReason, PlaybackEvent, PlaybackStatus, SessionSnapshot, Track,
};
use artistbot_common::traits::CallTransport;

use crate::playback::queue::SessionQueue;

/// Upper bound on a best-effort leave before the consumer moves on.
const LEAVE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    /// How long an idle consumer waits on an empty queue before exiting.
    /// `None` keeps it parked until shutdown.
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug)]
struct SessionState {
    status: PlaybackStatus,
    current: Option<Track>,
    paused: bool,
    /// Call this chat streams into, set by `bind_call`.
    call: Option<CallTarget>,
    /// Call actually joined for `current`.
    joined: Option<CallTarget>,
    skip: Option<CancellationToken>,
    started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn idle(call: Option<CallTarget>) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current: None,
            paused: false,
            call,
            joined: None,
            skip: None,
            started_at: None,
        }
    }
}

pub struct PlaybackSession {
    chat_id: ChatId,
    queue: SessionQueue,
    state: Mutex<SessionState>,
    consumer: parking_lot::Mutex<Option<JoinHandle<()>>>,
    pause_tx: watch::Sender<bool>,
    transport: Arc<dyn CallTransport>,
    events: broadcast::Sender<PlaybackEvent>,
    shutdown: CancellationToken,
    settings: SessionSettings,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("chat_id", &self.chat_id)
            .field("queued", &self.queue.len())
            .field("consumer_running", &self.consumer_running())
            .finish()
    }
}

impl PlaybackSession {
    pub fn new(
        chat_id: ChatId,
        transport: Arc<dyn CallTransport>,
        events: broadcast::Sender<PlaybackEvent>,
        shutdown: CancellationToken,
        settings: SessionSettings,
    ) -> Self {
        let (pause_tx, _) = watch::channel(false);
        Self {
            chat_id,
            queue: SessionQueue::new(),
            state: Mutex::new(SessionState::idle(None)),
            consumer: parking_lot::Mutex::new(None),
            pause_tx,
            transport,
            events,
            shutdown,
            settings,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn queue(&self) -> &SessionQueue {
        &self.queue
    }

    /// Records which call this chat's tracks are streamed into.
    pub async fn bind_call(&self, target: CallTarget) {
        let mut state = self.state.lock().await;
        if state.call != Some(target) {
            info!(
                "(PlaybackSession) chat={} bound to call guild={} channel={}",
                self.chat_id, target.guild_id, target.channel_id
            );
        }
        state.call = Some(target);
    }

    pub async fn call_target(&self) -> Option<CallTarget> {
        self.state.lock().await.call
    }

    /// Appends to the tail of the queue; does not start the consumer.
    /// Returns the track's position in line.
    pub fn enqueue(&self, track: Track) -> usize {
        debug!(
            "(PlaybackSession) chat={} enqueue '{}'",
            self.chat_id,
            track.title()
        );
        self.queue.push(track)
    }

    pub fn consumer_running(&self) -> bool {
        self.consumer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawns the consumer loop unless one is already alive. Returns `true`
    /// when this call started it.
    ///
    /// Check and spawn happen under one guard, so concurrent callers start at
    /// most one loop.
    pub fn ensure_consumer_running(self: &Arc<Self>) -> bool {
        let mut slot = self.consumer.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        if self.shutdown.is_cancelled() {
            debug!(
                "(PlaybackSession) chat={} shutting down; not starting consumer",
                self.chat_id
            );
            return false;
        }

        let session = Arc::clone(self);
        *slot = Some(tokio::spawn(async move { session.run_consumer().await }));
        info!("(PlaybackSession) chat={} consumer loop started", self.chat_id);
        true
    }

    /// Hands the consumer's join handle to the caller (used at shutdown).
    pub(crate) fn take_consumer(&self) -> Option<JoinHandle<()>> {
        self.consumer.lock().take()
    }

    pub async fn now_playing(&self) -> Option<Track> {
        self.state.lock().await.current.clone()
    }

    pub async fn status(&self) -> PlaybackStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            chat_id: self.chat_id,
            status: state.status,
            current: state.current.clone(),
            paused: state.paused,
            queued: self.queue.snapshot(),
            consumer_running: self.consumer_running(),
            call: state.call,
            started_at: state.started_at,
        }
    }

    /// Halts the stream without leaving the call.
    pub async fn pause(&self) -> Result<Track, ControlError> {
        let mut state = self.state.lock().await;
        match state.status {
            PlaybackStatus::Playing => {}
            PlaybackStatus::Paused => return Err(ControlError::AlreadyPaused),
            _ => return Err(ControlError::NothingPlaying),
        }
        let (Some(track), Some(target)) = (state.current.clone(), state.joined) else {
            return Err(ControlError::NothingPlaying);
        };

        self.transport.pause_stream(&target).await?;
        state.paused = true;
        state.status = PlaybackStatus::Paused;
        self.pause_tx.send_replace(true);
        drop(state);

        info!("(PlaybackSession) chat={} paused '{}'", self.chat_id, track.title());
        self.publish(PlaybackEvent::Paused {
            chat_id: self.chat_id,
        });
        Ok(track)
    }

    pub async fn resume(&self) -> Result<Track, ControlError> {
        let mut state = self.state.lock().await;
        match state.status {
            PlaybackStatus::Paused => {}
            PlaybackStatus::Playing => return Err(ControlError::NotPaused),
            _ => return Err(ControlError::NothingPlaying),
        }
        let (Some(track), Some(target)) = (state.current.clone(), state.joined) else {
            return Err(ControlError::NothingPlaying);
        };

        self.transport.resume_stream(&target).await?;
        state.paused = false;
        state.status = PlaybackStatus::Playing;
        self.pause_tx.send_replace(false);
        drop(state);

        info!("(PlaybackSession) chat={} resumed '{}'", self.chat_id, track.title());
        self.publish(PlaybackEvent::Resumed {
            chat_id: self.chat_id,
        });
        Ok(track)
    }

    /// Stops the current stream and cuts the hold short; the consumer then
    /// leaves the call and moves to the next queued track.
    pub async fn skip(&self) -> Result<Track, ControlError> {
        let state = self.state.lock().await;
        let Some(track) = state.current.clone() else {
            return Err(ControlError::NothingPlaying);
        };
        if matches!(state.status, PlaybackStatus::Idle | PlaybackStatus::Leaving) {
            return Err(ControlError::NothingPlaying);
        }

        if let Some(target) = state.joined {
            if let Err(e) = self.transport.stop_stream(&target).await {
                warn!(
                    "(PlaybackSession) chat={} stop_stream failed during skip: {e}",
                    self.chat_id
                );
            }
        }
        if let Some(skip) = &state.skip {
            skip.cancel();
        }

        info!("(PlaybackSession) chat={} skipped '{}'", self.chat_id, track.title());
        Ok(track)
    }

    async fn run_consumer(self: Arc<Self>) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = self.next_track() => next,
            };

            let Some(track) = next else {
                if self.retire_if_idle() {
                    info!(
                        "(PlaybackSession) chat={} idle timeout reached; consumer loop exiting",
                        self.chat_id
                    );
                    return;
                }
                continue;
            };

            if !self.play_track(track).await {
                break;
            }
        }
        info!("(PlaybackSession) chat={} consumer loop stopped", self.chat_id);
    }

    async fn next_track(&self) -> Option<Track> {
        match self.settings.idle_timeout {
            Some(timeout) => self.queue.pop_timeout(timeout).await,
            None => Some(self.queue.pop().await),
        }
    }

    /// Clears the consumer slot if the queue is still empty. Runs under the
    /// same guard as `ensure_consumer_running`, so a producer either sees the
    /// slot cleared and spawns a new loop, or its track is seen here.
    fn retire_if_idle(&self) -> bool {
        let mut slot = self.consumer.lock();
        if !self.queue.is_empty() {
            return false;
        }
        slot.take();
        true
    }

    /// Runs one track through join, hold and leave. Returns `false` once
    /// shutdown has been requested.
    async fn play_track(&self, track: Track) -> bool {
        let skip = CancellationToken::new();
        let target = {
            let mut state = self.state.lock().await;
            state.current = Some(track.clone());
            state.status = PlaybackStatus::Joining;
            state.paused = false;
            state.skip = Some(skip.clone());
            state.started_at = None;
            state.call
        };
        self.pause_tx.send_replace(false);

        info!(
            "(PlaybackSession) chat={} joining call for '{}'",
            self.chat_id,
            track.title()
        );

        let joined = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                if let Some(target) = target {
                    self.leave(&target).await;
                }
                self.clear_current().await;
                return false;
            }
            joined = self.join(target, &track) => joined,
        };

        let target = match joined {
            Ok(target) => target,
            Err(error) => {
                warn!(
                    "(PlaybackSession) chat={} join failed for '{}': {error}; dropping track",
                    self.chat_id,
                    track.title()
                );
                self.clear_current().await;
                self.publish(PlaybackEvent::JoinFailed {
                    chat_id: self.chat_id,
                    track,
                    error,
                });
                return !self.shutdown.is_cancelled();
            }
        };

        {
            let mut state = self.state.lock().await;
            state.status = PlaybackStatus::Playing;
            state.joined = Some(target);
            state.started_at = Some(Utc::now());
        }
        self.publish(PlaybackEvent::TrackStarted {
            chat_id: self.chat_id,
            track: track.clone(),
        });

        let reason = self.hold(&track, &skip).await;
        debug!(
            "(PlaybackSession) chat={} hold for '{}' ended: {reason:?}",
            self.chat_id,
            track.title()
        );

        self.state.lock().await.status = PlaybackStatus::Leaving;
        self.leave(&target).await;
        self.clear_current().await;

        self.publish(PlaybackEvent::TrackFinished {
            chat_id: self.chat_id,
            track,
            reason,
        });
        reason != FinishReason::Shutdown
    }

    async fn join(&self, target: Option<CallTarget>, track: &Track) -> Result<CallTarget, CallError> {
        let target = target.ok_or(CallError::NoActiveCall)?;
        self.transport.join(&target, track.filepath()).await?;
        Ok(target)
    }

    /// Best-effort: failures are logged and never propagated.
    async fn leave(&self, target: &CallTarget) {
        match tokio::time::timeout(LEAVE_TIMEOUT, self.transport.leave(target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("(PlaybackSession) chat={} leave failed: {e}", self.chat_id),
            Err(_) => warn!(
                "(PlaybackSession) chat={} leave timed out after {:?}",
                self.chat_id, LEAVE_TIMEOUT
            ),
        }
    }

    /// Waits out the track's hold duration, counting only time spent
    /// unpaused. Skip and shutdown end the wait immediately.
    async fn hold(&self, track: &Track, skip: &CancellationToken) -> FinishReason {
        let mut remaining = track.hold_duration();
        let mut paused_rx = self.pause_tx.subscribe();

        loop {
            let paused = *paused_rx.borrow_and_update();
            if paused {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => return FinishReason::Shutdown,
                    _ = skip.cancelled() => return FinishReason::Skipped,
                    changed = paused_rx.changed() => {
                        if changed.is_err() {
                            return FinishReason::Shutdown;
                        }
                    }
                }
            } else {
                let started = Instant::now();
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => return FinishReason::Shutdown,
                    _ = skip.cancelled() => return FinishReason::Skipped,
                    _ = tokio::time::sleep(remaining) => return FinishReason::Completed,
                    changed = paused_rx.changed() => {
                        if changed.is_err() {
                            return FinishReason::Shutdown;
                        }
                        remaining = remaining.saturating_sub(started.elapsed());
                    }
                }
            }
        }
    }

    async fn clear_current(&self) {
        {
            let mut state = self.state.lock().await;
            let call = state.call;
            *state = SessionState::idle(call);
        }
        self.pause_tx.send_replace(false);
    }

    fn publish(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
