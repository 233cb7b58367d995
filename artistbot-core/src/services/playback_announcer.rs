// File: artistbot-core/src/services/playback_announcer.rs

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use artistbot_common::models::{FinishReason, PlaybackEvent};
use artistbot_common::traits::ChatMessenger;
use artistbot_common::utils::duration_label;

/// Relays playback events into the chat they belong to.
pub struct PlaybackAnnouncer {
    messenger: Arc<dyn ChatMessenger>,
}

impl PlaybackAnnouncer {
    pub fn new(messenger: Arc<dyn ChatMessenger>) -> Self {
        Self { messenger }
    }

    /// Chat line for an event, if it warrants one. Pause and resume are
    /// already answered by the command that caused them.
    pub fn render(event: &PlaybackEvent) -> Option<String> {
        match event {
            PlaybackEvent::TrackStarted { track, .. } => Some(format!(
                "▶️ Now playing: {} ({}) requested by {}",
                track.title(),
                duration_label(track.duration_secs()),
                track.requester()
            )),
            PlaybackEvent::JoinFailed { track, error, .. } => Some(format!(
                "❌ Couldn't start {}: {error}. Moving on.",
                track.title()
            )),
            PlaybackEvent::TrackFinished {
                reason: FinishReason::Shutdown,
                track,
                ..
            } => Some(format!("⏹ Stopped {} (bot is shutting down)", track.title())),
            PlaybackEvent::TrackFinished { .. }
            | PlaybackEvent::Paused { .. }
            | PlaybackEvent::Resumed { .. } => None,
        }
    }

    /// Consumes `events` until the channel closes or `shutdown` fires.
    /// Events already buffered when `shutdown` fires are still announced.
    pub fn spawn(
        self,
        mut events: broadcast::Receiver<PlaybackEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("(PlaybackAnnouncer) started");
            loop {
                let event = tokio::select! {
                    biased;
                    event = events.recv() => event,
                    _ = shutdown.cancelled() => {
                        while let Ok(event) = events.try_recv() {
                            self.announce(&event).await;
                        }
                        break;
                    }
                };
                match event {
                    Ok(event) => self.announce(&event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("(PlaybackAnnouncer) fell behind; {missed} event(s) dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("(PlaybackAnnouncer) stopped");
        })
    }

    async fn announce(&self, event: &PlaybackEvent) {
        let chat = event.chat_id();
        let Some(text) = Self::render(event) else {
            debug!("(PlaybackAnnouncer) chat={chat} nothing to say for {event:?}");
            return;
        };
        if let Err(e) = self.messenger.send_message(chat, &text).await {
            warn!("(PlaybackAnnouncer) chat={chat} announcement failed: {e}");
        }
    }
}
