use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use artistbot_common::models::{ChatId, PlaybackEvent};
use artistbot_common::traits::CallTransport;

use crate::playback::session::{PlaybackSession, SessionSettings};

const EVENT_CAPACITY: usize = 64;

/// Process-wide map from chat to its playback session.
///
/// Sessions are created on first use and kept for the life of the process.
pub struct SessionRegistry {
    sessions: DashMap<ChatId, Arc<PlaybackSession>>,
    transport: Arc<dyn CallTransport>,
    events: broadcast::Sender<PlaybackEvent>,
    shutdown: CancellationToken,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(transport: Arc<dyn CallTransport>, settings: SessionSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sessions: DashMap::new(),
            transport,
            events,
            shutdown: CancellationToken::new(),
            settings,
        }
    }

    /// Returns the chat's session, creating an empty one on first call.
    ///
    /// The map entry is locked between the lookup and the insert, so two
    /// racing callers for an unseen chat get the same instance.
    pub fn get_or_create(&self, chat_id: ChatId) -> Arc<PlaybackSession> {
        let entry = self.sessions.entry(chat_id).or_insert_with(|| {
            info!("(SessionRegistry) creating session for chat={chat_id}");
            Arc::new(PlaybackSession::new(
                chat_id,
                self.transport.clone(),
                self.events.clone(),
                self.shutdown.child_token(),
                self.settings.clone(),
            ))
        });
        Arc::clone(entry.value())
    }

    /// Existing session only; control commands on unseen chats use this.
    pub fn get(&self, chat_id: ChatId) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&chat_id).map(|s| Arc::clone(s.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Token cancelled on shutdown; in-flight resolutions select on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancels every consumer loop (each leaves its call if joined) and waits
    /// up to `grace` for them to finish. Never fails; stragglers are logged.
    pub async fn shutdown(&self, grace: Duration) {
        info!(
            "(SessionRegistry) shutting down {} session(s)",
            self.sessions.len()
        );
        self.shutdown.cancel();

        let sessions: Vec<Arc<PlaybackSession>> =
            self.sessions.iter().map(|s| Arc::clone(s.value())).collect();
        let deadline = tokio::time::Instant::now() + grace;

        for session in &sessions {
            let dropped = session.queue().clear();
            if dropped > 0 {
                info!(
                    "(SessionRegistry) chat={} dropping {dropped} queued track(s)",
                    session.chat_id()
                );
            }
        }

        let waits = sessions.into_iter().filter_map(|session| {
            let handle = session.take_consumer()?;
            Some(async move {
                match tokio::time::timeout_at(deadline, handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(
                        "(SessionRegistry) consumer for chat={} ended abnormally: {e}",
                        session.chat_id()
                    ),
                    Err(_) => warn!(
                        "(SessionRegistry) consumer for chat={} did not stop within {:?}",
                        session.chat_id(),
                        grace
                    ),
                }
            })
        });
        join_all(waits).await;
        info!("(SessionRegistry) shutdown complete");
    }
}
