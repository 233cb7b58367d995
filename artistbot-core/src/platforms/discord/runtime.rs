use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    self as gateway, CloseFrame, Config, Event, EventTypeFlags, Intents, MessageSender, Shard,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_model::gateway::payload::incoming::{MessageCreate, Ready as ReadyPayload};
use twilight_model::id::Id;
use twilight_model::id::marker::ChannelMarker;

use artistbot_common::models::{CallTarget, ChatId};
use artistbot_common::traits::{CallTransport, ChatMessenger};

use crate::Error;
use crate::services::CommandContext;

#[cfg(feature = "voice")]
use songbird::Songbird;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// An inbound guild or DM message, with the author's voice channel if the
/// cache has seen them in one.
#[derive(Debug, Clone)]
pub struct DiscordMessageEvent {
    pub channel_id: u64,
    pub guild_id: Option<u64>,
    pub username: String,
    pub text: String,
    pub voice_channel_id: Option<u64>,
    /// Content of the message being replied to.
    pub referenced_text: Option<String>,
}

impl DiscordMessageEvent {
    pub fn command_context(&self) -> CommandContext {
        let call_target = match (self.guild_id, self.voice_channel_id) {
            (Some(guild_id), Some(channel_id)) => Some(CallTarget {
                guild_id,
                channel_id,
            }),
            _ => None,
        };
        CommandContext {
            chat_id: ChatId(self.channel_id),
            requester: self.username.clone(),
            call_target,
            reply_text: self.referenced_text.clone(),
        }
    }
}

/// Pumps one shard: updates the cache (voice states included), feeds voice
/// events to songbird, and forwards human-authored messages to `tx`.
async fn shard_runner(
    mut shard: Shard,
    tx: UnboundedSender<DiscordMessageEvent>,
    cache: Arc<InMemoryCache>,
    #[cfg(feature = "voice")] songbird: Arc<Songbird>,
) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };

        cache.update(&event);
        #[cfg(feature = "voice")]
        songbird.process(&event).await;

        match &event {
            Event::Ready(ready) => {
                let data: &ReadyPayload = ready.as_ref();
                info!(
                    "Shard {shard_id} => READY as {} (ID={})",
                    data.user.name, data.user.id
                );
            }
            Event::MessageCreate(msg_create) => {
                let msg: &MessageCreate = msg_create;
                if msg.author.bot {
                    debug!("Ignoring bot message from {}", msg.author.name);
                    continue;
                }

                let voice_channel_id = msg.guild_id.and_then(|guild| {
                    cache
                        .voice_state(msg.author.id, guild)
                        .map(|state| state.channel_id().get())
                });

                let _ = tx.send(DiscordMessageEvent {
                    channel_id: msg.channel_id.get(),
                    guild_id: msg.guild_id.map(|g| g.get()),
                    username: msg.author.name.clone(),
                    text: msg.content.clone(),
                    voice_channel_id,
                    referenced_text: msg.referenced_message.as_ref().map(|m| m.content.clone()),
                });
            }
            _ => {
                trace!("Shard {shard_id} => unhandled event: {:?}", event.kind());
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

pub struct DiscordPlatform {
    token: String,
    connection_status: ConnectionStatus,

    rx: Mutex<Option<UnboundedReceiver<DiscordMessageEvent>>>,
    shard_tasks: Mutex<Vec<JoinHandle<()>>>,
    shard_senders: Vec<MessageSender>,

    http: Option<Arc<HttpClient>>,
    cache: Option<Arc<InMemoryCache>>,
    #[cfg(feature = "voice")]
    songbird: Option<Arc<Songbird>>,
}

impl DiscordPlatform {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            connection_status: ConnectionStatus::Disconnected,
            rx: Mutex::new(None),
            shard_tasks: Mutex::new(Vec::new()),
            shard_senders: Vec::new(),
            http: None,
            cache: None,
            #[cfg(feature = "voice")]
            songbird: None,
        }
    }

    /// Waits for the next inbound message; `None` once disconnected.
    pub async fn next_message_event(&self) -> Option<DiscordMessageEvent> {
        let mut guard = self.rx.lock().await;
        match guard.as_mut() {
            Some(r) => r.recv().await,
            None => None,
        }
    }

    /// Voice transport backed by this connection. Must be called after
    /// `connect`; without the `voice` feature every join is refused.
    pub fn call_transport(&self) -> Result<Arc<dyn CallTransport>, Error> {
        #[cfg(feature = "voice")]
        {
            let songbird = self
                .songbird
                .clone()
                .ok_or_else(|| Error::Platform("Discord is not connected; no voice client".into()))?;
            Ok(Arc::new(super::songbird::SongbirdTransport::new(songbird)))
        }
        #[cfg(not(feature = "voice"))]
        {
            Ok(Arc::new(super::songbird::UnavailableTransport))
        }
    }

    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.connection_status == ConnectionStatus::Connected {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }
        if self.token.is_empty() {
            return Err(Error::Platform("Discord token is empty".into()));
        }

        let (tx, rx) = unbounded_channel::<DiscordMessageEvent>();
        *self.rx.lock().await = Some(rx);

        let http_client = Arc::new(
            ClientBuilder::new()
                .token(self.token.clone())
                .timeout(Duration::from_secs(30))
                .build(),
        );
        self.http = Some(http_client.clone());

        // Voice states tell us which call a /play author is sitting in.
        let cache = Arc::new(
            InMemoryCache::builder()
                .resource_types(ResourceType::GUILD | ResourceType::CHANNEL | ResourceType::VOICE_STATE)
                .build(),
        );
        self.cache = Some(cache.clone());

        let config = Config::new(
            self.token.clone(),
            Intents::GUILDS
                | Intents::GUILD_MESSAGES
                | Intents::DIRECT_MESSAGES
                | Intents::MESSAGE_CONTENT
                | Intents::GUILD_VOICE_STATES,
        );

        let shards: Vec<Shard> = gateway::create_recommended(&http_client, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?
            .collect();
        self.shard_senders = shards.iter().map(|s| s.sender()).collect();

        #[cfg(feature = "voice")]
        let songbird = {
            let user_id = http_client
                .current_user()
                .await
                .map_err(|e| Error::Platform(format!("current_user request failed: {e}")))?
                .model()
                .await
                .map_err(|e| Error::Platform(format!("current_user decode failed: {e}")))?
                .id;
            let senders = shards
                .iter()
                .map(|s| (s.id().number(), s.sender()))
                .collect();
            let map = Arc::new(songbird::shards::TwilightMap::new(senders));
            let songbird = Arc::new(Songbird::twilight(map, user_id));
            self.songbird = Some(songbird.clone());
            songbird
        };

        let mut tasks = self.shard_tasks.lock().await;
        for shard in shards {
            let tx_for_shard = tx.clone();
            let cache_for_shard = cache.clone();
            #[cfg(feature = "voice")]
            let runner = shard_runner(shard, tx_for_shard, cache_for_shard, songbird.clone());
            #[cfg(not(feature = "voice"))]
            let runner = shard_runner(shard, tx_for_shard, cache_for_shard);

            tasks.push(tokio::spawn(runner));
        }
        drop(tasks);

        self.connection_status = ConnectionStatus::Connected;
        info!("(DiscordPlatform) connected with {} shard(s)", self.shard_senders.len());
        Ok(())
    }

    /// Closes every shard and waits for its runner to finish.
    pub async fn disconnect(&self) -> Result<(), Error> {
        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        let tasks: Vec<JoinHandle<()>> = self.shard_tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("(DiscordPlatform) shard task ended abnormally: {e}");
            }
        }
        *self.rx.lock().await = None;
        info!("(DiscordPlatform) disconnected");
        Ok(())
    }
}

#[async_trait]
impl ChatMessenger for DiscordPlatform {
    async fn send_message(&self, chat: ChatId, message: &str) -> Result<(), Error> {
        let channel_id = Id::<ChannelMarker>::new_checked(chat.0)
            .ok_or_else(|| Error::Platform(format!("Invalid channel ID: {chat}")))?;
        let http = self
            .http
            .as_ref()
            .ok_or_else(|| Error::Platform("Discord is not connected".into()))?;

        http.create_message(channel_id)
            .content(message)
            .await
            .map_err(|e| Error::Platform(format!("Error sending Discord message: {e:?}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(guild: Option<u64>, voice: Option<u64>) -> DiscordMessageEvent {
        DiscordMessageEvent {
            channel_id: 555,
            guild_id: guild,
            username: "alice".into(),
            text: "/play song".into(),
            voice_channel_id: voice,
            referenced_text: None,
        }
    }

    #[test]
    fn call_target_needs_both_guild_and_voice_channel() {
        let ctx = event(Some(1), Some(2)).command_context();
        assert_eq!(ctx.chat_id, ChatId(555));
        assert_eq!(ctx.requester, "alice");
        assert_eq!(
            ctx.call_target,
            Some(CallTarget {
                guild_id: 1,
                channel_id: 2
            })
        );

        assert_eq!(event(Some(1), None).command_context().call_target, None);
        assert_eq!(event(None, Some(2)).command_context().call_target, None);
    }

    #[test]
    fn replied_to_text_is_carried_into_the_context() {
        assert_eq!(event(Some(1), Some(2)).command_context().reply_text, None);

        let reply = DiscordMessageEvent {
            text: "/play".into(),
            referenced_text: Some("never gonna give you up".into()),
            ..event(Some(1), Some(2))
        };
        assert_eq!(
            reply.command_context().reply_text.as_deref(),
            Some("never gonna give you up")
        );
    }

    #[tokio::test]
    async fn sending_before_connect_is_a_platform_error() {
        let platform = DiscordPlatform::new("token");
        let err = platform.send_message(ChatId(5), "hi").await.unwrap_err();
        assert!(matches!(err, Error::Platform(_)));

        let err = platform.send_message(ChatId(0), "hi").await.unwrap_err();
        assert!(matches!(err, Error::Platform(msg) if msg.contains("Invalid channel")));
    }
}
