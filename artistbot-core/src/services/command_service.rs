// File: artistbot-core/src/services/command_service.rs

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use artistbot_common::error::ControlError;
use artistbot_common::models::{CallTarget, ChatId, PlaybackStatus, Track};
use artistbot_common::traits::ChatMessenger;
use artistbot_common::utils::{duration_label, format_seconds};
use artistbot_common::utils::time::seconds_since;

use crate::Error;
use crate::playback::{PlaybackSession, SessionRegistry};
use crate::resolver::MediaResolver;

/// Who sent a chat line, where, and which call they are sitting in.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub chat_id: ChatId,
    pub requester: String,
    /// The sender's current voice channel, if the platform knows it.
    pub call_target: Option<CallTarget>,
    /// Text of the message this one replies to, if any.
    pub reply_text: Option<String>,
}

/// Lines to post back to the chat the command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub chat_id: ChatId,
    pub texts: Vec<String>,
}

impl CommandResponse {
    fn single(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            texts: vec![text.into()],
        }
    }
}

pub struct CommandService {
    registry: Arc<SessionRegistry>,
    resolver: Arc<MediaResolver>,
    messenger: Arc<dyn ChatMessenger>,
    prefix: String,
}

impl CommandService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        resolver: Arc<MediaResolver>,
        messenger: Arc<dyn ChatMessenger>,
        prefix: impl Into<String>,
    ) -> Self {
        let prefix = prefix.into();
        debug!("Initializing CommandService with prefix '{prefix}'");
        Self {
            registry,
            resolver,
            messenger,
            prefix,
        }
    }

    /// Handles `text` on its own task so a slow download never holds up
    /// other chats. Replies are posted through the messenger.
    pub fn spawn_dispatch(self: &Arc<Self>, ctx: CommandContext, text: String) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.dispatch(&ctx, &text).await })
    }

    /// Runs one chat line and posts whatever it answers.
    pub async fn dispatch(&self, ctx: &CommandContext, text: &str) {
        let response = match self.handle_chat_line(ctx, text).await {
            Ok(Some(resp)) => resp,
            Ok(None) => return,
            Err(e) => {
                error!("(CommandService) chat={} command '{text}' failed: {e}", ctx.chat_id);
                return;
            }
        };
        for line in &response.texts {
            if let Err(e) = self.messenger.send_message(response.chat_id, line).await {
                error!("(CommandService) reply to chat={} failed: {e}", response.chat_id);
            }
        }
    }

    /// Parses a chat line and runs the command in it, if any.
    ///
    /// Text without the prefix and unknown commands yield `Ok(None)`.
    pub async fn handle_chat_line(
        &self,
        ctx: &CommandContext,
        message_text: &str,
    ) -> Result<Option<CommandResponse>, Error> {
        let Some(rest) = message_text.trim().strip_prefix(self.prefix.as_str()) else {
            return Ok(None);
        };
        let (word, args) = match rest.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args.trim()),
            None => (rest, ""),
        };
        // "/play@SomeBot" addresses a specific bot; the suffix is not part of the name.
        let name = word.split('@').next().unwrap_or_default().to_lowercase();
        debug!("Parsed command: '{name}', args: '{args}'");

        let chat = ctx.chat_id;
        let resp = match name.as_str() {
            "start" | "help" => CommandResponse::single(chat, self.welcome_text()),
            "play" => self.play(ctx, args).await?,
            "pause" => self.control(chat, Control::Pause).await,
            "resume" => self.control(chat, Control::Resume).await,
            "skip" => self.control(chat, Control::Skip).await,
            "nowplaying" | "np" => self.now_playing(chat).await,
            "queue" => self.queue(chat),
            "seek" => self.seek(chat, args).await,
            _ => {
                debug!("No command found matching '{name}'");
                return Ok(None);
            }
        };
        Ok(Some(resp))
    }

    fn welcome_text(&self) -> String {
        let p = &self.prefix;
        format!(
            "🎵 Welcome to Artist Music Bot!\n\n\
             Commands:\n\
             {p}play <url or query> - Play a song\n\
             {p}pause - Pause\n\
             {p}resume - Resume\n\
             {p}skip - Skip current\n\
             {p}nowplaying - Show current song info\n\
             {p}queue - Show what's up next\n\
             {p}seek <seconds> - Seek (not supported yet)\n"
        )
    }

    async fn play(&self, ctx: &CommandContext, query: &str) -> Result<CommandResponse, Error> {
        let chat = ctx.chat_id;
        // A bare "/play" sent as a reply plays whatever the quoted message says.
        let query = match query {
            "" => ctx.reply_text.as_deref().map(str::trim).unwrap_or_default(),
            q => q,
        };
        if query.is_empty() {
            return Ok(CommandResponse::single(
                chat,
                format!("Usage: {}play <url or search query>", self.prefix),
            ));
        }

        let session = self.registry.get_or_create(chat);
        match ctx.call_target {
            Some(target) => session.bind_call(target).await,
            None if session.call_target().await.is_none() => {
                return Ok(CommandResponse::single(
                    chat,
                    "Join a voice channel first, then try again.",
                ));
            }
            None => {}
        }

        if let Err(e) = self
            .messenger
            .send_message(chat, "🔎 Searching and downloading...")
            .await
        {
            warn!("(CommandService) chat={chat} status update failed: {e}");
        }

        let shutdown = self.registry.shutdown_token();
        let resolved = tokio::select! {
            _ = shutdown.cancelled() => {
                return Ok(CommandResponse::single(chat, "❌ Failed to play: the bot is shutting down"));
            }
            resolved = self.resolver.resolve(query, &ctx.requester) => resolved,
        };

        let track = match resolved {
            Ok(track) => track,
            Err(e) => {
                info!("(CommandService) chat={chat} could not resolve '{query}': {e}");
                return Ok(CommandResponse::single(chat, format!("❌ Failed to play: {e}")));
            }
        };

        let card = queued_card(&track, session.enqueue(track.clone()));
        session.ensure_consumer_running();
        Ok(CommandResponse::single(chat, card))
    }

    async fn control(&self, chat: ChatId, op: Control) -> CommandResponse {
        let result = match self.registry.get(chat) {
            Some(session) => match op {
                Control::Pause => session.pause().await.map(|_| "⏸ Paused".to_string()),
                Control::Resume => session.resume().await.map(|_| "▶️ Resumed".to_string()),
                Control::Skip => session
                    .skip()
                    .await
                    .map(|t| format!("⏭ Skipped: {}", t.title())),
            },
            None => Err(ControlError::NothingPlaying),
        };
        match result {
            Ok(text) => CommandResponse::single(chat, text),
            Err(e) => CommandResponse::single(chat, format!("Error: {e}")),
        }
    }

    async fn now_playing(&self, chat: ChatId) -> CommandResponse {
        let snapshot = match self.registry.get(chat) {
            Some(session) => session.snapshot().await,
            None => return CommandResponse::single(chat, "No song is playing right now."),
        };
        let Some(track) = snapshot.current.as_ref() else {
            return CommandResponse::single(chat, "No song is playing right now.");
        };

        let mut text = format!(
            "🎶 Now Playing\nTitle: {}\nDuration: {}\nRequested by: {}\n",
            track.title(),
            duration_label(track.duration_secs()),
            track.requester()
        );
        match snapshot.status {
            PlaybackStatus::Paused => text.push_str("Status: paused\n"),
            PlaybackStatus::Joining => text.push_str("Status: joining the call\n"),
            _ => {
                if let Some(started) = snapshot.started_at {
                    text.push_str(&format!("Started: {} ago\n", format_seconds(seconds_since(started))));
                }
            }
        }
        CommandResponse::single(chat, text)
    }

    fn queue(&self, chat: ChatId) -> CommandResponse {
        let queued = self
            .registry
            .get(chat)
            .map(|s| s.queue().snapshot())
            .unwrap_or_default();
        if queued.is_empty() {
            return CommandResponse::single(chat, "Queue is empty.");
        }

        let mut text = String::from("📜 Up next:\n");
        for (i, track) in queued.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} ({}) - {}\n",
                i + 1,
                track.title(),
                duration_label(track.duration_secs()),
                track.requester()
            ));
        }
        CommandResponse::single(chat, text)
    }

    async fn seek(&self, chat: ChatId, args: &str) -> CommandResponse {
        let Some(raw) = args.split_whitespace().next() else {
            return CommandResponse::single(chat, format!("Usage: {}seek <seconds>", self.prefix));
        };
        if raw.parse::<i64>().is_err() {
            return CommandResponse::single(chat, "Provide seconds as integer");
        }
        let playing = match self.registry.get(chat) {
            Some(session) => is_playing(&session).await,
            None => false,
        };
        if !playing {
            return CommandResponse::single(chat, "Nothing playing");
        }
        CommandResponse::single(chat, "Seeking isn't supported yet; the track keeps playing from where it is.")
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Skip,
}

async fn is_playing(session: &PlaybackSession) -> bool {
    session.now_playing().await.is_some()
}

fn queued_card(track: &Track, position: usize) -> String {
    format!(
        "🎵 Queued at position {position}\n\nTitle: {}\nDuration: {}\nRequested by: {}",
        track.title(),
        duration_label(track.duration_secs()),
        track.requester()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_card_shows_position_and_length() {
        let track = Track::new("Song A", "alice", "/tmp/a.m4a", 215, "a");
        let card = queued_card(&track, 2);
        assert!(card.contains("position 2"));
        assert!(card.contains("Title: Song A"));
        assert!(card.contains("Duration: 03:35"));
        assert!(card.contains("Requested by: alice"));

        let unknown = Track::new("Song B", "bob", "/tmp/b.m4a", 0, "b");
        assert!(queued_card(&unknown, 1).contains("Duration: unknown"));
    }
}
