use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::CallError;
use crate::models::track::Track;

/// Identifies the text chat a session belongs to. One session per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub u64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ChatId)
    }
}

impl From<u64> for ChatId {
    fn from(id: u64) -> Self {
        ChatId(id)
    }
}

/// The live call a chat's session streams into.
///
/// The text chat and the voice call are separate ids on the wire; a session
/// holds exactly one binding at a time (see `PlaybackSession::bind_call`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallTarget {
    pub guild_id: u64,
    pub channel_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackStatus {
    Idle,
    Joining,
    Playing,
    Paused,
    Leaving,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Joining => "joining",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Leaving => "leaving",
        };
        f.write_str(s)
    }
}

/// Read-only view of a session at one instant.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub chat_id: ChatId,
    pub status: PlaybackStatus,
    pub current: Option<Track>,
    pub paused: bool,
    pub queued: Vec<Track>,
    pub consumer_running: bool,
    pub call: Option<CallTarget>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Completed,
    Skipped,
    Shutdown,
}

/// Published by sessions as tracks move through the consumer loop.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    TrackStarted {
        chat_id: ChatId,
        track: Track,
    },
    JoinFailed {
        chat_id: ChatId,
        track: Track,
        error: CallError,
    },
    TrackFinished {
        chat_id: ChatId,
        track: Track,
        reason: FinishReason,
    },
    Paused {
        chat_id: ChatId,
    },
    Resumed {
        chat_id: ChatId,
    },
}

impl PlaybackEvent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            PlaybackEvent::TrackStarted { chat_id, .. }
            | PlaybackEvent::JoinFailed { chat_id, .. }
            | PlaybackEvent::TrackFinished { chat_id, .. }
            | PlaybackEvent::Paused { chat_id }
            | PlaybackEvent::Resumed { chat_id } => *chat_id,
        }
    }
}
