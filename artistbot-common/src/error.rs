// ================================================================
// File: artistbot-common/src/error.rs
// ================================================================

use thiserror::Error;

/// A query could not be turned into a playable file.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("empty query")]
    EmptyQuery,

    #[error("no results found for '{0}'")]
    NotFound(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("media backend error: {0}")]
    Backend(String),
}

/// Failures reported by the live-call transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// There is no call to attach to. Kept separate so callers can decide
    /// between starting a call and telling the user.
    #[error("no active voice call")]
    NoActiveCall,

    #[error("failed to join call: {0}")]
    Join(String),

    #[error("failed to leave call: {0}")]
    Leave(String),

    #[error("stream control failed: {0}")]
    Stream(String),

    #[error("voice transport unavailable: {0}")]
    Unavailable(String),
}

/// A pause/resume/skip request that could not be honoured.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("nothing is playing right now")]
    NothingPlaying,

    #[error("playback is already paused")]
    AlreadyPaused,

    #[error("playback is not paused")]
    NotPaused,

    #[error(transparent)]
    Transport(#[from] CallError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Call error: {0}")]
    Call(#[from] CallError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),
}
