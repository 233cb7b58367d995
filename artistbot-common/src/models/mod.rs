pub mod media;
pub mod session;
pub mod track;

pub use media::MediaInfo;
pub use session::{
    CallTarget, ChatId, FinishReason, PlaybackEvent, PlaybackStatus, SessionSnapshot,
};
pub use track::Track;
