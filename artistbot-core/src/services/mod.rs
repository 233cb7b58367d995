pub mod command_service;
pub mod playback_announcer;

pub use command_service::{CommandContext, CommandResponse, CommandService};
pub use playback_announcer::PlaybackAnnouncer;
