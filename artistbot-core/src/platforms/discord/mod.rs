pub mod runtime;
pub mod songbird;

pub use runtime::{DiscordMessageEvent, DiscordPlatform};
