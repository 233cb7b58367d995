// src/lib.rs

pub mod config;
pub mod platforms;
pub mod playback;
pub mod resolver;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use artistbot_common::Error;
pub use config::BotConfig;
