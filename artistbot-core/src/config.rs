// File: artistbot-core/src/config.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use artistbot_common::models::ChatId;

use crate::Error;
use crate::playback::SessionSettings;

pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";
pub const DEFAULT_COMMAND_PREFIX: &str = "/";
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Process-wide settings, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub download_dir: PathBuf,
    /// Where the periodic health message goes; `None` disables the task.
    pub health_check_channel: Option<ChatId>,
    pub health_check_interval: Duration,
    pub command_prefix: String,
    /// `None` keeps idle consumer loops parked forever.
    pub idle_timeout: Option<Duration>,
    pub yt_dlp_path: Option<String>,
}

impl BotConfig {
    /// Loads `.env` (if any) and then reads the process environment.
    pub fn from_env() -> Result<Self, Error> {
        match dotenv::dotenv() {
            Ok(path) => info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Could not load .env file: {e}"),
        }
        Self::from_vars(&std::env::vars().collect())
    }

    /// Builds the config from an explicit variable map. Missing credentials
    /// are the only hard failure.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, Error> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let discord_token = get("DISCORD_TOKEN").ok_or_else(|| {
            Error::Config("DISCORD_TOKEN is required (set it in the environment or .env)".into())
        })?;

        let download_dir = get("DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR));

        let health_check_channel = match get("HEALTH_CHECK_CHANNEL").or_else(|| get("LOG_CHANNEL")) {
            Some(raw) => Some(raw.parse::<ChatId>().map_err(|e| {
                Error::Config(format!("HEALTH_CHECK_CHANNEL/LOG_CHANNEL '{raw}' is not a channel id: {e}"))
            })?),
            None => None,
        };

        let health_check_interval = Duration::from_secs(parse_secs(
            "HEALTH_CHECK_INTERVAL_SECS",
            get("HEALTH_CHECK_INTERVAL_SECS"),
            DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
        )?
        .max(1));

        let idle_secs = parse_secs(
            "IDLE_TIMEOUT_SECS",
            get("IDLE_TIMEOUT_SECS"),
            DEFAULT_IDLE_TIMEOUT_SECS,
        )?;
        let idle_timeout = (idle_secs > 0).then(|| Duration::from_secs(idle_secs));

        Ok(Self {
            discord_token,
            download_dir,
            health_check_channel,
            health_check_interval,
            command_prefix: get("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.into()),
            idle_timeout,
            yt_dlp_path: get("YT_DLP_PATH"),
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: self.idle_timeout,
        }
    }
}

fn parse_secs(key: &str, raw: Option<String>, default: u64) -> Result<u64, Error> {
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("{key} '{raw}' is not a number of seconds: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = BotConfig::from_vars(&vars(&[("DOWNLOAD_DIR", "/tmp/x")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("DISCORD_TOKEN")));

        let err = BotConfig::from_vars(&vars(&[("DISCORD_TOKEN", "   ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults_apply() {
        let cfg = BotConfig::from_vars(&vars(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(cfg.download_dir, PathBuf::from(DEFAULT_DOWNLOAD_DIR));
        assert_eq!(cfg.command_prefix, "/");
        assert_eq!(cfg.health_check_channel, None);
        assert_eq!(cfg.health_check_interval, Duration::from_secs(60));
        assert_eq!(cfg.idle_timeout, Some(Duration::from_secs(300)));
        assert_eq!(cfg.yt_dlp_path, None);
    }

    #[test]
    fn health_channel_falls_back_to_log_channel() {
        let cfg = BotConfig::from_vars(&vars(&[
            ("DISCORD_TOKEN", "abc"),
            ("LOG_CHANNEL", "42"),
        ]))
        .unwrap();
        assert_eq!(cfg.health_check_channel, Some(ChatId(42)));

        let cfg = BotConfig::from_vars(&vars(&[
            ("DISCORD_TOKEN", "abc"),
            ("LOG_CHANNEL", "42"),
            ("HEALTH_CHECK_CHANNEL", "7"),
        ]))
        .unwrap();
        assert_eq!(cfg.health_check_channel, Some(ChatId(7)));
    }

    #[test]
    fn zero_idle_timeout_disables_exit_and_bad_numbers_are_rejected() {
        let cfg = BotConfig::from_vars(&vars(&[
            ("DISCORD_TOKEN", "abc"),
            ("IDLE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.idle_timeout, None);

        let err = BotConfig::from_vars(&vars(&[
            ("DISCORD_TOKEN", "abc"),
            ("HEALTH_CHECK_INTERVAL_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
