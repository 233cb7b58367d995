//! artistbot-server/src/context.rs
//!
//! The process-wide bag of services the bot runs with.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use artistbot_common::traits::{ChatMessenger, MediaBackend};
use artistbot_core::Error;
use artistbot_core::config::BotConfig;
use artistbot_core::platforms::discord::DiscordPlatform;
use artistbot_core::playback::SessionRegistry;
use artistbot_core::resolver::{MediaResolver, YtDlpBackend, locate_yt_dlp};
use artistbot_core::services::{CommandService, PlaybackAnnouncer};

pub struct ServerContext {
    pub config: Arc<BotConfig>,
    pub platform: Arc<DiscordPlatform>,
    pub registry: Arc<SessionRegistry>,
    pub command_service: Arc<CommandService>,
    /// Cancelled after sessions have drained; stops background tasks.
    pub tasks_shutdown: CancellationToken,
}

impl ServerContext {
    /// Connects to Discord and wires every service together.
    pub async fn new(config: BotConfig) -> Result<Self, Error> {
        let exe = locate_yt_dlp(config.yt_dlp_path.as_deref())?;
        let backend: Arc<dyn MediaBackend> = Arc::new(YtDlpBackend::new(exe));
        let resolver = Arc::new(MediaResolver::new(backend, config.download_dir.clone()));
        resolver.ensure_download_dir().await?;
        info!("Download directory: {}", resolver.download_dir().display());

        let mut platform = DiscordPlatform::new(config.discord_token.clone());
        platform.connect().await?;
        let transport = platform.call_transport()?;
        let platform = Arc::new(platform);
        let messenger: Arc<dyn ChatMessenger> = platform.clone();

        let registry = Arc::new(SessionRegistry::new(transport, config.session_settings()));
        let command_service = Arc::new(CommandService::new(
            registry.clone(),
            resolver,
            messenger,
            config.command_prefix.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            platform,
            registry,
            command_service,
            tasks_shutdown: CancellationToken::new(),
        })
    }

    pub fn messenger(&self) -> Arc<dyn ChatMessenger> {
        self.platform.clone()
    }

    pub fn announcer(&self) -> PlaybackAnnouncer {
        PlaybackAnnouncer::new(self.messenger())
    }
}
