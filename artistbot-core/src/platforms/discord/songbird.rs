//! Voice transport for Discord calls.
//!
//! With the `voice` feature the bot joins through songbird and streams the
//! downloaded file; without it every join is refused so text commands still
//! work on hosts without an audio stack.

use std::path::Path;

use async_trait::async_trait;

use artistbot_common::error::CallError;
use artistbot_common::models::CallTarget;
use artistbot_common::traits::CallTransport;

#[cfg(feature = "voice")]
pub use self::voice::SongbirdTransport;

#[cfg(feature = "voice")]
mod voice {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use dashmap::DashMap;
    use songbird::Songbird;
    use songbird::input::{File as SongbirdFile, Input};
    use songbird::tracks::TrackHandle;
    use tracing::{debug, info, warn};
    use twilight_model::id::Id;
    use twilight_model::id::marker::{ChannelMarker, GuildMarker};

    use artistbot_common::error::CallError;
    use artistbot_common::models::CallTarget;
    use artistbot_common::traits::CallTransport;

    /// One songbird call per guild; the handle of the track it is streaming
    /// is kept so pause/resume/stop can reach it.
    pub struct SongbirdTransport {
        songbird: Arc<Songbird>,
        tracks: DashMap<u64, TrackHandle>,
    }

    impl SongbirdTransport {
        pub fn new(songbird: Arc<Songbird>) -> Self {
            Self {
                songbird,
                tracks: DashMap::new(),
            }
        }

        fn handle(&self, target: &CallTarget) -> Result<TrackHandle, CallError> {
            self.tracks
                .get(&target.guild_id)
                .map(|h| h.value().clone())
                .ok_or(CallError::NoActiveCall)
        }
    }

    fn ids(target: &CallTarget) -> Result<(Id<GuildMarker>, Id<ChannelMarker>), CallError> {
        match (
            Id::new_checked(target.guild_id),
            Id::new_checked(target.channel_id),
        ) {
            (Some(guild), Some(channel)) => Ok((guild, channel)),
            _ => Err(CallError::NoActiveCall),
        }
    }

    #[async_trait]
    impl CallTransport for SongbirdTransport {
        async fn join(&self, target: &CallTarget, source: &Path) -> Result<(), CallError> {
            let (guild, channel) = ids(target)?;
            let call = self
                .songbird
                .join(guild, channel)
                .await
                .map_err(|e| CallError::Join(e.to_string()))?;
            info!(
                "(SongbirdTransport) joined guild={} channel={}",
                target.guild_id, target.channel_id
            );

            let input: Input = SongbirdFile::new(source.to_path_buf()).into();
            let handle = call.lock().await.play_only_input(input);
            if let Some(previous) = self.tracks.insert(target.guild_id, handle) {
                let _ = previous.stop();
            }
            debug!("(SongbirdTransport) streaming {}", source.display());
            Ok(())
        }

        async fn leave(&self, target: &CallTarget) -> Result<(), CallError> {
            let (guild, _) = ids(target)?;
            self.tracks.remove(&target.guild_id);
            match self.songbird.remove(guild).await {
                Ok(()) => Ok(()),
                Err(songbird::error::JoinError::NoCall) => {
                    warn!("(SongbirdTransport) leave: guild={} had no call", target.guild_id);
                    Ok(())
                }
                Err(e) => Err(CallError::Leave(e.to_string())),
            }
        }

        async fn pause_stream(&self, target: &CallTarget) -> Result<(), CallError> {
            self.handle(target)?
                .pause()
                .map_err(|e| CallError::Stream(e.to_string()))
        }

        async fn resume_stream(&self, target: &CallTarget) -> Result<(), CallError> {
            self.handle(target)?
                .play()
                .map_err(|e| CallError::Stream(e.to_string()))
        }

        async fn stop_stream(&self, target: &CallTarget) -> Result<(), CallError> {
            self.handle(target)?
                .stop()
                .map_err(|e| CallError::Stream(e.to_string()))
        }
    }
}

const VOICE_DISABLED: &str = "built without the `voice` feature";

/// Transport used when voice support is compiled out.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableTransport;

#[async_trait]
impl CallTransport for UnavailableTransport {
    async fn join(&self, _target: &CallTarget, _source: &Path) -> Result<(), CallError> {
        Err(CallError::Unavailable(VOICE_DISABLED.into()))
    }

    async fn leave(&self, _target: &CallTarget) -> Result<(), CallError> {
        Ok(())
    }

    async fn pause_stream(&self, _target: &CallTarget) -> Result<(), CallError> {
        Err(CallError::Unavailable(VOICE_DISABLED.into()))
    }

    async fn resume_stream(&self, _target: &CallTarget) -> Result<(), CallError> {
        Err(CallError::Unavailable(VOICE_DISABLED.into()))
    }

    async fn stop_stream(&self, _target: &CallTarget) -> Result<(), CallError> {
        Err(CallError::Unavailable(VOICE_DISABLED.into()))
    }
}
