// File: src/tasks/health_check.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use artistbot_common::models::ChatId;
use artistbot_common::traits::ChatMessenger;

pub const HEALTH_CHECK_MESSAGE: &str = "Health check successful ✨";

/// Spawns a background task that posts a liveness message to `chat` every
/// `interval` until `shutdown` is cancelled. The first post happens right away.
pub fn spawn_health_check_task(
    messenger: Arc<dyn ChatMessenger>,
    chat: ChatId,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("(HealthCheck) posting to chat={chat} every {period:?}");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match messenger.send_message(chat, HEALTH_CHECK_MESSAGE).await {
                Ok(()) => debug!("(HealthCheck) posted to chat={chat}"),
                Err(e) => warn!("(HealthCheck) post to chat={chat} failed: {e}"),
            }
        }
        info!("(HealthCheck) stopped");
    })
}
