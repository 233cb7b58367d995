// File: artistbot-core/src/test_utils/mod.rs
//
// In-memory stand-ins for the platform seams, shared by unit tests and the
// integration tests under tests/.

pub mod fakes;

pub use fakes::{FakeBackend, RecordingMessenger, RecordingTransport, TransportCall};

use std::time::Duration;

use artistbot_common::models::{CallTarget, Track};

pub const TEST_CALL: CallTarget = CallTarget {
    guild_id: 1,
    channel_id: 2,
};

/// A track whose file never needs to exist; transports under test don't read it.
pub fn track(title: &str, duration_secs: u64) -> Track {
    Track::new(
        title,
        "tester",
        format!("/tmp/artistbot-test/{title}.m4a"),
        duration_secs,
        title,
    )
}

/// Polls `check` until it holds, yielding to the runtime between attempts.
/// Works with a paused clock because each attempt sleeps.
pub async fn wait_until<F: FnMut() -> bool>(mut check: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
