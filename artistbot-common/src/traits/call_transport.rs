use std::path::Path;

use async_trait::async_trait;

use crate::error::CallError;
use crate::models::CallTarget;

/// The live-call side of playback: attach to a call with an audio file,
/// control its stream, detach.
#[async_trait]
pub trait CallTransport: Send + Sync {
    /// Attach to `target` and start streaming `source`.
    /// Returns `CallError::NoActiveCall` when there is no call to attach to.
    async fn join(&self, target: &CallTarget, source: &Path) -> Result<(), CallError>;

    async fn leave(&self, target: &CallTarget) -> Result<(), CallError>;

    async fn pause_stream(&self, target: &CallTarget) -> Result<(), CallError>;

    async fn resume_stream(&self, target: &CallTarget) -> Result<(), CallError>;

    async fn stop_stream(&self, target: &CallTarget) -> Result<(), CallError>;
}
