pub mod queue;
pub mod registry;
pub mod session;

pub use queue::SessionQueue;
pub use registry::SessionRegistry;
pub use session::{PlaybackSession, SessionSettings};
