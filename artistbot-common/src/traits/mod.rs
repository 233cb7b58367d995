pub mod call_transport;
pub mod media_backend;
pub mod messenger;

pub use call_transport::CallTransport;
pub use media_backend::MediaBackend;
pub use messenger::ChatMessenger;
