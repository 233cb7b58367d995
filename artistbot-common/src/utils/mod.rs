pub mod time;

pub use time::{duration_label, format_seconds};
