pub mod error;
pub mod models;
pub mod traits;
pub mod utils;

pub use error::Error;
