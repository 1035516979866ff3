pub mod config;
pub mod error;

pub use config::MocConfig;
pub use error::{MocError, MocResult};
