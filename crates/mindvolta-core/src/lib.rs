pub mod config;
pub mod error;
pub mod types;

pub use config::MindvoltaConfig;
pub use error::{MindvoltaError, Result};
pub use types::*;
