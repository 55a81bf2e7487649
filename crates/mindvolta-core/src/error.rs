use thiserror::Error;

/// Top-level error type for the MindVolta system.
///
/// Subsystem crates define their own error types and convert from
/// `MindvoltaError` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MindvoltaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for MindvoltaError {
    fn from(err: toml::de::Error) -> Self {
        MindvoltaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MindvoltaError {
    fn from(err: toml::ser::Error) -> Self {
        MindvoltaError::Config(err.to_string())
    }
}

/// A specialized `Result` type for MindVolta operations.
pub type Result<T> = std::result::Result<T, MindvoltaError>;
