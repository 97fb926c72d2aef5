//! Error types for Lakelog
//!
//! Failures shared by the configuration loader and the table collaborator
//! types. Request-level errors live with the HTTP surface that reports them.

use crate::types::TableIdError;
use thiserror::Error;

/// Common result type for Lakelog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Lakelog
#[derive(Debug, Error)]
pub enum Error {
    // Catalog errors
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("invalid table id: {0}")]
    InvalidTableId(#[from] TableIdError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_table_id_conversion() {
        let err: Error = TableIdError::Empty.into();
        assert!(matches!(err, Error::InvalidTableId(TableIdError::Empty)));
        assert_eq!(err.to_string(), "invalid table id: table id must not be empty");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = config::ConfigError::Message("bad value".into()).into();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("bad value")));
    }
}
