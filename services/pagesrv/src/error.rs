//! Error handling for the paging service
//!
//! This module provides error type definitions and conversions for the
//! paging service.

use thiserror::Error;

/// Paging Service Error Type
#[derive(Error, Debug, Clone)]
pub enum PageSrvError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Connection establishment and maintenance errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Data handling errors (decoding, parsing, conversion)
    #[error("Data error: {0}")]
    DataError(String),

    /// Operation timeout errors
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Storage errors (SQLite, settings)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the paging service
pub type Result<T> = std::result::Result<T, PageSrvError>;

impl PageSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        PageSrvError::ConfigError(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        PageSrvError::IoError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        PageSrvError::ConnectionError(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        PageSrvError::DataError(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        PageSrvError::TimeoutError(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        PageSrvError::StorageError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PageSrvError::InternalError(msg.into())
    }
}

impl From<std::io::Error> for PageSrvError {
    fn from(err: std::io::Error) -> Self {
        PageSrvError::IoError(err.to_string())
    }
}

impl From<sqlx::Error> for PageSrvError {
    fn from(err: sqlx::Error) -> Self {
        PageSrvError::StorageError(err.to_string())
    }
}

impl From<tokio_serial::Error> for PageSrvError {
    fn from(err: tokio_serial::Error) -> Self {
        PageSrvError::ConnectionError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PageSrvError::config("missing key");
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = PageSrvError::storage("insert failed");
        assert_eq!(err.to_string(), "Storage error: insert failed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such device");
        let err: PageSrvError = io_err.into();
        assert!(matches!(err, PageSrvError::IoError(_)));
    }
}
