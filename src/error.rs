/// Unified error handling for the guardia proxy
///
/// This module provides a comprehensive error type system that covers all
/// error scenarios in guardia, including network errors, protocol errors,
/// configuration errors, and storage-quota-monitor errors.
use std::fmt;
use std::io;
use std::net::AddrParseError;
use thiserror::Error;

/// Main error type for guardia operations
#[derive(Debug, Error)]
pub enum GuardiaError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Wire protocol parsing errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Session-level errors
    #[error("Session error: {message}")]
    Session { message: String },

    /// Filter errors
    #[error("Filter error: {message}")]
    Filter { message: String },

    /// Storage quota monitor errors
    #[error("Storage monitor error: {0}")]
    Storage(#[from] StorageError),

    /// Address parsing errors
    #[error("Address parsing error: {0}")]
    AddressParse(#[from] AddrParseError),

    /// Timeout errors
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage-quota-monitor-specific errors (data-size monitor, file-count monitor)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("dbStats query failed: {message}")]
    DbStatsError { message: String },

    #[error("directory watch error: {message}")]
    WatchError { message: String },

    #[error("failed to parse storage metric: {message}")]
    ParseError { message: String },
}

/// Result type alias for guardia operations
pub type GuardiaResult<T> = Result<T, GuardiaError>;

impl GuardiaError {
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        GuardiaError::Protocol(message.into())
    }

    pub fn session<S: Into<String>>(message: S) -> Self {
        GuardiaError::Session {
            message: message.into(),
        }
    }

    pub fn filter<S: Into<String>>(message: S) -> Self {
        GuardiaError::Filter {
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        GuardiaError::Timeout {
            operation: operation.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        GuardiaError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            GuardiaError::Network(_) => true,
            GuardiaError::Timeout { .. } => true,
            GuardiaError::Storage(_) => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GuardiaError::Config(_) => ErrorSeverity::Critical,
            GuardiaError::Internal { .. } => ErrorSeverity::Critical,
            GuardiaError::Network(_) => ErrorSeverity::Warning,
            GuardiaError::Timeout { .. } => ErrorSeverity::Warning,
            GuardiaError::Storage(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    Error,
    Warning,
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}

impl StorageError {
    pub fn db_stats<S: Into<String>>(message: S) -> Self {
        StorageError::DbStatsError {
            message: message.into(),
        }
    }

    pub fn watch<S: Into<String>>(message: S) -> Self {
        StorageError::WatchError {
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        StorageError::ParseError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = GuardiaError::session("session 42 closed by filter");
        assert!(matches!(error, GuardiaError::Session { .. }));
        assert_eq!(
            error.to_string(),
            "Session error: session 42 closed by filter"
        );
    }

    #[test]
    fn test_error_severity() {
        let config_error =
            GuardiaError::Config(crate::config::ConfigError::ValidationError("x".into()));
        assert_eq!(config_error.severity(), ErrorSeverity::Critical);

        let network_error =
            GuardiaError::Network(io::Error::new(io::ErrorKind::ConnectionRefused, "x"));
        assert_eq!(network_error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_error_recoverability() {
        let network_error =
            GuardiaError::Network(io::Error::new(io::ErrorKind::ConnectionRefused, "x"));
        assert!(network_error.is_recoverable());

        let config_error =
            GuardiaError::Config(crate::config::ConfigError::ValidationError("x".into()));
        assert!(!config_error.is_recoverable());
    }

    #[test]
    fn test_storage_error_creation() {
        let storage_error = StorageError::db_stats("connection refused");
        let guardia_error = GuardiaError::Storage(storage_error);
        assert!(matches!(guardia_error, GuardiaError::Storage(_)));
    }
}
