//! Unified error handling for Sensorwatch
//!
//! This crate provides a single error type used across all Sensorwatch components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using SensorwatchError
pub type Result<T> = std::result::Result<T, SensorwatchError>;

/// Unified error type for all Sensorwatch operations
#[derive(thiserror::Error, Debug)]
pub enum SensorwatchError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("Hardware not found: {0}")]
    HardwareNotFound(String),

    #[error("Hardware provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Failed to refresh {hardware}: {reason}")]
    Refresh {
        hardware: String,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

impl SensorwatchError {
    /// Create an invalid config error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a refresh error for a hardware node
    pub fn refresh(hardware: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refresh {
            hardware: hardware.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = SensorwatchError::invalid_config("health.max_consecutive_failures", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for health.max_consecutive_failures: must be at least 1"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: SensorwatchError = io_err.into();
        assert!(matches!(err, SensorwatchError::Io(_)));
    }
}
