//! Error types shared by the livesnmp crates.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for livesnmp infrastructure operations.
pub type LiveSnmpResult<T> = Result<T, LiveSnmpError>;

/// Errors raised by command execution and configuration handling.
#[derive(Debug, Error)]
pub enum LiveSnmpError {
    /// Failed to spawn an external program.
    #[error("Failed to execute command '{command}': {source}")]
    CommandExec {
        /// The rendered command line.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Configuration file could not be parsed or serialized.
    #[error("Configuration file {path}: {message}")]
    ConfigFile {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser or serializer message.
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Host not present in the registry.
    #[error("Host '{name}' not found")]
    UnknownHost {
        /// The host name.
        name: String,
    },

    /// Device not present in the registry.
    #[error("Device '{name}' not found")]
    UnknownDevice {
        /// The device name.
        name: String,
    },

    /// Service not present in the registry.
    #[error("Service '{name}' not found")]
    UnknownService {
        /// The service name.
        name: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl LiveSnmpError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration file error.
    pub fn config_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown host error.
    pub fn unknown_host(name: impl Into<String>) -> Self {
        Self::UnknownHost { name: name.into() }
    }

    /// Creates an unknown device error.
    pub fn unknown_device(name: impl Into<String>) -> Self {
        Self::UnknownDevice { name: name.into() }
    }

    /// Creates an unknown service error.
    pub fn unknown_service(name: impl Into<String>) -> Self {
        Self::UnknownService { name: name.into() }
    }

    /// Returns true if the error comes from a dangling registry reference.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            LiveSnmpError::UnknownHost { .. }
                | LiveSnmpError::UnknownDevice { .. }
                | LiveSnmpError::UnknownService { .. }
        )
    }
}
