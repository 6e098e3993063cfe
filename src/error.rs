//! Error types for Missy
//!
//! Pipeline errors live in [`crate::messaging::error`]; this module holds the
//! configuration errors and the application level umbrella used by the
//! `missy` binary.

use thiserror::Error;

use crate::messaging::MessagingError;

/// Errors found while loading or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Missing required configuration value.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    /// Invalid security protocol specified.
    #[error("Invalid security protocol: {0}")]
    InvalidSecurityProtocol(String),

    /// Invalid SASL mechanism specified.
    #[error("Invalid SASL mechanism: {0}")]
    InvalidSaslMechanism(String),

    /// A value is present but unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main error type for Missy operations
#[derive(Error, Debug)]
pub enum MissyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors reported by the messaging pipeline
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Missy operations
///
/// Uses `anyhow::Error` so that binaries can attach context while
/// propagating.
pub type Result<T> = anyhow::Result<T>;
