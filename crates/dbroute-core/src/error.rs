//! Configuration error types

use thiserror::Error;

/// Errors raised while building or loading router configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A shard count was below one
    #[error("Invalid {field}: {value} (must be at least 1)")]
    InvalidCount { field: &'static str, value: u32 },

    /// The routing key field name was empty
    #[error("Router key must not be empty")]
    MissingRouterKey,

    /// A required property was absent
    #[error("Missing property: {0}")]
    MissingProperty(String),

    /// A property was present but could not be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidProperty { key: String, value: String },

    /// The default pool is not among the configured pools
    #[error("Default pool {0:?} has no descriptor")]
    UnknownDefaultPool(String),

    /// A routed pool required by the shard layout is not configured
    #[error("Routed pool {0:?} has no descriptor")]
    MissingDescriptor(String),

    /// Malformed JSON settings
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}
