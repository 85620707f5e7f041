//! Error types for stepcache
//!
//! All modules use `StepCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stepcache operations
pub type StepCacheResult<T> = Result<T, StepCacheError>;

/// All errors that can occur in stepcache
#[derive(Error, Debug)]
pub enum StepCacheError {
    // Cache errors
    #[error("Cannot serialize value for checkpoint '{identity}': {reason}")]
    UnserializableArgument { identity: String, reason: String },

    #[error("Storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cached artifact {key} could not be decoded: {reason}")]
    Decode { key: String, reason: String },

    #[error("Invalid checkpoint identity '{identity}': {reason}")]
    InvalidIdentity { identity: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl StepCacheError {
    /// Create a storage error with context
    pub fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// Create an unserializable-value error for a checkpoint
    pub fn unserializable(identity: impl Into<String>, reason: impl ToString) -> Self {
        Self::UnserializableArgument {
            identity: identity.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Decode { .. } => {
                Some("The artifact was written by a different result type. Run: stepcache truncate <checkpoint>")
            }
            Self::InvalidIdentity { .. } => {
                Some("Checkpoint names must be 1 to 128 bytes without path separators")
            }
            Self::ConfigInvalid { .. } => Some("Run: stepcache config init --force"),
            _ => None,
        }
    }
}
