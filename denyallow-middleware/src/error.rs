//! Error types for the permission middleware

use denyallow_core::CheckError;
use thiserror::Error;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur while setting up or running a guard
#[derive(Debug, Error)]
pub enum GuardError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    Environment(#[from] std::env::VarError),

    /// A check or policy could not be evaluated or built
    #[error("Permission check error: {0}")]
    Check(#[from] CheckError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GuardError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error stems from invalid configuration
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(_) | Self::Environment(_) | Self::Json(_) => true,
            Self::Check(err) => err.is_configuration(),
        }
    }
}
