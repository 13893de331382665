//! Error types raised by permission checks

use thiserror::Error;

/// Result type for check and policy evaluation
pub type CheckResult<T> = Result<T, CheckError>;

/// Errors a check can raise instead of answering.
///
/// The evaluator never converts these into a deny. Whatever a check returns
/// reaches the caller as-is.
#[derive(Debug, Error)]
pub enum CheckError {
    /// A check or policy was set up wrongly
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    /// The context does not carry what the check needs
    #[error("Missing context: {0}")]
    MissingContext(String),

    /// A check could not reach a decision
    #[error("Check '{check}' failed: {message}")]
    Failed {
        /// Name of the failing check
        check: String,
        /// What went wrong
        message: String,
    },

    /// Foreign error raised from inside a check
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl CheckError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ImproperlyConfigured(msg.into())
    }

    /// Create a missing context error
    pub fn missing_context<S: Into<String>>(msg: S) -> Self {
        Self::MissingContext(msg.into())
    }

    /// Create a failure attributed to a named check
    pub fn failed<N: Into<String>, S: Into<String>>(check: N, msg: S) -> Self {
        Self::Failed {
            check: check.into(),
            message: msg.into(),
        }
    }

    /// Wrap any foreign error
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(err))
    }

    /// Whether this error points at a setup mistake rather than a runtime failure
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ImproperlyConfigured(_))
    }
}
