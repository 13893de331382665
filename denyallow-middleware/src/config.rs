//! Guard configuration loaded from the environment

use crate::error::{GuardError, GuardResult};
use denyallow_core::AllowAuthorizedKey;
use denyallow_core::policy::DEFAULT_DENY_MESSAGE;
use serde::{Deserialize, Serialize};
use std::env::{self, VarError};
use std::fmt;
use tracing::{info, warn};

/// Comma separated shared keys accepted by [`AllowAuthorizedKey`]
pub const AUTHORIZED_KEYS_ENV: &str = "DENYALLOW_AUTHORIZED_KEYS";

/// Message returned with a denial
pub const DENY_MESSAGE_ENV: &str = "DENYALLOW_DENY_MESSAGE";

/// Answer anonymous denials with `401` instead of `403`
pub const ANONYMOUS_UNAUTHORIZED_ENV: &str = "DENYALLOW_ANONYMOUS_UNAUTHORIZED";

/// Settings shared by every guard of an application
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Shared keys for service-to-service calls
    pub authorized_keys: Vec<String>,

    /// Message returned when a policy sets none of its own
    pub deny_message: String,

    /// Answer anonymous callers with `401 Unauthorized` on denial
    pub anonymous_status_unauthorized: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            authorized_keys: Vec::new(),
            deny_message: DEFAULT_DENY_MESSAGE.to_string(),
            anonymous_status_unauthorized: false,
        }
    }
}

impl GuardConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    pub fn from_env() -> GuardResult<Self> {
        let mut config = Self::default();
        config.load_from_env()?;

        info!(
            authorized_keys = config.authorized_keys.len(),
            anonymous_status_unauthorized = config.anonymous_status_unauthorized,
            "Loaded permission guard configuration from environment"
        );

        Ok(config)
    }

    /// Parse configuration from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> GuardResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration overrides from environment variables
    pub fn load_from_env(&mut self) -> GuardResult<()> {
        self.load_from(|name| env::var(name))
    }

    /// Load overrides through `lookup`, which behaves like [`std::env::var`]
    pub fn load_from<F>(&mut self, lookup: F) -> GuardResult<()>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        if let Some(keys) = read_var(&lookup, AUTHORIZED_KEYS_ENV)? {
            self.authorized_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(String::from)
                .collect();

            if self.authorized_keys.is_empty() {
                warn!("{AUTHORIZED_KEYS_ENV} is set but holds no keys");
            }
        }

        if let Some(message) = read_var(&lookup, DENY_MESSAGE_ENV)? {
            self.deny_message = message;
        }

        if let Some(flag) = read_var(&lookup, ANONYMOUS_UNAUTHORIZED_ENV)? {
            self.anonymous_status_unauthorized = flag.trim().parse().map_err(|_| {
                GuardError::config(format!(
                    "{ANONYMOUS_UNAUTHORIZED_ENV} must be 'true' or 'false', got '{flag}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> GuardResult<()> {
        if self.deny_message.trim().is_empty() {
            return Err(GuardError::config("Deny message cannot be empty"));
        }

        if self.authorized_keys.iter().any(|key| key.trim().is_empty()) {
            return Err(GuardError::config("Authorized keys cannot be blank"));
        }

        Ok(())
    }

    /// Build the shared key check from the configured keys
    pub fn authorized_key_check(&self) -> GuardResult<AllowAuthorizedKey> {
        Ok(AllowAuthorizedKey::new(&self.authorized_keys)?)
    }

    /// Get configuration summary for logging
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            authorized_keys: self.authorized_keys.len(),
            deny_message: self.deny_message.clone(),
            anonymous_status_unauthorized: self.anonymous_status_unauthorized,
        }
    }

    /// Add a shared key
    pub fn with_authorized_key<S: Into<String>>(mut self, key: S) -> Self {
        self.authorized_keys.push(key.into());
        self
    }

    /// Set the deny message
    pub fn with_deny_message<S: Into<String>>(mut self, message: S) -> Self {
        self.deny_message = message.into();
        self
    }

    /// Answer anonymous denials with `401`
    pub fn with_anonymous_unauthorized(mut self, enabled: bool) -> Self {
        self.anonymous_status_unauthorized = enabled;
        self
    }
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field(
                "authorized_keys",
                &format_args!("[REDACTED; {}]", self.authorized_keys.len()),
            )
            .field("deny_message", &self.deny_message)
            .field(
                "anonymous_status_unauthorized",
                &self.anonymous_status_unauthorized,
            )
            .finish()
    }
}

fn read_var<F>(lookup: &F, name: &str) -> GuardResult<Option<String>>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match lookup(name) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Configuration summary for display, without secrets
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    /// Number of configured shared keys
    pub authorized_keys: usize,
    /// Message returned on denial
    pub deny_message: String,
    /// Whether anonymous denials answer `401`
    pub anonymous_status_unauthorized: bool,
}

impl fmt::Display for ConfigSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Permission Guard Configuration Summary:")?;
        writeln!(f, "  Authorized Keys: {}", self.authorized_keys)?;
        writeln!(f, "  Deny Message: {}", self.deny_message)?;
        write!(
            f,
            "  Anonymous Denial Status: {}",
            if self.anonymous_status_unauthorized {
                "401 Unauthorized"
            } else {
                "403 Forbidden"
            }
        )
    }
}
