mod gardena;
mod secrets;
mod store;

pub use gardena::*;
pub use secrets::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gardena: GardenaConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (field, url) in [
            ("gardena.auth_url", &self.gardena.auth_url),
            ("gardena.api_base_url", &self.gardena.api_base_url),
        ] {
            if url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "URL must not be empty".into(),
                });
            } else if !url.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: field.into(),
                    message: "URL is not https; credentials would travel in clear text".into(),
                });
            }
        }

        if self.gardena.timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "gardena.timeout_ms".into(),
                message: "timeout must be greater than 0".into(),
            });
        }

        // Zero margin means a token may be sent right as it expires.
        if self.gardena.expiry_margin_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "gardena.expiry_margin_secs".into(),
                message: "no safety margin before token expiry".into(),
            });
        }

        if self.credentials.application_env.is_empty() || self.credentials.secret_env.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "credentials".into(),
                message: "credential environment variable names must not be empty".into(),
            });
        }

        if self.store.path.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.path".into(),
                message: "store path must not be empty".into(),
            });
        }

        errors
    }
}
