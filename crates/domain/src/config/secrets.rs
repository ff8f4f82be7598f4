use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential sources
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Names of the environment variables holding the application credentials.
/// The values themselves never live in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "d_application_env")]
    pub application_env: String,
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            application_env: d_application_env(),
            secret_env: d_secret_env(),
        }
    }
}

impl CredentialsConfig {
    /// Resolve both environment variables into [`Credentials`].
    pub fn resolve(&self) -> Result<Credentials> {
        let application = read_env(&self.application_env)?;
        let password = read_env(&self.secret_env)?;
        Ok(Credentials::new(application, password))
    }
}

fn read_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(Error::Config(format!(
            "environment variable '{name}' not set or empty"
        ))),
    }
}

fn d_application_env() -> String {
    "GARDENA_APPLICATION_ID".into()
}
fn d_secret_env() -> String {
    "GARDENA_APPLICATION_SECRET".into()
}
