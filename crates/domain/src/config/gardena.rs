use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gardena smart system endpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GardenaConfig {
    /// OAuth2 token endpoint for the client-credentials exchange.
    #[serde(default = "d_auth_url")]
    pub auth_url: String,
    /// Base URL of the resource API; request paths are appended to it.
    #[serde(default = "d_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    /// Seconds subtracted from `expires_in` when storing a token.
    #[serde(default = "d_10")]
    pub expiry_margin_secs: u64,
    /// Prefix applied to every key written to the flow context.
    #[serde(default = "d_key_prefix")]
    pub key_prefix: String,
}

impl Default for GardenaConfig {
    fn default() -> Self {
        Self {
            auth_url: d_auth_url(),
            api_base_url: d_api_base_url(),
            timeout_ms: 10_000,
            expiry_margin_secs: 10,
            key_prefix: d_key_prefix(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_auth_url() -> String {
    "https://api.authentication.husqvarnagroup.dev/v1/oauth2/token".into()
}
fn d_api_base_url() -> String {
    "https://api.smart.gardena.dev/v2".into()
}
fn d_10000() -> u64 {
    10_000
}
fn d_10() -> u64 {
    10
}
fn d_key_prefix() -> String {
    "gardena_".into()
}
