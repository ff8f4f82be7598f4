//! `gs-client` — client crate for the Gardena smart system API.
//!
//! Provides the [`GardenaClient`] facade (authenticated requests with a
//! bounded 401/404 retry, location cache, concurrent device status and
//! service commands), the [`Authenticator`] that owns the OAuth2
//! client-credentials exchange, the [`FlowContext`] key-value store that
//! token and location caches live in, and a [`JsonApiResolver`] that turns
//! JSON:API documents into nested entities.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gs_client::{GardenaClient, MemoryFlowContext};
//! use gs_domain::config::GardenaConfig;
//! use gs_domain::credentials::Credentials;
//!
//! # async fn example() -> gs_domain::error::Result<()> {
//! let client = GardenaClient::new(&GardenaConfig::default())?
//!     .with_credentials(Credentials::new("application-id", "application-secret"))
//!     .with_flow_context(Arc::new(MemoryFlowContext::new()));
//!
//! for (id, name) in client.locations().await? {
//!     println!("{id}: {name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod jsonapi;
pub mod services;
pub mod store;
pub mod token;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use auth::{Authenticator, TokenResponse};
pub use client::{from_reqwest, parse_locations, GardenaClient};
pub use jsonapi::{Document, JsonApiResolver, ResolvedEntity, DEFAULT_MAX_DEPTH};
pub use services::find_service;
pub use store::{FileFlowContext, FlowContext, MemoryFlowContext};
pub use token::{TokenCache, TokenRecord, TokenState};
pub use types::{ApiResponse, CommandRequest, CommandType, LocationMap, START_SECONDS_TO_OVERRIDE};

use std::sync::Arc;

use gs_domain::config::Config;
use gs_domain::error::Result;

/// Build a ready-to-use client from the full configuration.
///
/// Credentials are read from the environment variables named in
/// `[credentials]`; the flow context is the JSON file at `[store].path`.
pub fn client_from_config(cfg: &Config) -> Result<GardenaClient> {
    let credentials = cfg.credentials.resolve()?;
    let store = FileFlowContext::open(&cfg.store.path)?;
    tracing::debug!(path = %store.path().display(), "using file flow context");

    Ok(GardenaClient::new(&cfg.gardena)?
        .with_credentials(credentials)
        .with_flow_context(Arc::new(store)))
}
