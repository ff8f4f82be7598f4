//! OAuth2 client-credentials exchange with single-flight token acquisition.
//!
//! [`Authenticator::get_token`] serves the cached token while it is fresh
//! and otherwise exchanges the application credentials for a new one.
//! Concurrent callers are serialized behind one async lock; a caller that
//! queued while an exchange was running receives that exchange's outcome
//! instead of starting another one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gs_domain::config::GardenaConfig;
use gs_domain::credentials::Credentials;
use gs_domain::error::{Error, Result};
use gs_domain::trace::TraceEvent;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::store::FlowContext;
use crate::token::{TokenCache, TokenState};

/// Response from the token endpoint.
///
/// `Debug` is manually implemented to redact the token.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Outcome of the most recent exchange, replayed to callers that were
/// queued behind it.
#[derive(Default)]
struct ExchangeSlot {
    outcome: Option<Result<String>>,
}

pub struct Authenticator {
    http: Client,
    auth_url: String,
    credentials: Credentials,
    cache: TokenCache,
    exchange: Mutex<ExchangeSlot>,
    /// Bumped after every completed exchange.
    generation: AtomicU64,
}

impl Authenticator {
    /// Build an authenticator and reconcile the stored token with
    /// `credentials`; a cache written for other credentials is invalidated
    /// before first use.
    pub async fn connect(
        http: Client,
        cfg: &GardenaConfig,
        credentials: Credentials,
        store: Arc<dyn FlowContext>,
    ) -> Result<Self> {
        let cache = TokenCache::new(store, &credentials, &cfg.key_prefix, cfg.expiry_margin_secs);

        if cache.reconcile().await? {
            TraceEvent::TokenInvalidated {
                reason: "credentials changed".into(),
            }
            .emit();
        }

        Ok(Self {
            http,
            auth_url: cfg.auth_url.clone(),
            credentials,
            cache,
            exchange: Mutex::new(ExchangeSlot::default()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Current cache state for these credentials.
    pub async fn token_state(&self) -> Result<TokenState> {
        self.cache.state(now()).await
    }

    /// Return a valid bearer token, exchanging credentials if needed.
    pub async fn get_token(&self) -> Result<String> {
        let observed = self.generation.load(Ordering::Acquire);
        let mut slot = self.exchange.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            if let Some(outcome) = &slot.outcome {
                tracing::debug!("reusing result of concurrent token exchange");
                return replay(outcome);
            }
        }

        if let Some(token) = self.cache.valid_token(now()).await? {
            return Ok(token);
        }

        let outcome = self.authenticate().await;
        slot.outcome = Some(replay(&outcome));
        self.generation.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Drop the cached token so the next [`get_token`](Self::get_token)
    /// performs a fresh exchange.
    pub async fn invalidate(&self, reason: &str) -> Result<()> {
        let mut slot = self.exchange.lock().await;
        slot.outcome = None;
        self.cache.invalidate().await?;

        TraceEvent::TokenInvalidated {
            reason: reason.to_owned(),
        }
        .emit();
        Ok(())
    }

    /// Perform the client-credentials exchange and store the result.
    ///
    /// Never retried here: a failure means the credentials are wrong or the
    /// token endpoint is unreachable.
    async fn authenticate(&self) -> Result<String> {
        tracing::debug!(application = %self.credentials.application, "obtaining access token");

        let resp = self
            .http
            .post(&self.auth_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.application.as_str()),
                ("client_secret", self.credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("token request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Authentication(format!("reading token response: {e}")))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "token exchange rejected");
            return Err(Error::Authentication(format!(
                "token endpoint returned HTTP {}; the credentials are probably wrong",
                status.as_u16()
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Authentication(format!("parsing token response: {e}")))?;

        self.cache
            .store(&token.access_token, token.expires_in, now())
            .await?;

        TraceEvent::TokenExchanged {
            expires_in: token.expires_in,
        }
        .emit();

        Ok(token.access_token)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Clone an exchange outcome for a waiting caller.
fn replay(outcome: &Result<String>) -> Result<String> {
    match outcome {
        Ok(token) => Ok(token.clone()),
        Err(Error::Storage(msg)) => Err(Error::Storage(msg.clone())),
        Err(Error::Authentication(msg)) => Err(Error::Authentication(msg.clone())),
        Err(other) => Err(Error::Authentication(other.to_string())),
    }
}
