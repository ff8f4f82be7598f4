//! Bearer-token cache on top of a [`FlowContext`].
//!
//! A token is persisted as three independent keys (token, expiry, credentials
//! fingerprint) so each can be cleared on its own. Invalidation removes the
//! first two and overwrites the fingerprint with [`INVALIDATED_MARKER`], which
//! can never equal a real fingerprint.
//!
//! Lifecycle: `Unknown → Valid → Expired → Invalidated → Valid`. Expired and
//! Invalidated both force a fresh exchange; they differ only in how the cache
//! got there.

use std::sync::Arc;

use gs_domain::credentials::Credentials;
use gs_domain::error::{Error, Result};
use serde_json::{json, Value};

use crate::store::FlowContext;

/// Fingerprint value written by [`TokenCache::invalidate`].
pub const INVALIDATED_MARKER: &str = "invalidated";

const ACCESS_TOKEN_KEY: &str = "access_token";
const EXPIRES_AT_KEY: &str = "access_token_expires_at";
const STORAGE_HASH_KEY: &str = "storage_hash";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A cached token as read back from the flow context.
///
/// `Debug` is manually implemented to redact the token.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub access_token: String,
    /// Unix timestamp (seconds) after which the token must not be used.
    pub expires_at: i64,
    pub credentials_hash: String,
}

impl TokenRecord {
    /// A token is usable strictly before `expires_at`.
    pub fn is_fresh(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("credentials_hash", &self.credentials_hash)
            .finish()
    }
}

/// Observable state of the cache for the configured credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Nothing has ever been stored.
    Unknown,
    Valid,
    Expired,
    /// Deliberately cleared, or stored for different credentials.
    Invalidated,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TokenCache {
    store: Arc<dyn FlowContext>,
    token_key: String,
    expires_key: String,
    hash_key: String,
    fingerprint: String,
    expiry_margin_secs: u64,
}

impl TokenCache {
    pub fn new(
        store: Arc<dyn FlowContext>,
        credentials: &Credentials,
        key_prefix: &str,
        expiry_margin_secs: u64,
    ) -> Self {
        Self {
            store,
            token_key: format!("{key_prefix}{ACCESS_TOKEN_KEY}"),
            expires_key: format!("{key_prefix}{EXPIRES_AT_KEY}"),
            hash_key: format!("{key_prefix}{STORAGE_HASH_KEY}"),
            fingerprint: credentials.fingerprint(),
            expiry_margin_secs,
        }
    }

    /// Fingerprint of the credentials this cache serves.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Read the stored record, if all three fields are present.
    pub async fn load(&self) -> Result<Option<TokenRecord>> {
        let token = self.store.get(&self.token_key).await?;
        let expires = self.store.get(&self.expires_key).await?;
        let hash = self.store.get(&self.hash_key).await?;

        let (Some(token), Some(expires), Some(hash)) = (token, expires, hash) else {
            return Ok(None);
        };
        let (Some(token), Some(expires_at), Some(hash)) =
            (token.as_str(), read_timestamp(&expires), hash.as_str())
        else {
            tracing::warn!("ignoring malformed cached token");
            return Ok(None);
        };

        Ok(Some(TokenRecord {
            access_token: token.to_owned(),
            expires_at,
            credentials_hash: hash.to_owned(),
        }))
    }

    /// Return the cached token if it is fresh at `now` and belongs to the
    /// configured credentials.
    pub async fn valid_token(&self, now: i64) -> Result<Option<String>> {
        Ok(self
            .load()
            .await?
            .filter(|rec| rec.credentials_hash == self.fingerprint && rec.is_fresh(now))
            .map(|rec| rec.access_token))
    }

    pub async fn state(&self, now: i64) -> Result<TokenState> {
        let hash = self.store.get(&self.hash_key).await?;
        if hash.as_ref().and_then(Value::as_str) == Some(INVALIDATED_MARKER) {
            return Ok(TokenState::Invalidated);
        }
        match self.load().await? {
            None if hash.is_none() => Ok(TokenState::Unknown),
            None => Ok(TokenState::Invalidated),
            Some(rec) if rec.credentials_hash != self.fingerprint => Ok(TokenState::Invalidated),
            Some(rec) if rec.is_fresh(now) => Ok(TokenState::Valid),
            Some(_) => Ok(TokenState::Expired),
        }
    }

    /// Persist a freshly issued token. The safety margin is subtracted from
    /// `expires_in` so the token is retired before its real expiry.
    pub async fn store(&self, access_token: &str, expires_in: u64, now: i64) -> Result<TokenRecord> {
        let lifetime = i64::try_from(expires_in.saturating_sub(self.expiry_margin_secs))
            .map_err(|_| Error::Authentication(format!("unreasonable expires_in: {expires_in}")))?;
        let record = TokenRecord {
            access_token: access_token.to_owned(),
            expires_at: now.saturating_add(lifetime),
            credentials_hash: self.fingerprint.clone(),
        };

        self.store.set(&self.token_key, json!(record.access_token)).await?;
        self.store.set(&self.expires_key, json!(record.expires_at)).await?;
        self.store.set(&self.hash_key, json!(record.credentials_hash)).await?;

        Ok(record)
    }

    /// Clear the cached token and mark the fingerprint as invalidated.
    pub async fn invalidate(&self) -> Result<()> {
        self.store.remove(&self.token_key).await?;
        self.store.remove(&self.expires_key).await?;
        self.store.set(&self.hash_key, json!(INVALIDATED_MARKER)).await
    }

    /// Invalidate when the stored fingerprint does not match the configured
    /// credentials. Returns `true` if the cache was cleared.
    pub async fn reconcile(&self) -> Result<bool> {
        let stored = self.store.get(&self.hash_key).await?;
        if stored.as_ref().and_then(Value::as_str) == Some(self.fingerprint.as_str()) {
            return Ok(false);
        }
        self.invalidate().await?;
        Ok(true)
    }
}

/// Expiry timestamps written by older clients may be fractional seconds.
fn read_timestamp(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
}
