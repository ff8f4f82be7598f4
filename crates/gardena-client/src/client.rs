//! `GardenaClient` — authenticated access to the Gardena smart system API.
//!
//! Every request carries a bearer token from the [`Authenticator`]. A 401
//! or 404 answer is taken as a sign that the token was revoked: the cached
//! token is invalidated and the request is sent once more with a fresh one.
//! There is never more than one retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use gs_domain::config::GardenaConfig;
use gs_domain::credentials::Credentials;
use gs_domain::error::{Error, Result};
use gs_domain::trace::TraceEvent;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::auth::Authenticator;
use crate::jsonapi::{Document, JsonApiResolver, PrimaryData, ResolvedEntity, ResourceObject};
use crate::store::FlowContext;
use crate::types::{
    ApiResponse, CommandRequest, CommandType, LocationMap, START_SECONDS_TO_OVERRIDE,
    UNKNOWN_LOCATION,
};

const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";
const LOCATIONS_KEY: &str = "locations";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client for one (credentials, flow context) pairing.
///
/// Both must be supplied with [`with_credentials`](Self::with_credentials)
/// and [`with_flow_context`](Self::with_flow_context) before any operation;
/// otherwise operations fail with [`Error::Config`]. The authenticator is
/// created on first use and reused afterwards.
pub struct GardenaClient {
    http: Client,
    config: GardenaConfig,
    credentials: Option<Credentials>,
    flow_context: Option<Arc<dyn FlowContext>>,
    authenticator: OnceCell<Authenticator>,
    resolver: JsonApiResolver,
}

impl GardenaClient {
    pub fn new(cfg: &GardenaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            config: GardenaConfig {
                api_base_url: cfg.api_base_url.trim_end_matches('/').to_owned(),
                ..cfg.clone()
            },
            credentials: None,
            flow_context: None,
            authenticator: OnceCell::new(),
            resolver: JsonApiResolver::default(),
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self.authenticator = OnceCell::new();
        self
    }

    pub fn with_flow_context(mut self, flow_context: Arc<dyn FlowContext>) -> Self {
        self.flow_context = Some(flow_context);
        self.authenticator = OnceCell::new();
        self
    }

    pub fn with_resolver(mut self, resolver: JsonApiResolver) -> Self {
        self.resolver = resolver;
        self
    }

    fn flow_context(&self) -> Result<&Arc<dyn FlowContext>> {
        self.flow_context
            .as_ref()
            .ok_or_else(|| Error::Config("flow context has not been set".into()))
    }

    async fn authenticator(&self) -> Result<&Authenticator> {
        self.authenticator
            .get_or_try_init(|| async {
                let credentials = self
                    .credentials
                    .clone()
                    .ok_or_else(|| Error::Config("credentials have not been set".into()))?;
                let store = self.flow_context()?.clone();
                Authenticator::connect(self.http.clone(), &self.config, credentials, store).await
            })
            .await
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base_url,
            path.trim_start_matches('/')
        )
    }

    // ── operations ───────────────────────────────────────────────────

    /// `true` if a token can be obtained. Never fails.
    pub async fn login_status(&self) -> bool {
        let result = match self.authenticator().await {
            Ok(auth) => auth.get_token().await.map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "login check failed");
                false
            }
        }
    }

    /// Location id → name, served from the flow context once cached.
    ///
    /// The cache is never refreshed for the lifetime of the flow context.
    pub async fn locations(&self) -> Result<LocationMap> {
        let store = self.flow_context()?;
        let key = format!("{}{LOCATIONS_KEY}", self.config.key_prefix);

        if let Some(cached) = store.get(&key).await? {
            match serde_json::from_value::<LocationMap>(cached) {
                Ok(locations) if !locations.is_empty() => return Ok(locations),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "ignoring malformed cached locations"),
            }
        }

        let resp = self
            .send_authenticated_request(Method::GET, "locations", None, true)
            .await?;
        if resp.status != 200 {
            return Err(Error::Api {
                status: resp.status,
                body: resp.body,
            });
        }

        let doc: Document = serde_json::from_value(resp.body)
            .map_err(|e| Error::Decode(format!("locations response: {e}")))?;
        let PrimaryData::Many(resources) = doc.data else {
            return Err(Error::Decode("locations response data is not a list".into()));
        };
        let locations = parse_locations(&resources);

        store
            .set(&key, serde_json::to_value(&locations)?)
            .await
            .map_err(|e| Error::Storage(format!("unable to store locations in flow context: {e}")))?;

        TraceEvent::LocationsCached {
            count: locations.len(),
        }
        .emit();

        Ok(locations)
    }

    /// Device graph of every location, fetched concurrently.
    ///
    /// Results are in completion order, not location order. The first
    /// failure aborts the whole operation.
    pub async fn all_devices_status(&self) -> Result<Vec<Value>> {
        let locations = self.locations().await?;

        let mut pending: FuturesUnordered<_> = locations
            .keys()
            .map(|id| self.location_devices(id))
            .collect();

        let mut devices = Vec::with_capacity(locations.len());
        while let Some(result) = pending.next().await {
            devices.push(Value::Object(result?));
        }
        Ok(devices)
    }

    /// Resolved device graph of one location.
    pub async fn location_devices(&self, location_id: &str) -> Result<ResolvedEntity> {
        let resp = self
            .send_authenticated_request(Method::GET, &format!("locations/{location_id}"), None, true)
            .await?;
        if resp.status != 200 {
            return Err(Error::Api {
                status: resp.status,
                body: resp.body,
            });
        }
        self.resolver.deserialize_value(&resp.body)
    }

    /// Send a command to a service. Only `202 Accepted` counts as success;
    /// any other answer is returned as [`Error::Api`] with the raw body.
    pub async fn send_service_control(
        &self,
        service_id: &str,
        operation: &str,
        duration_minutes: Option<u32>,
        command: CommandType,
    ) -> Result<ApiResponse> {
        if service_id.trim().is_empty() {
            return Err(Error::Validation(
                "service id was not given; set up the node properly to run a command".into(),
            ));
        }
        if operation == START_SECONDS_TO_OVERRIDE && duration_minutes.unwrap_or(0) == 0 {
            return Err(Error::Validation(
                "duration in minutes is required for START_SECONDS_TO_OVERRIDE".into(),
            ));
        }

        let payload = serde_json::to_value(CommandRequest::new(command, operation, duration_minutes))?;
        tracing::debug!(service_id, operation, command = %command, "sending service command");

        let resp = self
            .send_authenticated_request(
                Method::PUT,
                &format!("command/{service_id}"),
                Some(&payload),
                true,
            )
            .await?;
        if resp.status != 202 {
            return Err(Error::Api {
                status: resp.status,
                body: resp.body,
            });
        }
        Ok(resp)
    }

    pub async fn send_valve_control(
        &self,
        service_id: &str,
        operation: &str,
        duration_minutes: Option<u32>,
    ) -> Result<ApiResponse> {
        self.send_service_control(service_id, operation, duration_minutes, CommandType::ValveControl)
            .await
    }

    pub async fn send_mower_control(
        &self,
        service_id: &str,
        operation: &str,
        duration_minutes: Option<u32>,
    ) -> Result<ApiResponse> {
        self.send_service_control(service_id, operation, duration_minutes, CommandType::MowerControl)
            .await
    }

    pub async fn send_power_socket_control(
        &self,
        service_id: &str,
        operation: &str,
        duration_minutes: Option<u32>,
    ) -> Result<ApiResponse> {
        self.send_service_control(
            service_id,
            operation,
            duration_minutes,
            CommandType::PowerSocketControl,
        )
        .await
    }

    // ── request engine ───────────────────────────────────────────────

    /// Send an authenticated request against the resource API.
    ///
    /// * A 401/404 with `allow_retry` invalidates the token and retries once
    ///   with `allow_retry = false`.
    /// * Any other non-2xx status is returned as [`Error::Api`].
    pub async fn send_authenticated_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        allow_retry: bool,
    ) -> Result<ApiResponse> {
        let auth = self.authenticator().await?;
        let mut allow_retry = allow_retry;
        let mut retried = false;

        loop {
            let token = auth.get_token().await?;
            let start = Instant::now();
            let resp = self
                .dispatch(&method, path, body, &token, &auth.credentials().application)
                .await?;

            TraceEvent::ApiCall {
                method: method.to_string(),
                path: path.to_owned(),
                status: resp.status,
                duration_ms: start.elapsed().as_millis() as u64,
                retried,
            }
            .emit();

            if is_auth_failure(resp.status) && allow_retry {
                tracing::info!(status = resp.status, path, "request rejected; refreshing token and retrying");
                auth.invalidate(&format!("{method} {path} returned {}", resp.status))
                    .await?;
                allow_retry = false;
                retried = true;
                continue;
            }

            if !resp.is_success() {
                return Err(Error::Api {
                    status: resp.status,
                    body: resp.body,
                });
            }
            return Ok(resp);
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
        application: &str,
    ) -> Result<ApiResponse> {
        let mut rb = self
            .http
            .request(method.clone(), self.url(path))
            .bearer_auth(token)
            .header("X-Api-Key", application)
            .header(CONTENT_TYPE, JSON_API_CONTENT_TYPE);
        if let Some(body) = body {
            rb = rb.body(serde_json::to_vec(body)?);
        }

        let resp = rb.send().await.map_err(from_reqwest)?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(from_reqwest)?;
        Ok(ApiResponse::from_text(status, &text))
    }
}

fn is_auth_failure(status: u16) -> bool {
    status == 401 || status == 404
}

/// Build the id → name map from a `locations` collection. Resources that
/// are not `LOCATION`s, or carry no attributes, are skipped.
pub fn parse_locations(resources: &[ResourceObject]) -> LocationMap {
    resources
        .iter()
        .filter(|r| r.kind.as_deref() == Some("LOCATION"))
        .filter_map(|r| {
            let id = r.id.clone()?;
            let attributes = r.attributes.as_ref()?;
            let name = attributes
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_LOCATION)
                .to_owned();
            Some((id, name))
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resources(value: Value) -> Vec<ResourceObject> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parse_locations_filters_and_defaults() {
        let parsed = parse_locations(&resources(json!([
            {"id": "1", "type": "LOCATION", "attributes": {"name": "Front yard"}},
            {"id": "2", "type": "LOCATION", "attributes": {}},
            {"id": "3", "type": "DEVICE", "attributes": {"name": "Mower"}},
            {"id": "4", "type": "LOCATION"}
        ])));

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["1"], "Front yard");
        assert_eq!(parsed["2"], UNKNOWN_LOCATION);
    }

    #[test]
    fn auth_failure_statuses() {
        assert!(is_auth_failure(401));
        assert!(is_auth_failure(404));
        assert!(!is_auth_failure(403));
        assert!(!is_auth_failure(500));
    }

    #[test]
    fn url_joins_base_and_path() {
        let client = GardenaClient::new(&GardenaConfig {
            api_base_url: "https://example.test/v2/".into(),
            ..GardenaConfig::default()
        })
        .unwrap();
        assert_eq!(client.url("locations"), "https://example.test/v2/locations");
        assert_eq!(client.url("/command/abc"), "https://example.test/v2/command/abc");
    }

    #[tokio::test]
    async fn operations_require_credentials_and_context() {
        let client = GardenaClient::new(&GardenaConfig::default()).unwrap();
        assert!(matches!(client.locations().await.unwrap_err(), Error::Config(_)));
        assert!(!client.login_status().await);
    }

    #[tokio::test]
    async fn validation_runs_before_any_request() {
        // No credentials or flow context: a validation failure must come
        // first, proving nothing was attempted.
        let client = GardenaClient::new(&GardenaConfig::default()).unwrap();

        let err = client
            .send_valve_control("", "START_SECONDS_TO_OVERRIDE", Some(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = client
            .send_valve_control("svc-1", START_SECONDS_TO_OVERRIDE, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
