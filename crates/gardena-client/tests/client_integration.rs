use std::sync::Arc;

use gs_client::{find_service, FlowContext, GardenaClient, MemoryFlowContext, TokenState};
use gs_domain::config::GardenaConfig;
use gs_domain::credentials::Credentials;
use gs_domain::error::Error;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── helpers ──────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> GardenaConfig {
    GardenaConfig {
        auth_url: format!("{}/v1/oauth2/token", server.uri()),
        api_base_url: format!("{}/v2", server.uri()),
        ..GardenaConfig::default()
    }
}

fn client_for(server: &MockServer, store: Arc<MemoryFlowContext>) -> GardenaClient {
    GardenaClient::new(&config_for(server))
        .unwrap()
        .with_credentials(Credentials::new("app", "secret"))
        .with_flow_context(store)
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-1", "expires_in": 3600})),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn locations_body() -> Value {
    json!({
        "data": [
            {"id": "loc-1", "type": "LOCATION", "attributes": {"name": "Garden"}},
            {"id": "loc-2", "type": "LOCATION", "attributes": {"name": "Balcony"}}
        ]
    })
}

fn location_document(id: &str, service_id: &str) -> Value {
    json!({
        "data": {
            "id": id,
            "type": "LOCATION",
            "attributes": {"name": id},
            "relationships": {
                "devices": {"data": [{"id": "dev-1", "type": "DEVICE"}]}
            }
        },
        "included": [
            {
                "id": "dev-1",
                "type": "DEVICE",
                "relationships": {
                    "location": {"data": {"id": id, "type": "LOCATION"}},
                    "services": {"data": [{"id": service_id, "type": "VALVE"}]}
                }
            },
            {
                "id": service_id,
                "type": "VALVE",
                "attributes": {"activity": {"value": "CLOSED"}},
                "relationships": {
                    "device": {"data": {"id": "dev-1", "type": "DEVICE"}}
                }
            }
        ]
    })
}

// ── authenticated request engine ─────────────────────────────────────

#[tokio::test]
async fn unauthorized_response_is_retried_once_with_new_token() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    let locations = client.locations().await.unwrap();
    assert_eq!(locations.len(), 2);
}

#[tokio::test]
async fn second_unauthorized_response_surfaces() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations/loc-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    let err = client.location_devices("loc-1").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn retry_disabled_returns_first_failure() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    let err = client
        .send_authenticated_request(reqwest::Method::GET, "locations", None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 401, .. }));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    match client.locations().await.unwrap_err() {
        Error::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, json!("boom"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn requests_carry_auth_and_api_key_headers() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(header("X-Api-Key", "app"))
        .and(header("Content-Type", "application/vnd.api+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    client.locations().await.unwrap();
}

// ── login status ─────────────────────────────────────────────────────

#[tokio::test]
async fn login_status_reflects_token_exchange() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    assert!(client.login_status().await);
    assert!(client.login_status().await);
}

#[tokio::test]
async fn login_status_false_on_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryFlowContext::new());
    let client = client_for(&server, store.clone());
    assert!(!client.login_status().await);
    assert!(store.get("gardena_access_token").await.unwrap().is_none());
}

#[tokio::test]
async fn unconfigured_client_is_config_error() {
    let server = MockServer::start().await;
    let client = GardenaClient::new(&config_for(&server))
        .unwrap()
        .with_flow_context(Arc::new(MemoryFlowContext::new()));
    assert!(matches!(client.locations().await.unwrap_err(), Error::Config(_)));
}

// ── locations ────────────────────────────────────────────────────────

#[tokio::test]
async fn locations_are_cached_in_flow_context() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations_body()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryFlowContext::new());
    let client = client_for(&server, store.clone());

    let first = client.locations().await.unwrap();
    let second = client.locations().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first["loc-1"], "Garden");
    assert_eq!(
        store.get("gardena_locations").await.unwrap(),
        Some(json!({"loc-1": "Garden", "loc-2": "Balcony"}))
    );
}

#[tokio::test]
async fn token_is_shared_through_flow_context() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations_body()))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryFlowContext::new());
    client_for(&server, store.clone()).locations().await.unwrap();

    // A second client on the same flow context reuses the stored token.
    let other = client_for(&server, store);
    assert!(other.login_status().await);
}

// ── device status ────────────────────────────────────────────────────

#[tokio::test]
async fn all_devices_status_fetches_every_location() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations_body()))
        .mount(&server)
        .await;
    for (id, service) in [("loc-1", "valve-a"), ("loc-2", "valve-b")] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/locations/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(location_document(id, service)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    let status = client.all_devices_status().await.unwrap();
    assert_eq!(status.len(), 2);

    let valve = find_service(&status, "valve-b", "VALVE").unwrap();
    assert_eq!(valve["activity"]["value"], "CLOSED");
    // The back-reference to the owning device is dropped.
    assert!(valve.get("device").is_none());
}

#[tokio::test]
async fn all_devices_status_fails_when_one_location_fails() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v2/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/locations/loc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(location_document("loc-1", "v")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/locations/loc-2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    let err = client.all_devices_status().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

// ── commands ─────────────────────────────────────────────────────────

#[tokio::test]
async fn valve_command_is_accepted() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("PUT"))
        .and(path("/v2/command/valve-a"))
        .and(body_string_contains(r#""type":"VALVE_CONTROL""#))
        .and(body_string_contains(r#""command":"START_SECONDS_TO_OVERRIDE""#))
        .and(body_string_contains(r#""seconds":600"#))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    let resp = client
        .send_valve_control("valve-a", "START_SECONDS_TO_OVERRIDE", Some(10))
        .await
        .unwrap();
    assert_eq!(resp.status, 202);
    assert_eq!(resp.body, Value::Null);
}

#[tokio::test]
async fn command_answered_with_other_success_status_is_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("PUT"))
        .and(path("/v2/command/mower-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    let err = client
        .send_mower_control("mower-1", "PARK_UNTIL_NEXT_TASK", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 200, .. }));
}

#[tokio::test]
async fn invalid_command_sends_nothing() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;

    let client = client_for(&server, Arc::new(MemoryFlowContext::new()));
    let err = client
        .send_power_socket_control("", "START_OVERRIDE", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = client
        .send_power_socket_control("socket-1", "START_SECONDS_TO_OVERRIDE", Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn revoked_token_state_after_failed_retry() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("PUT"))
        .and(path("/v2/command/socket-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryFlowContext::new());
    let client = client_for(&server, store.clone());
    let err = client
        .send_power_socket_control("socket-1", "START_OVERRIDE", None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));

    // The retry stored a fresh token; the final 401 does not invalidate again.
    let cache = gs_client::TokenCache::new(
        store,
        &Credentials::new("app", "secret"),
        "gardena_",
        10,
    );
    assert_eq!(
        cache.state(chrono::Utc::now().timestamp()).await.unwrap(),
        TokenState::Valid
    );
}
