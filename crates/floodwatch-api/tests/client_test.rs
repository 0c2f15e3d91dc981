#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use floodwatch_api::{ApiClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = ApiClient::new(
        base_url,
        &SecretString::from("test-token".to_string()),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

// ── Devices ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_sends_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "device_id": "AWLR-01",
                "name": "Pintu Air Manggarai",
                "location": "Jakarta Selatan",
                "is_offline": false,
                "last_seen_at": "2026-03-01T08:00:00Z",
                "sensor_height": 300
            },
            {
                "id": "AWLR-02",
                "name": "Bendung Katulampa"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "AWLR-01");
    assert_eq!(devices[0].location.as_deref(), Some("Jakarta Selatan"));
    assert_eq!(devices[0].sensor_height, Some(json!(300)));
    assert_eq!(devices[1].id, "AWLR-02");
    assert!(devices[1].is_offline.is_none());
}

#[tokio::test]
async fn test_list_devices_wrapped_envelope_skips_bad_rows() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "device_id": "AWLR-01" },
                { "name": "no identifier at all" },
                "not even an object"
            ]
        })))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "AWLR-01");
}

#[tokio::test]
async fn test_list_devices_keeps_rows_with_epoch_timestamps() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "device_id": "AWLR-01", "last_seen_at": 1_767_225_600, "updated_at": "soon" },
            { "device_id": "AWLR-02" }
        ])))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "AWLR-01");
    assert_eq!(devices[0].last_seen_at, Some(json!(1_767_225_600)));
}

// ── Alerts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_active_alerts_filters_server_side() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .and(query_param("is_active", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 11,
                "device_id": "AWLR-01",
                "alert_type": "flood",
                "severity": "high",
                "message": "Water level 250 cm",
                "is_active": true,
                "triggered_at": "2026-03-01T08:05:00Z"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let alerts = client.list_alerts(true).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, "flood");
    assert_eq!(alerts[0].id.as_deref(), Some("11"));
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list_devices().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client.list_alerts(true).await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 502, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_non_json_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.list_devices().await;
    match result {
        Err(Error::Deserialization { body, .. }) => assert!(body.contains("maintenance")),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_backend_reports_configured_timeout() {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        timeout: Duration::from_secs(1),
        ..TransportConfig::default()
    };
    let client = ApiClient::new(
        Url::parse(&format!("{}/api", server.uri())).unwrap(),
        &SecretString::from("test-token".to_string()),
        &transport,
    )
    .unwrap();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(
        matches!(err, Error::Timeout { timeout_secs: 1 }),
        "unexpected error: {err:?}"
    );
}
