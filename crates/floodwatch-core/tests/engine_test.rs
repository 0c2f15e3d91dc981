#![allow(clippy::unwrap_used)]
// SyncEngine against a wiremock backend. The stream endpoint points at a
// closed port, so the channel keeps retrying in the background while events
// are injected with `Channel::dispatch`.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use floodwatch_api::channel::ReconnectConfig;
use floodwatch_api::{ChannelEvent, ChannelManager};
use floodwatch_core::event::names;
use floodwatch_core::{
    AlertType, CoreError, DeviceId, LoadState, StreamHealth, SyncConfig, SyncEngine,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer) -> SyncConfig {
    let mut config = SyncConfig::new(
        Url::parse(&format!("{}/api", server.uri())).unwrap(),
        Url::parse("ws://127.0.0.1:9/events").unwrap(),
        SecretString::from("engine-token".to_string()),
    );
    config.resync_on_reconnect = false;
    config
}

fn manager() -> Arc<ChannelManager> {
    Arc::new(ChannelManager::new(ReconnectConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        max_retries: None,
    }))
}

async fn mount_snapshot(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "device_id": "A", "name": "Pos Manggarai", "is_offline": false,
              "last_seen_at": "2026-01-10T07:00:00Z" },
            { "device_id": "B", "name": "Pos Depok", "is_offline": false }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .and(query_param("is_active", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [
            { "id": 1, "device_id": "B", "alert_type": "flood",
              "triggered_at": "2026-01-10T06:00:00Z", "message": "older" },
            { "id": 2, "device_id": "B", "alert_type": "flood",
              "triggered_at": "2026-01-10T06:30:00Z", "message": "newer" },
            { "id": 3, "device_id": "B", "alert_type": "volcano" }
        ]})))
        .mount(server)
        .await;
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn attach_loads_snapshot_and_seeds_alerts() {
    let server = MockServer::start().await;
    mount_snapshot(&server).await;
    let channels = manager();

    let engine = SyncEngine::new(config(&server), Arc::clone(&channels), "dashboard").unwrap();
    engine.attach().await.unwrap();

    assert!(matches!(engine.current_load_state(), LoadState::Ready { .. }));
    let store = engine.store();
    assert_eq!(store.views().len(), 2);

    let active = store.active_alerts(&DeviceId::from("B"));
    assert_eq!(active.len(), 1, "duplicate rows collapse to one");
    assert_eq!(active[0].message, "newer");

    engine.detach().await;
    channels.shutdown();
}

#[tokio::test]
async fn attaching_twice_delivers_each_event_once() {
    let server = MockServer::start().await;
    mount_snapshot(&server).await;
    let channels = manager();

    let engine = SyncEngine::new(config(&server), Arc::clone(&channels), "dashboard").unwrap();
    engine.attach().await.unwrap();
    engine.attach().await.unwrap();

    let channel = engine.channel().await.unwrap();
    let delivered = channel.dispatch(&ChannelEvent::new(
        names::RAPID_RISE_ALERT,
        json!({ "device_id": "A", "message": "rising 4 cm/min" }),
    ));
    assert_eq!(delivered, 1);
    assert!(
        engine
            .store()
            .alert(&DeviceId::from("A"), AlertType::RapidRise)
            .unwrap()
            .is_active
    );

    engine.detach().await;
    assert_eq!(channel.handler_count(), 0);
    channels.shutdown();
}

#[tokio::test]
async fn consumers_share_a_channel_and_detach_independently() {
    let server = MockServer::start().await;
    mount_snapshot(&server).await;
    let channels = manager();

    let grid = SyncEngine::new(config(&server), Arc::clone(&channels), "grid").unwrap();
    let detail = SyncEngine::new(config(&server), Arc::clone(&channels), "detail").unwrap();
    grid.attach().await.unwrap();
    detail.attach().await.unwrap();
    assert_eq!(channels.len(), 1);

    let channel = grid.channel().await.unwrap();
    let event = ChannelEvent::new(names::SENSOR_DATA, json!({ "device_id": "A", "water_level": 88 }));
    assert_eq!(channel.dispatch(&event), 2);

    grid.detach().await;
    assert!(!channel.is_closed(), "other consumer still attached");
    let event = ChannelEvent::new(names::SENSOR_DATA, json!({ "device_id": "A", "water_level": 91 }));
    assert_eq!(channel.dispatch(&event), 1);

    let a = DeviceId::from("A");
    assert_eq!(detail.store().sample(&a).unwrap().water_level, Some(91.0));
    assert_eq!(grid.store().sample(&a).unwrap().water_level, Some(88.0));

    detail.detach().await;
    assert_eq!(channels.close_idle(), 1);
    channels.shutdown();
}

#[tokio::test]
async fn first_load_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let channels = manager();

    let engine = SyncEngine::new(config(&server), Arc::clone(&channels), "dashboard").unwrap();
    let err = engine.attach().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(
        engine.current_load_state(),
        LoadState::Failed {
            message: err.to_string(),
            has_cached_state: false
        }
    );

    engine.detach().await;
    channels.shutdown();
}

#[tokio::test]
async fn later_load_failure_keeps_cached_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "device_id": "A" }])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let channels = manager();

    let engine = SyncEngine::new(config(&server), Arc::clone(&channels), "dashboard").unwrap();
    engine.attach().await.unwrap();

    let err = engine.reload().await.unwrap_err();
    assert!(matches!(err, CoreError::SnapshotFailed { retryable: true, .. }));
    assert!(matches!(
        engine.current_load_state(),
        LoadState::Failed {
            has_cached_state: true,
            ..
        }
    ));
    assert_eq!(engine.store().views().len(), 1);

    engine.detach().await;
    channels.shutdown();
}

#[tokio::test]
async fn unreachable_stream_degrades_without_failing_attach() {
    let server = MockServer::start().await;
    mount_snapshot(&server).await;
    let channels = manager();

    let engine = SyncEngine::new(config(&server), Arc::clone(&channels), "dashboard").unwrap();
    engine.attach().await.unwrap();

    let mut health = engine.store().health();
    tokio::time::timeout(
        Duration::from_secs(5),
        health.wait_for(|h| matches!(h, StreamHealth::Degraded { fatal: false, .. })),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(engine.store().views().len(), 2);

    engine.detach().await;
    channels.shutdown();
}
