#![allow(clippy::unwrap_used)]
// End-to-end engine tests against a wiremock backend.
//
// The poll and push producers are driven by hand (`refresh()` /
// `apply_push()`) so no test depends on wall-clock timing. Poll and push
// views only have to agree eventually — assertions are made after each
// producer has run, never mid-flight.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use iotdata_api::{PushFrame, TelemetryFrame};
use iotdata_core::{
    AccessAction, AccessIntent, ConnectionState, CoreError, Engine, EngineConfig, Role, Session,
    UserDraft, toggle_intent,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn engine_for(server: &MockServer, role: Role) -> Engine {
    let config = EngineConfig {
        base_url: Url::parse(&server.uri()).unwrap(),
        // Producers are driven by hand in tests.
        poll_interval: Duration::ZERO,
        push_enabled: false,
        timeout: Duration::from_secs(5),
        accept_invalid_certs: false,
    };
    let session = Session::new("ana", role, SecretString::from("tok".to_owned()));
    Engine::new(config, session)
}

fn message_json(id: u64, esn: &str, payload: &str, device_name: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "esn": esn,
        "device_name": device_name,
        "payload": payload,
        "received_at": "05/08/2026 14:22:01",
        "shared_with": []
    })
}

async fn mock_messages_once(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

fn telemetry(esn: &str, payload: &str) -> PushFrame {
    PushFrame::Telemetry(TelemetryFrame {
        id: 0,
        esn: esn.to_owned(),
        payload: payload.to_owned(),
        device_name: None,
        received_at: Some("05/08/2026 14:22:01".to_owned()),
        shared_with: Vec::new(),
    })
}

// ── The full reconciliation scenario ────────────────────────────────

#[tokio::test]
async fn push_poll_edit_commit_scenario() {
    let server = MockServer::start().await;
    let engine = engine_for(&server, Role::User);

    // Start with zero messages.
    mock_messages_once(&server, json!([])).await;
    engine.connect().await.unwrap();
    assert!(engine.store().groups().is_empty());

    // Push one telemetry envelope: the group appears immediately.
    engine.apply_push(&telemetry("E1", "AA"));
    let group = engine.store().group("E1").unwrap();
    assert_eq!(group.len(), 1);
    assert_eq!(group.messages[0].payload, "AA");

    // A poll returns the authoritative row, now carrying the name.
    mock_messages_once(
        &server,
        json!([message_json(1, "E1", "AA", Some("Tractor1"))]),
    )
    .await;
    engine.refresh().await.unwrap();
    let group = engine.store().group("E1").unwrap();
    assert_eq!(group.len(), 1);
    assert_eq!(group.device_name.as_deref(), Some("Tractor1"));

    // Begin editing. The draft starts at the displayed name.
    engine.begin_rename("E1").unwrap();
    assert_eq!(engine.rename_draft("E1").as_deref(), Some("Tractor1"));
    engine.update_rename_draft("E1", "Tractor1-Renamed").unwrap();

    // A concurrent poll would deliver a different name — it must not
    // reach the network at all while the edit session is open.
    {
        let suppressed = Mock::given(method("GET"))
            .and(path("/api/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([message_json(1, "E1", "AA", Some("OldName"))])),
            )
            .expect(0)
            .mount_as_scoped(&server)
            .await;

        engine.refresh().await.unwrap();
        assert_eq!(
            engine.rename_draft("E1").as_deref(),
            Some("Tractor1-Renamed")
        );
        assert_eq!(
            engine.store().group("E1").unwrap().device_name.as_deref(),
            Some("Tractor1")
        );
        drop(suppressed); // verifies expect(0): the call was skipped
    }

    // Commit succeeds: the session closes and the optimistic name shows.
    Mock::given(method("POST"))
        .and(path("/api/device/update"))
        .and(body_json(json!({"esn": "E1", "name": "Tractor1-Renamed"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    engine.commit_rename("E1").await.unwrap();
    assert!(engine.rename_draft("E1").is_none());
    assert_eq!(
        engine.store().group("E1").unwrap().device_name.as_deref(),
        Some("Tractor1-Renamed")
    );

    // The next poll confirms the rename.
    mock_messages_once(
        &server,
        json!([message_json(1, "E1", "AA", Some("Tractor1-Renamed"))]),
    )
    .await;
    engine.refresh().await.unwrap();
    assert_eq!(
        engine.store().group("E1").unwrap().device_name.as_deref(),
        Some("Tractor1-Renamed")
    );

    engine.disconnect().await;
    assert_eq!(*engine.connection_state().borrow(), ConnectionState::Disconnected);
}

// ── Push ordering ───────────────────────────────────────────────────

#[tokio::test]
async fn push_delivery_preserves_arrival_order() {
    let server = MockServer::start().await;
    let engine = engine_for(&server, Role::User);
    mock_messages_once(&server, json!([])).await;
    engine.connect().await.unwrap();

    engine.apply_push(&telemetry("E1", "AA"));
    engine.apply_push(&telemetry("E1", "BB"));

    let group = engine.store().group("E1").unwrap();
    let payloads: Vec<&str> = group.messages.iter().map(|m| m.payload.as_str()).collect();
    // Newest first: B heads the history, A precedes it chronologically.
    assert_eq!(payloads, vec!["BB", "AA"]);

    engine.disconnect().await;
}

// ── Push renames vs the edit guard ──────────────────────────────────

#[tokio::test]
async fn push_rename_applies_unless_esn_is_being_edited() {
    let server = MockServer::start().await;
    let engine = engine_for(&server, Role::User);
    mock_messages_once(
        &server,
        json!([message_json(1, "E1", "AA", Some("Original"))]),
    )
    .await;
    engine.connect().await.unwrap();

    // No edit in flight: the rename lands on every cached message.
    engine.apply_push(&PushFrame::DeviceUpdate {
        esn: "E1".into(),
        name: "FromElsewhere".into(),
    });
    assert_eq!(
        engine.store().group("E1").unwrap().device_name.as_deref(),
        Some("FromElsewhere")
    );

    // Edit in flight: the frame is dropped, draft and view untouched.
    engine.begin_rename("E1").unwrap();
    engine.update_rename_draft("E1", "MyDraft").unwrap();
    engine.apply_push(&PushFrame::DeviceUpdate {
        esn: "E1".into(),
        name: "Clobber".into(),
    });
    assert_eq!(engine.rename_draft("E1").as_deref(), Some("MyDraft"));
    assert_eq!(
        engine.store().group("E1").unwrap().device_name.as_deref(),
        Some("FromElsewhere")
    );

    engine.cancel_rename("E1");
    engine.disconnect().await;
}

// ── Optimistic rollback ─────────────────────────────────────────────

fn master_data_json() -> serde_json::Value {
    json!({
        "users": [
            {"id": 1, "username": "ana", "full_name": "Ana Souza", "role": "master"},
            {"id": 2, "username": "joao", "role": "user"}
        ],
        "devices": [
            {"id": 3, "esn": "E1", "name": "Tractor1", "users": []}
        ]
    })
}

async fn connect_master(server: &MockServer) -> Engine {
    let engine = engine_for(server, Role::Master);
    mock_messages_once(server, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/master/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(master_data_json()))
        .up_to_n_times(1)
        .mount(server)
        .await;
    engine.connect().await.unwrap();
    engine
}

#[tokio::test]
async fn grant_applies_optimistically_and_rolls_back_on_failure() {
    let server = MockServer::start().await;
    let engine = connect_master(&server).await;

    let user = engine.store().user_by_id(2).unwrap();
    let device = engine.store().device_by_id(3).unwrap();
    let intent = toggle_intent(&user, &device);
    assert_eq!(intent.action, AccessAction::Grant);

    // Failure path: the flip must be rolled back to the pre-toggle set.
    Mock::given(method("POST"))
        .and(path("/api/master/permission"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let err = engine.set_permission(intent).await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }));
    assert!(engine.store().device_by_id(3).unwrap().users.is_empty());

    // Success path: the flip sticks; the next refresh would confirm it.
    Mock::given(method("POST"))
        .and(path("/api/master/permission"))
        .and(body_json(
            json!({"user_id": 2, "device_id": 3, "action": "grant"}),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    engine.set_permission(intent).await.unwrap();
    assert!(engine.store().device_by_id(3).unwrap().grants("joao"));

    engine.disconnect().await;
}

#[tokio::test]
async fn rename_failure_rolls_back_and_keeps_the_draft() {
    let server = MockServer::start().await;
    let engine = engine_for(&server, Role::User);
    mock_messages_once(
        &server,
        json!([message_json(1, "E1", "AA", Some("Tractor1"))]),
    )
    .await;
    engine.connect().await.unwrap();

    engine.begin_rename("E1").unwrap();
    engine.update_rename_draft("E1", "WillFail").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/device/update"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = engine.commit_rename("E1").await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }));

    // The session stays open with the draft preserved for retry, and the
    // displayed name reverted to its pre-optimistic value.
    assert_eq!(engine.rename_draft("E1").as_deref(), Some("WillFail"));
    assert_eq!(
        engine.store().group("E1").unwrap().device_name.as_deref(),
        Some("Tractor1")
    );

    engine.cancel_rename("E1");
    engine.disconnect().await;
}

#[tokio::test]
async fn user_delete_rolls_back_on_failure() {
    let server = MockServer::start().await;
    let engine = connect_master(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/master/user/delete"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = engine.delete_user(2).await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }));
    assert!(engine.store().user_by_id(2).is_some());

    engine.disconnect().await;
}

#[tokio::test]
async fn user_create_rolls_back_on_failure() {
    let server = MockServer::start().await;
    let engine = connect_master(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/master/user"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let draft = UserDraft {
        username: "carla".into(),
        role: Role::Support,
        ..UserDraft::default()
    };
    let err = engine.save_user(draft).await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }));
    assert!(engine.store().user_by_username("carla").is_none());

    engine.disconnect().await;
}

// ── Permission intents hit the wire with both actions ───────────────

#[tokio::test]
async fn revoke_intent_posts_revoke() {
    let server = MockServer::start().await;
    let engine = connect_master(&server).await;

    // Grant first so there is something to revoke.
    Mock::given(method("POST"))
        .and(path("/api/master/permission"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    engine
        .set_permission(AccessIntent {
            user_id: 2,
            device_id: 3,
            action: AccessAction::Grant,
        })
        .await
        .unwrap();
    assert!(engine.store().device_by_id(3).unwrap().grants("joao"));

    let user = engine.store().user_by_id(2).unwrap();
    let device = engine.store().device_by_id(3).unwrap();
    let intent = toggle_intent(&user, &device);
    assert_eq!(intent.action, AccessAction::Revoke);

    engine.set_permission(intent).await.unwrap();
    assert!(!engine.store().device_by_id(3).unwrap().grants("joao"));

    engine.disconnect().await;
}

// ── Session invalidation ────────────────────────────────────────────

#[tokio::test]
async fn a_401_clears_local_session_state() {
    let server = MockServer::start().await;
    let engine = engine_for(&server, Role::User);
    mock_messages_once(&server, json!([message_json(1, "E1", "AA", None)])).await;
    engine.connect().await.unwrap();
    assert_eq!(engine.store().message_count(), 1);

    Mock::given(method("GET"))
        .and(path("/api/messages"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = engine.refresh().await.unwrap_err();
    assert!(err.is_session_expired());
    assert_eq!(engine.store().message_count(), 0);
    assert_eq!(
        *engine.connection_state().borrow(),
        ConnectionState::SessionExpired
    );

    engine.disconnect().await;
}

// ── Idempotent polling ──────────────────────────────────────────────

#[tokio::test]
async fn ingesting_the_same_snapshot_twice_is_stable() {
    let server = MockServer::start().await;
    let engine = engine_for(&server, Role::User);

    let body = json!([
        message_json(2, "E1", "BB", Some("Tractor1")),
        message_json(1, "E1", "AA", Some("Tractor1")),
        message_json(3, "E2", "CC", None),
    ]);
    mock_messages_once(&server, body.clone()).await;
    engine.connect().await.unwrap();

    let first: Vec<(String, usize)> = engine
        .store()
        .groups()
        .into_iter()
        .map(|g| (g.esn.clone(), g.len()))
        .collect();

    mock_messages_once(&server, body).await;
    engine.refresh().await.unwrap();

    let second: Vec<(String, usize)> = engine
        .store()
        .groups()
        .into_iter()
        .map(|g| (g.esn.clone(), g.len()))
        .collect();
    assert_eq!(first, second);
    assert_eq!(engine.store().message_count(), 3);

    engine.disconnect().await;
}
