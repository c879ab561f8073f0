#![allow(clippy::unwrap_used)]
// Integration tests for the REST `Client` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use iotdata_api::{Client, Error, PermissionAction, SaveUserRequest, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Client) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = Client::with_http(
        reqwest::Client::new(),
        base_url,
        SecretString::from("tok-123".to_owned()),
    );
    (server, client)
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn login_returns_token_and_role() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": "ana", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "jwt-abc",
            "role": "master",
            "username": "ana"
        })))
        .mount(&server)
        .await;

    let secret = SecretString::from("hunter2".to_owned());
    let reply = Client::login(&base_url, "ana", &secret, &TransportConfig::default())
        .await
        .unwrap();

    assert_eq!(reply.token, "jwt-abc");
    assert_eq!(reply.role, "master");
    assert_eq!(reply.username, "ana");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let secret = SecretString::from("wrong".to_owned());
    let result = Client::login(&base_url, "ana", &secret, &TransportConfig::default()).await;

    assert!(matches!(result, Err(Error::SessionExpired)));
}

// ── Messages ────────────────────────────────────────────────────────

#[tokio::test]
async fn list_messages_sends_bearer_and_decodes() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/messages"))
        .and(header("Authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 7,
                "esn": "0-4619304",
                "device_name": "Tractor1",
                "payload": "0A1B2C",
                "received_at": "05/08/2026 14:22:01",
                "shared_with": ["joao"]
            },
            {
                "id": 6,
                "esn": "0-4619305",
                "payload": "FFEE",
                "received_at": "05/08/2026 14:20:44"
            }
        ])))
        .mount(&server)
        .await;

    let messages = client.list_messages().await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, 7);
    assert_eq!(messages[0].device_name.as_deref(), Some("Tractor1"));
    assert_eq!(messages[0].shared_with, vec!["joao".to_owned()]);
    // Omitted fields default
    assert_eq!(messages[1].device_name, None);
    assert!(messages[1].shared_with.is_empty());
}

#[tokio::test]
async fn expired_session_maps_to_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list_messages().await;
    assert!(matches!(result, Err(Error::SessionExpired)));
    assert!(result.unwrap_err().is_session_expired());
}

// ── Master data ─────────────────────────────────────────────────────

#[tokio::test]
async fn master_data_decodes_users_and_devices() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/master/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [
                {"id": 1, "username": "ana", "full_name": "Ana Souza", "role": "master"},
                {"id": 2, "username": "joao", "role": "user", "city": "Cuiabá", "state": "MT"}
            ],
            "devices": [
                {"id": 3, "esn": "0-4619304", "name": "Tractor1", "users": ["joao"]},
                {"id": 4, "esn": "0-4619305"}
            ]
        })))
        .mount(&server)
        .await;

    let data = client.master_data().await.unwrap();

    assert_eq!(data.users.len(), 2);
    assert_eq!(data.users[1].city.as_deref(), Some("Cuiabá"));
    assert_eq!(data.devices.len(), 2);
    assert_eq!(data.devices[0].users, vec!["joao".to_owned()]);
    assert!(data.devices[1].users.is_empty());
}

#[tokio::test]
async fn master_data_forbidden_for_plain_users() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/master/data"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = client.master_data().await;
    assert!(matches!(result, Err(Error::Forbidden)));
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn update_device_posts_rename() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/device/update"))
        .and(body_json(json!({"esn": "0-4619304", "name": "Harvester"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.update_device("0-4619304", "Harvester").await.unwrap();
}

#[tokio::test]
async fn set_permission_serializes_action_lowercase() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/master/permission"))
        .and(body_json(
            json!({"user_id": 2, "device_id": 3, "action": "revoke"}),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_permission(2, 3, PermissionAction::Revoke)
        .await
        .unwrap();
}

#[tokio::test]
async fn save_user_omits_absent_fields() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/master/user"))
        .and(body_json(json!({
            "username": "carla",
            "password": "s3cret",
            "role": "support"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client
        .save_user(&SaveUserRequest {
            id: None,
            username: "carla".into(),
            password: Some("s3cret".into()),
            role: "support".into(),
            ..SaveUserRequest::default()
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_user_surfaces_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/master/user/delete"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.delete_user(9).await;
    assert!(matches!(result, Err(Error::Api { status: 500, .. })));
}

// ── Audit ───────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_log_decodes_entries() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/audit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 44,
                "created_at": "05/08/2026 09:00:12",
                "username": "ana",
                "action": "UPDATE_DEVICE",
                "details": "renamed 0-4619304 to Tractor1",
                "ip_address": "10.0.0.9"
            }
        ])))
        .mount(&server)
        .await;

    let entries = client.audit_log().await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "UPDATE_DEVICE");
    assert_eq!(entries[0].ip_address, "10.0.0.9");
}
