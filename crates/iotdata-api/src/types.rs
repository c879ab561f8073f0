// Wire types for the IoTData backend.
//
// These mirror the backend's JSON exactly and stay raw: timestamps are the
// backend's `dd/MM/yyyy HH:MM:SS` strings, roles are plain strings.
// `iotdata-core` converts them into domain types.

use serde::{Deserialize, Serialize};

// ── Messages ────────────────────────────────────────────────────────

/// One telemetry message as returned by `GET /api/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: u64,
    pub esn: String,
    #[serde(default)]
    pub device_name: Option<String>,
    pub payload: String,
    pub received_at: String,
    /// Usernames that can also see this device's messages.
    #[serde(default)]
    pub shared_with: Vec<String>,
}

// ── Master data ─────────────────────────────────────────────────────

/// One device row from `GET /api/master/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: u64,
    pub esn: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Usernames with granted access. The backend may omit or null this.
    #[serde(default)]
    pub users: Vec<String>,
}

/// One user row from `GET /api/master/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Combined payload of `GET /api/master/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterData {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

// ── Audit ───────────────────────────────────────────────────────────

/// One audit-trail row from `GET /api/audit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: u64,
    pub created_at: String,
    pub username: String,
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub ip_address: String,
}

// ── Mutation payloads ───────────────────────────────────────────────

/// Body of `POST /api/device/update`.
#[derive(Debug, Clone, Serialize)]
pub struct RenameRequest<'a> {
    pub esn: &'a str,
    pub name: &'a str,
}

/// Grant or revoke, as the backend spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Grant,
    Revoke,
}

/// Body of `POST /api/master/permission`.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionRequest {
    pub user_id: u64,
    pub device_id: u64,
    pub action: PermissionAction,
}

/// Body of `POST /api/master/user`. `id` present means update, absent
/// means create.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SaveUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Body of `POST /api/master/user/delete`.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteUserRequest {
    pub user_id: u64,
}

// ── Login ───────────────────────────────────────────────────────────

/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Reply of `POST /login`: the bearer credential plus the authoritative
/// role for this account.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginReply {
    pub token: String,
    pub role: String,
    pub username: String,
}
