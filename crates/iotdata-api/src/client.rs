// REST client for the IoTData backend.
//
// Wraps `reqwest::Client` with bearer-credential injection, URL
// construction, and status-code mapping. The backend returns bare JSON
// (no envelope); 401 anywhere is a session-invalid signal.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::types::{
    AuditRecord, DeleteUserRequest, LoginReply, LoginRequest, MasterData, MessageRecord,
    PermissionAction, PermissionRequest, RenameRequest, SaveUserRequest,
};

/// HTTP client for the backend's REST API.
///
/// Every request carries `Authorization: Bearer <token>`. Methods return
/// decoded payloads; a 401 on any call surfaces as
/// [`Error::SessionExpired`].
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl Client {
    /// Create a client from a `TransportConfig`. The `base_url` is the
    /// backend root (e.g. `https://panel.example.com`).
    pub fn new(
        base_url: Url,
        token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (tests).
    pub fn with_http(http: reqwest::Client, base_url: Url, token: SecretString) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchange credentials for a bearer token via `POST /login`.
    ///
    /// An associated function because no token exists yet. The reply also
    /// carries the account's authoritative role.
    pub async fn login(
        base_url: &Url,
        username: &str,
        password: &SecretString,
        transport: &TransportConfig,
    ) -> Result<LoginReply, Error> {
        let http = transport.build_client()?;
        let url = join_url(base_url, "login")?;
        debug!("POST {url}");

        let resp = http
            .post(url)
            .json(&LoginRequest {
                username,
                password: password.expose_secret(),
            })
            .send()
            .await
            .map_err(Error::Transport)?;

        decode_response(resp).await
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// `GET /api/messages` — the full authoritative message set visible
    /// to this account.
    pub async fn list_messages(&self) -> Result<Vec<MessageRecord>, Error> {
        self.get_json("api/messages").await
    }

    /// `GET /api/master/data` — users and devices (elevated roles only).
    pub async fn master_data(&self) -> Result<MasterData, Error> {
        self.get_json("api/master/data").await
    }

    /// `GET /api/audit` — the audit trail.
    pub async fn audit_log(&self) -> Result<Vec<AuditRecord>, Error> {
        self.get_json("api/audit").await
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// `POST /api/device/update` — confirm a device rename.
    pub async fn update_device(&self, esn: &str, name: &str) -> Result<(), Error> {
        self.post_unit("api/device/update", &RenameRequest { esn, name })
            .await
    }

    /// `POST /api/master/permission` — grant or revoke device access.
    pub async fn set_permission(
        &self,
        user_id: u64,
        device_id: u64,
        action: PermissionAction,
    ) -> Result<(), Error> {
        self.post_unit(
            "api/master/permission",
            &PermissionRequest {
                user_id,
                device_id,
                action,
            },
        )
        .await
    }

    /// `POST /api/master/user` — create (no `id`) or update a user.
    pub async fn save_user(&self, request: &SaveUserRequest) -> Result<(), Error> {
        self.post_unit("api/master/user", request).await
    }

    /// `POST /api/master/user/delete` — delete a user account.
    pub async fn delete_user(&self, user_id: u64) -> Result<(), Error> {
        self.post_unit("api/master/user/delete", &DeleteUserRequest { user_id })
            .await
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = join_url(&self.base_url, path)?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(Error::Transport)?;

        decode_response(resp).await
    }

    async fn post_unit(&self, path: &str, body: &(impl Serialize + Sync)) -> Result<(), Error> {
        let url = join_url(&self.base_url, path)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        check_status(&resp)?;
        Ok(())
    }
}

/// Join a path onto the base URL, tolerating a trailing slash.
fn join_url(base: &Url, path: &str) -> Result<Url, Error> {
    let full = format!("{}/{path}", base.as_str().trim_end_matches('/'));
    Url::parse(&full).map_err(Error::InvalidUrl)
}

/// Map non-success statuses to errors. 401 is the session-invalid signal.
fn check_status(resp: &reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::SessionExpired);
    }
    if status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Forbidden);
    }
    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_owned(),
        });
    }
    Ok(())
}

/// Check the status, then decode the JSON body. Non-success statuses keep
/// a body preview for diagnostics.
async fn decode_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::SessionExpired);
    }
    if status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Forbidden);
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        let preview = &body[..body.len().min(200)];
        return Err(Error::Api {
            status: status.as_u16(),
            message: preview.trim().to_owned(),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        let preview = &body[..body.len().min(200)];
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}
