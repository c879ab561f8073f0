use thiserror::Error;

/// Top-level error type for the `iotdata-api` crate.
///
/// Covers every failure mode across both API surfaces: REST transport,
/// backend rejections, and the push channel. `iotdata-core` maps these
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Session ─────────────────────────────────────────────────────
    /// The backend returned 401: the bearer credential is expired or
    /// revoked. Always fatal to the session.
    #[error("session expired or credential rejected")]
    SessionExpired,

    /// The backend returned 403: the credential is valid but the role
    /// does not permit the operation.
    #[error("insufficient permissions (HTTP 403)")]
    Forbidden,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Backend ─────────────────────────────────────────────────────
    /// Non-success status with whatever body the backend sent.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Push channel ────────────────────────────────────────────────
    /// Push connection failed (handshake, upgrade, or mid-stream error).
    #[error("push connection failed: {0}")]
    PushConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the session is gone and local
    /// session state must be cleared.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error the next poll tick or
    /// the push transport's own reconnection will heal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::PushConnect(_) => true,
            _ => false,
        }
    }
}
