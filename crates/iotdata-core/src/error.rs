// ── Core error types ──
//
// User-facing errors from iotdata-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<iotdata_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the engine.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session ──────────────────────────────────────────────────────
    /// The bearer credential was rejected. Fatal: local session state is
    /// cleared and the operator must sign in again.
    #[error("session expired — sign in again")]
    SessionExpired,

    #[error("cannot reach server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("not connected")]
    NotConnected,

    // ── Data ─────────────────────────────────────────────────────────
    #[error("device not found: {esn}")]
    DeviceNotFound { esn: String },

    #[error("no device with id {id} in the cache")]
    DeviceIdNotFound { id: u64 },

    #[error("no user with id {id} in the cache")]
    UserNotFound { id: u64 },

    // ── Edit guard ───────────────────────────────────────────────────
    #[error("a rename is already in progress for {esn}")]
    EditInProgress { esn: String },

    #[error("no rename in progress for {esn}")]
    NoEditSession { esn: String },

    // ── Operations ───────────────────────────────────────────────────
    #[error("operation rejected by server: {message}")]
    Rejected { message: String },

    #[error("server error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error invalidates the whole session.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

// ── Conversion from transport-layer errors ──────────────────────────

impl From<iotdata_api::Error> for CoreError {
    fn from(err: iotdata_api::Error) -> Self {
        match err {
            iotdata_api::Error::SessionExpired => CoreError::SessionExpired,
            iotdata_api::Error::Forbidden => CoreError::Rejected {
                message: "insufficient permissions for this operation".into(),
            },
            iotdata_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            iotdata_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            iotdata_api::Error::Api { status, message } => {
                CoreError::Api {
                    message,
                    status: Some(status),
                }
            }
            iotdata_api::Error::PushConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push connection failed: {reason}"),
            },
            iotdata_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expiry_maps_through() {
        let core: CoreError = iotdata_api::Error::SessionExpired.into();
        assert!(core.is_session_expired());
    }

    #[test]
    fn forbidden_maps_to_rejected() {
        let core: CoreError = iotdata_api::Error::Forbidden.into();
        assert!(matches!(core, CoreError::Rejected { .. }));
    }

    #[test]
    fn api_errors_keep_status() {
        let core: CoreError = iotdata_api::Error::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(
            core,
            CoreError::Api {
                status: Some(500),
                ..
            }
        ));
    }
}
