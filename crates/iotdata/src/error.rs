//! CLI error wrapper reported through miette.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] iotdata_core::CoreError),

    #[error(transparent)]
    Config(#[from] iotdata_config::ConfigError),

    #[error(transparent)]
    Api(#[from] iotdata_api::Error),

    #[error("{0}")]
    Message(String),
}

impl From<dialoguer::Error> for CliError {
    fn from(err: dialoguer::Error) -> Self {
        Self::Message(format!("prompt failed: {err}"))
    }
}

impl CliError {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// Whether the backend invalidated the session (the stored token
    /// must be cleared).
    pub fn is_session_expired(&self) -> bool {
        match self {
            Self::Core(e) => e.is_session_expired(),
            Self::Api(e) => e.is_session_expired(),
            _ => false,
        }
    }
}
