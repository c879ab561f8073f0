//! Shared configuration for the IoTData CLI.
//!
//! TOML profiles (server URL + tuning) layered with environment
//! overrides, plus the stored session written by `iotdata login` — the
//! bearer token and the backend-authoritative role live there, never in
//! ambient global state. Clearing the stored session IS the local half
//! of the 401 "session invalid" rule.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use iotdata_core::{EngineConfig, Role, Session};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' is not defined")]
    UnknownProfile { profile: String },

    #[error("not logged in — run `iotdata login` first")]
    NoSession,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse stored session: {0}")]
    SessionParse(#[from] toml::de::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Full-snapshot poll cadence in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept self-signed TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Maintain the push channel.
    #[serde(default = "default_push")]
    pub push: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            timeout: default_timeout(),
            insecure: false,
            push: default_push(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}
fn default_timeout() -> u64 {
    30
}
fn default_push() -> bool {
    true
}

/// A named backend profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Backend root URL (e.g. `https://panel.example.com`).
    pub server: String,

    /// Bearer token (plaintext — prefer `iotdata login` or the env var).
    pub token: Option<String>,

    /// Environment variable name holding the token.
    pub token_env: Option<String>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Override poll interval (seconds).
    pub poll_interval: Option<u64>,

    /// Override push-channel setting.
    pub push: Option<bool>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "iotdata")
}

/// Path of the TOML config file, if a home directory exists.
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the stored session file.
pub fn session_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("session.toml"))
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load configuration: built-in defaults, then the TOML file, then
/// `IOTDATA_*` environment variables.
pub fn load() -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = config_path() {
        figment = figment.merge(Toml::file(path));
    }
    let config = figment
        .merge(Env::prefixed("IOTDATA_").split("__"))
        .extract()?;
    Ok(config)
}

/// Resolve a profile by name (or the configured default) into an
/// [`EngineConfig`] plus any token the profile itself carries.
pub fn resolve(
    config: &Config,
    profile_name: Option<&str>,
    server_override: Option<&str>,
) -> Result<(EngineConfig, Option<SecretString>), ConfigError> {
    let name = profile_name
        .map(str::to_owned)
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into());

    let fallback = Profile::default();
    let profile = match config.profiles.get(&name) {
        Some(p) => p,
        // Only the implicit default profile may be missing; anything the
        // operator named explicitly must exist.
        None if profile_name.is_none() => &fallback,
        None => return Err(ConfigError::UnknownProfile { profile: name }),
    };

    let server = server_override
        .map(str::to_owned)
        .or_else(|| (!profile.server.is_empty()).then(|| profile.server.clone()))
        .unwrap_or_else(|| "http://localhost:5000".into());
    let base_url = Url::parse(&server).map_err(|e| ConfigError::Validation {
        field: "server".into(),
        reason: e.to_string(),
    })?;

    let engine = EngineConfig {
        base_url,
        poll_interval: Duration::from_secs(
            profile.poll_interval.unwrap_or(config.defaults.poll_interval),
        ),
        push_enabled: profile.push.unwrap_or(config.defaults.push),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(config.defaults.timeout)),
        accept_invalid_certs: profile.insecure.unwrap_or(config.defaults.insecure),
    };

    let token = profile
        .token_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .or_else(|| profile.token.clone())
        .map(SecretString::from);

    Ok((engine, token))
}

// ── Stored session ──────────────────────────────────────────────────

/// The session written by `iotdata login`: server, identity, role, and
/// the bearer token. Role is whatever the backend's login reply said —
/// it is never computed locally.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoredSession {
    pub server: String,
    pub username: String,
    pub role: String,
    pub token: String,
}

impl StoredSession {
    /// Convert into the engine's session context. An unrecognized role
    /// string degrades to the least-privileged role.
    pub fn to_session(&self) -> Session {
        let role = Role::from_str(&self.role).unwrap_or(Role::User);
        Session::new(
            self.username.clone(),
            role,
            SecretString::from(self.token.clone()),
        )
    }
}

/// Load the stored session, if one exists.
pub fn load_session() -> Result<Option<StoredSession>, ConfigError> {
    let Some(path) = session_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&raw)?))
}

/// Persist the session after a successful login.
pub fn save_session(session: &StoredSession) -> Result<(), ConfigError> {
    let Some(path) = session_path() else {
        return Err(ConfigError::Validation {
            field: "session".into(),
            reason: "no home directory to store the session in".into(),
        });
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(session)?)?;
    Ok(())
}

/// Remove the stored session (logout, or a 401 from the backend).
pub fn clear_session() -> Result<(), ConfigError> {
    if let Some(path) = session_path() {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}
