// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the login flow share timeout and TLS settings
// through this module.

use std::time::Duration;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    /// Accept self-signed certificates (lab/staging backends).
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("iotdata/", env!("CARGO_PKG_VERSION")));

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().map_err(crate::error::Error::Transport)
    }
}
