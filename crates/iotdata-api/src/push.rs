//! Push channel with auto-reconnect.
//!
//! Connects to the backend's `/ws` endpoint and streams parsed frames
//! through a [`tokio::sync::broadcast`] channel. Reconnection with
//! exponential backoff is handled automatically; a dropped or malformed
//! frame is logged and skipped — transient loss self-heals at the next
//! poll interval.
//!
//! Two frame kinds arrive on the wire:
//! - `{"type": "DEVICE_UPDATE", "esn": ..., "name": ...}` — a rename
//!   confirmed or performed elsewhere;
//! - a telemetry envelope with `esn` and `payload` fields — one new live
//!   message.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

const FRAME_CHANNEL_CAPACITY: usize = 1024;

// ── Frames ──────────────────────────────────────────────────────────

/// A live telemetry envelope. The backend sends `id: 0` for messages it
/// broadcasts before assigning a row id; consumers treat 0 as absent.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryFrame {
    #[serde(default)]
    pub id: u64,
    pub esn: String,
    pub payload: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub received_at: Option<String>,
    #[serde(default)]
    pub shared_with: Vec<String>,
}

/// A parsed frame from the push channel.
#[derive(Debug, Clone)]
pub enum PushFrame {
    /// A device was renamed (here or elsewhere).
    DeviceUpdate { esn: String, name: String },
    /// A new live message arrived.
    Telemetry(TelemetryFrame),
}

// ── ReconnectConfig ─────────────────────────────────────────────────

/// Exponential backoff configuration for push reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── PushHandle ──────────────────────────────────────────────────────

/// Handle to a running push stream.
///
/// Subscribe for frames; call [`shutdown`](Self::shutdown) to tear the
/// background task down. The connection must be closed explicitly when
/// the consumer goes away — otherwise it would leak for the session's
/// lifetime.
pub struct PushHandle {
    frame_rx: broadcast::Receiver<Arc<PushFrame>>,
    cancel: CancellationToken,
}

impl PushHandle {
    /// Spawn the reconnection loop against `ws_url`.
    ///
    /// Returns immediately; the first connection attempt happens
    /// asynchronously. `bearer` is injected as an `Authorization` header
    /// on the upgrade request.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        bearer: Option<String>,
    ) -> Self {
        let (frame_tx, frame_rx) = broadcast::channel(FRAME_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            push_loop(ws_url, frame_tx, reconnect, task_cancel, bearer).await;
        });

        Self { frame_rx, cancel }
    }

    /// Get a new broadcast receiver for the frame stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushFrame>> {
        self.frame_rx.resubscribe()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ────────────────────────────────────

/// Main loop: connect → read → on error, back off → reconnect.
async fn push_loop(
    ws_url: Url,
    frame_tx: broadcast::Sender<Arc<PushFrame>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    bearer: Option<String>,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &frame_tx, &cancel, bearer.as_deref()) => {
                match result {
                    // Clean close: reset the attempt counter, reconnect now.
                    Ok(()) => {
                        tracing::info!("push channel closed cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "push channel error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(max_retries = max, "push reconnection limit reached");
                                break;
                            }
                        }

                        let delay = reconnect_delay(attempt, &reconnect);
                        tracing::debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "waiting before reconnect");

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("push loop exiting");
}

/// Establish one connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    frame_tx: &broadcast::Sender<Arc<PushFrame>>,
    cancel: &CancellationToken,
    bearer: Option<&str>,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting push channel");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::PushConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(token) = bearer {
        request = request.with_header("Authorization", token);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::PushConnect(e.to_string()))?;

    tracing::info!("push channel connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(parsed) = parse_frame(&text) {
                            // Send errors just mean no subscribers right now.
                            let _ = frame_tx.send(Arc::new(parsed));
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pings automatically
                        tracing::trace!("push ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        match frame {
                            Some(ref cf) => tracing::info!(code = %cf.code, reason = %cf.reason, "push close frame"),
                            None => tracing::info!("push close frame (no payload)"),
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::PushConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("push stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, raw frames — ignore
                    }
                }
            }
        }
    }
}

// ── Frame parsing ───────────────────────────────────────────────────

/// Parse one text frame. A frame that matches neither shape is dropped
/// with a debug log and does not affect subsequent frames.
fn parse_frame(text: &str) -> Option<PushFrame> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "dropping unparseable push frame");
            return None;
        }
    };

    if value.get("type").and_then(|t| t.as_str()) == Some("DEVICE_UPDATE") {
        let esn = value.get("esn").and_then(|v| v.as_str());
        let name = value.get("name").and_then(|v| v.as_str());
        return match (esn, name) {
            (Some(esn), Some(name)) => Some(PushFrame::DeviceUpdate {
                esn: esn.to_owned(),
                name: name.to_owned(),
            }),
            _ => {
                tracing::debug!("dropping DEVICE_UPDATE frame without esn/name");
                None
            }
        };
    }

    if value.get("esn").is_some() && value.get("payload").is_some() {
        return match serde_json::from_value::<TelemetryFrame>(value) {
            Ok(frame) => Some(PushFrame::Telemetry(frame)),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed telemetry frame");
                None
            }
        };
    }

    tracing::debug!("dropping push frame of unknown shape");
    None
}

// ── Backoff calculation ─────────────────────────────────────────────

/// Exponential backoff: `min(initial * 2^attempt, max)`, then a
/// deterministic ±20% spread derived from the attempt number so
/// simultaneous clients don't reconnect in lockstep.
fn reconnect_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let doubled = config
        .initial_delay
        .saturating_mul(2u32.saturating_pow(attempt.min(16)));
    let capped = doubled.min(config.max_delay);
    let spread = 0.8 + 0.4 * f64::from(attempt % 5) / 4.0;
    capped.mul_f64(spread)
}

// ── Tests ───────────────────────────────────────────────────────────
