//! Reconciliation engine for the IoTData telemetry dashboard.
//!
//! The dashboard merges three independent update sources — an initial
//! fetch, a periodic poll, and an asynchronous push stream — into one
//! consistent, grouped view, while in-progress local edits are shielded
//! from concurrent refreshes and optimistic mutations reconcile with
//! server-confirmed state. This crate owns that engine:
//!
//! - **[`Engine`]** — Central facade managing the session lifecycle:
//!   [`connect()`](Engine::connect) loads the initial snapshot, then
//!   spawns the poll task, the push bridge, and the command processor.
//!
//! - **[`DataStore`]** — Reactive storage: the ordered [`MessageLog`]
//!   plus keyed device/user caches, all broadcasting snapshots through
//!   `watch` channels. Grouping by ESN is derived on demand.
//!
//! - **[`EditGuard`]** — Tracks in-progress renames; while a session is
//!   open, poll refreshes are suppressed and push renames for that ESN
//!   are dropped (the next poll reconciles).
//!
//! - **[`matrix`]** — Pure projection of the device cache into a
//!   per-user permission matrix, granted devices first.
//!
//! - **[`Command`]** — Typed mutations routed through an `mpsc` channel
//!   to a single processor that applies each change optimistically and
//!   rolls it back on remote failure. Reads bypass the channel.

pub mod command;
pub mod controller;
pub mod convert;
pub mod edit;
pub mod error;
pub mod matrix;
pub mod model;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, UserDraft};
pub use controller::{ConnectionState, Engine, EngineConfig};
pub use edit::{Disclosure, EditGuard, EditPhase, EditSession, PanelState};
pub use error::CoreError;
pub use matrix::{AccessAction, AccessIntent, MatrixRow, permission_matrix, toggle_intent};
pub use session::Session;
pub use store::{DataStore, MessageLog};
pub use stream::Subscription;

// Re-export model types at the crate root for ergonomics.
pub use model::{AuditEntry, Device, DeviceGroup, Message, Role, User};
