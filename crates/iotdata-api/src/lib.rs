// iotdata-api: Async Rust client for the IoTData telemetry backend.
//
// Two surfaces: the REST API (messages, master data, mutations, audit)
// and the push channel at /ws (device renames + live telemetry).

pub mod client;
pub mod error;
pub mod push;
pub mod transport;
pub mod types;

pub use client::Client;
pub use error::Error;
pub use push::{PushFrame, PushHandle, ReconnectConfig, TelemetryFrame};
pub use transport::TransportConfig;
pub use types::{
    AuditRecord, DeviceRecord, LoginReply, MasterData, MessageRecord, PermissionAction,
    SaveUserRequest, UserRecord,
};
