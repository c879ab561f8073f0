// ── Domain model ──

pub mod audit;
pub mod device;
pub mod message;
pub mod user;

pub use audit::AuditEntry;
pub use device::Device;
pub use message::{DeviceGroup, Message};
pub use user::{Role, User};
