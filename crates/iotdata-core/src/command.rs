// ── Command API ──
//
// All write operations flow through a unified `Command` enum, processed
// one at a time by the engine's command task. Serializing mutations is
// what makes each optimistic apply-then-rollback atomic at the
// local-state level — no interleaving between overlapping edits.

use secrecy::SecretString;

use crate::error::CoreError;
use crate::matrix::AccessAction;
use crate::model::Role;

/// A command envelope sent through the command channel, carrying a
/// oneshot reply for the caller.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub reply: tokio::sync::oneshot::Sender<Result<(), CoreError>>,
}

/// All write operations against the backend.
#[derive(Debug, Clone)]
pub enum Command {
    /// Rename a device; updates the device cache and every cached
    /// message's denormalized name.
    RenameDevice { esn: String, name: String },

    /// Grant or revoke one user's access to one device.
    SetPermission {
        user_id: u64,
        device_id: u64,
        action: AccessAction,
    },

    /// Create (`draft.id == None`) or update a user account.
    SaveUser { draft: UserDraft },

    /// Delete a user account.
    DeleteUser { user_id: u64 },
}

/// Editable user fields for create/update.
#[derive(Debug, Clone, Default)]
pub struct UserDraft {
    /// `None` creates; `Some` updates the existing account.
    pub id: Option<u64>,
    pub username: String,
    /// Only sent when set (create, or password change).
    pub password: Option<SecretString>,
    pub role: Role,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}
