// ── Permission matrix projection ──
//
// Derives, for a selected user, which devices they can currently see —
// granted devices sorted before the rest, stable within each partition.
// Pure view logic: owns no storage; toggles become single grant/revoke
// intents routed through the mutation coordinator.

use std::sync::Arc;

use crate::model::{Device, User};

/// Grant or revoke — the two whole-intent mutations the matrix issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    Grant,
    Revoke,
}

/// A single grant/revoke intent, ready for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessIntent {
    pub user_id: u64,
    pub device_id: u64,
    pub action: AccessAction,
}

/// One row of the matrix for the selected user.
#[derive(Debug, Clone)]
pub struct MatrixRow {
    pub device: Arc<Device>,
    pub granted: bool,
}

/// Project the device cache onto a matrix for `user`.
///
/// Devices the user already has access to sort first; order within each
/// partition is the cache order, so the result is deterministic across
/// recomputations.
pub fn permission_matrix(user: &User, devices: &[Arc<Device>]) -> Vec<MatrixRow> {
    let mut rows: Vec<MatrixRow> = devices
        .iter()
        .map(|device| MatrixRow {
            granted: device.grants(&user.username),
            device: Arc::clone(device),
        })
        .collect();
    // Stable sort: granted-first, ties keep cache order.
    rows.sort_by_key(|row| !row.granted);
    rows
}

/// The intent that flips `user`'s access to `device`.
pub fn toggle_intent(user: &User, device: &Device) -> AccessIntent {
    AccessIntent {
        user_id: user.id,
        device_id: device.id,
        action: if device.grants(&user.username) {
            AccessAction::Revoke
        } else {
            AccessAction::Grant
        },
    }
}
