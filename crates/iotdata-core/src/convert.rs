// ── Wire → domain conversions ──
//
// The backend formats timestamps as `dd/MM/yyyy HH:MM:SS` (local wall
// clock, no zone); newer deployments send RFC 3339. Both are accepted;
// an unparseable stamp falls back to the epoch rather than dropping the
// message.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use iotdata_api::{AuditRecord, DeviceRecord, MessageRecord, TelemetryFrame, UserRecord};

use crate::model::{AuditEntry, Device, Message, Role, User};

const BACKEND_TIMESTAMP: &str = "%d/%m/%Y %H:%M:%S";

pub(crate) fn parse_received_at(raw: &str) -> DateTime<Utc> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, BACKEND_TIMESTAMP) {
        return naive.and_utc();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    debug!(raw, "unparseable timestamp, defaulting to epoch");
    DateTime::<Utc>::UNIX_EPOCH
}

pub(crate) fn message_from_record(record: MessageRecord) -> Message {
    Message {
        id: record.id,
        esn: record.esn,
        device_name: record.device_name,
        payload: record.payload,
        received_at: parse_received_at(&record.received_at),
        shared_with: record.shared_with,
    }
}

/// Build a `Message` from a live telemetry frame. The backend broadcasts
/// `id: 0` before a row id exists; `fallback_id` substitutes a synthetic
/// local id so identity stays unique until the next poll replaces it.
pub(crate) fn message_from_push(frame: &TelemetryFrame, fallback_id: u64) -> Message {
    Message {
        id: if frame.id == 0 { fallback_id } else { frame.id },
        esn: frame.esn.clone(),
        device_name: frame.device_name.clone(),
        payload: frame.payload.clone(),
        received_at: frame
            .received_at
            .as_deref()
            .map_or_else(Utc::now, parse_received_at),
        shared_with: frame.shared_with.clone(),
    }
}

pub(crate) fn device_from_record(record: DeviceRecord) -> Device {
    Device {
        id: record.id,
        esn: record.esn,
        name: record.name,
        users: record.users,
    }
}

pub(crate) fn user_from_record(record: UserRecord) -> User {
    let role = Role::from_str(&record.role).unwrap_or_else(|_| {
        debug!(
            role = record.role.as_str(),
            username = record.username.as_str(),
            "unknown role, treating as user"
        );
        Role::User
    });
    User {
        id: record.id,
        username: record.username,
        full_name: record.full_name,
        role,
        email: record.email,
        phone: record.phone,
        address: record.address,
        city: record.city,
        state: record.state,
    }
}

pub(crate) fn audit_from_record(record: AuditRecord) -> AuditEntry {
    AuditEntry {
        id: record.id,
        created_at: record.created_at,
        username: record.username,
        action: record.action,
        details: record.details,
        ip_address: record.ip_address,
    }
}
