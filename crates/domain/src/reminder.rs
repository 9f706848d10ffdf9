use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Prefix of every key in the reminder KV bucket.
pub const REMINDER_KEY_PREFIX: &str = "reminder_";

/// A scheduled notification for a (ticket, user) pair.
///
/// One KV entry exists per key; the bucket enforces key uniqueness. The
/// record is never deleted: when it fires it moves to `Completed`, when the
/// owner cancels it it moves to `Canceled`, and terminal records stay around
/// for audit. Snoozing and re-creating overwrite the record in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub key: String,
    /// Pre-serialized `TicketEvent` published verbatim when the reminder
    /// fires.
    #[serde(rename = "eventData")]
    pub event_data: Box<RawValue>,
    #[serde(rename = "remind_time")]
    pub remind_time: DateTime<Utc>,
    pub status: ReminderStatus,
    /// KV revision the record was last written against. Informational; the
    /// authoritative revision is the one returned by the bucket.
    #[serde(default)]
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Completed,
    Canceled,
}

impl ReminderStatus {
    /// Terminal statuses are never resurrected by the scheduler.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReminderStatus::Pending)
    }
}

/// Composes the stable KV key for a (ticket, user) reminder pair.
pub fn reminder_key(ticket_id: &str, user_id: &str) -> String {
    format!("{}{}_{}", REMINDER_KEY_PREFIX, ticket_id, user_id)
}

/// Recovers the ticket id from a reminder key.
///
/// Ticket ids are ULIDs minted upstream and contain no underscores, so the
/// segment between the prefix and the next underscore is the ticket id.
/// User ids may contain underscores and are never parsed out of the key;
/// they travel in the reminder payload instead.
pub fn ticket_id_from_key(key: &str) -> &str {
    let rest = key.strip_prefix(REMINDER_KEY_PREFIX).unwrap_or(key);
    rest.split('_').next().unwrap_or(rest)
}
