use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::entity::ID;

/// Lifecycle event for a ticket, published on `crm.tickets.<kind>.<ticketId>`.
///
/// The shape is shared with the other CRM services, so the field names are
/// part of the wire contract and must not drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketEvent {
    pub event_id: ID,
    pub event_type: TicketEventType,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub ticket: TicketDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Changes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<ReminderDetails>,
}

impl TicketEvent {
    /// Placeholder for payloads that could not be decoded, carried inside
    /// DLQ events so the original bytes' context is not lost entirely.
    pub fn unknown() -> Self {
        Self {
            event_id: ID::new(),
            event_type: TicketEventType::Unknown,
            timestamp: Utc::now(),
            actor: Actor::default(),
            ticket: TicketDetails::default(),
            changes: None,
            reminder: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEventType {
    #[serde(rename = "ticket_created")]
    Created,
    #[serde(rename = "ticket_assigned")]
    Assigned,
    #[serde(rename = "ticket_reassigned")]
    Reassigned,
    #[serde(rename = "ticket.reminder")]
    Reminder,
    #[serde(rename = "ticket.reminder.cancel")]
    ReminderCancel,
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl TicketEventType {
    fn subject_kind(&self) -> &'static str {
        match self {
            TicketEventType::Created => "created",
            TicketEventType::Assigned => "assigned",
            TicketEventType::Reassigned => "reassigned",
            TicketEventType::Reminder | TicketEventType::ReminderCancel => "reminder",
            TicketEventType::Unknown => "unknown",
        }
    }

    /// Subject the event is published on within the `CRM_TICKETS` stream.
    pub fn subject(&self, ticket_id: &str) -> String {
        format!("crm.tickets.{}.{}", self.subject_kind(), ticket_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
}

/// Snapshot of the ticket at the time the event was emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketDetails {
    pub ticket_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub assigned_to: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Changes {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub assigned_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderDetails {
    /// Scheduled moment in UTC. Display localization happens at the edge.
    #[serde(rename = "timestamp")]
    pub scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&TicketEventType::Created).unwrap(),
            "\"ticket_created\""
        );
        assert_eq!(
            serde_json::to_string(&TicketEventType::Reminder).unwrap(),
            "\"ticket.reminder\""
        );
        assert_eq!(
            serde_json::to_string(&TicketEventType::ReminderCancel).unwrap(),
            "\"ticket.reminder.cancel\""
        );
    }

    #[test]
    fn unrecognized_event_types_decode_as_unknown() {
        let parsed: TicketEventType = serde_json::from_str("\"ticket_archived\"").unwrap();
        assert_eq!(parsed, TicketEventType::Unknown);
    }

    #[test]
    fn subjects_embed_the_ticket_id() {
        assert_eq!(
            TicketEventType::Created.subject("T1"),
            "crm.tickets.created.T1"
        );
        assert_eq!(
            TicketEventType::Reminder.subject("T1"),
            "crm.tickets.reminder.T1"
        );
    }

    #[test]
    fn optional_sections_are_omitted_when_absent() {
        let event = TicketEvent {
            event_id: ID::new(),
            event_type: TicketEventType::Created,
            timestamp: Utc::now(),
            actor: Actor {
                user_id: "u1".into(),
            },
            ticket: TicketDetails {
                ticket_id: "T1".into(),
                status: "open".into(),
                priority: "high".into(),
                created_at: "2026-01-01T00:00:00Z".into(),
                assigned_to: String::new(),
            },
            changes: None,
            reminder: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("\"changes\""));
        assert!(!json.contains("\"reminder\""));

        let parsed: TicketEvent = serde_json::from_str(&json).unwrap();
        assert!(parsed.changes.is_none());
        assert_eq!(parsed.ticket.ticket_id, "T1");
    }
}
