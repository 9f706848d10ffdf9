use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::entity::ID;
use crate::ticket_event::TicketEvent;

/// Fallback ticket id segment for DLQ subjects when the failing event did
/// not carry one.
pub const UNKNOWN_TICKET: &str = "unknown_ticket";

/// Envelope published on `crm.dlq.<ticketId>` when a consumer gives up on a
/// message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DLQEvent {
    pub event_id: ID,
    /// Subject the wrapped event was originally delivered on.
    #[serde(rename = "original_event")]
    pub original_event: String,
    pub timestamp: DateTime<Utc>,
    pub event: TicketEvent,
    pub failure_reason: String,
    pub retry_attempts: u32,
}

/// Subject for dead-lettering an event about the given ticket.
pub fn dlq_subject(ticket_id: &str) -> String {
    let ticket_id = if ticket_id.is_empty() {
        UNKNOWN_TICKET
    } else {
        ticket_id
    };
    format!("crm.dlq.{}", ticket_id)
}
