use std::sync::Arc;

use crm_ticketing_domain::TicketEvent;
use crm_ticketing_infra::{BusMessage, Context, MessageHandler, TICKETS_STREAM};
use tracing::{error, info};

use super::{finish_fanout, move_to_dlq, notify_watchers};

/// Durable worker notifying staff watchers when a ticket moves between
/// assignees. The mail spells out both sides of the handover.
pub struct TicketReassignedConsumer {
    ctx: Context,
}

impl TicketReassignedConsumer {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting ticket reassigned consumer");
        self.ctx
            .bus
            .queue_subscribe(
                TICKETS_STREAM,
                "crm.tickets.reassigned.*",
                "ticket_reassigned_worker",
                Arc::new(TicketReassignedHandler {
                    ctx: self.ctx.clone(),
                }),
            )
            .await
    }
}

struct TicketReassignedHandler {
    ctx: Context,
}

#[async_trait::async_trait]
impl MessageHandler for TicketReassignedHandler {
    async fn handle(&self, msg: BusMessage) -> anyhow::Result<()> {
        let event: TicketEvent = match serde_json::from_slice(&msg.payload) {
            Ok(event) => event,
            Err(err) => {
                error!(error = %err, "failed to parse event");
                move_to_dlq(
                    &self.ctx,
                    &msg.subject,
                    TicketEvent::unknown(),
                    &format!("failed to parse event: {}", err),
                )
                .await;
                return Ok(());
            }
        };

        info!(
            ticket_id = %event.ticket.ticket_id,
            assigned_to = %event.ticket.assigned_to,
            "Received ticket reassigned event"
        );

        let new_assignee = event
            .changes
            .as_ref()
            .map(|changes| changes.assigned_to.as_str())
            .unwrap_or_default();

        let subject = format!("[Ticket ID: {}] Reassignment Update", event.ticket.ticket_id);
        // The ticket snapshot still carries the previous assignee
        let body = format!(
            "The ticket with ID {} has been reassigned.\n\nPrevious Assignee: {}\nNew Assignee: {}\nStatus: {}\nPriority: {}.",
            event.ticket.ticket_id,
            event.ticket.assigned_to,
            new_assignee,
            event.ticket.status,
            event.ticket.priority,
        );

        let failed = notify_watchers(&self.ctx, &event.ticket.ticket_id, &subject, &body, true).await?;
        finish_fanout(&self.ctx, &msg, event, failed).await
    }
}
