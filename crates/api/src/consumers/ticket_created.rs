use std::sync::Arc;

use crm_ticketing_domain::TicketEvent;
use crm_ticketing_infra::{BusMessage, Context, MessageHandler, TICKETS_STREAM};
use tracing::{error, info};

use super::{finish_fanout, move_to_dlq, notify_watchers};

/// Durable worker notifying watchers when a ticket is opened.
pub struct TicketCreatedConsumer {
    ctx: Context,
}

impl TicketCreatedConsumer {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting ticket created consumer");
        self.ctx
            .bus
            .queue_subscribe(
                TICKETS_STREAM,
                "crm.tickets.created.*",
                "ticket_created_worker",
                Arc::new(TicketCreatedHandler {
                    ctx: self.ctx.clone(),
                }),
            )
            .await
    }
}

struct TicketCreatedHandler {
    ctx: Context,
}

#[async_trait::async_trait]
impl MessageHandler for TicketCreatedHandler {
    async fn handle(&self, msg: BusMessage) -> anyhow::Result<()> {
        let event: TicketEvent = match serde_json::from_slice(&msg.payload) {
            Ok(event) => event,
            Err(err) => {
                // Undecodable payloads never get better; park them instead
                // of burning redeliveries
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
            "Received ticket created event"
        );

        let subject = format!("[Ticket ID: {}] Status Update", event.ticket.ticket_id);
        let body = format!(
            "A new support ticket has been created.\n\nTicket ID: {}\nStatus: {}\nPriority: {}.",
            event.ticket.ticket_id, event.ticket.status, event.ticket.priority,
        );

        let failed = notify_watchers(&self.ctx, &event.ticket.ticket_id, &subject, &body, false).await?;
        finish_fanout(&self.ctx, &msg, event, failed).await
    }
}
