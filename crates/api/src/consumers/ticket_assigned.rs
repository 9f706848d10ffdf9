use std::sync::Arc;

use crm_ticketing_domain::TicketEvent;
use crm_ticketing_infra::{BusMessage, Context, MessageHandler, TICKETS_STREAM};
use tracing::{error, info};

use super::{finish_fanout, move_to_dlq, notify_watchers};

/// Durable worker notifying staff watchers when a ticket gets an assignee.
/// Customers watch their own tickets but are not told about internal
/// assignment moves.
pub struct TicketAssignedConsumer {
    ctx: Context,
}

impl TicketAssignedConsumer {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting ticket assigned consumer");
        self.ctx
            .bus
            .queue_subscribe(
                TICKETS_STREAM,
                "crm.tickets.assigned.*",
                "ticket_assigned_worker",
                Arc::new(TicketAssignedHandler {
                    ctx: self.ctx.clone(),
                }),
            )
            .await
    }
}

struct TicketAssignedHandler {
    ctx: Context,
}

#[async_trait::async_trait]
impl MessageHandler for TicketAssignedHandler {
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
            "Received ticket assigned event"
        );

        let new_assignee = event
            .changes
            .as_ref()
            .map(|changes| changes.assigned_to.as_str())
            .unwrap_or_default();

        let subject = format!("[Ticket ID: {}] Assignment Update", event.ticket.ticket_id);
        let body = format!(
            "The ticket with ID {} has been assigned.\n\nStatus: {}\nPriority: {}\nAssigned To: {}.",
            event.ticket.ticket_id, event.ticket.status, event.ticket.priority, new_assignee,
        );

        let failed = notify_watchers(&self.ctx, &event.ticket.ticket_id, &subject, &body, true).await?;
        finish_fanout(&self.ctx, &msg, event, failed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crm_ticketing_domain::{Actor, Changes, TicketDetails, TicketEventType, ID};
    use crm_ticketing_infra::{InMemoryEmailClient, InMemoryWatcherRepo, Repos};

    fn assigned_event(ticket_id: &str, new_assignee: &str) -> TicketEvent {
        TicketEvent {
            event_id: ID::new(),
            event_type: TicketEventType::Assigned,
            timestamp: Utc::now(),
            actor: Actor {
                user_id: "manager1".into(),
            },
            ticket: TicketDetails {
                ticket_id: ticket_id.into(),
                status: "open".into(),
                priority: "high".into(),
                created_at: "2026-01-01T00:00:00Z".into(),
                assigned_to: String::new(),
            },
            changes: Some(Changes {
                status: String::new(),
                assigned_to: new_assignee.into(),
            }),
            reminder: None,
        }
    }

    #[tokio::test]
    async fn skips_customers_and_names_the_assignee() {
        let watchers = Arc::new(InMemoryWatcherRepo::new());
        watchers.add_watcher("T1", "u1", "customer@example.com", "customer");
        watchers.add_watcher("T1", "u2", "agent@example.com", "employee");
        watchers.add_watcher("T1", "u3", "boss@example.com", "manager");

        let email = Arc::new(InMemoryEmailClient::new());
        let mut ctx = Context::create_inmemory();
        ctx.repos = Repos {
            watchers: watchers.clone(),
        };
        ctx.email = email.clone();

        let handler = TicketAssignedHandler { ctx };
        let event = assigned_event("T1", "emp42");
        handler
            .handle(BusMessage {
                subject: TicketEventType::Assigned.subject("T1"),
                payload: serde_json::to_vec(&event).unwrap(),
                delivery_attempt: 1,
            })
            .await
            .unwrap();

        let sent = email.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.recipient != "customer@example.com"));
        assert!(sent[0].subject.contains("Assignment Update"));
        assert!(sent[0].body.contains("emp42"));
    }
}
