use std::sync::Arc;

use crm_ticketing_domain::TicketEvent;
use crm_ticketing_infra::{BusMessage, Context, MessageHandler, TICKETS_STREAM};
use tracing::{error, info};

use super::{finish_fanout, move_to_dlq};

/// Durable worker delivering fired reminders to their recipients.
///
/// The scheduler publishes the reminder payload it stored at creation time;
/// this worker resolves the recipients' addresses and mails them the note.
pub struct TicketReminderConsumer {
    ctx: Context,
}

impl TicketReminderConsumer {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting ticket reminder consumer");
        self.ctx
            .bus
            .queue_subscribe(
                TICKETS_STREAM,
                "crm.tickets.reminder.*",
                "ticket_reminder_worker",
                Arc::new(TicketReminderHandler {
                    ctx: self.ctx.clone(),
                }),
            )
            .await
    }
}

struct TicketReminderHandler {
    ctx: Context,
}

#[async_trait::async_trait]
impl MessageHandler for TicketReminderHandler {
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

        let details = match event.reminder.clone() {
            Some(details) => details,
            None => {
                // Malformed the same way a decode failure is: no retry will
                // grow a reminder section onto the event
                move_to_dlq(
                    &self.ctx,
                    &msg.subject,
                    event,
                    "reminder event carries no reminder details",
                )
                .await;
                return Ok(());
            }
        };

        info!(
            ticket_id = %event.ticket.ticket_id,
            recipients = details.recipients.len(),
            "Received ticket reminder event"
        );

        let emails = self
            .ctx
            .repos
            .watchers
            .find_emails(&details.recipients)
            .await?;

        let local_time = details
            .scheduled_time
            .with_timezone(&self.ctx.config.display_timezone);
        let subject = format!("[Ticket ID: {}] Reminder", event.ticket.ticket_id);
        let body = format!(
            "You have a reminder for ticket {}.\n\nMessage: {}\nScheduled For: {}.",
            event.ticket.ticket_id,
            details.message,
            local_time.format("%Y-%m-%d %H:%M:%S %Z"),
        );

        let mut failed = Vec::new();
        for email in emails {
            info!(recipient = %email, "Sending email");
            if let Err(err) = self.ctx.email.send(&email, &subject, &body).await {
                error!(recipient = %email, error = %err, "failed to send email");
                failed.push(email);
            }
        }

        finish_fanout(&self.ctx, &msg, event, failed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crm_ticketing_domain::{
        Actor, ReminderDetails, TicketDetails, TicketEventType, ID,
    };
    use crm_ticketing_infra::{InMemoryEmailClient, InMemoryWatcherRepo, Repos};

    fn reminder_event(ticket_id: &str, recipients: Vec<String>) -> TicketEvent {
        TicketEvent {
            event_id: ID::new(),
            event_type: TicketEventType::Reminder,
            timestamp: Utc::now(),
            actor: Actor {
                user_id: "u1".into(),
            },
            ticket: TicketDetails {
                ticket_id: ticket_id.into(),
                status: "open".into(),
                priority: "high".into(),
                created_at: "2026-01-01T00:00:00Z".into(),
                assigned_to: String::new(),
            },
            changes: None,
            reminder: Some(ReminderDetails {
                scheduled_time: Utc::now() + Duration::minutes(5),
                message: "call the customer back".into(),
                recipients,
            }),
        }
    }

    #[tokio::test]
    async fn mails_the_reminder_recipients() {
        let watchers = Arc::new(InMemoryWatcherRepo::new());
        watchers.add_watcher("T1", "u1", "owner@example.com", "employee");
        watchers.add_watcher("T1", "u2", "peer@example.com", "employee");

        let email = Arc::new(InMemoryEmailClient::new());
        let mut ctx = Context::create_inmemory();
        ctx.repos = Repos {
            watchers: watchers.clone(),
        };
        ctx.email = email.clone();

        let handler = TicketReminderHandler { ctx };
        let event = reminder_event("T1", vec!["u1".into(), "u2".into()]);
        handler
            .handle(BusMessage {
                subject: TicketEventType::Reminder.subject("T1"),
                payload: serde_json::to_vec(&event).unwrap(),
                delivery_attempt: 1,
            })
            .await
            .unwrap();

        let sent = email.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].subject.contains("Reminder"));
        assert!(sent[0].body.contains("call the customer back"));
    }

    #[tokio::test]
    async fn event_without_reminder_details_is_dead_lettered_and_acked() {
        let ctx = Context::create_inmemory();
        let dlq = crate::consumers::test_helpers::dlq_probe(&ctx).await;

        let handler = TicketReminderHandler { ctx };
        let mut event = reminder_event("T1", vec![]);
        event.reminder = None;

        let res = handler
            .handle(BusMessage {
                subject: TicketEventType::Reminder.subject("T1"),
                payload: serde_json::to_vec(&event).unwrap(),
                delivery_attempt: 1,
            })
            .await;
        assert!(res.is_ok());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(dlq.lock().unwrap().len(), 1);
    }
}
