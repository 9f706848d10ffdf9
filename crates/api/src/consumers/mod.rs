mod ticket_assigned;
mod ticket_created;
mod ticket_reassigned;
mod ticket_reminder;

use anyhow::anyhow;
use crm_ticketing_domain::{dlq_subject, DLQEvent, TicketEvent, WatcherRole, ID};
use crm_ticketing_infra::{BusMessage, Context, MAX_DELIVER};
use tracing::{error, info, warn};

pub use ticket_assigned::TicketAssignedConsumer;
pub use ticket_created::TicketCreatedConsumer;
pub use ticket_reassigned::TicketReassignedConsumer;
pub use ticket_reminder::TicketReminderConsumer;

/// Starts the durable queue-group consumers for the ticket stream.
pub async fn start_consumers(ctx: &Context) -> anyhow::Result<()> {
    info!("Initializing consumers");
    TicketCreatedConsumer::new(ctx.clone()).start().await?;
    TicketAssignedConsumer::new(ctx.clone()).start().await?;
    TicketReassignedConsumer::new(ctx.clone()).start().await?;
    TicketReminderConsumer::new(ctx.clone()).start().await?;
    Ok(())
}

/// Dead-letters a failed event. Publish failures are logged and swallowed:
/// dead-lettering must never block the ack/nak decision for the original.
pub(crate) async fn move_to_dlq(
    ctx: &Context,
    original_subject: &str,
    event: TicketEvent,
    reason: &str,
) {
    warn!(ticket_id = %event.ticket.ticket_id, reason, "Moving failed message to DLQ");

    let subject = dlq_subject(&event.ticket.ticket_id);
    let dlq_event = DLQEvent {
        event_id: ID::new(),
        original_event: original_subject.to_string(),
        timestamp: ctx.sys.now_utc(),
        event,
        failure_reason: reason.to_string(),
        retry_attempts: MAX_DELIVER as u32,
    };

    let payload = match serde_json::to_vec(&dlq_event) {
        Ok(payload) => payload,
        Err(err) => {
            error!(error = %err, "failed to serialize DLQ event");
            return;
        }
    };

    if let Err(err) = ctx.bus.publish(&subject, payload).await {
        error!(subject = %subject, error = %err, "failed to move event to DLQ");
    }
}

/// Emails every watcher of the ticket, optionally skipping customers.
/// Returns the recipients that could not be reached.
pub(crate) async fn notify_watchers(
    ctx: &Context,
    ticket_id: &str,
    subject: &str,
    body: &str,
    skip_customers: bool,
) -> anyhow::Result<Vec<String>> {
    let watchers = ctx.repos.watchers.find_watchers(ticket_id).await?;

    let mut failed = Vec::new();
    for watcher in watchers {
        if skip_customers && watcher.role == WatcherRole::Customer {
            info!(recipient = %watcher.email, "Skipping email notification for customer");
            continue;
        }
        info!(recipient = %watcher.email, role = ?watcher.role, "Sending email");
        if let Err(err) = ctx.email.send(&watcher.email, subject, body).await {
            error!(recipient = %watcher.email, error = %err, "failed to send email");
            failed.push(watcher.email);
        }
    }
    Ok(failed)
}

/// Shared tail of every fan-out handler: success acks; failures nak, and the
/// final permitted attempt dead-letters the aggregate first.
pub(crate) async fn finish_fanout(
    ctx: &Context,
    msg: &BusMessage,
    event: TicketEvent,
    failed: Vec<String>,
) -> anyhow::Result<()> {
    if failed.is_empty() {
        return Ok(());
    }

    let reason = format!("failed to send email to: {:?}", failed);
    if msg.delivery_attempt >= MAX_DELIVER as u64 {
        move_to_dlq(ctx, &msg.subject, event, &reason).await;
    }
    Err(anyhow!(reason))
}
