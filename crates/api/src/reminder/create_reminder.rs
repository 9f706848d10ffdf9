use chrono::{DateTime, Utc};
use crm_ticketing_domain::{
    reminder_key, Actor, Reminder, ReminderDetails, ReminderStatus, TicketDetails, TicketEvent,
    TicketEventType, ID,
};
use crm_ticketing_infra::{Context, KVError};
use tracing::error;

use crate::error::ApiError;
use crate::shared::usecase::UseCase;

/// Schedules a reminder for a (ticket, user) pair.
///
/// The KV bucket is the only thing written here; the scheduler's watch loop
/// picks the record up and queues it. Re-creating a reminder for the same
/// pair overwrites the previous record, including terminal ones, which is
/// how a fired or canceled reminder gets rescheduled.
#[derive(Debug)]
pub struct CreateReminderUseCase {
    pub ticket_id: String,
    pub user_id: String,
    pub remind_time: DateTime<Utc>,
    pub message: String,
    pub recipients: Vec<String>,
    /// Snapshot of the ticket embedded in the published event.
    pub ticket: TicketDetails,
}

#[derive(Debug, PartialEq)]
pub enum UseCaseError {
    ReminderTimeNotInFuture,
    Conflict,
    StorageError,
}

impl From<UseCaseError> for ApiError {
    fn from(e: UseCaseError) -> Self {
        match e {
            UseCaseError::ReminderTimeNotInFuture => {
                Self::BadClientData("reminder time must be in the future".into())
            }
            UseCaseError::Conflict => Self::Conflict(
                "The reminder was modified concurrently, please retry".into(),
            ),
            UseCaseError::StorageError => Self::InternalError,
        }
    }
}

#[async_trait::async_trait]
impl UseCase for CreateReminderUseCase {
    type Response = String;

    type Errors = UseCaseError;

    const NAME: &'static str = "CreateReminder";

    async fn execute(&mut self, ctx: &Context) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now_utc();
        // Boundary: a reminder for exactly now is already late
        if self.remind_time <= now {
            return Err(UseCaseError::ReminderTimeNotInFuture);
        }

        let mut recipients = self.recipients.clone();
        if !recipients.contains(&self.user_id) {
            recipients.push(self.user_id.clone());
        }

        let event = TicketEvent {
            event_id: ID::new(),
            event_type: TicketEventType::Reminder,
            timestamp: now,
            actor: Actor {
                user_id: self.user_id.clone(),
            },
            ticket: self.ticket.clone(),
            changes: None,
            reminder: Some(ReminderDetails {
                scheduled_time: self.remind_time,
                message: self.message.clone(),
                recipients,
            }),
        };

        let key = reminder_key(&self.ticket_id, &self.user_id);
        let event_data = serde_json::value::to_raw_value(&event).map_err(|err| {
            error!(error = %err, "failed to serialize reminder event");
            UseCaseError::StorageError
        })?;
        let reminder = Reminder {
            key: key.clone(),
            event_data,
            remind_time: self.remind_time,
            status: ReminderStatus::Pending,
            revision: 0,
        };
        let value = serde_json::to_vec(&reminder).map_err(|err| {
            error!(error = %err, "failed to serialize reminder record");
            UseCaseError::StorageError
        })?;

        // Create when absent, otherwise CAS against the revision we just
        // read so a concurrent writer surfaces as a conflict.
        let result = match ctx.kv.get(&key).await {
            Ok(Some(entry)) => ctx.kv.update(&key, value, entry.revision).await,
            Ok(None) => ctx.kv.create(&key, value).await,
            Err(err) => {
                error!(key = %key, error = %err, "failed to read reminder bucket");
                return Err(UseCaseError::StorageError);
            }
        };

        match result {
            Ok(_) => Ok(key),
            Err(KVError::Conflict) | Err(KVError::KeyExists) => Err(UseCaseError::Conflict),
            Err(err) => {
                error!(key = %key, error = %err, "failed to store reminder");
                Err(UseCaseError::StorageError)
            }
        }
    }
}
