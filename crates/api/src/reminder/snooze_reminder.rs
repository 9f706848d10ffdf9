use chrono::{DateTime, Duration, Utc};
use crm_ticketing_domain::{Reminder, ReminderStatus};
use crm_ticketing_infra::Context;
use tracing::{error, info};

use crate::error::ApiError;
use crate::reminder::ReminderScheduler;
use crate::shared::usecase::UseCase;

/// Pushes a reminder's fire time back by a duration.
///
/// Snoozing a past-due reminder is allowed; the shifted time may still be in
/// the past, in which case it fires on the next fire-loop pass. The heap is
/// updated inline in addition to the KV write, and the watch loop's
/// re-processing of the write is idempotent because scheduling always
/// replaces the key's existing entry.
#[derive(Debug)]
pub struct SnoozeReminderUseCase {
    pub key: String,
    pub duration: Duration,
    pub scheduler: ReminderScheduler,
}

#[derive(Debug)]
pub enum UseCaseError {
    NotFound(String),
    BadData(String),
    StorageError,
}

impl From<UseCaseError> for ApiError {
    fn from(e: UseCaseError) -> Self {
        match e {
            UseCaseError::NotFound(key) => {
                Self::NotFound(format!("The reminder with key: {}, was not found.", key))
            }
            UseCaseError::BadData(key) => Self::BadClientData(format!(
                "The reminder with key: {}, has an invalid stored record.",
                key
            )),
            UseCaseError::StorageError => Self::InternalError,
        }
    }
}

#[async_trait::async_trait]
impl UseCase for SnoozeReminderUseCase {
    type Response = DateTime<Utc>;

    type Errors = UseCaseError;

    const NAME: &'static str = "SnoozeReminder";

    async fn execute(&mut self, ctx: &Context) -> Result<Self::Response, Self::Errors> {
        let entry = match ctx.kv.get(&self.key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Err(UseCaseError::NotFound(self.key.clone())),
            Err(err) => {
                error!(key = %self.key, error = %err, "failed to read reminder");
                return Err(UseCaseError::StorageError);
            }
        };

        let mut reminder: Reminder = serde_json::from_slice(&entry.value)
            .map_err(|_| UseCaseError::BadData(self.key.clone()))?;

        reminder.remind_time = reminder.remind_time + self.duration;
        reminder.status = ReminderStatus::Pending;
        reminder.revision = entry.revision;

        let value = serde_json::to_vec(&reminder).map_err(|err| {
            error!(key = %self.key, error = %err, "failed to serialize snoozed reminder");
            UseCaseError::StorageError
        })?;

        if let Err(err) = ctx.kv.put(&self.key, value).await {
            error!(key = %self.key, error = %err, "failed to store snoozed reminder");
            return Err(UseCaseError::StorageError);
        }

        // Requeue inline rather than waiting a watch round-trip
        self.scheduler.schedule(reminder.clone());
        info!(key = %self.key, remind_time = %reminder.remind_time, "reminder snoozed");

        Ok(reminder.remind_time)
    }
}
