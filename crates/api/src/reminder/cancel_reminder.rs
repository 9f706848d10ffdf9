use crm_ticketing_domain::{Reminder, ReminderStatus};
use crm_ticketing_infra::Context;
use tracing::{error, info};

use crate::error::ApiError;
use crate::reminder::ReminderScheduler;
use crate::shared::usecase::UseCase;

/// Cancels a scheduled reminder.
///
/// The heap entry is dropped inline so the cancellation takes effect
/// immediately instead of after the watch round-trip; the KV write then
/// makes it durable. Re-processing of our own watch event is a no-op since
/// the stored status is terminal.
#[derive(Debug)]
pub struct CancelReminderUseCase {
    pub key: String,
    pub scheduler: ReminderScheduler,
}

#[derive(Debug)]
pub enum UseCaseError {
    NotFound(String),
    StorageError,
}

impl From<UseCaseError> for ApiError {
    fn from(e: UseCaseError) -> Self {
        match e {
            UseCaseError::NotFound(key) => {
                Self::NotFound(format!("The reminder with key: {}, was not found.", key))
            }
            UseCaseError::StorageError => Self::InternalError,
        }
    }
}

#[async_trait::async_trait]
impl UseCase for CancelReminderUseCase {
    type Response = ();

    type Errors = UseCaseError;

    const NAME: &'static str = "CancelReminder";

    async fn execute(&mut self, ctx: &Context) -> Result<Self::Response, Self::Errors> {
        let entry = match ctx.kv.get(&self.key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Err(UseCaseError::NotFound(self.key.clone())),
            Err(err) => {
                error!(key = %self.key, error = %err, "failed to read reminder");
                return Err(UseCaseError::StorageError);
            }
        };

        let mut reminder: Reminder = serde_json::from_slice(&entry.value).map_err(|err| {
            error!(key = %self.key, error = %err, "failed to parse stored reminder");
            UseCaseError::StorageError
        })?;

        self.scheduler.remove(&self.key);

        reminder.status = ReminderStatus::Canceled;
        reminder.revision = entry.revision;
        let value = serde_json::to_vec(&reminder).map_err(|err| {
            error!(key = %self.key, error = %err, "failed to serialize canceled reminder");
            UseCaseError::StorageError
        })?;

        match ctx.kv.put(&self.key, value).await {
            Ok(revision) => {
                info!(key = %self.key, revision, "reminder canceled");
                Ok(())
            }
            Err(err) => {
                error!(key = %self.key, error = %err, "failed to store canceled reminder");
                Err(UseCaseError::StorageError)
            }
        }
    }
}
