mod consumers;
mod error;
mod reminder;
mod shared;

use crm_ticketing_infra::Context;
use tracing::info;

pub use consumers::{
    start_consumers, TicketAssignedConsumer, TicketCreatedConsumer, TicketReassignedConsumer,
    TicketReminderConsumer,
};
pub use error::ApiError;
pub use reminder::{
    CancelReminderUseCase, CreateReminderUseCase, ReminderScheduler, SnoozeReminderUseCase,
};
pub use shared::usecase::{execute, UseCase};

/// Owns the reminder scheduler and the event consumers for one process.
pub struct Application {
    context: Context,
    scheduler: ReminderScheduler,
}

impl Application {
    /// Recovers scheduler state from the KV bucket and starts the consumer
    /// workers. Fails when the bucket or the bus is unreachable.
    pub async fn new(context: Context) -> anyhow::Result<Self> {
        let scheduler = ReminderScheduler::start(context.clone()).await?;
        start_consumers(&context).await?;

        Ok(Self { context, scheduler })
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Stops the scheduler loops, then drains the bus so buffered messages
    /// are delivered before the connection goes away.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.scheduler.stop();
        self.context.bus.drain().await?;
        info!("application shut down");
        Ok(())
    }
}
