mod cancel_reminder;
mod create_reminder;
mod scheduler;
mod snooze_reminder;

pub use cancel_reminder::CancelReminderUseCase;
pub use create_reminder::CreateReminderUseCase;
pub use scheduler::ReminderScheduler;
pub use snooze_reminder::SnoozeReminderUseCase;
