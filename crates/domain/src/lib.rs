mod dlq_event;
mod reminder;
mod shared;
mod ticket_event;
mod watcher;

pub use dlq_event::{dlq_subject, DLQEvent, UNKNOWN_TICKET};
pub use reminder::{
    reminder_key, ticket_id_from_key, Reminder, ReminderStatus, REMINDER_KEY_PREFIX,
};
pub use shared::entity::{InvalidIDError, ID};
pub use ticket_event::{
    Actor, Changes, ReminderDetails, TicketDetails, TicketEvent, TicketEventType,
};
pub use watcher::{Watcher, WatcherRole};
