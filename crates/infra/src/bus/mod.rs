mod inmemory;
mod nats;

use std::sync::Arc;
use std::time::Duration;

pub use inmemory::InMemoryEventBus;
pub use nats::NatsEventBus;

/// Stream holding every ticket lifecycle event.
pub const TICKETS_STREAM: &str = "CRM_TICKETS";
pub const TICKETS_SUBJECTS: &str = "crm.tickets.*.*";

/// Dead-letter stream for messages consumers gave up on.
pub const DLQ_STREAM: &str = "CRM_DLQ";
pub const DLQ_SUBJECTS: &str = "crm.dlq.>";

/// Redelivery bound for durable consumers. After this many attempts the bus
/// abandons the message, so handlers must dead-letter before their final nak.
pub const MAX_DELIVER: i64 = 5;
pub const ACK_WAIT: Duration = Duration::from_secs(30);

pub(crate) const PUBLISH_TIMEOUT: Duration = Duration::from_secs(3);

/// A message delivered to a queue-group handler.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
    /// 1-based attempt counter, bounded by `MAX_DELIVER`.
    pub delivery_attempt: u64,
}

/// Processes one delivery. `Ok` acknowledges the message, `Err` requests
/// redelivery (nak).
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: BusMessage) -> anyhow::Result<()>;
}

/// Persistent pub-sub with named streams, durable consumers, explicit acks
/// and bounded redelivery.
#[async_trait::async_trait]
pub trait IEventBus: Send + Sync {
    /// Synchronous publish; returns the stream sequence on success.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> anyhow::Result<u64>;

    /// Registers an idempotent durable queue-group consumer and dispatches
    /// each delivery to `handler` from a background task.
    async fn queue_subscribe(
        &self,
        stream: &str,
        subject: &str,
        consumer_name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> anyhow::Result<()>;

    /// Delivers buffered messages, then releases the connection.
    async fn drain(&self) -> anyhow::Result<()>;
}
