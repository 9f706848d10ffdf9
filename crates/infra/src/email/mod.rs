mod inmemory;
mod smtp;

pub use inmemory::{InMemoryEmailClient, SentEmail};
pub use smtp::SmtpEmailClient;

/// Outbound notification mail. Delivery is at-least-once from the point of
/// view of the event pipeline; downstream dedup is not our concern.
#[async_trait::async_trait]
pub trait IEmailClient: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}
