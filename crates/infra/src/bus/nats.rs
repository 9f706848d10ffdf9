use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy},
    stream::{RetentionPolicy, StorageType},
    AckKind,
};
use futures::StreamExt;
use tracing::{error, info, warn};

use super::{
    BusMessage, IEventBus, MessageHandler, ACK_WAIT, DLQ_STREAM, DLQ_SUBJECTS, MAX_DELIVER,
    PUBLISH_TIMEOUT, TICKETS_STREAM, TICKETS_SUBJECTS,
};

/// JetStream-backed bus. Declares the ticket and DLQ streams on connect so
/// that starting the process twice against the same server is a no-op.
pub struct NatsEventBus {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsEventBus {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = async_nats::ConnectOptions::new()
            .event_callback(|event| async move {
                info!(%event, "nats connection event");
            })
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to NATS at {}", url))?;

        let jetstream = jetstream::new(client.clone());
        let bus = Self { client, jetstream };
        bus.ensure_streams().await?;
        info!("Connected to NATS JetStream");
        Ok(bus)
    }

    pub(crate) fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    async fn ensure_streams(&self) -> anyhow::Result<()> {
        self.jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: TICKETS_STREAM.to_string(),
                subjects: vec![TICKETS_SUBJECTS.to_string()],
                storage: StorageType::File,
                retention: RetentionPolicy::Limits,
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!(e))
            .context("failed to create CRM_TICKETS stream")?;

        self.jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: DLQ_STREAM.to_string(),
                subjects: vec![DLQ_SUBJECTS.to_string()],
                storage: StorageType::File,
                retention: RetentionPolicy::Limits,
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!(e))
            .context("failed to create CRM_DLQ stream")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl IEventBus for NatsEventBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> anyhow::Result<u64> {
        let ack = tokio::time::timeout(PUBLISH_TIMEOUT, async {
            let published = self
                .jetstream
                .publish(subject.to_string(), payload.into())
                .await
                .map_err(|e| anyhow!(e))?;
            published.await.map_err(|e| anyhow!(e))
        })
        .await
        .map_err(|_| anyhow!("publish to {} timed out", subject))??;

        Ok(ack.sequence)
    }

    async fn queue_subscribe(
        &self,
        stream: &str,
        subject: &str,
        consumer_name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> anyhow::Result<()> {
        let stream = self
            .jetstream
            .get_stream(stream)
            .await
            .map_err(|e| anyhow!(e))?;

        let consumer = stream
            .get_or_create_consumer(
                consumer_name,
                pull::Config {
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    max_deliver: MAX_DELIVER,
                    ack_wait: ACK_WAIT,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| anyhow!(e))?;

        let name = consumer_name.to_string();
        tokio::spawn(async move {
            loop {
                let mut messages = match consumer.messages().await {
                    Ok(messages) => messages,
                    Err(err) => {
                        error!(consumer = %name, error = %err, "failed to open message stream, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                while let Some(message) = messages.next().await {
                    let message = match message {
                        Ok(message) => message,
                        Err(err) => {
                            warn!(consumer = %name, error = %err, "message stream error");
                            break;
                        }
                    };

                    let delivery_attempt = message
                        .info()
                        .map(|info| info.delivered.max(1) as u64)
                        .unwrap_or(1);
                    let bus_message = BusMessage {
                        subject: message.subject.to_string(),
                        payload: message.payload.to_vec(),
                        delivery_attempt,
                    };

                    match handler.handle(bus_message).await {
                        Ok(()) => {
                            if let Err(err) = message.ack().await {
                                warn!(consumer = %name, error = %err, "failed to ack message");
                            }
                        }
                        Err(err) => {
                            warn!(consumer = %name, error = %err, "processing failed, message will be retried");
                            if let Err(err) = message.ack_with(AckKind::Nak(None)).await {
                                warn!(consumer = %name, error = %err, "failed to nak message");
                            }
                        }
                    }
                }
                warn!(consumer = %name, "message stream ended, re-subscribing");
            }
        });

        info!(subject, consumer = consumer_name, "Queue subscription established");
        Ok(())
    }

    async fn drain(&self) -> anyhow::Result<()> {
        self.client.drain().await.map_err(|e| anyhow!(e))?;
        info!("NATS connection drained");
        Ok(())
    }
}
