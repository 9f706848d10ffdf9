use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{BusMessage, IEventBus, MessageHandler, MAX_DELIVER};

struct ConsumerSlot {
    pattern: String,
    tx: mpsc::UnboundedSender<BusMessage>,
}

struct BusState {
    /// Keyed by durable name: re-registering a consumer replaces its slot,
    /// which is what a queue group degenerates to with a single member.
    consumers: HashMap<String, ConsumerSlot>,
    sequence: u64,
}

/// In-process bus with queue-group semantics and bounded redelivery, used by
/// tests and local runs without a NATS server. Messages are delivered to
/// consumers registered at publish time; there is no persisted backlog.
pub struct InMemoryEventBus {
    state: Arc<Mutex<BusState>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                consumers: HashMap::new(),
                sequence: 0,
            })),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// NATS-style subject match: `*` matches one token, `>` the rest.
fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');
    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), _) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[async_trait::async_trait]
impl IEventBus for InMemoryEventBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> anyhow::Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.sequence += 1;
        let sequence = state.sequence;
        for slot in state.consumers.values() {
            if subject_matches(&slot.pattern, subject) {
                // A closed receiver just means the consumer went away
                let _ = slot.tx.send(BusMessage {
                    subject: subject.to_string(),
                    payload: payload.clone(),
                    delivery_attempt: 1,
                });
            }
        }
        Ok(sequence)
    }

    async fn queue_subscribe(
        &self,
        _stream: &str,
        subject: &str,
        consumer_name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<BusMessage>();
        {
            let mut state = self.state.lock().unwrap();
            state.consumers.insert(
                consumer_name.to_string(),
                ConsumerSlot {
                    pattern: subject.to_string(),
                    tx: tx.clone(),
                },
            );
        }

        let name = consumer_name.to_string();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let attempt = message.delivery_attempt;
                match handler.handle(message.clone()).await {
                    Ok(()) => {}
                    Err(err) if attempt < MAX_DELIVER as u64 => {
                        warn!(consumer = %name, error = %err, "processing failed, message will be retried");
                        let mut redelivery = message;
                        redelivery.delivery_attempt = attempt + 1;
                        let _ = tx.send(redelivery);
                    }
                    Err(err) => {
                        warn!(consumer = %name, error = %err, "redelivery attempts exhausted, dropping message");
                    }
                }
            }
        });

        info!(subject, consumer = consumer_name, "Queue subscription established");
        Ok(())
    }

    async fn drain(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
