use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::warn;

use super::{IKVStore, KVEntry, KVError, KVOperation, KVWatch};

struct StoredValue {
    value: Vec<u8>,
    revision: u64,
}

struct Bucket {
    entries: BTreeMap<String, StoredValue>,
    /// Bucket-wide write counter, like a stream sequence. Per-key revisions
    /// therefore strictly increase as well.
    revision: u64,
}

/// In-memory stand-in for the replicated bucket, used by tests and local
/// runs without a NATS server.
pub struct InMemoryKVStore {
    bucket: Mutex<Bucket>,
    watch_tx: broadcast::Sender<KVEntry>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        let (watch_tx, _) = broadcast::channel(1024);
        Self {
            bucket: Mutex::new(Bucket {
                entries: BTreeMap::new(),
                revision: 0,
            }),
            watch_tx,
        }
    }

    fn commit(&self, bucket: &mut Bucket, key: &str, value: Vec<u8>) -> u64 {
        bucket.revision += 1;
        let revision = bucket.revision;
        bucket.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.clone(),
                revision,
            },
        );
        // No receivers is fine; watching is optional
        let _ = self.watch_tx.send(KVEntry {
            key: key.to_string(),
            value,
            revision,
            operation: KVOperation::Put,
        });
        revision
    }
}

impl Default for InMemoryKVStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IKVStore for InMemoryKVStore {
    async fn get(&self, key: &str) -> Result<Option<KVEntry>, KVError> {
        let bucket = self.bucket.lock().unwrap();
        Ok(bucket.entries.get(key).map(|stored| KVEntry {
            key: key.to_string(),
            value: stored.value.clone(),
            revision: stored.revision,
            operation: KVOperation::Put,
        }))
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64, KVError> {
        let mut bucket = self.bucket.lock().unwrap();
        if bucket.entries.contains_key(key) {
            return Err(KVError::KeyExists);
        }
        Ok(self.commit(&mut bucket, key, value))
    }

    async fn update(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: u64,
    ) -> Result<u64, KVError> {
        let mut bucket = self.bucket.lock().unwrap();
        match bucket.entries.get(key) {
            Some(stored) if stored.revision == expected_revision => {
                Ok(self.commit(&mut bucket, key, value))
            }
            Some(_) => Err(KVError::Conflict),
            None => Err(KVError::Conflict),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64, KVError> {
        let mut bucket = self.bucket.lock().unwrap();
        Ok(self.commit(&mut bucket, key, value))
    }

    async fn keys(&self) -> Result<Vec<String>, KVError> {
        let bucket = self.bucket.lock().unwrap();
        Ok(bucket.entries.keys().cloned().collect())
    }

    async fn watch_all(&self) -> Result<KVWatch, KVError> {
        let rx = self.watch_tx.subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(entry) => return Some((entry, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "kv watch lagged behind, some updates were dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
