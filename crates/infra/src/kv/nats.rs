use std::time::Duration;

use anyhow::anyhow;
use async_nats::jetstream::kv;
use futures::StreamExt;
use tracing::warn;

use super::{IKVStore, KVEntry, KVError, KVOperation, KVWatch};

/// Per-operation deadline for bucket calls.
const KV_TIMEOUT: Duration = Duration::from_secs(5);

/// Reminder bucket backed by a JetStream KV store.
pub struct NatsKVStore {
    store: kv::Store,
}

impl NatsKVStore {
    pub fn new(store: kv::Store) -> Self {
        Self { store }
    }
}

fn entry_operation(operation: kv::Operation) -> KVOperation {
    match operation {
        kv::Operation::Put => KVOperation::Put,
        kv::Operation::Delete | kv::Operation::Purge => KVOperation::Delete,
    }
}

#[async_trait::async_trait]
impl IKVStore for NatsKVStore {
    async fn get(&self, key: &str) -> Result<Option<KVEntry>, KVError> {
        let entry = tokio::time::timeout(KV_TIMEOUT, self.store.entry(key))
            .await
            .map_err(|_| KVError::Store(anyhow!("kv get timed out for key {}", key)))?
            .map_err(|e| KVError::Store(anyhow!(e)))?;

        Ok(entry.and_then(|entry| match entry.operation {
            // A deleted key still has history; treat it as absent
            kv::Operation::Delete | kv::Operation::Purge => None,
            kv::Operation::Put => Some(KVEntry {
                key: entry.key,
                value: entry.value.to_vec(),
                revision: entry.revision,
                operation: KVOperation::Put,
            }),
        }))
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64, KVError> {
        let res = tokio::time::timeout(KV_TIMEOUT, self.store.create(key, value.into()))
            .await
            .map_err(|_| KVError::Store(anyhow!("kv create timed out for key {}", key)))?;

        match res {
            Ok(revision) => Ok(revision),
            Err(err) if err.kind() == kv::CreateErrorKind::AlreadyExists => Err(KVError::KeyExists),
            Err(err) => Err(KVError::Store(anyhow!(err))),
        }
    }

    async fn update(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: u64,
    ) -> Result<u64, KVError> {
        let res = tokio::time::timeout(
            KV_TIMEOUT,
            self.store.update(key, value.into(), expected_revision),
        )
        .await
        .map_err(|_| KVError::Store(anyhow!("kv update timed out for key {}", key)))?;

        match res {
            Ok(revision) => Ok(revision),
            // The server reports a CAS miss as a wrong-last-sequence publish
            // failure; there is no dedicated error kind for it.
            Err(err) if err.to_string().contains("wrong last sequence") => Err(KVError::Conflict),
            Err(err) => Err(KVError::Store(anyhow!(err))),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64, KVError> {
        tokio::time::timeout(KV_TIMEOUT, self.store.put(key, value.into()))
            .await
            .map_err(|_| KVError::Store(anyhow!("kv put timed out for key {}", key)))?
            .map_err(|e| KVError::Store(anyhow!(e)))
    }

    async fn keys(&self) -> Result<Vec<String>, KVError> {
        let mut key_stream = tokio::time::timeout(KV_TIMEOUT, self.store.keys())
            .await
            .map_err(|_| KVError::Store(anyhow!("kv keys listing timed out")))?
            .map_err(|e| KVError::Store(anyhow!(e)))?;

        let mut keys = Vec::new();
        while let Some(key) = key_stream.next().await {
            keys.push(key.map_err(|e| KVError::Store(anyhow!(e)))?);
        }
        Ok(keys)
    }

    async fn watch_all(&self) -> Result<KVWatch, KVError> {
        let watch = self
            .store
            .watch_all()
            .await
            .map_err(|e| KVError::Store(anyhow!(e)))?;

        let stream = watch.filter_map(|entry| async move {
            match entry {
                Ok(entry) => Some(KVEntry {
                    operation: entry_operation(entry.operation),
                    key: entry.key,
                    value: entry.value.to_vec(),
                    revision: entry.revision,
                }),
                Err(err) => {
                    warn!(error = %err, "dropping undecodable kv watch entry");
                    None
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
