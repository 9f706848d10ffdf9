mod inmemory;
mod nats;

use std::pin::Pin;

use futures::Stream;
use thiserror::Error;

pub use inmemory::InMemoryKVStore;
pub use nats::NatsKVStore;

/// An entry as stored in (or observed from) the reminder bucket.
#[derive(Debug, Clone)]
pub struct KVEntry {
    pub key: String,
    pub value: Vec<u8>,
    /// Monotonic, bucket-assigned revision. Strictly increases per key.
    pub revision: u64,
    pub operation: KVOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KVOperation {
    Put,
    Delete,
}

#[derive(Debug, Error)]
pub enum KVError {
    #[error("key already exists")]
    KeyExists,
    /// The expected revision no longer matches: someone else wrote the key
    /// in between. Callers must re-read before retrying.
    #[error("revision conflict")]
    Conflict,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type KVWatch = Pin<Box<dyn Stream<Item = KVEntry> + Send>>;

/// Typed access to a replicated KV bucket with per-key total order,
/// compare-and-swap writes and a watch stream.
#[async_trait::async_trait]
pub trait IKVStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<KVEntry>, KVError>;
    /// Fails with `KVError::KeyExists` when the key is already present.
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64, KVError>;
    /// Compare-and-swap write. Fails with `KVError::Conflict` unless the
    /// current revision equals `expected_revision`.
    async fn update(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: u64,
    ) -> Result<u64, KVError>;
    /// Unconditional write.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64, KVError>;
    async fn keys(&self) -> Result<Vec<String>, KVError>;
    /// One event per committed write, in per-key order. The stream ends on
    /// infrastructure failure; callers are expected to re-establish it.
    async fn watch_all(&self) -> Result<KVWatch, KVError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryKVStore::new();
        let rev = store.create("k1", b"v1".to_vec()).await.unwrap();
        let entry = store.get("k1").await.unwrap().expect("To find created key");
        assert_eq!(entry.value, b"v1");
        assert_eq!(entry.revision, rev);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rejects_existing_keys() {
        let store = InMemoryKVStore::new();
        store.create("k1", b"v1".to_vec()).await.unwrap();
        assert!(matches!(
            store.create("k1", b"v2".to_vec()).await,
            Err(KVError::KeyExists)
        ));
    }

    #[tokio::test]
    async fn update_enforces_revisions() {
        let store = InMemoryKVStore::new();
        let rev = store.create("k1", b"v1".to_vec()).await.unwrap();
        let rev2 = store.update("k1", b"v2".to_vec(), rev).await.unwrap();
        assert!(rev2 > rev);

        // Stale revision must be rejected
        assert!(matches!(
            store.update("k1", b"v3".to_vec(), rev).await,
            Err(KVError::Conflict)
        ));

        let entry = store.get("k1").await.unwrap().unwrap();
        assert_eq!(entry.value, b"v2");
    }

    #[tokio::test]
    async fn put_is_unconditional_and_bumps_revisions() {
        let store = InMemoryKVStore::new();
        let rev1 = store.put("k1", b"v1".to_vec()).await.unwrap();
        let rev2 = store.put("k1", b"v2".to_vec()).await.unwrap();
        assert!(rev2 > rev1);
    }

    #[tokio::test]
    async fn keys_lists_all_entries() {
        let store = InMemoryKVStore::new();
        store.create("b", b"1".to_vec()).await.unwrap();
        store.create("a", b"2".to_vec()).await.unwrap();
        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn watch_observes_writes_in_order() {
        let store = InMemoryKVStore::new();
        let mut watch = store.watch_all().await.unwrap();

        store.create("k1", b"v1".to_vec()).await.unwrap();
        store.put("k1", b"v2".to_vec()).await.unwrap();

        let first = watch.next().await.unwrap();
        assert_eq!(first.key, "k1");
        assert_eq!(first.value, b"v1");
        assert_eq!(first.operation, KVOperation::Put);

        let second = watch.next().await.unwrap();
        assert_eq!(second.value, b"v2");
        assert!(second.revision > first.revision);
    }
}
