mod watcher;

use std::sync::Arc;

pub use watcher::{IWatcherRepo, InMemoryWatcherRepo};

#[derive(Clone)]
pub struct Repos {
    pub watchers: Arc<dyn IWatcherRepo>,
}

impl Repos {
    /// The watcher table lives in the CRM's relational store, owned by
    /// another service; this process only ever needs the read seam. The
    /// in-memory implementation doubles as the local/test backend.
    pub fn create_inmemory() -> Self {
        Self {
            watchers: Arc::new(InMemoryWatcherRepo::new()),
        }
    }
}
