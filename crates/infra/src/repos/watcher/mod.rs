mod inmemory;

pub use inmemory::InMemoryWatcherRepo;

use crm_ticketing_domain::Watcher;

#[async_trait::async_trait]
pub trait IWatcherRepo: Send + Sync {
    /// Watchers of a ticket. Roles are normalized before they leave the
    /// repo, so callers never see the raw role strings.
    async fn find_watchers(&self, ticket_id: &str) -> anyhow::Result<Vec<Watcher>>;

    /// Email addresses for the given user ids. Unknown ids are skipped.
    async fn find_emails(&self, user_ids: &[String]) -> anyhow::Result<Vec<String>>;
}
