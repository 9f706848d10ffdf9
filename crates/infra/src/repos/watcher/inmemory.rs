use std::sync::Mutex;

use crm_ticketing_domain::{Watcher, WatcherRole};

use super::IWatcherRepo;

#[derive(Debug, Clone)]
struct WatcherRow {
    ticket_id: String,
    user_id: String,
    email: String,
    /// Raw role as the store would hand it back; normalized on read.
    role: String,
}

pub struct InMemoryWatcherRepo {
    rows: Mutex<Vec<WatcherRow>>,
}

impl InMemoryWatcherRepo {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn add_watcher(&self, ticket_id: &str, user_id: &str, email: &str, role: &str) {
        self.rows.lock().unwrap().push(WatcherRow {
            ticket_id: ticket_id.to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
        });
    }
}

impl Default for InMemoryWatcherRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IWatcherRepo for InMemoryWatcherRepo {
    async fn find_watchers(&self, ticket_id: &str) -> anyhow::Result<Vec<Watcher>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| row.ticket_id == ticket_id)
            .map(|row| Watcher {
                email: row.email.clone(),
                role: WatcherRole::normalize(&row.role),
            })
            .collect())
    }

    async fn find_emails(&self, user_ids: &[String]) -> anyhow::Result<Vec<String>> {
        let rows = self.rows.lock().unwrap();
        Ok(user_ids
            .iter()
            .filter_map(|user_id| {
                rows.iter()
                    .find(|row| row.user_id == *user_id)
                    .map(|row| row.email.clone())
            })
            .collect())
    }
}
