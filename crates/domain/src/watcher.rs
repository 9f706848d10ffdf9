use serde::{Deserialize, Serialize};

/// A user watching a ticket, with the role already normalized.
///
/// The watcher table stores roles as free-form strings; rows are normalized
/// at the query boundary so consumers only ever branch on the enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watcher {
    pub email: String,
    pub role: WatcherRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherRole {
    Customer,
    Employee,
    Manager,
    Admin,
    Unknown,
}

impl WatcherRole {
    /// Maps a raw role string onto the known roles. Anything unrecognized
    /// (including casing surprises from older rows) becomes `Unknown`.
    pub fn normalize(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "customer" => WatcherRole::Customer,
            "employee" => WatcherRole::Employee,
            "manager" => WatcherRole::Manager,
            "admin" => WatcherRole::Admin,
            _ => WatcherRole::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_roles() {
        assert_eq!(WatcherRole::normalize("customer"), WatcherRole::Customer);
        assert_eq!(WatcherRole::normalize("Manager"), WatcherRole::Manager);
        assert_eq!(WatcherRole::normalize("ADMIN"), WatcherRole::Admin);
    }

    #[test]
    fn unrecognized_roles_become_unknown() {
        assert_eq!(WatcherRole::normalize(""), WatcherRole::Unknown);
        assert_eq!(WatcherRole::normalize("42"), WatcherRole::Unknown);
        assert_eq!(WatcherRole::normalize("supervisor"), WatcherRole::Unknown);
    }
}
