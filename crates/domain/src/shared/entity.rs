use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use ulid::Ulid;

/// Identifier for events minted by this service. Ticket ids and user ids
/// come from other services and stay opaque strings; this type is only for
/// identifiers we generate ourselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ID(Ulid);

impl ID {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ID {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
#[error("not a valid ULID: `{0}`")]
pub struct InvalidIDError(String);

impl FromStr for ID {
    type Err = InvalidIDError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| InvalidIDError(s.to_owned()))
    }
}

// On the wire an id is just its canonical ULID string.
impl Serialize for ID {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ID {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = ID::new();
        assert_eq!(id, id.to_string().parse().unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!("nope".parse::<ID>().is_err());
        assert!("".parse::<ID>().is_err());
    }

    #[test]
    fn json_form_is_the_ulid_string() {
        let id = ID::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));

        let back: ID = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn malformed_json_ids_fail_to_decode() {
        assert!(serde_json::from_str::<ID>("\"not-a-ulid\"").is_err());
    }
}
