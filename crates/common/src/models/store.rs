//! Document store catalog entries

use serde::{Deserialize, Serialize};

/// Processing status reported by the document store service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreStatus {
    Empty,
    Stale,
    Sync,
    Upserted,
    Upserting,
    Syncing,
    #[serde(other)]
    Unknown,
}

/// A named, independently searchable collection of ingested documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: StoreStatus,
}

impl StoreStatus {
    /// Parse the status string the store service reports, tolerating unknown values
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "EMPTY" => StoreStatus::Empty,
            "STALE" => StoreStatus::Stale,
            "SYNC" => StoreStatus::Sync,
            "UPSERTED" => StoreStatus::Upserted,
            "UPSERTING" => StoreStatus::Upserting,
            "SYNCING" => StoreStatus::Syncing,
            _ => StoreStatus::Unknown,
        }
    }

    /// Whether the store holds searchable vectors
    pub fn is_searchable(&self) -> bool {
        matches!(self, StoreStatus::Sync | StoreStatus::Upserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(StoreStatus::parse("UPSERTED"), StoreStatus::Upserted);
        assert_eq!(StoreStatus::parse("sync"), StoreStatus::Sync);
        assert_eq!(StoreStatus::parse("weird"), StoreStatus::Unknown);
        assert!(StoreStatus::Upserted.is_searchable());
        assert!(!StoreStatus::Empty.is_searchable());
    }
}
