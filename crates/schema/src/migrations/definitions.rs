//! Migration Definitions - core types shared by the migration system

use serde::{Deserialize, Serialize};

/// A row of the migration log table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration id (file name without extension)
    pub id: String,
    /// Batch number (for grouping migrations)
    pub batch: i64,
}

/// Migration status in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied { batch: i64 },
}

/// Status line for one known migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatusEntry {
    pub id: String,
    #[serde(flatten)]
    pub status: MigrationStatus,
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration
    Up,
    /// Revert the migration
    Down,
}

impl MigrationDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationDirection::Up => "up",
            MigrationDirection::Down => "down",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_entry_serializes_flat() {
        let entry = MigrationStatusEntry {
            id: "2024_01_01_000000_create_users_table".to_string(),
            status: MigrationStatus::Applied { batch: 2 },
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "2024_01_01_000000_create_users_table",
                "state": "applied",
                "batch": 2
            })
        );
    }
}
