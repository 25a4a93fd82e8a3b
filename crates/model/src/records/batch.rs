use crate::core::{identifiers::BatchKey, lsn::Lsn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle of a batch in the ledger. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    InProgress,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "IN_PROGRESS",
            BatchStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(BatchStatus::InProgress),
            "COMPLETED" => Ok(BatchStatus::Completed),
            other => Err(format!("Unknown batch status: {other}")),
        }
    }
}

/// One row of the batch ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: i64,
    pub key: BatchKey,
    pub status: BatchStatus,
    pub row_count: u64,
    pub start_marker: Option<Lsn>,
    pub end_marker: Option<Lsn>,
    pub created_at: DateTime<Utc>,
    pub completion_timestamp: Option<DateTime<Utc>>,
}

impl BatchRecord {
    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }
}
