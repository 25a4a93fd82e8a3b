use crate::{
    core::lsn::Lsn,
    records::batch::{BatchRecord, BatchStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How far the logical replication slots watching the source have acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotProgress {
    pub slot_names: Vec<String>,
    /// Minimum confirmed-flush position across the slots, `None` when no slot
    /// has confirmed anything yet.
    pub confirmed_position: Option<Lsn>,
}

/// Read-only projection of the newest batch for an entity against slot progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationStatus {
    pub batch_id: i64,
    pub status: BatchStatus,
    pub row_count: u64,
    pub end_marker: Option<Lsn>,
    pub slots: SlotProgress,
    pub caught_up: bool,
    pub since_completion: Option<Duration>,
}

impl ReplicationStatus {
    /// Projects a ledger row against slot progress as observed at `now`.
    ///
    /// Replication counts as caught up only for a completed batch with an end
    /// marker, at least one slot, and a confirmed position at or past the marker.
    pub fn project(batch: &BatchRecord, slots: SlotProgress, now: DateTime<Utc>) -> Self {
        let caught_up = match (batch.status, batch.end_marker, slots.confirmed_position) {
            (BatchStatus::Completed, Some(end), Some(confirmed)) => {
                !slots.slot_names.is_empty() && confirmed >= end
            }
            _ => false,
        };

        let since_completion = batch
            .completion_timestamp
            .and_then(|at| (now - at).to_std().ok());

        Self {
            batch_id: batch.key.batch_id,
            status: batch.status,
            row_count: batch.row_count,
            end_marker: batch.end_marker,
            slots,
            caught_up,
            since_completion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifiers::{BatchKey, EntityRef};

    fn completed(end: u64) -> BatchRecord {
        let now = Utc::now();
        BatchRecord {
            id: 1,
            key: BatchKey::new(EntityRef::new("public", "orders"), 7),
            status: BatchStatus::Completed,
            row_count: 10,
            start_marker: Some(Lsn::new(end - 5)),
            end_marker: Some(Lsn::new(end)),
            created_at: now,
            completion_timestamp: Some(now),
        }
    }

    fn slots(confirmed: Option<u64>) -> SlotProgress {
        SlotProgress {
            slot_names: vec!["orders_slot".into()],
            confirmed_position: confirmed.map(Lsn::new),
        }
    }

    #[test]
    fn caught_up_once_slot_passes_end_marker() {
        let batch = completed(100);
        assert!(ReplicationStatus::project(&batch, slots(Some(100)), Utc::now()).caught_up);
        assert!(ReplicationStatus::project(&batch, slots(Some(250)), Utc::now()).caught_up);
        assert!(!ReplicationStatus::project(&batch, slots(Some(99)), Utc::now()).caught_up);
    }

    #[test]
    fn never_caught_up_without_slots_or_completion() {
        let batch = completed(100);
        assert!(!ReplicationStatus::project(&batch, SlotProgress::default(), Utc::now()).caught_up);

        let mut in_progress = completed(100);
        in_progress.status = BatchStatus::InProgress;
        in_progress.end_marker = None;
        in_progress.completion_timestamp = None;
        let status = ReplicationStatus::project(&in_progress, slots(Some(500)), Utc::now());
        assert!(!status.caught_up);
        assert_eq!(status.since_completion, None);
    }
}
