use crate::error::LedgerError;
use async_trait::async_trait;
use model::{
    core::{
        identifiers::{BatchKey, EntityRef},
        lsn::Lsn,
    },
    records::batch::BatchRecord,
    replication::status::ReplicationStatus,
};

pub mod postgres;

/// Durable record of batch lifecycle state, keyed by (namespace, entity, batch_id).
#[async_trait]
pub trait BatchLedger: Send + Sync {
    /// Inserts an IN_PROGRESS row and returns its ledger id.
    ///
    /// Fails with [`LedgerError::DuplicateBatch`] when the key already exists,
    /// leaving the existing row untouched.
    async fn create(
        &self,
        key: &BatchKey,
        row_count: u64,
        start_marker: Lsn,
    ) -> Result<i64, LedgerError>;

    /// Moves the batch to COMPLETED with `end_marker`. Idempotent once completed;
    /// fails with [`LedgerError::UnknownBatch`] when no row matches.
    async fn complete(&self, key: &BatchKey, end_marker: Lsn) -> Result<(), LedgerError>;

    async fn batch(&self, key: &BatchKey) -> Result<Option<BatchRecord>, LedgerError>;

    /// The newest batch of `entity` by creation order, projected against
    /// replication slot progress.
    async fn latest_status(
        &self,
        entity: &EntityRef,
    ) -> Result<Option<ReplicationStatus>, LedgerError>;
}
