use crate::{
    error::{LedgerError, StoreError},
    position::PositionOracle,
};
use async_trait::async_trait;
use model::{
    core::{
        identifiers::{BatchKey, EntityRef},
        lsn::Lsn,
    },
    records::order::{NewOrder, OrderRecord},
};

pub mod postgres;

/// Read access to the records of an entity, on either side of replication.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn count(&self, entity: &EntityRef) -> Result<u64, StoreError>;

    /// Every record of `entity`. Stores should return them ordered by
    /// `order_id`, but callers that need the order must enforce it.
    async fn fetch_records(&self, entity: &EntityRef) -> Result<Vec<OrderRecord>, StoreError>;
}

/// The store batches are loaded into.
#[async_trait]
pub trait SourceStore: RecordStore + PositionOracle {
    /// Starts a transaction on a connection of its own.
    async fn begin_load(&self) -> Result<Box<dyn LoadTransaction>, StoreError>;
}

/// One load unit of work. Nothing it writes is visible before `commit`.
#[async_trait]
pub trait LoadTransaction: Send {
    /// Bulk-inserts `records`; returns how many rows the store accepted.
    async fn bulk_insert(
        &mut self,
        entity: &EntityRef,
        records: &[NewOrder],
    ) -> Result<u64, StoreError>;

    /// Write position as seen from inside the transaction.
    async fn current_position(&mut self) -> Result<Lsn, StoreError>;

    /// Marks the ledger row for `key` as completed, as part of this transaction.
    /// Completing an already completed batch is a no-op.
    async fn complete_batch(&mut self, key: &BatchKey, end_marker: Lsn)
    -> Result<(), LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
