//! In-process store used for dry runs and tests.
//!
//! One [`MemoryStore`] plays a whole database: it holds records per entity,
//! the batch ledger, a write position that grows with every write, and the
//! confirmed position of a simulated replication slot. Faults can be injected
//! to exercise outage and rollback paths.

use crate::{
    error::{LedgerError, StoreError},
    ledger::BatchLedger,
    position::PositionOracle,
    store::{LoadTransaction, RecordStore, SourceStore},
};
use async_trait::async_trait;
use chrono::Utc;
use connectors::sql::base::error::DbError;
use model::{
    core::{
        identifiers::{BatchKey, EntityRef},
        lsn::Lsn,
    },
    records::{
        batch::{BatchRecord, BatchStatus},
        order::{NewOrder, OrderRecord},
    },
    replication::status::{ReplicationStatus, SlotProgress},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Default)]
struct Inner {
    position: u64,
    next_order_id: i64,
    next_batch_id: i64,
    entities: HashMap<EntityRef, Vec<OrderRecord>>,
    batches: Vec<BatchRecord>,
    slots: SlotProgress,
    offline: bool,
    failures_remaining: u32,
    reject_inserts: bool,
}

impl Inner {
    fn check_available(&mut self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::unavailable("memory store is offline"));
        }
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(StoreError::unavailable("injected transient failure"));
        }
        Ok(())
    }

    fn advance(&mut self, bytes: u64) -> Lsn {
        self.position = self.position.saturating_add(bytes);
        Lsn::new(self.position)
    }

    fn batch_mut(&mut self, key: &BatchKey) -> Option<&mut BatchRecord> {
        self.batches.iter_mut().find(|b| &b.key == key)
    }

    fn complete(&mut self, key: &BatchKey, end_marker: Lsn) -> Result<(), LedgerError> {
        let batch = self
            .batch_mut(key)
            .ok_or_else(|| LedgerError::UnknownBatch(key.clone()))?;

        if batch.status == BatchStatus::Completed {
            return Ok(());
        }

        batch.status = BatchStatus::Completed;
        batch.end_marker = Some(end_marker);
        batch.completion_timestamp = Some(Utc::now());
        self.advance(1);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes records directly, bypassing loads and the ledger. Used to play
    /// the replication side into a target store.
    pub fn insert_records(&self, entity: &EntityRef, records: impl IntoIterator<Item = OrderRecord>) {
        let mut inner = self.lock();
        let incoming = records.into_iter().collect::<Vec<_>>();
        if let Some(max_id) = incoming.iter().map(|r| r.order_id).max() {
            inner.next_order_id = inner.next_order_id.max(max_id);
        }
        let written = incoming.len() as u64;
        inner.entities.entry(entity.clone()).or_default().extend(incoming);
        inner.advance(written);
    }

    /// Records of `entity` in insertion order.
    pub fn records(&self, entity: &EntityRef) -> Vec<OrderRecord> {
        self.lock().entities.get(entity).cloned().unwrap_or_default()
    }

    pub fn position(&self) -> Lsn {
        Lsn::new(self.lock().position)
    }

    /// Marks a replication slot as having confirmed everything up to `position`.
    pub fn confirm_slot(&self, slot_name: &str, position: Lsn) {
        let mut inner = self.lock();
        if !inner.slots.slot_names.iter().any(|s| s == slot_name) {
            inner.slots.slot_names.push(slot_name.to_string());
        }
        inner.slots.confirmed_position = Some(position);
    }

    /// Every call fails with `StoreError::Unavailable` while offline.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// The next `count` calls fail with `StoreError::Unavailable`.
    pub fn fail_next(&self, count: u32) {
        self.lock().failures_remaining = count;
    }

    /// Bulk inserts fail with a non-transient database error.
    pub fn reject_inserts(&self, reject: bool) {
        self.lock().reject_inserts = reject;
    }
}

#[async_trait]
impl PositionOracle for MemoryStore {
    async fn current_position(&self) -> Result<Lsn, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        Ok(Lsn::new(inner.position))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn count(&self, entity: &EntityRef) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        Ok(inner.entities.get(entity).map_or(0, |r| r.len() as u64))
    }

    async fn fetch_records(&self, entity: &EntityRef) -> Result<Vec<OrderRecord>, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        Ok(inner.entities.get(entity).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn begin_load(&self) -> Result<Box<dyn LoadTransaction>, StoreError> {
        self.lock().check_available()?;
        Ok(Box::new(MemoryLoadTransaction {
            store: self.clone(),
            inserts: Vec::new(),
            completions: Vec::new(),
        }))
    }
}

#[async_trait]
impl BatchLedger for MemoryStore {
    async fn create(
        &self,
        key: &BatchKey,
        row_count: u64,
        start_marker: Lsn,
    ) -> Result<i64, LedgerError> {
        let mut inner = self.lock();
        inner.check_available()?;

        if inner.batches.iter().any(|b| &b.key == key) {
            return Err(LedgerError::DuplicateBatch(key.clone()));
        }

        inner.next_batch_id += 1;
        let id = inner.next_batch_id;
        inner.batches.push(BatchRecord {
            id,
            key: key.clone(),
            status: BatchStatus::InProgress,
            row_count,
            start_marker: Some(start_marker),
            end_marker: None,
            created_at: Utc::now(),
            completion_timestamp: None,
        });
        inner.advance(1);
        Ok(id)
    }

    async fn complete(&self, key: &BatchKey, end_marker: Lsn) -> Result<(), LedgerError> {
        let mut inner = self.lock();
        inner.check_available()?;
        inner.complete(key, end_marker)
    }

    async fn batch(&self, key: &BatchKey) -> Result<Option<BatchRecord>, LedgerError> {
        let mut inner = self.lock();
        inner.check_available()?;
        Ok(inner.batches.iter().find(|b| &b.key == key).cloned())
    }

    async fn latest_status(
        &self,
        entity: &EntityRef,
    ) -> Result<Option<ReplicationStatus>, LedgerError> {
        let mut inner = self.lock();
        inner.check_available()?;
        let latest = inner
            .batches
            .iter()
            .filter(|b| &b.key.entity == entity)
            .max_by_key(|b| b.id);

        Ok(latest.map(|batch| ReplicationStatus::project(batch, inner.slots.clone(), Utc::now())))
    }
}

struct MemoryLoadTransaction {
    store: MemoryStore,
    inserts: Vec<(EntityRef, Vec<NewOrder>)>,
    completions: Vec<(BatchKey, Lsn)>,
}

#[async_trait]
impl LoadTransaction for MemoryLoadTransaction {
    async fn bulk_insert(
        &mut self,
        entity: &EntityRef,
        records: &[NewOrder],
    ) -> Result<u64, StoreError> {
        let mut inner = self.store.lock();
        inner.check_available()?;
        if inner.reject_inserts {
            return Err(StoreError::Database(DbError::Write(format!(
                "insert into {entity} rejected"
            ))));
        }

        // Uncommitted writes still grow the log.
        inner.advance(records.len() as u64);
        self.inserts.push((entity.clone(), records.to_vec()));
        Ok(records.len() as u64)
    }

    async fn current_position(&mut self) -> Result<Lsn, StoreError> {
        let mut inner = self.store.lock();
        inner.check_available()?;
        Ok(Lsn::new(inner.position))
    }

    async fn complete_batch(
        &mut self,
        key: &BatchKey,
        end_marker: Lsn,
    ) -> Result<(), LedgerError> {
        let mut inner = self.store.lock();
        inner.check_available()?;
        if !inner.batches.iter().any(|b| &b.key == key) {
            return Err(LedgerError::UnknownBatch(key.clone()));
        }
        self.completions.push((key.clone(), end_marker));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut inner = self.store.lock();
        inner.check_available()?;

        // Nothing becomes visible unless every completion can be applied.
        if let Some((key, _)) = self
            .completions
            .iter()
            .find(|(key, _)| !inner.batches.iter().any(|b| &b.key == key))
        {
            return Err(StoreError::Database(DbError::Unknown(
                LedgerError::UnknownBatch(key.clone()).to_string(),
            )));
        }

        for (entity, orders) in &self.inserts {
            let mut assigned = Vec::with_capacity(orders.len());
            for order in orders {
                inner.next_order_id += 1;
                assigned.push(order.clone().with_id(inner.next_order_id));
            }
            inner.entities.entry(entity.clone()).or_default().extend(assigned);
        }

        for (key, end_marker) in &self.completions {
            inner
                .complete(key, *end_marker)
                .map_err(|err| StoreError::Database(DbError::Unknown(err.to_string())))?;
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
