use crate::{
    error::{LedgerError, StoreError},
    ledger::BatchLedger,
};
use async_trait::async_trait;
use chrono::Utc;
use connectors::sql::postgres::{
    adapter::PgAdapter, transaction::PgTransaction, utils::qualified_name,
};
use model::{
    core::{
        identifiers::{BatchKey, EntityRef},
        lsn::Lsn,
    },
    records::batch::{BatchRecord, BatchStatus},
    replication::status::{ReplicationStatus, SlotProgress},
};
use tokio_postgres::{Row, types::PgLsn};
use tracing::{debug, info};

const CREATE_TABLE_SQL: &str = include_str!("sql/create_table.sql");
const INSERT_BATCH_SQL: &str = include_str!("sql/insert_batch.sql");
const COMPLETE_BATCH_SQL: &str = include_str!("sql/complete_batch.sql");
const SELECT_BATCH_SQL: &str = include_str!("sql/select_batch.sql");
const LATEST_BATCH_SQL: &str = include_str!("sql/latest_batch.sql");
const SLOT_PROGRESS_SQL: &str = include_str!("sql/slot_progress.sql");

/// Ledger statements with the table name substituted.
#[derive(Debug, Clone)]
pub(crate) struct LedgerTable {
    create: String,
    insert: String,
    complete: String,
    select: String,
    latest: String,
}

impl LedgerTable {
    pub(crate) fn new(table: &EntityRef) -> Self {
        let name = qualified_name(table);
        Self {
            create: CREATE_TABLE_SQL.replace("{table}", &name),
            insert: INSERT_BATCH_SQL.replace("{table}", &name),
            complete: COMPLETE_BATCH_SQL.replace("{table}", &name),
            select: SELECT_BATCH_SQL.replace("{table}", &name),
            latest: LATEST_BATCH_SQL.replace("{table}", &name),
        }
    }

    /// Completes `key` on the given transaction.
    ///
    /// The update only matches IN_PROGRESS rows; when nothing matched, the row is
    /// looked up to tell an already completed batch (no-op) from a missing one.
    pub(crate) async fn complete_in(
        &self,
        tx: &PgTransaction,
        key: &BatchKey,
        end_marker: Lsn,
    ) -> Result<(), LedgerError> {
        let end = lsn_to_pg(end_marker);
        let updated = tx
            .execute(
                &self.complete,
                &[&key.namespace(), &key.entity_name(), &key.batch_id, &end],
            )
            .await?;

        if updated > 0 {
            return Ok(());
        }

        let existing = tx
            .query_opt(
                &self.select,
                &[&key.namespace(), &key.entity_name(), &key.batch_id],
            )
            .await?;

        match existing {
            Some(row) => {
                let record = batch_from_row(&row)?;
                if record.is_completed() {
                    debug!(batch = %key, "Batch already completed; nothing to do");
                    Ok(())
                } else {
                    Err(LedgerError::UnknownBatch(key.clone()))
                }
            }
            None => Err(LedgerError::UnknownBatch(key.clone())),
        }
    }
}

/// Batch ledger stored in a Postgres table of the source database.
#[derive(Clone)]
pub struct PgBatchLedger {
    adapter: PgAdapter,
    sql: LedgerTable,
    slot_name: Option<String>,
}

impl PgBatchLedger {
    pub fn new(adapter: PgAdapter, table: &EntityRef) -> Self {
        Self {
            adapter,
            sql: LedgerTable::new(table),
            slot_name: None,
        }
    }

    /// Restricts replication progress to one logical slot instead of every
    /// logical slot of the database.
    pub fn with_slot_name(mut self, slot_name: Option<String>) -> Self {
        self.slot_name = slot_name;
        self
    }

    /// Creates the ledger table when it does not exist yet.
    pub async fn ensure_table(&self) -> Result<(), LedgerError> {
        self.adapter.exec(&self.sql.create).await?;
        info!("Batch ledger table is in place");
        Ok(())
    }

    async fn slot_progress(&self) -> Result<SlotProgress, LedgerError> {
        let rows = self
            .adapter
            .query_rows(SLOT_PROGRESS_SQL, &[&self.slot_name.as_deref()])
            .await?;
        Ok(slot_progress_from_rows(&rows)?)
    }
}

#[async_trait]
impl BatchLedger for PgBatchLedger {
    async fn create(
        &self,
        key: &BatchKey,
        row_count: u64,
        start_marker: Lsn,
    ) -> Result<i64, LedgerError> {
        let row_count = i64::try_from(row_count)
            .map_err(|_| StoreError::Decode(format!("row_count {row_count} exceeds BIGINT")))?;
        let start = lsn_to_pg(start_marker);

        let row = self
            .adapter
            .query_opt(
                &self.sql.insert,
                &[
                    &key.namespace(),
                    &key.entity_name(),
                    &key.batch_id,
                    &row_count,
                    &start,
                ],
            )
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<_, i64>("id")?),
            None => Err(LedgerError::DuplicateBatch(key.clone())),
        }
    }

    async fn complete(&self, key: &BatchKey, end_marker: Lsn) -> Result<(), LedgerError> {
        let tx = self.adapter.begin().await?;
        self.sql.complete_in(&tx, key, end_marker).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn batch(&self, key: &BatchKey) -> Result<Option<BatchRecord>, LedgerError> {
        let row = self
            .adapter
            .query_opt(
                &self.sql.select,
                &[&key.namespace(), &key.entity_name(), &key.batch_id],
            )
            .await?;

        Ok(row.as_ref().map(batch_from_row).transpose()?)
    }

    async fn latest_status(
        &self,
        entity: &EntityRef,
    ) -> Result<Option<ReplicationStatus>, LedgerError> {
        let row = self
            .adapter
            .query_opt(&self.sql.latest, &[&entity.namespace(), &entity.name()])
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let batch = batch_from_row(&row)?;
        let slots = self.slot_progress().await?;
        Ok(Some(ReplicationStatus::project(&batch, slots, Utc::now())))
    }
}

pub(crate) fn lsn_to_pg(lsn: Lsn) -> PgLsn {
    PgLsn::from(lsn.as_u64())
}

pub(crate) fn lsn_from_pg(lsn: PgLsn) -> Lsn {
    Lsn::new(u64::from(lsn))
}

fn batch_from_row(row: &Row) -> Result<BatchRecord, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<BatchStatus>().map_err(StoreError::Decode)?;

    let row_count: i64 = row.try_get("row_count")?;
    let row_count = u64::try_from(row_count)
        .map_err(|_| StoreError::Decode(format!("negative row_count {row_count}")))?;

    let entity = EntityRef::new(
        row.try_get::<_, String>("schema_name")?,
        row.try_get::<_, String>("table_name")?,
    );

    Ok(BatchRecord {
        id: row.try_get("id")?,
        key: BatchKey::new(entity, row.try_get("batch_id")?),
        status,
        row_count,
        start_marker: row
            .try_get::<_, Option<PgLsn>>("start_lsn")?
            .map(lsn_from_pg),
        end_marker: row
            .try_get::<_, Option<PgLsn>>("completion_lsn")?
            .map(lsn_from_pg),
        created_at: row.try_get("created_at")?,
        completion_timestamp: row.try_get("completion_timestamp")?,
    })
}

/// Folds slot rows into one progress value. A slot that never confirmed
/// anything holds the whole set back.
fn slot_progress_from_rows(rows: &[Row]) -> Result<SlotProgress, StoreError> {
    let mut slot_names = Vec::with_capacity(rows.len());
    let mut positions = Vec::with_capacity(rows.len());

    for row in rows {
        slot_names.push(row.try_get::<_, String>("slot_name")?);
        positions.push(
            row.try_get::<_, Option<PgLsn>>("confirmed_flush_lsn")?
                .map(lsn_from_pg),
        );
    }

    Ok(SlotProgress {
        slot_names,
        confirmed_position: min_confirmed(&positions),
    })
}

fn min_confirmed(positions: &[Option<Lsn>]) -> Option<Lsn> {
    positions
        .iter()
        .copied()
        .collect::<Option<Vec<_>>>()
        .and_then(|all| all.into_iter().min())
}
