use crate::{
    error::{LedgerError, StoreError},
    ledger::postgres::{LedgerTable, lsn_from_pg},
    position::PositionOracle,
    store::{LoadTransaction, RecordStore, SourceStore},
};
use async_trait::async_trait;
use connectors::sql::{
    base::encoder::CopyValueEncoder,
    postgres::{
        adapter::PgAdapter, encoder::PgCopyValueEncoder, transaction::PgTransaction,
        utils::qualified_name,
    },
};
use model::{
    core::{
        identifiers::{BatchKey, EntityRef},
        lsn::Lsn,
    },
    records::order::{NewOrder, OrderRecord},
};
use tokio_postgres::{Row, types::PgLsn};
use tracing::debug;

const CURRENT_POSITION_SQL: &str = "SELECT pg_current_wal_lsn()";

/// Columns written by a load; `order_id` is assigned by the table's sequence.
const LOAD_COLUMNS: [&str; 3] = ["customer_id", "amount", "timestamp"];

/// Postgres-backed store. The same type serves as source (with loads and the
/// ledger) and as read-only target.
#[derive(Clone)]
pub struct PgStore {
    adapter: PgAdapter,
    ledger: LedgerTable,
}

impl PgStore {
    pub fn new(adapter: PgAdapter, ledger_table: &EntityRef) -> Self {
        Self {
            adapter,
            ledger: LedgerTable::new(ledger_table),
        }
    }

    pub fn adapter(&self) -> &PgAdapter {
        &self.adapter
    }

    /// Creates the orders table for `entity` when it does not exist yet.
    pub async fn ensure_entity(&self, entity: &EntityRef) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                order_id    BIGSERIAL      PRIMARY KEY,
                customer_id INTEGER        NOT NULL,
                amount      NUMERIC(12, 2) NOT NULL,
                \"timestamp\" TIMESTAMP    NOT NULL
            )",
            qualified_name(entity)
        );
        self.adapter.exec(&sql).await?;
        Ok(())
    }
}

#[async_trait]
impl PositionOracle for PgStore {
    async fn current_position(&self) -> Result<Lsn, StoreError> {
        let row = self.adapter.query_one(CURRENT_POSITION_SQL, &[]).await?;
        Ok(lsn_from_pg(row.try_get::<_, PgLsn>(0)?))
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn count(&self, entity: &EntityRef) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", qualified_name(entity));
        let row = self.adapter.query_one(&sql, &[]).await?;
        let count: i64 = row.try_get(0)?;
        u64::try_from(count).map_err(|_| StoreError::Decode(format!("negative count {count}")))
    }

    async fn fetch_records(&self, entity: &EntityRef) -> Result<Vec<OrderRecord>, StoreError> {
        let sql = format!(
            "SELECT order_id::bigint AS order_id,
                    customer_id::integer AS customer_id,
                    amount::numeric AS amount,
                    \"timestamp\"::timestamp AS ts
               FROM {}
              ORDER BY order_id",
            qualified_name(entity)
        );
        let rows = self.adapter.query_rows(&sql, &[]).await?;
        rows.iter().map(order_from_row).collect()
    }
}

#[async_trait]
impl SourceStore for PgStore {
    async fn begin_load(&self) -> Result<Box<dyn LoadTransaction>, StoreError> {
        let tx = self.adapter.begin().await?;
        Ok(Box::new(PgLoadTransaction {
            tx,
            ledger: self.ledger.clone(),
            encoder: PgCopyValueEncoder::new(),
        }))
    }
}

struct PgLoadTransaction {
    tx: PgTransaction,
    ledger: LedgerTable,
    encoder: PgCopyValueEncoder,
}

impl PgLoadTransaction {
    fn encode(&self, order: &NewOrder) -> String {
        self.encoder.encode_line(&[
            self.encoder.encode_int(i64::from(order.customer_id)),
            self.encoder.encode_decimal(&order.amount),
            self.encoder.encode_timestamp(&order.timestamp),
        ])
    }
}

#[async_trait]
impl LoadTransaction for PgLoadTransaction {
    async fn bulk_insert(
        &mut self,
        entity: &EntityRef,
        records: &[NewOrder],
    ) -> Result<u64, StoreError> {
        let lines = records.iter().map(|r| self.encode(r)).collect::<Vec<_>>();
        let copied = self
            .tx
            .copy_rows(&qualified_name(entity), &LOAD_COLUMNS, lines)
            .await?;
        debug!(entity = %entity, copied, "COPY finished");
        Ok(copied)
    }

    async fn current_position(&mut self) -> Result<Lsn, StoreError> {
        let row = self.tx.query_one(CURRENT_POSITION_SQL, &[]).await?;
        Ok(lsn_from_pg(row.try_get::<_, PgLsn>(0)?))
    }

    async fn complete_batch(
        &mut self,
        key: &BatchKey,
        end_marker: Lsn,
    ) -> Result<(), LedgerError> {
        self.ledger.complete_in(&self.tx, key, end_marker).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn order_from_row(row: &Row) -> Result<OrderRecord, StoreError> {
    Ok(OrderRecord {
        order_id: row.try_get("order_id")?,
        customer_id: row.try_get("customer_id")?,
        amount: row.try_get("amount")?,
        timestamp: row.try_get("ts")?,
    })
}
