use crate::sql::{
    base::error::{ConnectorError, DbError},
    postgres::{
        transaction::PgTransaction,
        utils::{connect_client, parse_config},
    },
};
use tokio_postgres::{Client, Config, Row, types::ToSql};
use tracing::debug;

/// Postgres access where every call acquires, uses and releases its own
/// connection. Nothing is held between calls, so callers can sleep between
/// them without pinning a backend.
#[derive(Clone)]
pub struct PgAdapter {
    config: Config,
}

impl PgAdapter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn from_url(url: &str) -> Result<Self, ConnectorError> {
        Ok(Self::new(parse_config(url)?))
    }

    async fn connect(&self) -> Result<Client, DbError> {
        let client = connect_client(&self.config).await?;
        debug!(dbname = ?self.config.get_dbname(), "Opened Postgres connection");
        Ok(client)
    }

    /// Round-trips `SELECT 1`.
    pub async fn ping(&self) -> Result<(), DbError> {
        let client = self.connect().await?;
        let row = client.query_one("SELECT 1", &[]).await?;
        let val: i32 = row.try_get(0)?;
        if val != 1 {
            return Err(DbError::Unknown(format!(
                "Ping returned unexpected result: {val}"
            )));
        }
        Ok(())
    }

    pub async fn exec(&self, sql: &str) -> Result<(), DbError> {
        let client = self.connect().await?;
        client.batch_execute(sql).await?;
        Ok(())
    }

    pub async fn query_rows(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, DbError> {
        let client = self.connect().await?;
        Ok(client.query(sql, params).await?)
    }

    pub async fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, DbError> {
        let client = self.connect().await?;
        Ok(client.query_one(sql, params).await?)
    }

    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, DbError> {
        let client = self.connect().await?;
        Ok(client.query_opt(sql, params).await?)
    }

    /// Opens a dedicated connection and starts a transaction on it.
    pub async fn begin(&self) -> Result<PgTransaction, DbError> {
        let client = self.connect().await?;
        PgTransaction::begin(client).await
    }
}
