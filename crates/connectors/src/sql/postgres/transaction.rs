use crate::sql::{base::error::DbError, postgres::utils::quote_identifier};
use bytes::Bytes;
use futures_util::{SinkExt, pin_mut};
use tokio_postgres::{Client, Row, types::ToSql};
use tracing::debug;

/// A transaction that owns its connection.
///
/// Dropping it without `commit` closes the connection, which makes the server
/// roll the transaction back.
pub struct PgTransaction {
    client: Client,
    finished: bool,
}

impl PgTransaction {
    pub(crate) async fn begin(client: Client) -> Result<Self, DbError> {
        client.batch_execute("BEGIN").await?;
        Ok(Self {
            client,
            finished: false,
        })
    }

    pub async fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, DbError> {
        Ok(self.client.query_one(sql, params).await?)
    }

    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, DbError> {
        Ok(self.client.query_opt(sql, params).await?)
    }

    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, DbError> {
        Ok(self.client.execute(sql, params).await?)
    }

    /// Streams pre-encoded CSV lines into `table` with `COPY … FROM STDIN`.
    /// Returns the number of rows the server reports as copied.
    pub async fn copy_rows(
        &self,
        table: &str,
        columns: &[&str],
        lines: Vec<String>,
    ) -> Result<u64, DbError> {
        if lines.is_empty() {
            return Ok(0);
        }

        let column_list = columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!("COPY {table} ({column_list}) FROM STDIN WITH (FORMAT csv)");

        debug!("COPY statement: {}", statement);

        let sink = self.client.copy_in::<_, Bytes>(statement.as_str()).await?;
        pin_mut!(sink);

        for line in lines {
            sink.as_mut().send(Bytes::from(line)).await?;
        }

        Ok(sink.as_mut().finish().await?)
    }

    pub async fn commit(mut self) -> Result<(), DbError> {
        self.client.batch_execute("COMMIT").await?;
        self.finished = true;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), DbError> {
        self.client.batch_execute("ROLLBACK").await?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Transaction dropped without commit; closing its connection rolls it back");
        }
    }
}
