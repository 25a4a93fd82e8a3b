use connectors::sql::base::error::DbError;
use model::core::identifiers::BatchKey;
use thiserror::Error;

/// Failures talking to a source or target store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or dropped the connection.
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The store was reachable but rejected or failed the operation.
    #[error("Store operation failed: {0}")]
    Database(#[source] DbError),

    #[error("Malformed row: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.is_unavailable() {
            StoreError::Unavailable {
                reason: err.to_string(),
            }
        } else {
            StoreError::Database(err)
        }
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        DbError::from(err).into()
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Batch {0} already exists in the ledger")]
    DuplicateBatch(BatchKey),

    #[error("No batch {0} found in the ledger")]
    UnknownBatch(BatchKey),

    #[error("Ledger store error: {0}")]
    Store(#[from] StoreError),
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        LedgerError::Store(err.into())
    }
}

impl From<tokio_postgres::Error> for LedgerError {
    fn from(err: tokio_postgres::Error) -> Self {
        LedgerError::Store(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_become_unavailable() {
        let err: StoreError = DbError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ))
        .into();
        assert!(err.is_unavailable());

        let err: StoreError = DbError::Write("copy rejected".into()).into();
        assert!(matches!(err, StoreError::Database(DbError::Write(_))));
    }
}
