use crate::error::MonitorError;
use connectors::sql::base::error::{ConnectorError, DbError};
use engine_core::{
    error::{LedgerError, StoreError},
    retry::RetryDisposition,
};
use tokio_postgres::{Error as PgError, error::SqlState};

pub fn classify_monitor_error(err: &MonitorError) -> RetryDisposition {
    match err {
        MonitorError::Ledger(ledger_err) => classify_ledger_error(ledger_err),
        MonitorError::Store(store_err) => classify_store_error(store_err),
    }
}

pub fn classify_ledger_error(err: &LedgerError) -> RetryDisposition {
    match err {
        LedgerError::Store(store_err) => classify_store_error(store_err),
        LedgerError::DuplicateBatch(_) => RetryDisposition::Stop,
        LedgerError::UnknownBatch(_) => RetryDisposition::Stop,
    }
}

pub fn classify_store_error(err: &StoreError) -> RetryDisposition {
    match err {
        StoreError::Unavailable { .. } => RetryDisposition::Retry,
        StoreError::Database(db_err) => classify_db_error(db_err),
        StoreError::Decode(_) => RetryDisposition::Stop,
    }
}

pub fn classify_db_error(err: &DbError) -> RetryDisposition {
    match err {
        DbError::Io(_) => RetryDisposition::Retry,
        DbError::PgError(pg_err) => classify_pg_error(pg_err),
        DbError::Connector(conn_err) => classify_connector_error(conn_err),
        DbError::Write(_) => RetryDisposition::Stop,
        DbError::Unknown(_) => RetryDisposition::Stop,
    }
}

fn classify_connector_error(err: &ConnectorError) -> RetryDisposition {
    match err {
        ConnectorError::Connection(pg_err) => classify_pg_error(pg_err),
        ConnectorError::InvalidUrl(_) => RetryDisposition::Stop,
        ConnectorError::TlsConfig(_) => RetryDisposition::Stop,
    }
}

fn classify_pg_error(err: &PgError) -> RetryDisposition {
    if err.is_closed() {
        return RetryDisposition::Retry;
    }

    match err.code() {
        Some(code) if is_retryable_pg_code(code) => RetryDisposition::Retry,
        Some(_) => RetryDisposition::Stop,
        // No SQLSTATE means the failure happened below the protocol (socket, TLS).
        None => RetryDisposition::Retry,
    }
}

fn is_retryable_pg_code(code: &SqlState) -> bool {
    matches!(
        *code,
        SqlState::T_R_SERIALIZATION_FAILURE
            | SqlState::T_R_DEADLOCK_DETECTED
            | SqlState::LOCK_NOT_AVAILABLE
            | SqlState::TOO_MANY_CONNECTIONS
            | SqlState::ADMIN_SHUTDOWN
            | SqlState::CRASH_SHUTDOWN
            | SqlState::CANNOT_CONNECT_NOW
            | SqlState::CONNECTION_FAILURE
            | SqlState::CONNECTION_DOES_NOT_EXIST
            | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
            | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
            | SqlState::CONNECTION_EXCEPTION
            | SqlState::QUERY_CANCELED
    )
}
