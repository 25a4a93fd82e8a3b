use thiserror::Error;
use tokio_postgres::error::SqlState;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Low‐level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    PgError(#[from] tokio_postgres::Error),

    /// The connection could not be established.
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Writing rows to the database failed at the application level.
    #[error("Write error: {0}")]
    Write(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DbError {
    /// True when the store could not be reached or dropped the connection,
    /// as opposed to rejecting a statement.
    pub fn is_unavailable(&self) -> bool {
        match self {
            DbError::Io(_) => true,
            DbError::Connector(err) => !matches!(err, ConnectorError::InvalidUrl(_)),
            DbError::PgError(err) => is_connection_failure(err),
            DbError::Write(_) | DbError::Unknown(_) => false,
        }
    }

    /// The SQLSTATE reported by the server, if any.
    pub fn sql_state(&self) -> Option<&SqlState> {
        match self {
            DbError::PgError(err) => err.code(),
            DbError::Connector(ConnectorError::Connection(err)) => err.code(),
            _ => None,
        }
    }
}

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("PostgreSQL connection failed: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),
}

fn is_connection_failure(err: &tokio_postgres::Error) -> bool {
    if err.is_closed() {
        return true;
    }

    if let Some(code) = err.code() {
        // Class 08 is "connection exception".
        return code.code().starts_with("08")
            || matches!(
                *code,
                SqlState::ADMIN_SHUTDOWN
                    | SqlState::CRASH_SHUTDOWN
                    | SqlState::CANNOT_CONNECT_NOW
                    | SqlState::TOO_MANY_CONNECTIONS
            );
    }

    std::error::Error::source(err)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .is_some()
}
