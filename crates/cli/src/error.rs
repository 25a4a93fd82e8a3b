use connectors::sql::base::error::{ConnectorError, DbError};
use engine_config::error::ConfigError;
use engine_core::error::{LedgerError, StoreError};
use engine_processing::error::LoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to read or write the feed file: {0}")]
    Feed(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Invalid feed settings: {0}")]
    InvalidFeed(String),
}
