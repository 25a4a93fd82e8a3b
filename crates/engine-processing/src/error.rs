use engine_core::error::{LedgerError, StoreError};
use model::core::identifiers::BatchKey;
use std::{fmt, time::Duration};
use thiserror::Error;

/// Step of the load protocol that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Begin,
    Insert,
    EndMarker,
    Complete,
    Commit,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            LoadStage::Begin => "begin",
            LoadStage::Insert => "insert",
            LoadStage::EndMarker => "end marker",
            LoadStage::Complete => "complete",
            LoadStage::Commit => "commit",
        };
        f.write_str(stage)
    }
}

/// Underlying cause of a failed load.
#[derive(Error, Debug)]
pub enum LoadCause {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("store accepted {inserted} rows, ledger expects {expected}")]
    RowCountMismatch { expected: u64, inserted: u64 },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read the start position: {0}")]
    StartMarker(#[source] StoreError),

    /// Ledger creation failed; `DuplicateBatch` arrives here untouched.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Load of batch '{key}' failed at {stage}: {source}")]
    LoadFailed {
        key: BatchKey,
        stage: LoadStage,
        #[source]
        source: LoadCause,
    },
}

impl LoadError {
    pub fn failed(key: &BatchKey, stage: LoadStage, source: impl Into<LoadCause>) -> Self {
        LoadError::LoadFailed {
            key: key.clone(),
            stage,
            source: source.into(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, LoadError::Ledger(LedgerError::DuplicateBatch(_)))
    }
}

/// Failure of a single monitor tick.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Non-confirmed outcome of a verification, for callers that want a `Result`.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Batch '{key}' was not confirmed within {timeout:?}")]
    Timeout { key: BatchKey, timeout: Duration },

    #[error("Verification of batch '{key}' failed: {source}")]
    Store {
        key: BatchKey,
        #[source]
        source: MonitorError,
    },

    #[error("Verification of batch '{key}' was cancelled")]
    Cancelled { key: BatchKey },
}
