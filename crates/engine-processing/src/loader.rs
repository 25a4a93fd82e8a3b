use crate::error::{LoadCause, LoadError, LoadStage};
use engine_core::{
    ledger::BatchLedger,
    store::{LoadTransaction, SourceStore},
};
use model::{
    core::{
        identifiers::{BatchKey, EntityRef},
        lsn::Lsn,
    },
    records::order::NewOrder,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of a committed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub key: BatchKey,
    pub ledger_id: i64,
    pub row_count: u64,
    pub start_marker: Lsn,
    pub end_marker: Lsn,
}

/// Loads batches into the source store and brackets them in the ledger.
///
/// The ledger row is created on its own before the load transaction starts,
/// so a failed load leaves it IN_PROGRESS. Records, the end marker and the
/// COMPLETED transition commit together or not at all.
pub struct Loader {
    source: Arc<dyn SourceStore>,
    ledger: Arc<dyn BatchLedger>,
    entity: EntityRef,
}

impl Loader {
    pub fn new(source: Arc<dyn SourceStore>, ledger: Arc<dyn BatchLedger>, entity: EntityRef) -> Self {
        Self {
            source,
            ledger,
            entity,
        }
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub async fn load(&self, records: &[NewOrder], batch_id: i64) -> Result<LoadSummary, LoadError> {
        let key = BatchKey::new(self.entity.clone(), batch_id);
        let row_count = records.len() as u64;

        let start_marker = self
            .source
            .current_position()
            .await
            .map_err(LoadError::StartMarker)?;

        let ledger_id = self.ledger.create(&key, row_count, start_marker).await?;
        info!(batch = %key, ledger_id, row_count, start_marker = %start_marker, "Batch registered");

        let mut tx = self
            .source
            .begin_load()
            .await
            .map_err(|e| LoadError::failed(&key, LoadStage::Begin, e))?;

        let end_marker = match self.write_batch(tx.as_mut(), &key, records).await {
            Ok(end_marker) => end_marker,
            Err((stage, cause)) => {
                error!(batch = %key, stage = %stage, error = %cause, "Load failed; rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(batch = %key, error = %rollback_err, "Rollback failed");
                }
                return Err(LoadError::failed(&key, stage, cause));
            }
        };

        tx.commit()
            .await
            .map_err(|e| LoadError::failed(&key, LoadStage::Commit, e))?;

        info!(
            batch = %key,
            row_count,
            start_marker = %start_marker,
            end_marker = %end_marker,
            "Batch committed"
        );

        Ok(LoadSummary {
            key,
            ledger_id,
            row_count,
            start_marker,
            end_marker,
        })
    }

    /// Everything that must commit atomically with the records.
    async fn write_batch(
        &self,
        tx: &mut dyn LoadTransaction,
        key: &BatchKey,
        records: &[NewOrder],
    ) -> Result<Lsn, (LoadStage, LoadCause)> {
        let expected = records.len() as u64;

        let inserted = tx
            .bulk_insert(&self.entity, records)
            .await
            .map_err(|e| (LoadStage::Insert, LoadCause::from(e)))?;
        if inserted != expected {
            return Err((
                LoadStage::Insert,
                LoadCause::RowCountMismatch { expected, inserted },
            ));
        }

        let end_marker = tx
            .current_position()
            .await
            .map_err(|e| (LoadStage::EndMarker, LoadCause::from(e)))?;

        tx.complete_batch(key, end_marker)
            .await
            .map_err(|e| (LoadStage::Complete, LoadCause::from(e)))?;

        Ok(end_marker)
    }
}
