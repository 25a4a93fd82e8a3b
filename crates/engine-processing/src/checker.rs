use engine_core::{error::StoreError, store::RecordStore};
use model::{
    core::identifiers::EntityRef,
    records::order::OrderRecord,
    verify::mismatch::{CompareReport, Mismatch},
};
use std::{cmp::Ordering, sync::Arc};
use tracing::debug;

/// Compares the records of one entity between source and target.
#[derive(Clone)]
pub struct ConsistencyChecker {
    source: Arc<dyn RecordStore>,
    target: Arc<dyn RecordStore>,
}

impl ConsistencyChecker {
    pub fn new(source: Arc<dyn RecordStore>, target: Arc<dyn RecordStore>) -> Self {
        Self { source, target }
    }

    pub async fn compare(&self, entity: &EntityRef) -> Result<CompareReport, StoreError> {
        let source = self.source.fetch_records(entity).await?;
        let target = self.target.fetch_records(entity).await?;

        let report = diff_records(source, target);
        debug!(
            entity = %entity,
            source_count = report.source_count,
            target_count = report.target_count,
            mismatches = report.mismatches.len(),
            "Compared record sets"
        );
        Ok(report)
    }
}

/// Merge-joins both sides by `order_id`.
///
/// Both inputs are sorted here, so the result does not depend on the order
/// the stores returned rows in.
pub fn diff_records(mut source: Vec<OrderRecord>, mut target: Vec<OrderRecord>) -> CompareReport {
    source.sort_by_key(|r| r.order_id);
    target.sort_by_key(|r| r.order_id);

    let source_count = source.len();
    let target_count = target.len();
    let mut mismatches = Vec::new();

    let mut left = source.into_iter().peekable();
    let mut right = target.into_iter().peekable();

    loop {
        let ordering = match (left.peek(), right.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(s), Some(t)) => s.order_id.cmp(&t.order_id),
        };

        match ordering {
            Ordering::Less => {
                if let Some(s) = left.next() {
                    mismatches.push(Mismatch {
                        key: s.order_id,
                        source: Some(s),
                        target: None,
                    });
                }
            }
            Ordering::Greater => {
                if let Some(t) = right.next() {
                    mismatches.push(Mismatch {
                        key: t.order_id,
                        source: None,
                        target: Some(t),
                    });
                }
            }
            Ordering::Equal => {
                if let (Some(s), Some(t)) = (left.next(), right.next())
                    && s != t
                {
                    mismatches.push(Mismatch {
                        key: s.order_id,
                        source: Some(s),
                        target: Some(t),
                    });
                }
            }
        }
    }

    CompareReport::from_mismatches(source_count, target_count, mismatches)
}
