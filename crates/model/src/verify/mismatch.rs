use crate::records::order::OrderRecord;
use serde::{Deserialize, Serialize};

/// A key whose content differs between source and target, or that exists on
/// only one side (the missing side is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub key: i64,
    pub source: Option<OrderRecord>,
    pub target: Option<OrderRecord>,
}

impl Mismatch {
    pub fn kind(&self) -> MismatchKind {
        match (&self.source, &self.target) {
            (Some(_), None) => MismatchKind::MissingInTarget,
            (None, Some(_)) => MismatchKind::MissingInSource,
            _ => MismatchKind::ContentDiffers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchKind {
    ContentDiffers,
    MissingInTarget,
    MissingInSource,
}

/// Outcome of comparing one scope between source and target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareReport {
    pub equal: bool,
    pub source_count: usize,
    pub target_count: usize,
    pub mismatches: Vec<Mismatch>,
}

impl CompareReport {
    pub fn from_mismatches(
        source_count: usize,
        target_count: usize,
        mismatches: Vec<Mismatch>,
    ) -> Self {
        Self {
            equal: mismatches.is_empty(),
            source_count,
            target_count,
            mismatches,
        }
    }
}
