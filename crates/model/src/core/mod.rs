pub mod identifiers;
pub mod lsn;
