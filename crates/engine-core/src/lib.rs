pub mod error;
pub mod ledger;
pub mod memory;
pub mod position;
pub mod retry;
pub mod store;
