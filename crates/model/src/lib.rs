pub mod core;
pub mod records;
pub mod replication;
pub mod verify;
