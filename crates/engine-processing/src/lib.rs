pub mod checker;
pub mod error;
pub mod loader;
pub mod monitor;
pub mod retry;
