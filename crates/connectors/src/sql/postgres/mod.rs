pub mod adapter;
pub mod encoder;
pub mod transaction;
pub mod utils;
