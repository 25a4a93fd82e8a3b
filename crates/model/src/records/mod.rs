pub mod batch;
pub mod order;
