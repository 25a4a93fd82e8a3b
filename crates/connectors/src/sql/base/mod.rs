pub mod encoder;
pub mod error;
