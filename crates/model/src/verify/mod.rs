pub mod mismatch;
