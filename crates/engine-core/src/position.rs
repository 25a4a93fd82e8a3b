use crate::error::StoreError;
use async_trait::async_trait;
use model::core::lsn::Lsn;

/// Reads the source store's current write position.
///
/// The returned token is a lower bound for visibility: no write that committed
/// before the call returns can carry a greater position.
#[async_trait]
pub trait PositionOracle: Send + Sync {
    async fn current_position(&self) -> Result<Lsn, StoreError>;
}
