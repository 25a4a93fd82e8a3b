use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An order as it exists in a store, after the source assigned its identity.
///
/// Two records are the same order when their `order_id`s match; they are
/// consistent when every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: i64,
    pub customer_id: i32,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
}

/// An order prepared for loading; the source store assigns `order_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: i32,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
}

impl NewOrder {
    pub fn with_id(self, order_id: i64) -> OrderRecord {
        OrderRecord {
            order_id,
            customer_id: self.customer_id,
            amount: self.amount,
            timestamp: self.timestamp,
        }
    }
}
