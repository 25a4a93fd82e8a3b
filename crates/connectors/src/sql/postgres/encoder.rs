use crate::sql::base::encoder::CopyValueEncoder;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Timestamp layout accepted by `COPY … WITH (FORMAT csv)` for `timestamp` columns.
const PG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Default, Clone, Copy)]
pub struct PgCopyValueEncoder;

impl PgCopyValueEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl CopyValueEncoder for PgCopyValueEncoder {
    fn encode_int(&self, value: i64) -> String {
        value.to_string()
    }

    fn encode_decimal(&self, value: &Decimal) -> String {
        value.to_string()
    }

    fn encode_timestamp(&self, value: &NaiveDateTime) -> String {
        value.format(PG_TIMESTAMP_FORMAT).to_string()
    }
}
