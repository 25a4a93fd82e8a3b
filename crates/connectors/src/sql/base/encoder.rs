use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Provides database-specific CSV encoding for COPY style ingestion.
pub trait CopyValueEncoder {
    fn encode_int(&self, value: i64) -> String;

    fn encode_decimal(&self, value: &Decimal) -> String;

    fn encode_timestamp(&self, value: &NaiveDateTime) -> String;

    /// Joins already encoded fields into one newline-terminated CSV line.
    fn encode_line(&self, fields: &[String]) -> String {
        let mut line = fields.join(",");
        line.push('\n');
        line
    }
}
