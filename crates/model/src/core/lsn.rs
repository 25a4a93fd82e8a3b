use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Position in the source store's write-ahead log.
///
/// Tokens are totally ordered: a write that committed before another one never
/// carries a greater position. The textual form is the Postgres `XXXXXXXX/XXXXXXXX`
/// notation (high and low 32 bits in hex), which is also what gets serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn(u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LsnParseError {
    #[error("LSN '{0}' is missing the '/' separator")]
    MissingSeparator(String),

    #[error("LSN '{0}' contains an invalid hex segment")]
    InvalidHex(String),
}

impl Lsn {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Lsn {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Lsn> for u64 {
    fn from(lsn: Lsn) -> Self {
        lsn.0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

impl FromStr for Lsn {
    type Err = LsnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hi, lo) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| LsnParseError::MissingSeparator(s.to_string()))?;

        let hi = u32::from_str_radix(hi, 16).map_err(|_| LsnParseError::InvalidHex(s.to_string()))?;
        let lo = u32::from_str_radix(lo, 16).map_err(|_| LsnParseError::InvalidHex(s.to_string()))?;

        Ok(Lsn((u64::from(hi) << 32) | u64::from(lo)))
    }
}

impl Serialize for Lsn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Lsn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_postgres_notation() {
        let lsn: Lsn = "16/B374D848".parse().unwrap();
        assert_eq!(lsn.as_u64(), (0x16 << 32) | 0xB374_D848);
        assert_eq!(lsn.to_string(), "16/B374D848");
    }

    #[test]
    fn ordering_follows_log_position() {
        let earlier: Lsn = "0/FFFFFFFF".parse().unwrap();
        let later: Lsn = "1/0".parse().unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(
            "16B374D848".parse::<Lsn>(),
            Err(LsnParseError::MissingSeparator("16B374D848".into()))
        );
        assert!(matches!("0/XYZ".parse::<Lsn>(), Err(LsnParseError::InvalidHex(_))));
    }

    #[test]
    fn serializes_as_text() {
        let json = serde_json::to_string(&Lsn::new(0x1_0000_0010)).unwrap();
        assert_eq!(json, "\"1/10\"");
        let back: Lsn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Lsn::new(0x1_0000_0010));
    }
}
