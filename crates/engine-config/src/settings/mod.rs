use crate::error::ConfigError;
use connection::ConnectionSettings;
use model::core::identifiers::EntityRef;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{info, warn};

pub mod connection;

/// Polling parameters for `verify`; command-line flags override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub timeout_secs: u64,
    pub interval_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            interval_secs: 10,
        }
    }
}

impl MonitorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// The JSON configuration document. Every field is optional; omitted fields
/// take the values of [`Settings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feed_dir: PathBuf,
    pub db: ConnectionSettings,
    pub target_db: ConnectionSettings,
    pub batch_size: usize,
    pub customer_id_range: (i32, i32),
    pub amount_range: (Decimal, Decimal),
    pub namespace: String,
    pub entity: String,
    pub ledger_table: String,
    /// Restricts replication progress to one logical slot.
    pub slot_name: Option<String>,
    pub monitor: MonitorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_dir: PathBuf::from("feed_files"),
            db: ConnectionSettings::source_default(),
            target_db: ConnectionSettings::target_default(),
            batch_size: 100,
            customer_id_range: (1, 1000),
            amount_range: (Decimal::new(1000, 2), Decimal::new(100000, 2)),
            namespace: "public".into(),
            entity: "orders".into(),
            ledger_table: "batch_control".into(),
            slot_name: None,
            monitor: MonitorSettings::default(),
        }
    }
}

impl Settings {
    /// Reads and validates the document at `path`. A missing file yields the
    /// defaults; an unreadable or malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let settings = match fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found; using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        settings.validate()?;
        info!(
            path = %path.display(),
            source = %settings.db,
            target = %settings.target_db,
            "Configuration loaded"
        );
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min_id, max_id) = self.customer_id_range;
        if min_id > max_id {
            return Err(ConfigError::InvalidRange {
                field: "customer_id_range",
                min: min_id.to_string(),
                max: max_id.to_string(),
            });
        }

        let (min_amount, max_amount) = self.amount_range;
        if min_amount > max_amount {
            return Err(ConfigError::InvalidRange {
                field: "amount_range",
                min: min_amount.to_string(),
                max: max_amount.to_string(),
            });
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be at least 1".into(),
            });
        }

        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.interval_secs",
                reason: "must be at least 1".into(),
            });
        }

        for (field, value) in [
            ("namespace", &self.namespace),
            ("entity", &self.entity),
            ("ledger_table", &self.ledger_table),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must not be empty".into(),
                });
            }
        }

        Ok(())
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.namespace.as_str(), self.entity.as_str())
    }

    /// The ledger lives in the same namespace as the entity it tracks.
    pub fn ledger_ref(&self) -> EntityRef {
        EntityRef::new(self.namespace.as_str(), self.ledger_table.as_str())
    }

    pub fn feed_file(&self, batch_id: i64) -> PathBuf {
        self.feed_dir.join(format!("orders_batch_{batch_id}.csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.target_db.port, 5433);
    }

    #[test]
    fn partial_document_keeps_default_target() {
        let file = write_config(
            r#"{
                "feed_dir": "/tmp/feeds",
                "db": {"host": "src", "port": 5432, "database": "sourcedb",
                       "user": "sourceuser", "password": "sourcepass"},
                "batch_size": 250,
                "customer_id_range": [10, 20],
                "amount_range": [1.5, 99.99]
            }"#,
        );

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.db.host, "src");
        assert_eq!(settings.target_db, ConnectionSettings::target_default());
        assert_eq!(settings.batch_size, 250);
        assert_eq!(settings.customer_id_range, (10, 20));
        assert_eq!(
            settings.amount_range,
            (Decimal::new(15, 1), Decimal::new(9999, 2))
        );
        assert_eq!(settings.feed_file(7), PathBuf::from("/tmp/feeds/orders_batch_7.csv"));
    }

    #[test]
    fn monitor_section_is_read() {
        let file = write_config(r#"{"monitor": {"timeout_secs": 60}, "slot_name": "orders_slot"}"#);
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.monitor.timeout(), Duration::from_secs(60));
        assert_eq!(settings.monitor.interval(), Duration::from_secs(10));
        assert_eq!(settings.slot_name.as_deref(), Some("orders_slot"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let file = write_config(r#"{"monitor": {"interval_secs": 0}}"#);
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "monitor.interval_secs",
                ..
            }
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let file = write_config(r#"{"customer_id_range": [500, 1]}"#);
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidRange {
                field: "customer_id_range",
                ..
            }
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let file = write_config("{ not json");
        assert!(matches!(
            Settings::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn entity_and_ledger_share_namespace() {
        let settings = Settings {
            namespace: "sales".into(),
            ..Settings::default()
        };
        assert_eq!(settings.entity_ref().to_string(), "sales.orders");
        assert_eq!(settings.ledger_ref().to_string(), "sales.batch_control");
    }
}
