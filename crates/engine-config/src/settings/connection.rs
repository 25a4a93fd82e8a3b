use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_postgres::config::{Config, SslMode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslModeSetting {
    Disable,
    #[default]
    Prefer,
    Require,
}

impl From<SslModeSetting> for SslMode {
    fn from(mode: SslModeSetting) -> Self {
        match mode {
            SslModeSetting::Disable => SslMode::Disable,
            SslModeSetting::Prefer => SslMode::Prefer,
            SslModeSetting::Require => SslMode::Require,
        }
    }
}

/// Where to find one Postgres database.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub sslmode: SslModeSetting,
}

impl ConnectionSettings {
    pub fn source_default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            database: "sourcedb".into(),
            user: "sourceuser".into(),
            password: "sourcepass".into(),
            sslmode: SslModeSetting::default(),
        }
    }

    pub fn target_default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5433,
            database: "targetdb".into(),
            user: "targetuser".into(),
            password: "targetpass".into(),
            sslmode: SslModeSetting::default(),
        }
    }

    pub fn to_pg_config(&self) -> Config {
        let mut config = Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password)
            .ssl_mode(self.sslmode.into());
        config
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("sslmode", &self.sslmode)
            .finish()
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", ConnectionSettings::source_default());
        assert!(rendered.contains("sourceuser"));
        assert!(!rendered.contains("sourcepass"));
    }

    #[test]
    fn builds_driver_config() {
        let config = ConnectionSettings::target_default().to_pg_config();
        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(config.get_dbname(), Some("targetdb"));
        assert_eq!(config.get_user(), Some("targetuser"));
        assert_eq!(config.get_password(), Some(&b"targetpass"[..]));
        assert_eq!(config.get_ssl_mode(), SslMode::Prefer);
    }

    #[test]
    fn sslmode_defaults_to_prefer() {
        let parsed: ConnectionSettings = serde_json::from_str(
            r#"{"host":"db","port":6000,"database":"d","user":"u","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(parsed.sslmode, SslModeSetting::Prefer);
        assert_eq!(parsed.to_string(), "u@db:6000/d");
    }
}
