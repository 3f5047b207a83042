use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Deadline for a single booking transaction.
    #[serde(default = "default_unit_of_work_timeout")]
    pub unit_of_work_timeout_ms: u64,
}

fn default_unit_of_work_timeout() -> u64 { 5_000 }

impl BookingConfig {
    pub fn unit_of_work_timeout(&self) -> Duration {
        Duration::from_millis(self.unit_of_work_timeout_ms)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self { unit_of_work_timeout_ms: default_unit_of_work_timeout() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `TARMAC__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("TARMAC").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_default_file_deserializes() {
        let config: Config = config::Config::builder()
            .add_source(File::from_str(include_str!("../../config/default.toml"), FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.booking.unit_of_work_timeout(), Duration::from_secs(5));
        assert_eq!(config.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let minimal = r#"
            [server]
            port = 9000

            [database]
            url = "postgres://localhost/tarmac"

            [auth]
            jwt_secret = "secret"
        "#;

        let config: Config = config::Config::builder()
            .add_source(File::from_str(minimal, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.acquire_timeout_seconds, 3);
        assert_eq!(config.booking.unit_of_work_timeout_ms, 5_000);
    }
}
