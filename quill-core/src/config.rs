use std::time::Duration;

use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Top-level configuration, deserialized from an optional `quill` config
/// file overlaid with `QUILL__`-prefixed environment variables
/// (`QUILL__DATABASE__URL`, `QUILL__STORAGE__BUCKET`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default = "default_public_domain")]
    pub public_domain: String,
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_public_domain() -> String {
    "http://localhost:9000".to_owned()
}

fn default_presign_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Loads and validates configuration from the process environment plus
    /// an optional `quill.toml` next to the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("quill").required(false))
            .add_source(config::Environment::with_prefix("QUILL").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid("database.url must be set".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than zero".into(),
            ));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.bucket must be set".into()));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Opens a connection pool sized per this configuration.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect(&self.url)
            .await
    }
}

impl StorageConfig {
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let config = build(&[
            ("database.url", "postgres://localhost/quill"),
            ("storage.bucket", "quill-media"),
        ])
        .unwrap();

        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.storage.presign_ttl(), Duration::from_secs(3600));
        assert!(!config.storage.public_domain.is_empty());
    }

    #[test]
    fn rejects_empty_database_url() {
        let result = build(&[("database.url", ""), ("storage.bucket", "quill-media")]);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_empty_bucket() {
        let result = build(&[
            ("database.url", "postgres://localhost/quill"),
            ("storage.bucket", "  "),
        ]);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
