use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Rate limiting is disabled when no url is set.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

/// Domain events are only logged when no brokers are set.
#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: None,
            topic_prefix: default_topic_prefix(),
        }
    }
}

fn default_topic_prefix() -> String {
    "evently".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    pub webhook_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub rate_limit_per_minute: i64,
    pub max_message_length: usize,
    pub conflict_preview_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 120,
            max_message_length: 4000,
            conflict_preview_limit: 5,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides, e.g. config/production.toml
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // EVENTLY__DATABASE__URL=... overrides database.url
            .add_source(config::Environment::with_prefix("EVENTLY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let config = parse(
            r#"
            [server]
            port = 8080
            [storage]
            backend = "memory"
            [database]
            url = "postgres://localhost/evently"
            [auth]
            jwt_secret = "s"
            jwt_expiration_seconds = 60
            webhook_secret = "w"
            "#,
        );

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.redis.url.is_none());
        assert!(config.kafka.brokers.is_none());
        assert_eq!(config.kafka.topic_prefix, "evently");
        assert_eq!(config.limits.max_message_length, 4000);
    }

    #[test]
    fn test_postgres_backend_parses() {
        let config = parse(
            r#"
            [server]
            port = 8080
            [storage]
            backend = "postgres"
            [database]
            url = "postgres://localhost/evently"
            max_connections = 20
            [redis]
            url = "redis://127.0.0.1/"
            [auth]
            jwt_secret = "s"
            jwt_expiration_seconds = 60
            webhook_secret = "w"
            [limits]
            rate_limit_per_minute = 10
            max_message_length = 500
            conflict_preview_limit = 3
            "#,
        );

        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.redis.url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.limits.conflict_preview_limit, 3);
    }
}
