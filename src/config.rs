// config.rs
use std::str::FromStr;

use thiserror::Error;

use crate::db::cache::{CACHE_THRESHOLD, RECOMMENDATION_CACHE_TTL};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Transport the like/unlike feed is consumed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Kafka,
    Redis,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Kafka => "kafka",
            FeedKind::Redis => "redis",
        }
    }
}

impl FromStr for FeedKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "kafka" => Ok(FeedKind::Kafka),
            "redis" => Ok(FeedKind::Redis),
            other => Err(format!("unknown event source {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub log_level: String,
    // Database pool
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub run_migrations: bool,
    // Recommendation cache
    pub cache_threshold: i64,
    pub cache_ttl_secs: usize,
    // Product update feed
    pub event_source: FeedKind,
    pub event_topic: String,
    pub kafka_broker: String,
    pub kafka_group_id: String,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source; `init` reads the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        let or_default = |name: &'static str, default: &str| {
            lookup(name).unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            redis_url: required("REDIS_URL")?,
            port: parse_or(&lookup, "PORT", 8000)?,
            log_level: or_default("LOG_LEVEL", "debug"),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            db_min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", 5)?,
            db_acquire_timeout_secs: parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECONDS", 5)?,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", false)?,
            cache_threshold: parse_or(&lookup, "CACHE_THRESHOLD", CACHE_THRESHOLD)?,
            cache_ttl_secs: parse_or(&lookup, "CACHE_TTL_SECONDS", RECOMMENDATION_CACHE_TTL)?,
            event_source: parse_or(&lookup, "EVENT_SOURCE", FeedKind::Kafka)?,
            event_topic: or_default("EVENT_TOPIC", "product_updates"),
            kafka_broker: or_default("KAFKA_BROKER", "localhost:9092"),
            kafka_group_id: or_default("KAFKA_GROUP_ID", "recommendations"),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
