//! Configuration management for the transfer server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with RTX_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Transfer workflow settings
    pub transfer: TransferConfig,

    /// Reference number allocation
    pub sequence: SequenceConfig,

    /// Event broadcasting
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify access tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransferConfig {
    /// Receipt tolerance used when the caller does not supply one
    pub default_tolerance_percent: Decimal,

    /// Attempts for an operation that hit a concurrent modification
    pub conflict_retry_attempts: u32,

    /// Base delay between attempts; grows linearly
    pub conflict_retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SequenceConfig {
    /// Prefix of transfer reference numbers, e.g. BR-2025-00042
    pub prefix: String,

    /// Counter key for branch transfer requests
    pub order_type: String,

    /// Allocation attempts before giving up
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("RTX_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("transfer.default_tolerance_percent", "1.0")?
            .set_default("transfer.conflict_retry_attempts", 3)?
            .set_default("transfer.conflict_retry_backoff_ms", 50)?
            .set_default("sequence.prefix", "BR")?
            .set_default("sequence.order_type", "branch_request")?
            .set_default("sequence.max_attempts", 5)?
            .set_default("events.channel_capacity", 256)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (RTX_ prefix)
            .add_source(
                Environment::with_prefix("RTX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        shared::reconciliation::validate_tolerance(self.transfer.default_tolerance_percent)
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        if self.transfer.conflict_retry_attempts == 0 {
            return Err(ConfigError::Message(
                "transfer.conflict_retry_attempts must be at least 1".into(),
            ));
        }
        if self.sequence.max_attempts == 0 {
            return Err(ConfigError::Message(
                "sequence.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            default_tolerance_percent: shared::reconciliation::DEFAULT_TOLERANCE_PERCENT,
            conflict_retry_attempts: 3,
            conflict_retry_backoff_ms: 50,
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            prefix: "BR".to_string(),
            order_type: "branch_request".to_string(),
            max_attempts: 5,
        }
    }
}
