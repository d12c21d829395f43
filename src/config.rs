use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 5,
        }
    }
}

/// Public endpoints polled by the health monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeEndpoints {
    pub binance_url: String,
    pub wazirx_url: String,
    pub coindcx_url: String,
    pub cashfree_url: String,
}

impl Default for ExchangeEndpoints {
    fn default() -> Self {
        Self {
            binance_url: "https://api.binance.com/api/v3/ping".to_string(),
            wazirx_url: "https://api.wazirx.com/api/v2/ticker/24hr".to_string(),
            coindcx_url: "https://api.coindcx.com/exchange/ticker".to_string(),
            cashfree_url: "https://api.cashfree.com/pg/v1/orders".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// HMAC key for webhook signatures; verification is skipped when unset
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub environment: String,
    pub frontend_url: String,
    pub database_url: Option<String>,
    pub mongodb_url: Option<String>,
    pub redis_url: Option<String>,
    pub websocket_enabled: bool,
    pub health: HealthConfig,
    pub exchanges: ExchangeEndpoints,
    pub payments: PaymentsConfig,
    pub storage: StorageKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            environment: "production".to_string(),
            frontend_url: "https://cryptopulse-frontend.onrender.com".to_string(),
            database_url: None,
            mongodb_url: None,
            redis_url: None,
            websocket_enabled: false,
            health: HealthConfig::default(),
            exchanges: ExchangeEndpoints::default(),
            payments: PaymentsConfig::default(),
            storage: StorageKind::default(),
        }
    }
}

impl AppConfig {
    /// Build a configuration from defaults and environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Environment variables win over file values
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(host) = env_var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_var("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(environment) = env_var("APP_ENV") {
            self.environment = environment;
        }
        if let Some(url) = env_var("FRONTEND_URL") {
            self.frontend_url = url;
        }
        if let Some(url) = env_var("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(url) = env_var("MONGODB_URL") {
            self.mongodb_url = Some(url);
        }
        if let Some(url) = env_var("REDIS_URL") {
            self.redis_url = Some(url);
        }
        if let Some(enabled) = env_var("WEBSOCKET_ENABLED") {
            self.websocket_enabled = enabled == "true";
        }
        if let Some(secs) = env_var("HEALTH_CHECK_INTERVAL_SECS") {
            self.health.interval_secs = parse_env("HEALTH_CHECK_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = env_var("HEALTH_CHECK_TIMEOUT_SECS") {
            self.health.timeout_secs = parse_env("HEALTH_CHECK_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secret) = env_var("CASHFREE_WEBHOOK_SECRET") {
            self.payments.webhook_secret = Some(secret);
        }
        if let Some(kind) = env_var("SUBSCRIPTION_STORE") {
            self.storage = match kind.as_str() {
                "memory" => StorageKind::Memory,
                "postgres" => StorageKind::Postgres,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: "SUBSCRIPTION_STORE",
                        value: kind,
                    })
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.health.interval_secs == 0 || self.health.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "health interval and timeout must be at least one second".into(),
            ));
        }
        if self.health.timeout_secs >= self.health.interval_secs {
            return Err(ConfigError::Invalid(
                "health.timeout_secs must be shorter than health.interval_secs".into(),
            ));
        }
        if self.storage == StorageKind::Postgres && self.database_url.is_none() {
            return Err(ConfigError::Invalid(
                "storage = postgres requires database_url".into(),
            ));
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: value.to_string(),
    })
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Arc<AppConfig>, ConfigError> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut config: AppConfig = serde_yaml::from_str(&contents)?;
    config.apply_env_overrides()?;
    config.validate()?;

    info!(
        environment = %config.environment,
        storage = ?config.storage,
        "Configuration loaded successfully"
    );

    Ok(Arc::new(config))
}

/// Load configuration with fallback options
///
/// `CONFIG_PATH` first, then `config.yaml`/`config.yml` in the working
/// directory, then environment variables alone.
pub fn load_config_with_fallback() -> Result<Arc<AppConfig>, ConfigError> {
    if let Ok(config_path) = std::env::var("CONFIG_PATH") {
        match load_config(&config_path) {
            Ok(config) => return Ok(config),
            Err(e) => warn!(
                "Failed to load config from CONFIG_PATH ({}): {}",
                config_path, e
            ),
        }
    }

    for path in ["config.yaml", "config.yml"] {
        if Path::new(path).exists() {
            match load_config(path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Failed to load config from '{}': {}", path, e),
            }
        }
    }

    info!("No configuration file found, using environment variables");
    let config = AppConfig::from_env()?;
    config.validate()?;
    Ok(Arc::new(config))
}
