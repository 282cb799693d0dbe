use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_IDEMPOTENCY_BACKEND: &str = "in-memory";
const DEFAULT_IDEMPOTENCY_TTL_SECS: u64 = 600;
const DEFAULT_IDEMPOTENCY_NAMESPACE: &str = "assettrack:idem";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Idempotency guard backend: "in-memory" (single instance) or "redis"
    /// (shared across instances)
    #[serde(default = "default_idempotency_backend")]
    pub idempotency_backend: String,

    /// Replay window for completed stock exits (seconds)
    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,

    /// Namespace for idempotency keys when Redis is enabled
    #[serde(default = "default_idempotency_namespace")]
    pub idempotency_namespace: String,

    /// Redis connection URL; required when idempotency_backend = "redis"
    #[serde(default)]
    pub redis_url: Option<String>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_idempotency_backend() -> String {
    DEFAULT_IDEMPOTENCY_BACKEND.to_string()
}

fn default_idempotency_ttl_secs() -> u64 {
    DEFAULT_IDEMPOTENCY_TTL_SECS
}

fn default_idempotency_namespace() -> String {
    DEFAULT_IDEMPOTENCY_NAMESPACE.to_string()
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Convenience constructor used by tests and embedding code.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            idempotency_backend: default_idempotency_backend(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
            idempotency_namespace: default_idempotency_namespace(),
            redis_url: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Cross-field checks the derive-level validators cannot express.
    pub fn validate_additional_constraints(&self) -> Result<(), AppConfigError> {
        match self.idempotency_backend.as_str() {
            "in-memory" => Ok(()),
            "redis" => {
                if self.redis_url.is_none() {
                    return Err(AppConfigError::Invalid(
                        "idempotency_backend = \"redis\" requires redis_url".into(),
                    ));
                }
                Ok(())
            }
            other => Err(AppConfigError::Invalid(format!(
                "unknown idempotency_backend \"{}\" (expected \"in-memory\" or \"redis\")",
                other
            ))),
        }
    }
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://assettrack.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints()?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        assert_eq!(cfg.idempotency_backend, "in-memory");
        assert_eq!(cfg.idempotency_ttl_secs, 600);
        assert!(!cfg.is_production());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn redis_backend_requires_url() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        cfg.idempotency_backend = "redis".into();
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.redis_url = Some("redis://127.0.0.1:6379".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        cfg.idempotency_backend = "memcached".into();
        assert!(cfg.validate_additional_constraints().is_err());
    }
}
