use config::{Config, ConfigError, Environment, File};
use http::HeaderValue;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_NOTIFICATION_LIST_LIMIT: u64 = 50;
const DEFAULT_ORPHAN_GRACE_SECS: u64 = 3600;
const MIN_JWT_SECRET_LEN: usize = 64;
const MIN_JWT_SECRET_DISTINCT_CHARS: usize = 10;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Server and admin CLI settings, layered by `load_config`.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Apply pending migrations before serving
    #[serde(default)]
    pub auto_migrate: bool,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `development` relaxes the CORS and signing-key rules
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// One JSON object per log line
    #[serde(default)]
    pub log_json: bool,

    /// HS256 signing key for bearer tokens (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,

    /// Token lifetime in seconds (5min - 24h)
    #[serde(default = "default_jwt_expiration_secs")]
    #[validate(range(min = 300, max = 86400))]
    pub jwt_expiration_secs: u64,

    /// Comma-separated browser origins of the shop front ends
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Upper bound on notifications returned by a single listing
    #[serde(default = "default_notification_list_limit")]
    #[validate(range(min = 1, max = 500))]
    pub notification_list_limit: u64,

    /// Period of the item-less pedido sweep; 0 disables it
    #[serde(default)]
    pub orphan_sweep_interval_secs: u64,

    /// Minimum age before an item-less pedido counts as orphaned
    #[serde(default = "default_orphan_grace_secs")]
    pub orphan_grace_secs: u64,
}

impl AppConfig {
    /// Creates a new configuration with defaults for every tunable
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            auto_migrate: false,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            jwt_secret,
            jwt_issuer: default_jwt_issuer(),
            jwt_audience: default_jwt_audience(),
            jwt_expiration_secs: default_jwt_expiration_secs(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            notification_list_limit: default_notification_list_limit(),
            orphan_sweep_interval_secs: 0,
            orphan_grace_secs: default_orphan_grace_secs(),
        }
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Comma-separated `cors_allowed_origins`, skipping blanks and values that are not valid headers.
    pub fn cors_origins(&self) -> Vec<HeaderValue> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect()
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Period of the orphan sweep, if enabled
    pub fn orphan_sweep_interval(&self) -> Option<Duration> {
        (self.orphan_sweep_interval_secs > 0)
            .then(|| Duration::from_secs(self.orphan_sweep_interval_secs))
    }

    pub fn orphan_grace(&self) -> Duration {
        Duration::from_secs(self.orphan_grace_secs)
    }

    /// Rules spanning several fields, only meaningful outside development.
    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !self.should_allow_permissive_cors() && self.cors_origins().is_empty() {
            errors.add(
                "cors_allowed_origins",
                rule(
                    "cors_allowed_origins_required",
                    "no usable CORS origin: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true",
                ),
            );
        }
        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            errors.add(
                "jwt_secret",
                rule(
                    "jwt_secret_default_dev",
                    "the well-known development signing key is refused outside development",
                ),
            );
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Runs field validation and the cross-field security checks
    pub fn validate_all(&self) -> Result<(), AppConfigError> {
        self.validate().map_err(|e| {
            error!("Configuration validation failed: {:?}", e);
            AppConfigError::Validation(e)
        })?;

        self.validate_additional_constraints().map_err(|e| {
            error!("Configuration security validation failed: {:?}", e);
            AppConfigError::Validation(e)
        })
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
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

fn default_jwt_issuer() -> String {
    "printshop-crm".to_string()
}

fn default_jwt_audience() -> String {
    "printshop-crm-api".to_string()
}

fn default_jwt_expiration_secs() -> u64 {
    3600
}

fn default_notification_list_limit() -> u64 {
    DEFAULT_NOTIFICATION_LIST_LIMIT
}

fn default_orphan_grace_secs() -> u64 {
    DEFAULT_ORPHAN_GRACE_SECS
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(rule("log_level", "log level must be trace, debug, info, warn or error"))
    }
}

/// Refuses signing keys that are short or built from a handful of repeated characters.
fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let secret = secret.trim();
    let distinct = secret.chars().collect::<HashSet<_>>().len();
    let problem = if secret.len() < MIN_JWT_SECRET_LEN {
        "JWT secret must be at least 64 characters"
    } else if distinct < MIN_JWT_SECRET_DISTINCT_CHARS {
        "JWT secret must use at least 10 distinct characters"
    } else {
        return Ok(());
    };

    Err(rule("jwt_secret", problem))
}

/// Initializes tracing using the provided log level as the default filter.
/// `RUST_LOG` wins when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("printshop_crm={},tower_http=debug,sqlx=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    if !Path::new(CONFIG_DIR).exists() {
        info!(%run_env, "no {CONFIG_DIR}/ directory, using defaults and APP__* only");
    }

    // jwt_secret deliberately has no default.
    let config = Config::builder()
        .set_default("database_url", "sqlite://printshop.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("APP__JWT_SECRET is not set; tokens cannot be signed");
        return Err(AppConfigError::Load(ConfigError::NotFound("jwt_secret".into())));
    }

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate_all()?;
    info!(environment = %app_config.environment, port = app_config.port, "configuration loaded");
    Ok(app_config)
}
