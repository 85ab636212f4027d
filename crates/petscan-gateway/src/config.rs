//! Gateway configuration from environment variables
//!
//! Read once at startup; everything downstream receives plain values.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use petscan_worker::InvokerConfig;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_JWT_EXPIRATION_MS: i64 = 86_400_000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Invalid or missing configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the gateway needs to start
#[derive(Clone)]
pub struct GatewayConfig {
    pub port: u16,
    /// Base64 HMAC signing secret
    pub jwt_secret: String,
    pub jwt_expiration_ms: i64,
    pub worker: InvokerConfig,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub database_url: Option<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("jwt_secret", &"[redacted]")
            .field("jwt_expiration_ms", &self.jwt_expiration_ms)
            .field("worker", &self.worker)
            .field("allowed_origins", &self.allowed_origins)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("database_url", &self.database_url.as_ref().map(|_| "[set]"))
            .finish()
    }
}

impl GatewayConfig {
    /// Configuration with defaults for everything but the secret
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: jwt_secret.into(),
            jwt_expiration_ms: DEFAULT_JWT_EXPIRATION_MS,
            worker: InvokerConfig::default(),
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            database_url: None,
        }
    }

    /// Read `PETSCAN_*` variables from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let jwt_secret = get("PETSCAN_JWT_SECRET").ok_or(ConfigError::Missing("PETSCAN_JWT_SECRET"))?;
        let mut config = Self::new(jwt_secret);

        if let Some(v) = get("PETSCAN_PORT") {
            config.port = parse("PETSCAN_PORT", v)?;
        }
        if let Some(v) = get("PETSCAN_JWT_EXPIRATION_MS") {
            config.jwt_expiration_ms = parse("PETSCAN_JWT_EXPIRATION_MS", v)?;
            if config.jwt_expiration_ms <= 0 {
                return Err(invalid("PETSCAN_JWT_EXPIRATION_MS", v, "must be positive"));
            }
        }
        if let Some(v) = get("PETSCAN_WORKER_INTERPRETER") {
            config.worker.interpreter = PathBuf::from(v);
        }
        if let Some(v) = get("PETSCAN_WORKER_SCRIPT") {
            config.worker.worker = v.to_string();
        }
        if let Some(v) = get("PETSCAN_WORKER_TIMEOUT_SECS") {
            let secs: u64 = parse("PETSCAN_WORKER_TIMEOUT_SECS", v)?;
            if secs == 0 {
                return Err(invalid("PETSCAN_WORKER_TIMEOUT_SECS", v, "must be positive"));
            }
            config.worker.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = get("PETSCAN_ALLOWED_ORIGINS") {
            config.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("PETSCAN_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse("PETSCAN_MAX_UPLOAD_BYTES", v)?;
        }
        config.database_url = get("PETSCAN_DATABASE_URL").map(String::from);

        Ok(config)
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| invalid(name, value, e))
}

fn invalid(name: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
