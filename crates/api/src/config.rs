//! Process configuration, read once at startup and passed down explicitly.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use storefront_infra::CheckoutConfig;
use storefront_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub checkout: CheckoutConfig,
    pub log_format: LogFormat,
}

impl ApiConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Whether `JWT_SECRET` was missing and the insecure dev secret is in use.
    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// Read configuration through `lookup` (key -> value).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", &bind_raw, e))?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let timeout_ms = parse_number(&get, "CHECKOUT_TIMEOUT_MS")?
            .unwrap_or(CheckoutConfig::DEFAULT_TIMEOUT.as_millis() as u64);
        if timeout_ms == 0 {
            return Err(ConfigError::invalid("CHECKOUT_TIMEOUT_MS", "0", "must be positive"));
        }
        let max_attempts = parse_number(&get, "CHECKOUT_MAX_ATTEMPTS")?.unwrap_or(1);
        let max_attempts = u32::try_from(max_attempts)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::invalid("CHECKOUT_MAX_ATTEMPTS", &max_attempts.to_string(), "must be 1..=u32::MAX")
            })?;

        let database_max_connections = parse_number(&get, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(10);
        let database_max_connections = u32::try_from(database_max_connections)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::invalid(
                    "DATABASE_MAX_CONNECTIONS",
                    &database_max_connections.to_string(),
                    "must be 1..=u32::MAX",
                )
            })?;

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", &raw, e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            checkout: CheckoutConfig::new(Duration::from_millis(timeout_ms), max_attempts),
            log_format,
        })
    }
}

fn parse_number(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid(key, &raw, e))
        })
        .transpose()
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("checkout", &self.checkout)
            .field("log_format", &self.log_format)
            .finish()
    }
}
