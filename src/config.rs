use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Configuration - environment variables, optionally seeded from `.env`
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("expected postgres or memory, got {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    /// Set whenever `store` is `Postgres`
    pub database_url: Option<String>,
    pub redis_url: String,
    pub orders_queue: String,
    pub products_queue: String,
    pub rpc_timeout: Duration,
    pub product_retry_attempts: u32,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = parsed(&lookup, "ORDERS_STORE", StoreBackend::Postgres)?;

        let database_url = match store {
            StoreBackend::Postgres => Some(required(&lookup, "DATABASE_URL")?),
            StoreBackend::Memory => lookup("DATABASE_URL"),
        };

        let rpc_timeout_ms: u64 = parsed(&lookup, "RPC_TIMEOUT_MS", 5000)?;
        if rpc_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "RPC_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            store,
            database_url,
            redis_url: required(&lookup, "REDIS_URL")?,
            orders_queue: lookup("ORDERS_QUEUE").unwrap_or_else(|| "orders.requests".to_string()),
            products_queue: lookup("PRODUCTS_QUEUE").unwrap_or_else(|| "products.requests".to_string()),
            rpc_timeout: Duration::from_millis(rpc_timeout_ms),
            product_retry_attempts: parsed(&lookup, "PRODUCT_RETRY_ATTEMPTS", 1)?,
            metrics_port: parsed(&lookup, "METRICS_PORT", 9090)?,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<String, ConfigError> {
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
