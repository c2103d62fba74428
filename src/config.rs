//! Service configuration, read from the environment after `.env` is loaded.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl RateLimitConfig {
    pub fn per_minute(requests: u32) -> Self {
        let capacity = f64::from(requests);
        Self { capacity, refill_per_sec: capacity / 60.0 }
    }

    /// Time for an empty bucket to fill up.
    pub fn refill_window(&self) -> Duration {
        if self.refill_per_sec > 0.0 { Duration::from_millis((self.capacity / self.refill_per_sec * 1000.0).round() as u64) } else { Duration::from_secs(60) }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self { Self::per_minute(5) }
}

/// Contact details printed on quotes and emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessProfile {
    pub name: String,
    pub abn: Option<String>,
    pub phone: Option<String>,
    pub sales_email: String,
    pub website: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub public_url: String,
    pub from_email: String,
    pub business: BusinessProfile,
    pub quote_rate_limit: RateLimitConfig,
    pub approval_token_days: i64,
    pub redirect_cache_ttl: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let public_url = get("PUBLIC_URL").unwrap_or_else(|| "http://localhost:8083".to_string());
        let public_url = public_url.trim_end_matches('/').to_string();
        let per_minute: u32 = parse_or(&get, "QUOTE_RATE_LIMIT_PER_MINUTE", 5)?;
        Ok(Self {
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_or(&get, "PORT", 8083)?,
            nats_url: get("NATS_URL"),
            from_email: get("FROM_EMAIL").unwrap_or_else(|| "noreply@example.com".to_string()),
            business: BusinessProfile {
                name: get("BUSINESS_NAME").unwrap_or_else(|| "Industrial Storefront".to_string()),
                abn: get("BUSINESS_ABN"),
                phone: get("BUSINESS_PHONE"),
                sales_email: get("SALES_EMAIL").unwrap_or_else(|| "sales@example.com".to_string()),
                website: public_url.clone(),
            },
            public_url,
            quote_rate_limit: RateLimitConfig::per_minute(per_minute),
            approval_token_days: parse_or(&get, "APPROVAL_TOKEN_DAYS", 7)?,
            redirect_cache_ttl: Duration::from_secs(parse_or(&get, "REDIRECT_CACHE_TTL_SECS", 60)?),
        })
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
