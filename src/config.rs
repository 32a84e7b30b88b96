//! Environment-driven configuration for the three service binaries.
//!
//! Each service owns a typed config with `from_env`, defaults mirroring the
//! local docker-compose topology, and fail-fast validation: a malformed value
//! here is fatal and the process must not come up.

use std::env;

use anyhow::{bail, Context, Result};

pub const DEFAULT_SESSION_COOKIE: &str = "tradeboard_session";

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn get_or(lookup: Lookup, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn get_bool(lookup: Lookup, key: &str, default: bool) -> bool {
    match lookup(key) {
        Some(raw) => matches!(raw.as_str(), "1" | "true" | "TRUE" | "yes" | "on" | "ON"),
        None => default,
    }
}

fn parse_origins(raw: Option<String>, default: &str) -> Vec<String> {
    let raw = raw.unwrap_or_else(|| default.to_string());
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() {
        vec![default.to_string()]
    } else {
        origins
    }
}

/// Auth & user management service settings.
#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    pub starting_balance: f64,
    pub base_currency: String,
    pub session_ttl_minutes: i64,
    pub secure_cookies: bool,
    pub session_cookie_name: String,
    pub session_cookie_domain: Option<String>,
    pub db_path: String,
    pub redis_url: String,
    pub cors_origins: Vec<String>,
    pub http_host: String,
    pub http_port: u16,
    pub default_user_email: String,
    pub default_user_password: String,
}

impl AuthServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self> {
        let balance_raw = get_or(lookup, "AUTH_STARTING_BALANCE", "1000000");
        let starting_balance: f64 = balance_raw
            .parse()
            .with_context(|| format!("invalid AUTH_STARTING_BALANCE: {balance_raw}"))?;
        if starting_balance < 0.0 {
            bail!("AUTH_STARTING_BALANCE must be non-negative");
        }

        let base_currency = get_or(lookup, "AUTH_BASE_CURRENCY", "USD").to_uppercase();
        if base_currency.len() != 3 || !base_currency.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("AUTH_BASE_CURRENCY must be a 3-letter ISO code");
        }

        let ttl_raw = get_or(lookup, "AUTH_SESSION_TTL_MINUTES", "30");
        let session_ttl_minutes: i64 = ttl_raw
            .parse()
            .with_context(|| format!("invalid AUTH_SESSION_TTL_MINUTES: {ttl_raw}"))?;
        if session_ttl_minutes <= 0 {
            bail!("AUTH_SESSION_TTL_MINUTES must be positive");
        }

        let port_raw = get_or(lookup, "AUTH_HTTP_PORT", "8082");
        Ok(Self {
            starting_balance,
            base_currency,
            session_ttl_minutes,
            secure_cookies: get_bool(lookup, "AUTH_SECURE_COOKIES", true),
            session_cookie_name: get_or(lookup, "AUTH_SESSION_COOKIE_NAME", DEFAULT_SESSION_COOKIE),
            session_cookie_domain: lookup("AUTH_SESSION_COOKIE_DOMAIN"),
            db_path: get_or(lookup, "AUTH_DB_PATH", "tradeboard.db"),
            redis_url: get_or(lookup, "AUTH_REDIS_URL", "redis://127.0.0.1:6379/0"),
            cors_origins: parse_origins(lookup("AUTH_CORS_ORIGINS"), "http://localhost:5173"),
            http_host: get_or(lookup, "AUTH_HTTP_HOST", "0.0.0.0"),
            http_port: port_raw
                .parse()
                .with_context(|| format!("invalid AUTH_HTTP_PORT: {port_raw}"))?,
            default_user_email: get_or(lookup, "AUTH_DEFAULT_USER_EMAIL", "demo@example.com"),
            default_user_password: get_or(lookup, "AUTH_DEFAULT_USER_PASSWORD", "demo-password"),
        })
    }
}

/// Trading service settings.
#[derive(Debug, Clone)]
pub struct TradingServiceConfig {
    pub redis_url: String,
    pub db_path: String,
    pub execution_stream: String,
    pub book_prefix: String,
    pub session_cookie_name: String,
    pub session_ttl_minutes: i64,
    pub cors_origins: Vec<String>,
    pub http_host: String,
    pub http_port: u16,
}

impl TradingServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self> {
        let port_raw = get_or(lookup, "TRADING_HTTP_PORT", "8081");
        let redis_url = get_or(lookup, "TRADING_REDIS_URL", "redis://127.0.0.1:6379/0");
        if redis_url.trim().is_empty() {
            bail!("TRADING_REDIS_URL must not be empty");
        }
        let ttl_raw = get_or(lookup, "TRADING_SESSION_TTL_MINUTES", "30");
        let session_ttl_minutes: i64 = ttl_raw
            .parse()
            .with_context(|| format!("invalid TRADING_SESSION_TTL_MINUTES: {ttl_raw}"))?;
        if session_ttl_minutes <= 0 {
            bail!("TRADING_SESSION_TTL_MINUTES must be positive");
        }
        Ok(Self {
            redis_url,
            db_path: get_or(lookup, "TRADING_DB_PATH", "tradeboard.db"),
            execution_stream: get_or(lookup, "TRADING_EXECUTION_STREAM", "execution_stream"),
            book_prefix: get_or(lookup, "TRADING_BOOK_PREFIX", "marketdata:book"),
            session_cookie_name: get_or(
                lookup,
                "TRADING_SESSION_COOKIE_NAME",
                DEFAULT_SESSION_COOKIE,
            ),
            session_ttl_minutes,
            cors_origins: parse_origins(lookup("TRADING_CORS_ORIGINS"), "http://localhost:5173"),
            http_host: get_or(lookup, "TRADING_HTTP_HOST", "0.0.0.0"),
            http_port: port_raw
                .parse()
                .with_context(|| format!("invalid TRADING_HTTP_PORT: {port_raw}"))?,
        })
    }
}

/// Market data service settings. Instrument definitions arrive separately as
/// a JSON list in `MARKET_DATA_INSTRUMENTS`.
#[derive(Debug, Clone)]
pub struct MarketDataServiceConfig {
    pub redis_url: String,
    pub db_path: String,
    pub tick_stream: String,
    pub book_stream: String,
    pub quote_stream: String,
    pub book_prefix: String,
    pub pump_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub management_host: String,
    pub management_port: u16,
    pub cors_origins: Vec<String>,
    pub instruments_json: Option<String>,
}

impl MarketDataServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self> {
        let interval_raw = get_or(lookup, "MARKET_DATA_PUMP_INTERVAL_MS", "100");
        let pump_interval_ms: u64 = interval_raw
            .parse()
            .with_context(|| format!("invalid MARKET_DATA_PUMP_INTERVAL_MS: {interval_raw}"))?;
        if pump_interval_ms == 0 {
            bail!("MARKET_DATA_PUMP_INTERVAL_MS must be positive");
        }

        let attempts_raw = get_or(lookup, "MARKET_DATA_RETRY_ATTEMPTS", "3");
        let retry_attempts: u32 = attempts_raw
            .parse()
            .with_context(|| format!("invalid MARKET_DATA_RETRY_ATTEMPTS: {attempts_raw}"))?;
        if retry_attempts == 0 {
            bail!("MARKET_DATA_RETRY_ATTEMPTS must be positive");
        }

        let delay_raw = get_or(lookup, "MARKET_DATA_RETRY_BASE_DELAY_MS", "50");
        let port_raw = get_or(lookup, "MARKET_DATA_MANAGEMENT_PORT", "8080");
        Ok(Self {
            redis_url: get_or(lookup, "MARKET_DATA_REDIS_URL", "redis://127.0.0.1:6379/0"),
            db_path: get_or(lookup, "MARKET_DATA_DB_PATH", "tradeboard.db"),
            tick_stream: get_or(lookup, "MARKET_DATA_TICK_STREAM", "marketdata_stream"),
            book_stream: get_or(lookup, "MARKET_DATA_BOOK_STREAM", "orderbook_stream"),
            quote_stream: get_or(lookup, "MARKET_DATA_QUOTE_STREAM", "dealerquote_stream"),
            book_prefix: get_or(lookup, "MARKET_DATA_BOOK_PREFIX", "marketdata:book"),
            pump_interval_ms,
            retry_attempts,
            retry_base_delay_ms: delay_raw
                .parse()
                .with_context(|| format!("invalid MARKET_DATA_RETRY_BASE_DELAY_MS: {delay_raw}"))?,
            management_host: get_or(lookup, "MARKET_DATA_MANAGEMENT_HOST", "0.0.0.0"),
            management_port: port_raw
                .parse()
                .with_context(|| format!("invalid MARKET_DATA_MANAGEMENT_PORT: {port_raw}"))?,
            cors_origins: parse_origins(
                lookup("MARKET_DATA_CORS_ORIGINS"),
                "http://localhost:5173",
            ),
            instruments_json: lookup("MARKET_DATA_INSTRUMENTS"),
        })
    }
}
