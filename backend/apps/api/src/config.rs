//! Server Configuration
//!
//! Everything read from the environment at startup.

use std::env;
use std::time::Duration;

use anyhow::{Context, bail};
use credential::AuthConfig;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_DAY: u64 = 24 * 3600;

#[derive(Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub redis_url: String,
    pub max_connections: u32,
    pub port: u16,
    pub frontend_origins: Vec<String>,
    pub sweep_interval: Duration,
    pub auth: AuthConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());

        let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let port = parse_or("REST_PORT", DEFAULT_PORT)?;
        let sweep_interval =
            Duration::from_secs(parse_or("SESSION_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?);

        let frontend_origins = env::var("FRONTEND_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url,
            redis_url,
            max_connections,
            port,
            frontend_origins,
            sweep_interval,
            auth: auth_config()?,
        })
    }
}

fn auth_config() -> anyhow::Result<AuthConfig> {
    let production = env::var("ENV").is_ok_and(|v| v.eq_ignore_ascii_case("production"));

    let base = match env::var("JWT_SECRET") {
        Ok(secret) => AuthConfig::with_secret(secret.into_bytes()),
        Err(_) if cfg!(debug_assertions) => {
            tracing::warn!("JWT_SECRET not set, using a random key; tokens will not survive a restart");
            AuthConfig::with_random_secret()
        }
        Err(_) => bail!("JWT_SECRET must be set in release builds"),
    };

    let mut config = AuthConfig {
        cookie_secure: production,
        password_pepper: env::var("PASSWORD_PEPPER").ok().map(String::into_bytes),
        ..base
    };

    if let Some(minutes) = parse_opt::<u64>("ACCESS_TOKEN_TTL_MINUTES")? {
        config.access_token_ttl = scaled("ACCESS_TOKEN_TTL_MINUTES", minutes, SECS_PER_MINUTE)?;
    }
    if let Some(days) = parse_opt::<u64>("REFRESH_TOKEN_TTL_DAYS")? {
        config.refresh_token_ttl = scaled("REFRESH_TOKEN_TTL_DAYS", days, SECS_PER_DAY)?;
    }

    config.validate().context("invalid credential configuration")?;

    Ok(config)
}

/// `value` units of `unit_secs` seconds each
fn scaled(name: &str, value: u64, unit_secs: u64) -> anyhow::Result<Duration> {
    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .with_context(|| format!("{name} is too large: {value}"))
}

fn parse_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(name)?.unwrap_or(default))
}

fn parse_opt<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("{name} is not valid: {raw:?}")),
        Err(_) => Ok(None),
    }
}
