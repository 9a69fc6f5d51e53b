use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// `None` selects the in-process history cache.
    pub redis_url: Option<String>,
    pub cache_ttl: Duration,
    pub db_pool_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or_default("PORT", 8080)?,
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            cache_ttl: Duration::from_secs(parse_or_default("CACHE_TTL_SECS", 300)?),
            db_pool_size: parse_or_default("DB_POOL_SIZE", 10)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| ConfigError::Invalid {
                key: key.to_string(),
                reason: err.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_uses_default() {
        let value: u16 = parse_or_default("PVZ_TEST_UNSET_VARIABLE", 8080).unwrap();
        assert_eq!(value, 8080);
    }

    #[test]
    fn unparsable_variable_is_reported() {
        env::set_var("PVZ_TEST_BAD_PORT", "eighty");
        let err = parse_or_default::<u16>("PVZ_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(matches!(&err, ConfigError::Invalid { key, .. } if key == "PVZ_TEST_BAD_PORT"));
        assert!(err.to_string().starts_with("invalid PVZ_TEST_BAD_PORT: "));
        env::remove_var("PVZ_TEST_BAD_PORT");
    }
}
