use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::exa::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::formatter::DEFAULT_MAX_TOTAL_TOKENS;
use crate::tokens::DEFAULT_PRICE_PER_MILLION;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for environment variable {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub exa_api_key: String,
    pub exa_base_url: String,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub cache_sweep_interval: Duration,
    /// Persist the cache here instead of in memory.
    pub cache_dir: Option<PathBuf>,
    pub max_response_tokens: usize,
    pub price_per_million_tokens: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load .env file if present
        Ok(Config {
            exa_api_key: get_env("EXA_API_KEY")?,
            exa_base_url: get_env_or_default("EXA_BASE_URL", DEFAULT_BASE_URL),
            request_timeout: Duration::from_secs(parse_env_or(
                "EXA_TIMEOUT_SECS",
                DEFAULT_TIMEOUT.as_secs(),
            )?),
            cache_ttl: Duration::from_secs(parse_env_or("CACHE_TTL_SECS", 300)?),
            cache_max_entries: parse_env_or("CACHE_MAX_ENTRIES", 100)?,
            cache_sweep_interval: Duration::from_secs(parse_env_or(
                "CACHE_SWEEP_INTERVAL_SECS",
                300,
            )?),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            max_response_tokens: parse_env_or("MAX_RESPONSE_TOKENS", DEFAULT_MAX_TOTAL_TOKENS)?,
            price_per_million_tokens: parse_env_or(
                "PRICE_PER_MILLION_TOKENS",
                DEFAULT_PRICE_PER_MILLION,
            )?,
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl,
            max_entries: self.cache_max_entries,
            sweep_interval: self.cache_sweep_interval,
        }
    }
}

fn get_env(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

#[test]
fn test_parse_env_or_default_when_unset() {
    let v: usize = parse_env_or("EXA_LENS_TEST_SURELY_UNSET_VAR", 42).unwrap();
    assert_eq!(v, 42);
}

#[test]
fn test_cache_config_mapping() {
    let config = Config {
        exa_api_key: "k".to_string(),
        exa_base_url: DEFAULT_BASE_URL.to_string(),
        request_timeout: DEFAULT_TIMEOUT,
        cache_ttl: Duration::from_secs(60),
        cache_max_entries: 7,
        cache_sweep_interval: Duration::from_secs(30),
        cache_dir: None,
        max_response_tokens: DEFAULT_MAX_TOTAL_TOKENS,
        price_per_million_tokens: DEFAULT_PRICE_PER_MILLION,
    };
    let cache = config.cache_config();
    assert_eq!(cache.ttl, Duration::from_secs(60));
    assert_eq!(cache.max_entries, 7);
    assert_eq!(cache.sweep_interval, Duration::from_secs(30));
}
