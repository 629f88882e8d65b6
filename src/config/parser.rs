use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from defaults, an optional TOML file, and the process environment
///
/// Environment variables always override file values.
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use driftnet::config::load_config;
///
/// let config = load_config(None).unwrap();
/// println!("Max pages: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_from(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] but with an explicit variable lookup
///
/// Tests pass a closure over a fixed map instead of touching the process environment.
pub fn load_config_from<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => Config::default(),
    };

    apply_env(&mut config, lookup)?;
    validate(&config)?;

    Ok(config)
}

/// Loads defaults, file and environment without validating the result
///
/// Used by commands that only need the search engine or state database
/// settings, where a missing seed list is not an error.
pub fn load_config_unvalidated(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Applies recognized environment variables on top of `config`
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(seeds) = get("SEED_URLS") {
        config.crawler.seed_urls = split_list(&seeds);
    }
    if let Some(v) = get("MAX_PAGES") {
        config.crawler.max_pages = parse_value("MAX_PAGES", &v)?;
    }
    if let Some(v) = get("MAX_DEPTH") {
        config.crawler.max_depth = parse_value("MAX_DEPTH", &v)?;
    }
    if let Some(v) = get("CRAWL_DELAY") {
        config.crawler.crawl_delay = parse_value("CRAWL_DELAY", &v)?;
    }
    if let Some(v) = get("REQUEST_TIMEOUT") {
        config.crawler.request_timeout = parse_value("REQUEST_TIMEOUT", &v)?;
    }
    if let Some(v) = get("USER_AGENT") {
        config.crawler.user_agent = v;
    }
    if let Some(v) = get("CONCURRENCY") {
        config.crawler.concurrency = parse_value("CONCURRENCY", &v)?;
    }
    if let Some(v) = get("MAX_BODY_BYTES") {
        config.crawler.max_body_bytes = parse_value("MAX_BODY_BYTES", &v)?;
    }
    if let Some(v) = get("CRAWL_DEADLINE") {
        config.crawler.deadline = Some(parse_value("CRAWL_DEADLINE", &v)?);
    }
    if let Some(v) = get("MIN_CONTENT_CHARS") {
        config.crawler.min_content_chars = parse_value("MIN_CONTENT_CHARS", &v)?;
    }
    if let Some(v) = get("MAX_CONTENT_CHARS") {
        config.crawler.max_content_chars = parse_value("MAX_CONTENT_CHARS", &v)?;
    }
    if let Some(v) = get("SKIP_LOW_VALUE") {
        config.crawler.skip_low_value = parse_bool("SKIP_LOW_VALUE", &v)?;
    }
    if let Some(v) = get("MEILISEARCH_URL") {
        config.index.url = v;
    }
    if let Some(v) = get("MEILISEARCH_KEY") {
        config.index.api_key = Some(v);
    }
    if let Some(v) = get("INDEX_NAME") {
        config.index.name = v;
    }
    if let Some(v) = get("BATCH_SIZE") {
        config.index.batch_size = parse_value("BATCH_SIZE", &v)?;
    }
    if let Some(v) = get("BATCH_WINDOW") {
        config.index.batch_window = parse_value("BATCH_WINDOW", &v)?;
    }
    if let Some(v) = get("INDEX_MAX_RETRIES") {
        config.index.max_retries = parse_value("INDEX_MAX_RETRIES", &v)?;
    }
    if let Some(v) = get("STATE_DB_PATH") {
        config.storage.database_path = Some(v);
    }
    if let Some(v) = get("PERSIST_FINGERPRINTS") {
        config.storage.persist_fingerprints = parse_bool("PERSIST_FINGERPRINTS", &v)?;
    }

    Ok(())
}

/// Splits a comma-separated list, dropping blank items
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidEnv {
        key: key.to_string(),
        message: format!("'{}': {}", value, e),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            message: format!("'{}' is not a boolean", other),
        }),
    }
}

/// Computes a SHA-256 fingerprint of the effective configuration
///
/// The API key is excluded from serialization and therefore from the hash.
/// Recorded with each run so that history shows which settings produced it.
pub fn compute_config_hash(config: &Config) -> String {
    let rendered = serde_json::to_string(config).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    hex::encode(hasher.finalize())
}
