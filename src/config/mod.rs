//! Configuration module for Driftnet
//!
//! Settings come from built-in defaults, an optional TOML file, and
//! environment variables, in that order of precedence (last wins).
//!
//! # Example
//!
//! ```no_run
//! use driftnet::config::load_config;
//!
//! let config = load_config(None).unwrap();
//! println!("Crawler will fetch at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, IndexConfig, StorageConfig};

// Re-export parser functions
pub use parser::{
    apply_env, compute_config_hash, load_config, load_config_from, load_config_unvalidated,
};
pub use validation::validate;
