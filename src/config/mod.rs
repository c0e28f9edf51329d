//! Configuration module for Sumi-Audit
//!
//! This module handles defaults, TOML configuration files, `AUDIT_*`
//! environment overrides, and validation.
//!
//! # Example
//!
//! ```no_run
//! use sumi_audit::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("audit.toml")).unwrap();
//! println!("Crawler will fetch at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetchConfig, OutputConfig, UserAgentConfig, DEFAULT_EXCLUDE_PATTERN,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, load_config, load_config_from_env, parse_config, ENV_CSV_PATH,
    ENV_DELAY_MS, ENV_DOMAIN_CONCURRENCY, ENV_INCLUDE_THIN, ENV_MAX_PAGES, ENV_MIN_WORDS,
    ENV_REPORT_PATH, ENV_TARGET_URL, ENV_WORKERS,
};

pub use validation::{compile_pattern, validate, validate_target_url, MAX_WORKERS};
