use crate::config::types::{Config, CrawlerConfig, FetchConfig, UserAgentConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Upper bound on the worker pool size
pub const MAX_WORKERS: usize = 64;

/// Smallest accepted body cap
pub const MIN_BODY_BYTES: usize = 1024;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_fetch_config(&config.fetch)?;
    Ok(())
}

/// Compiles an optional include/exclude pattern
///
/// # Returns
///
/// * `Ok(None)` - No pattern configured (or blank)
/// * `Ok(Some(Regex))` - Compiled pattern
/// * `Err(ConfigError::InvalidPattern)` - The pattern does not compile
pub fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    match pattern.map(str::trim) {
        None | Some("") => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e))),
    }
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.domain_concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "domain_concurrency must be >= 1, got {}",
            config.domain_concurrency
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    compile_pattern(config.include_pattern.as_deref())?;
    compile_pattern(config.exclude_pattern.as_deref())?;

    if let Some(target) = &config.target_url {
        validate_target_url(target)?;
    }

    Ok(())
}

/// Validates the seed URL: absolute http/https with a host
pub fn validate_target_url(target: &str) -> Result<(), ConfigError> {
    let url = Url::parse(target.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", target, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Target URL '{}' must use http or https",
            target
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!(
            "Target URL '{}' has no host",
            target
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Name doubles as the robots.txt product token
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only ASCII letters, digits, '-' and '_', got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Validates fetch limits
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if !(1..=10).contains(&config.max_attempts) {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.max_body_bytes < MIN_BODY_BYTES {
        return Err(ConfigError::Validation(format!(
            "max_body_bytes must be >= {}, got {}",
            MIN_BODY_BYTES, config.max_body_bytes
        )));
    }

    if config.total_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}
