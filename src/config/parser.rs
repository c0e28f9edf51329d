use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;
use std::str::FromStr;

pub const ENV_TARGET_URL: &str = "AUDIT_TARGET_URL";
pub const ENV_MAX_PAGES: &str = "AUDIT_MAX_PAGES";
pub const ENV_MIN_WORDS: &str = "AUDIT_MIN_WORDS";
pub const ENV_INCLUDE_THIN: &str = "AUDIT_INCLUDE_THIN";
pub const ENV_DELAY_MS: &str = "AUDIT_DELAY_MS";
pub const ENV_DOMAIN_CONCURRENCY: &str = "AUDIT_DOMAIN_CONCURRENCY";
pub const ENV_WORKERS: &str = "AUDIT_WORKERS";
pub const ENV_REPORT_PATH: &str = "AUDIT_REPORT_PATH";
pub const ENV_CSV_PATH: &str = "AUDIT_CSV_PATH";

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_audit::config::load_config;
///
/// let config = load_config(Path::new("audit.toml")).unwrap();
/// println!("Page budget: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads configuration with the process environment layered on top
///
/// Precedence: defaults < TOML file (if given) < `AUDIT_*` variables.
pub fn load_config_from_env(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Applies `AUDIT_*` overrides using the given variable lookup
///
/// Unset and blank variables leave the configuration untouched.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_TARGET_URL) {
        config.crawler.target_url = Some(v.trim().to_string());
    }
    if let Some(v) = get(ENV_MAX_PAGES) {
        config.crawler.max_pages = parse_env(ENV_MAX_PAGES, &v)?;
    }
    if let Some(v) = get(ENV_MIN_WORDS) {
        config.crawler.min_words = parse_env(ENV_MIN_WORDS, &v)?;
    }
    if let Some(v) = get(ENV_INCLUDE_THIN) {
        config.crawler.include_thin = parse_bool(ENV_INCLUDE_THIN, &v)?;
    }
    if let Some(v) = get(ENV_DELAY_MS) {
        config.crawler.delay_ms = parse_env(ENV_DELAY_MS, &v)?;
    }
    if let Some(v) = get(ENV_DOMAIN_CONCURRENCY) {
        config.crawler.domain_concurrency = parse_env(ENV_DOMAIN_CONCURRENCY, &v)?;
    }
    if let Some(v) = get(ENV_WORKERS) {
        config.crawler.workers = parse_env(ENV_WORKERS, &v)?;
    }
    if let Some(v) = get(ENV_REPORT_PATH) {
        config.output.report_path = Some(v.trim().to_string());
    }
    if let Some(v) = get(ENV_CSV_PATH) {
        config.output.csv_path = Some(v.trim().to_string());
    }

    Ok(())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
target-url = "https://example.com/"
max-pages = 20
min-words = 250
workers = 8
delay-ms = 500

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"

[fetch]
max-attempts = 2

[output]
report-path = "./report.md"
csv-path = "./results.csv"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(
            config.crawler.target_url.as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(config.crawler.max_pages, 20);
        assert_eq!(config.crawler.min_words, 250);
        assert_eq!(config.crawler.workers, 8);
        assert_eq!(config.crawler.delay_ms, 500);
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
        assert_eq!(config.fetch.max_attempts, 2);
        assert_eq!(config.output.report_path.as_deref(), Some("./report.md"));
        assert_eq!(config.output.csv_path.as_deref(), Some("./results.csv"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_config("[crawler]\nmax-pages = 5\n").unwrap();
        assert_eq!(config.crawler.max_pages, 5);
        assert_eq!(config.crawler.min_words, 400);
        assert_eq!(config.crawler.domain_concurrency, 2);
        assert_eq!(config.fetch.max_body_bytes, 4 * 1024 * 1024);
        assert_eq!(config.fetch.total_timeout_secs, 40);
        assert!(config.output.report_path.is_none());
        assert!(config.output.csv_path.is_none());
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = parse_config("").unwrap();
        assert_eq!(config.crawler.max_pages, 50);
        assert_eq!(config.crawler.delay_ms, 1200);
        assert_eq!(config.crawler.workers, 4);
    }

    #[test]
    fn test_invalid_toml() {
        let result = parse_config("[crawler\nmax-pages = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_runs_on_load() {
        let file = create_temp_config("[crawler]\nworkers = 0\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/nonexistent/audit.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_TARGET_URL, "https://example.org/"),
                (ENV_MAX_PAGES, "10"),
                (ENV_MIN_WORDS, "100"),
                (ENV_INCLUDE_THIN, "true"),
                (ENV_DELAY_MS, "0"),
                (ENV_DOMAIN_CONCURRENCY, "3"),
                (ENV_WORKERS, "6"),
                (ENV_REPORT_PATH, "out.md"),
                (ENV_CSV_PATH, "out.csv"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.crawler.target_url.as_deref(),
            Some("https://example.org/")
        );
        assert_eq!(config.crawler.max_pages, 10);
        assert_eq!(config.crawler.min_words, 100);
        assert!(config.crawler.include_thin);
        assert_eq!(config.crawler.delay_ms, 0);
        assert_eq!(config.crawler.domain_concurrency, 3);
        assert_eq!(config.crawler.workers, 6);
        assert_eq!(config.output.report_path.as_deref(), Some("out.md"));
        assert_eq!(config.output.csv_path.as_deref(), Some("out.csv"));
    }

    #[test]
    fn test_env_blank_values_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[(ENV_MAX_PAGES, "  ")])).unwrap();
        assert_eq!(config.crawler.max_pages, 50);
    }

    #[test]
    fn test_env_invalid_number() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, env(&[(ENV_WORKERS, "many")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_env_invalid_bool() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, env(&[(ENV_INCLUDE_THIN, "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_file_then_env_precedence() {
        let mut config = parse_config("[crawler]\nmax-pages = 20\nmin-words = 300\n").unwrap();
        apply_env_overrides(&mut config, env(&[(ENV_MAX_PAGES, "7")])).unwrap();
        assert_eq!(config.crawler.max_pages, 7);
        assert_eq!(config.crawler.min_words, 300);
    }
}
