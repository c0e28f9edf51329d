use serde::Deserialize;

/// Default pattern excluding binary and static-asset links from discovery
pub const DEFAULT_EXCLUDE_PATTERN: &str =
    r"(?i)\.(pdf|jpg|jpeg|png|gif|svg|webp|css|js|zip|mp4|mp3)(\?|$)";

/// Main configuration structure for Sumi-Audit
///
/// Every section and key is optional in the TOML file; missing values fall
/// back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Seed URL; may instead come from the command line or environment
    pub target_url: Option<String>,

    /// Page budget (processed URLs, not kept pages)
    pub max_pages: usize,

    /// Minimum word count for a page to survive the thin-content filter
    pub min_words: usize,

    /// Keep pages below `min_words`
    pub include_thin: bool,

    /// Number of concurrent fetch workers
    pub workers: usize,

    /// Maximum in-flight fetches per registrable domain
    pub domain_concurrency: usize,

    /// Minimum time between requests to the same domain (milliseconds)
    pub delay_ms: u64,

    /// Only links matching this regex are enqueued
    pub include_pattern: Option<String>,

    /// Links matching this regex are never enqueued
    pub exclude_pattern: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            target_url: None,
            max_pages: 50,
            min_words: 400,
            include_thin: false,
            workers: 4,
            domain_concurrency: 2,
            delay_ms: 1200,
            include_pattern: None,
            exclude_pattern: Some(DEFAULT_EXCLUDE_PATTERN.to_string()),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SumiAudit".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// HTTP fetch limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,

    /// Whole-request timeout, including the body read
    pub total_timeout_secs: u64,

    /// Bodies above this size are discarded
    pub max_body_bytes: usize,

    /// Total attempts per URL, including the first
    pub max_attempts: u32,

    /// Fixed pause between attempts (milliseconds)
    pub retry_backoff_ms: u64,

    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            total_timeout_secs: 40,
            max_body_bytes: 4 * 1024 * 1024,
            max_attempts: 3,
            retry_backoff_ms: 1200,
            max_redirects: 10,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the markdown report; no report is written when unset
    pub report_path: Option<String>,

    /// Path to the CSV export of all results; none is written when unset
    pub csv_path: Option<String>,
}
