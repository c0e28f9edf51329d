//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retries, redirect checks, and body caps
//! - HTML extraction of metadata, links, and main text
//! - Per-domain politeness (concurrency and delay)
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{crawl_site, CrawlOutput, CrawlTarget, Crawler, CrawlerBuilder};
pub use fetcher::{
    build_http_client, is_html_content_type, FetchDiagnostics, FetchFailure, FetchResponse,
    Fetcher, TextResponse,
};
pub use parser::{
    count_paragraphs, count_words, extract, is_skip_directive, Extraction, ImageEntry, PageRecord,
};
pub use scheduler::{PolitenessController, PolitePermit};

use crate::config::Config;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl from a configuration
///
/// This is the main entry point used by the CLI. It will:
/// 1. Validate the configuration and seed URL
/// 2. Build the HTTP client
/// 3. Load robots.txt and crawl until the budget is spent, the frontier is
///    empty, or `cancel` fires
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `cancel` - Stops new fetches when cancelled
///
/// # Returns
///
/// * `Ok(CrawlOutput)` - Crawl completed (possibly partial if cancelled)
/// * `Err(AuditError)` - Crawl could not start
pub async fn crawl(config: Config, cancel: CancellationToken) -> crate::Result<CrawlOutput> {
    Crawler::builder(config).build()?.run(cancel).await
}
