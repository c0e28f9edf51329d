//! Sumi-Audit main entry point
//!
//! This is the command-line interface for the Sumi-Audit site crawler.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_audit::config::{load_config_from_env, validate, Config};
use sumi_audit::crawler::crawl;
use sumi_audit::output::{
    compute_metrics, generate_markdown_report, print_page_metrics, print_statistics,
    write_csv_report,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Audit: a polite site crawler for SEO/UX audits
///
/// Sumi-Audit crawls one site breadth-first, staying inside the seed's
/// registrable domain, respecting robots.txt and noindex directives, and
/// refusing hosts that resolve to private or reserved addresses. Kept pages
/// are scored with rule-based SEO and UX metrics.
#[derive(Parser, Debug)]
#[command(name = "sumi-audit")]
#[command(version)]
#[command(about = "A polite site crawler for SEO/UX audits", long_about = None)]
struct Cli {
    /// Seed URL (http or https)
    #[arg(value_name = "URL", env = "AUDIT_TARGET_URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of URLs to process
    #[arg(long, env = "AUDIT_MAX_PAGES")]
    max_pages: Option<usize>,

    /// Minimum word count for a page to be kept
    #[arg(long, env = "AUDIT_MIN_WORDS")]
    min_words: Option<usize>,

    /// Keep pages below the word threshold
    #[arg(long)]
    include_thin: bool,

    /// Minimum delay between requests to the same domain, in milliseconds
    #[arg(long, env = "AUDIT_DELAY_MS")]
    delay_ms: Option<u64>,

    /// Maximum concurrent requests per domain
    #[arg(long, env = "AUDIT_DOMAIN_CONCURRENCY")]
    domain_concurrency: Option<usize>,

    /// Number of concurrent fetch workers
    #[arg(long, env = "AUDIT_WORKERS")]
    workers: Option<usize>,

    /// Write a markdown report to this path
    #[arg(long, value_name = "FILE", env = "AUDIT_REPORT_PATH")]
    report: Option<PathBuf>,

    /// Write a CSV export of all results to this path
    #[arg(long, value_name = "FILE", env = "AUDIT_CSV_PATH")]
    csv: Option<PathBuf>,

    /// Validate configuration and print it without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_audit=info,warn"),
            1 => EnvFilter::new("sumi_audit=debug,info"),
            2 => EnvFilter::new("sumi_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Layers defaults, the config file, the environment, and CLI flags
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    if let Some(path) = &cli.config {
        tracing::info!("Loading configuration from: {}", path.display());
    }
    let mut config = load_config_from_env(cli.config.as_deref())
        .context("failed to load configuration")?;

    if let Some(url) = &cli.url {
        config.crawler.target_url = Some(url.clone());
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(min_words) = cli.min_words {
        config.crawler.min_words = min_words;
    }
    if cli.include_thin {
        config.crawler.include_thin = true;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.crawler.delay_ms = delay_ms;
    }
    if let Some(concurrency) = cli.domain_concurrency {
        config.crawler.domain_concurrency = concurrency;
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if let Some(report) = &cli.report {
        config.output.report_path = Some(report.display().to_string());
    }
    if let Some(csv) = &cli.csv {
        config.output.csv_path = Some(csv.display().to_string());
    }

    Ok(config)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Audit Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Target: {}",
        config.crawler.target_url.as_deref().unwrap_or("(none)")
    );
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Min words: {}", config.crawler.min_words);
    println!("  Include thin: {}", config.crawler.include_thin);
    println!("  Workers: {}", config.crawler.workers);
    println!(
        "  Per-domain concurrency: {}",
        config.crawler.domain_concurrency
    );
    println!("  Per-domain delay: {}ms", config.crawler.delay_ms);
    if let Some(pattern) = &config.crawler.include_pattern {
        println!("  Include pattern: {}", pattern);
    }
    if let Some(pattern) = &config.crawler.exclude_pattern {
        println!("  Exclude pattern: {}", pattern);
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nFetch:");
    println!(
        "  Timeouts: connect {}s, total {}s",
        config.fetch.connect_timeout_secs, config.fetch.total_timeout_secs
    );
    println!("  Max body: {} bytes", config.fetch.max_body_bytes);
    println!("  Attempts: {}", config.fetch.max_attempts);

    if let Some(path) = &config.output.report_path {
        println!("\nReport: {}", path);
    }
    if let Some(path) = &config.output.csv_path {
        println!("CSV export: {}", path);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let report_path = config.output.report_path.clone();
    let csv_path = config.output.csv_path.clone();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            signal_token.cancel();
        }
    });

    let output = match crawl(config, cancel).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print_statistics(&output.stats);
    println!();

    let metrics: Vec<_> = output.pages.values().map(compute_metrics).collect();
    print_page_metrics(&metrics);

    if let Some(path) = report_path {
        generate_markdown_report(&output, Path::new(&path))
            .with_context(|| format!("failed to write report to {}", path))?;
        println!("\n✓ Report written to: {}", path);
    }

    if let Some(path) = csv_path {
        write_csv_report(&output, Path::new(&path))
            .with_context(|| format!("failed to write CSV export to {}", path))?;
        println!("✓ CSV export written to: {}", path);
    }

    Ok(())
}
