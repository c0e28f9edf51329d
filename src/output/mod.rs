//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Run statistics and failure samples
//! - Rule-based per-page metrics, issue flags, and scores
//! - Markdown report generation
//! - CSV export of all results

mod export;
mod markdown;
mod metrics;
pub mod stats;

pub use export::{write_csv, write_csv_report};
pub use markdown::{format_markdown_report, generate_markdown_report};
pub use metrics::{
    compute_metrics, duplicate_titles, PageMetrics, DESCRIPTION_LENGTH, MISSING_ALT_THRESHOLD,
    TITLE_LENGTH,
};
pub use stats::{print_statistics, CrawlStats, FailureSample, MAX_FAIL_SAMPLES};

use thiserror::Error;

/// Errors that can occur while producing output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type OutputResult<T> = Result<T, OutputError>;

/// Prints per-page metrics to stdout, sorted by URL
pub fn print_page_metrics(metrics: &[PageMetrics]) {
    if metrics.is_empty() {
        println!("No pages were kept.");
        return;
    }

    let mut sorted: Vec<&PageMetrics> = metrics.iter().collect();
    sorted.sort_by(|a, b| a.url.cmp(&b.url));

    println!("=== Page Metrics ===\n");
    for page in sorted {
        println!("{}", page.url);
        println!(
            "  SEO {:>3}  UX {:>3}  words {}  links {}  alt {:.0}%",
            page.seo_score,
            page.ux_score,
            page.word_count,
            page.internal_links,
            page.images_alt_ratio * 100.0
        );
        let mut missing = Vec::new();
        if page.title.is_empty() {
            missing.push("title");
        }
        if !page.has_meta_description {
            missing.push("meta description");
        }
        if !page.has_h1 {
            missing.push("h1");
        }
        if !page.has_viewport {
            missing.push("viewport");
        }
        if !missing.is_empty() {
            println!("  missing: {}", missing.join(", "));
        }
        if page.has_issues() {
            let mut issues = Vec::new();
            if !page.title_issue.is_empty() {
                issues.push(format!("title {}", page.title_issue));
            }
            if !page.description_issue.is_empty() {
                issues.push(format!("description {}", page.description_issue));
            }
            if page.h1_anomaly {
                issues.push(format!("{} h1 elements", page.h1_count));
            }
            if page.alt_missing_heavy {
                issues.push(format!("{}/{} images without alt", page.images_missing_alt, page.images));
            }
            println!("  issues: {}", issues.join("; "));
        }
    }
}
