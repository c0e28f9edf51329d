//! CSV export of every crawl result
//!
//! Kept pages come first with their metrics and issue flags, followed by
//! one row per URL that was not kept. Metric columns are empty on those.

use crate::crawler::CrawlOutput;
use crate::output::metrics::{compute_metrics, PageMetrics};
use crate::output::OutputResult;
use crate::state::{OutcomeRecord, PageState};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    url: &'a str,
    state: &'static str,
    reason: &'static str,
    status: u16,
    final_url: &'a str,
    depth: Option<u32>,
    redirected: Option<bool>,
    title: &'a str,
    title_issue: &'a str,
    meta_description: &'a str,
    description_issue: &'a str,
    h1_count: Option<usize>,
    h1_anomaly: Option<bool>,
    canonical: &'a str,
    word_count: Option<usize>,
    images: Option<usize>,
    images_missing_alt: Option<usize>,
    alt_missing_heavy: Option<bool>,
    internal_links: Option<usize>,
    has_ldjson: Option<bool>,
    has_viewport: Option<bool>,
    seo_score: Option<u32>,
    ux_score: Option<u32>,
}

impl<'a> ResultRow<'a> {
    fn page(page: &'a PageMetrics) -> Self {
        Self {
            url: &page.url,
            state: PageState::Kept.as_str(),
            reason: "",
            status: page.status,
            final_url: &page.final_url,
            depth: Some(page.depth),
            redirected: Some(page.redirected),
            title: &page.title,
            title_issue: &page.title_issue,
            meta_description: &page.meta_description,
            description_issue: &page.description_issue,
            h1_count: Some(page.h1_count),
            h1_anomaly: Some(page.h1_anomaly),
            canonical: &page.canonical,
            word_count: Some(page.word_count),
            images: Some(page.images),
            images_missing_alt: Some(page.images_missing_alt),
            alt_missing_heavy: Some(page.alt_missing_heavy),
            internal_links: Some(page.internal_links),
            has_ldjson: Some(page.has_ldjson),
            has_viewport: Some(page.has_viewport),
            seo_score: Some(page.seo_score),
            ux_score: Some(page.ux_score),
        }
    }

    fn outcome(outcome: &'a OutcomeRecord) -> Self {
        Self {
            url: &outcome.url,
            state: outcome.state().as_str(),
            reason: outcome.reason.as_str(),
            status: outcome.status,
            final_url: "",
            depth: None,
            redirected: None,
            title: "",
            title_issue: "",
            meta_description: "",
            description_issue: "",
            h1_count: None,
            h1_anomaly: None,
            canonical: "",
            word_count: None,
            images: None,
            images_missing_alt: None,
            alt_missing_heavy: None,
            internal_links: None,
            has_ldjson: None,
            has_viewport: None,
            seo_score: None,
            ux_score: None,
        }
    }
}

/// Writes all crawl results as CSV to a file
///
/// # Arguments
///
/// * `output` - The crawl output
/// * `output_path` - Path where the CSV file should be written
pub fn write_csv_report(output: &CrawlOutput, output_path: &Path) -> OutputResult<()> {
    let file = File::create(output_path)?;
    write_csv(output, file)?;

    tracing::info!("Wrote CSV export to {}", output_path.display());
    Ok(())
}

/// Writes all crawl results as CSV, kept pages first, each group in URL order
pub fn write_csv<W: Write>(output: &CrawlOutput, writer: W) -> OutputResult<()> {
    let mut metrics: Vec<PageMetrics> = output.pages.values().map(compute_metrics).collect();
    metrics.sort_by(|a, b| a.url.cmp(&b.url));

    let mut outcomes: Vec<&OutcomeRecord> = output.outcomes.iter().collect();
    outcomes.sort_by(|a, b| a.url.cmp(&b.url));

    let mut csv = csv::Writer::from_writer(writer);
    for page in &metrics {
        csv.serialize(ResultRow::page(page))?;
    }
    for outcome in outcomes {
        csv.serialize(ResultRow::outcome(outcome))?;
    }
    csv.flush()?;

    Ok(())
}
