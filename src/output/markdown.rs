//! Markdown report generation
//!
//! This module generates a human-readable markdown report of a crawl,
//! including run statistics, failure samples, on-page problems, and
//! per-page metrics.

use crate::crawler::CrawlOutput;
use crate::output::metrics::{compute_metrics, duplicate_titles, PageMetrics};
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown report of a crawl
///
/// # Arguments
///
/// * `output` - The crawl output
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_report(output: &CrawlOutput, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(output);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    tracing::info!("Wrote report to {}", output_path.display());
    Ok(())
}

/// Formats a crawl output as markdown
///
/// Pages are listed in URL order so reports are stable between runs.
pub fn format_markdown_report(output: &CrawlOutput) -> String {
    let stats = &output.stats;
    let mut md = String::new();

    md.push_str("# Sumi Audit Crawl Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", stats.started_at.to_rfc3339()));
    if let Some(finished) = stats.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(seconds) = stats.duration_seconds() {
        md.push_str(&format!("- **Duration**: {:.1} seconds\n", seconds));
    }
    md.push_str(&format!("- **robots.txt**: {}\n", stats.robots));
    if stats.cancelled {
        md.push_str("- **Cancelled**: results are partial\n");
    }
    md.push('\n');

    md.push_str("## Statistics\n\n");
    md.push_str("| Counter | Value |\n");
    md.push_str("|---------|-------|\n");
    let rows = [
        ("Fetch attempts", stats.crawled),
        ("200 HTML responses", stats.status_200_html),
        ("Fetch errors", stats.fetch_error),
        ("Redirected", stats.redirected),
        ("robots.txt denied", stats.robots_denied),
        ("Unsafe host denied", stats.unsafe_denied),
        ("noindex/nofollow", stats.skipped_noindex),
        ("Thin content", stats.filtered_thin),
        ("Pages kept", stats.final_kept),
    ];
    for (label, value) in rows {
        md.push_str(&format!("| {} | {} |\n", label, value));
    }
    if stats.task_failed > 0 {
        md.push_str(&format!("| Failed tasks | {} |\n", stats.task_failed));
    }
    md.push('\n');

    if !stats.fail_samples.is_empty() {
        md.push_str("## Failure Samples\n\n");
        md.push_str("| URL | Status | Reason | Final URL | Content-Type |\n");
        md.push_str("|-----|--------|--------|-----------|--------------|\n");
        for sample in &stats.fail_samples {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                escape_cell(&sample.url),
                sample.status,
                escape_cell(&sample.reason),
                escape_cell(&sample.final_url),
                escape_cell(&sample.content_type)
            ));
        }
        md.push('\n');
    }

    let mut metrics: Vec<PageMetrics> = output.pages.values().map(compute_metrics).collect();
    metrics.sort_by(|a, b| a.url.cmp(&b.url));

    if !metrics.is_empty() {
        format_problems(&mut md, &metrics);
    }

    md.push_str("## Pages\n\n");
    if metrics.is_empty() {
        md.push_str("No pages were kept.\n");
        return md;
    }

    md.push_str("| URL | Title | Words | Links | Alt | SEO | UX |\n");
    md.push_str("|-----|-------|-------|-------|-----|-----|----|\n");
    for page in &metrics {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {:.0}% | {} | {} |\n",
            escape_cell(&page.url),
            escape_cell(&page.title),
            page.word_count,
            page.internal_links,
            page.images_alt_ratio * 100.0,
            page.seo_score,
            page.ux_score
        ));
    }

    md
}

/// Appends the on-page problems found among kept pages
fn format_problems(md: &mut String, metrics: &[PageMetrics]) {
    let bad_title: Vec<&PageMetrics> = metrics.iter().filter(|p| !p.title_issue.is_empty()).collect();
    let bad_description: Vec<&PageMetrics> = metrics
        .iter()
        .filter(|p| !p.description_issue.is_empty())
        .collect();
    let h1_anomalies: Vec<&PageMetrics> = metrics.iter().filter(|p| p.h1_anomaly).collect();
    let missing_alt: Vec<&PageMetrics> = metrics.iter().filter(|p| p.alt_missing_heavy).collect();
    let duplicates = duplicate_titles(metrics);

    md.push_str("## Problems\n\n");
    md.push_str("| Problem | Pages |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Title length | {} |\n", bad_title.len()));
    md.push_str(&format!("| Meta description length | {} |\n", bad_description.len()));
    md.push_str(&format!("| H1 count not 1 | {} |\n", h1_anomalies.len()));
    md.push_str(&format!("| Images over 30% without alt | {} |\n", missing_alt.len()));
    md.push_str(&format!("| Duplicate title groups | {} |\n", duplicates.len()));
    md.push('\n');

    if !bad_title.is_empty() {
        md.push_str("### Title Issues\n\n");
        for page in &bad_title {
            md.push_str(&format!("- {}: {}\n", page.url, page.title_issue));
        }
        md.push('\n');
    }

    if !bad_description.is_empty() {
        md.push_str("### Meta Description Issues\n\n");
        for page in &bad_description {
            md.push_str(&format!("- {}: {}\n", page.url, page.description_issue));
        }
        md.push('\n');
    }

    if !h1_anomalies.is_empty() {
        md.push_str("### H1 Anomalies\n\n");
        for page in &h1_anomalies {
            md.push_str(&format!("- {}: {} h1 elements\n", page.url, page.h1_count));
        }
        md.push('\n');
    }

    if !missing_alt.is_empty() {
        md.push_str("### Missing Alt Text\n\n");
        for page in &missing_alt {
            md.push_str(&format!(
                "- {}: {} of {} images\n",
                page.url, page.images_missing_alt, page.images
            ));
        }
        md.push('\n');
    }

    if !duplicates.is_empty() {
        md.push_str("### Duplicate Titles\n\n");
        for (title, urls) in &duplicates {
            md.push_str(&format!("- \"{}\" ({} pages): {}\n", title, urls.len(), urls.join(", ")));
        }
        md.push('\n');
    }
}

/// Escapes characters that would break a table cell
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::PageRecord;
    use crate::output::{CrawlStats, FailureSample};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn create_test_output() -> CrawlOutput {
        let mut stats = CrawlStats::new();
        stats.crawled = 3;
        stats.status_200_html = 2;
        stats.fetch_error = 1;
        stats.final_kept = 2;
        stats.redirected = 1;
        stats.push_sample(FailureSample {
            url: "https://example.com/broken".to_string(),
            status: 500,
            final_url: "https://example.com/broken".to_string(),
            is_html: true,
            content_type: "text/html".to_string(),
            reason: "http_status".to_string(),
        });
        stats.finish(false);

        let mut pages = HashMap::new();
        for path in ["b", "a"] {
            let url = format!("https://example.com/{}", path);
            pages.insert(
                url.clone(),
                PageRecord {
                    url,
                    title: format!("Page {} | Site", path),
                    h1_count: 1,
                    word_count: 450,
                    ..Default::default()
                },
            );
        }

        CrawlOutput {
            pages,
            stats,
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn test_format_markdown_report() {
        let md = format_markdown_report(&create_test_output());

        assert!(md.contains("# Sumi Audit Crawl Report"));
        assert!(md.contains("## Statistics"));
        assert!(md.contains("| Fetch attempts | 3 |"));
        assert!(md.contains("| Pages kept | 2 |"));
        assert!(md.contains("| Redirected | 1 |"));
        assert!(!md.contains("Failed tasks"));
        assert!(md.contains("robots.txt**: not checked"));
    }

    #[test]
    fn test_failed_tasks_row() {
        let mut output = create_test_output();
        output.stats.task_failed = 2;
        let md = format_markdown_report(&output);
        assert!(md.contains("| Failed tasks | 2 |"));
    }

    #[test]
    fn test_problems_section() {
        let mut output = create_test_output();
        for record in output.pages.values_mut() {
            record.title = "Shared".to_string();
        }
        if let Some(record) = output.pages.get_mut("https://example.com/a") {
            record.h1_count = 0;
        }

        let md = format_markdown_report(&output);

        assert!(md.contains("## Problems"));
        assert!(md.contains("| Title length | 2 |"));
        assert!(md.contains("| Meta description length | 2 |"));
        assert!(md.contains("| H1 count not 1 | 1 |"));
        assert!(md.contains("| Images over 30% without alt | 0 |"));
        assert!(md.contains("| Duplicate title groups | 1 |"));
        assert!(md.contains("- https://example.com/a: 0 h1 elements"));
        assert!(md.contains("- https://example.com/a: too short (6)"));
        assert!(md.contains("- \"Shared\" (2 pages): https://example.com/a, https://example.com/b"));
        assert!(!md.contains("### Missing Alt Text"));

        let problems = md.find("## Problems").unwrap();
        let pages = md.find("## Pages").unwrap();
        assert!(problems < pages);
    }

    #[test]
    fn test_failure_samples_section() {
        let md = format_markdown_report(&create_test_output());
        assert!(md.contains("## Failure Samples"));
        assert!(md.contains("| https://example.com/broken | 500 | http_status |"));
    }

    #[test]
    fn test_pages_sorted_and_escaped() {
        let md = format_markdown_report(&create_test_output());
        let a = md.find("| https://example.com/a |").unwrap();
        let b = md.find("| https://example.com/b |").unwrap();
        assert!(a < b);
        assert!(md.contains("Page a \\| Site"));
    }

    #[test]
    fn test_empty_pages() {
        let mut output = create_test_output();
        output.pages.clear();
        let md = format_markdown_report(&output);
        assert!(md.contains("No pages were kept."));
        assert!(!md.contains("## Problems"));
    }

    #[test]
    fn test_generate_markdown_report_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");

        generate_markdown_report(&create_test_output(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Sumi Audit Crawl Report"));
    }
}
