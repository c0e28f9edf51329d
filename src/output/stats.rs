//! Crawl statistics
//!
//! Run-scoped counters explaining what happened to every URL the crawl
//! touched. Owned and mutated by the coordinator only.

use crate::robots::RobotsStatus;
use chrono::{DateTime, Utc};

/// Maximum number of failure samples kept per run
pub const MAX_FAIL_SAMPLES: usize = 5;

/// Details of one failed fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSample {
    pub url: String,

    /// HTTP status (0 for transport failure, 451 for policy denial)
    pub status: u16,

    pub final_url: String,
    pub is_html: bool,
    pub content_type: String,

    /// Reason code, followed by detail when available
    pub reason: String,
}

/// Crawl statistics summary
///
/// `crawled == status_200_html + fetch_error` holds for every run: robots
/// and unsafe-host denials happen before any request and are not fetch
/// attempts. A worker task that dies is counted in `task_failed` only.
#[derive(Debug, Clone)]
pub struct CrawlStats {
    /// Fetch attempts (URLs that reached the fetcher)
    pub crawled: u64,

    /// Fetches that returned a 200 HTML body
    pub status_200_html: u64,

    /// URLs refused by robots.txt
    pub robots_denied: u64,

    /// URLs whose host resolved to non-public space before fetching
    pub unsafe_denied: u64,

    /// Pages that declared noindex/nofollow
    pub skipped_noindex: u64,

    /// Fetches that produced no usable body
    pub fetch_error: u64,

    /// Pages dropped by the thin-content filter
    pub filtered_thin: u64,

    /// Pages in the final output
    pub final_kept: u64,

    /// Fetches that ended on a different URL than requested
    pub redirected: u64,

    /// Worker tasks that panicked or were aborted before reporting
    pub task_failed: u64,

    /// Up to `MAX_FAIL_SAMPLES` failed fetches, first come first kept
    pub fail_samples: Vec<FailureSample>,

    /// How robots.txt was obtained
    pub robots: RobotsStatus,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Whether the run was stopped by cancellation
    pub cancelled: bool,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlStats {
    /// Creates zeroed statistics stamped with the current time
    pub fn new() -> Self {
        Self {
            crawled: 0,
            status_200_html: 0,
            robots_denied: 0,
            unsafe_denied: 0,
            skipped_noindex: 0,
            fetch_error: 0,
            filtered_thin: 0,
            final_kept: 0,
            redirected: 0,
            task_failed: 0,
            fail_samples: Vec::new(),
            robots: RobotsStatus::default(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
        }
    }

    /// Keeps a failure sample if fewer than `MAX_FAIL_SAMPLES` are held
    pub fn push_sample(&mut self, sample: FailureSample) {
        if self.fail_samples.len() < MAX_FAIL_SAMPLES {
            self.fail_samples.push(sample);
        }
    }

    /// Stamps the end of the run
    pub fn finish(&mut self, cancelled: bool) {
        self.finished_at = Some(Utc::now());
        self.cancelled = cancelled;
    }

    /// Run duration in seconds, if finished
    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// URLs that reached a terminal state
    pub fn processed(&self) -> u64 {
        self.crawled + self.robots_denied + self.unsafe_denied + self.task_failed
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Fetch attempts: {}", stats.crawled);
    println!("  200 HTML responses: {}", stats.status_200_html);
    println!("  Fetch errors: {}", stats.fetch_error);
    println!("  Redirected: {}", stats.redirected);
    println!("  Pages kept: {}", stats.final_kept);
    if stats.task_failed > 0 {
        println!("  Failed tasks: {}", stats.task_failed);
    }
    println!();

    println!("Skipped:");
    println!("  robots.txt denied: {}", stats.robots_denied);
    println!("  Unsafe host denied: {}", stats.unsafe_denied);
    println!("  noindex/nofollow: {}", stats.skipped_noindex);
    println!("  Thin content: {}", stats.filtered_thin);
    println!();

    println!("robots.txt: {}", stats.robots);
    if let Some(seconds) = stats.duration_seconds() {
        println!("Duration: {:.1}s", seconds);
    }
    if stats.cancelled {
        println!("Run was cancelled; results are partial");
    }
    println!();

    if !stats.fail_samples.is_empty() {
        println!("Failure Samples ({}):", stats.fail_samples.len());
        for sample in &stats.fail_samples {
            println!(
                "  - {} [{}] {} (final: {}, content-type: '{}')",
                sample.url, sample.status, sample.reason, sample.final_url, sample.content_type
            );
        }
        println!();
    }

    // Calculate success rate
    let success_rate = if stats.crawled > 0 {
        (stats.status_200_html as f64 / stats.crawled as f64) * 100.0
    } else {
        0.0
    };
    println!("Fetch success rate: {:.1}%", success_rate);
}
