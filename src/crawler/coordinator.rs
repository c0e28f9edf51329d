//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Validating the seed and loading robots.txt
//! - Managing the frontier queue and the visited set
//! - Dispatching fetches to a bounded pool of worker tasks
//! - Counting outcomes and applying the page budget
//! - Handling cancellation and the final thin-content filter
//!
//! The frontier, visited set, and statistics are owned by the coordinating
//! task. Workers only report back through their join handles.

use crate::config::{compile_pattern, validate, Config};
use crate::crawler::fetcher::{FetchDiagnostics, FetchResponse, Fetcher};
use crate::crawler::parser::{self, is_skip_directive, Extraction, PageRecord};
use crate::crawler::scheduler::PolitenessController;
use crate::output::{CrawlStats, FailureSample};
use crate::robots::{load_robots, RobotsPolicy};
use crate::state::{OutcomeRecord, ReasonCode, STATUS_TRANSPORT_FAILURE};
use crate::url::{
    parse_seed, registrable_domain, url_registrable_domain, HostGuard, Normalizer, Resolver,
    SystemResolver,
};
use crate::{AuditError, ConfigError, Result};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: Url,

    /// Link distance from the seed; tracked but not enforced
    pub depth: u32,
}

/// Everything a crawl run produced
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    /// Kept pages that passed the thin-content filter, keyed by requested URL
    pub pages: HashMap<String, PageRecord>,

    pub stats: CrawlStats,

    /// One record per URL that did not become a kept page
    pub outcomes: Vec<OutcomeRecord>,
}

/// What a worker reports for one URL
#[derive(Debug)]
enum TaskOutcome {
    RobotsDenied(OutcomeRecord),
    UnsafeDenied(OutcomeRecord),
    FetchFailed {
        outcome: OutcomeRecord,
        sample: FailureSample,
        redirected: bool,
    },
    Skipped {
        outcome: OutcomeRecord,
        redirected: bool,
    },
    Kept(Box<PageRecord>),
}

/// Shared, read-only state handed to every worker
struct WorkerContext {
    fetcher: Fetcher,
    guard: HostGuard,
    normalizer: Arc<Normalizer>,
    politeness: PolitenessController,
    robots: RobotsPolicy,
}

/// Builder for a `Crawler`
pub struct CrawlerBuilder {
    config: Config,
    resolver: Option<Arc<dyn Resolver>>,
    pins: Vec<(String, SocketAddr)>,
}

impl CrawlerBuilder {
    /// Replaces the DNS resolver used by the host guard
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sends all HTTP traffic for `host` to `addr`
    ///
    /// Only the HTTP connection is pinned. Host safety is still decided by
    /// the configured resolver.
    pub fn pin_host(mut self, host: &str, addr: SocketAddr) -> Self {
        self.pins.push((host.to_lowercase(), addr));
        self
    }

    /// Validates the configuration and seed, and builds the HTTP client
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to run
    /// * `Err(AuditError)` - Invalid configuration, invalid seed URL, seed
    ///   without a registrable domain, or HTTP client failure
    pub fn build(self) -> Result<Crawler> {
        validate(&self.config)?;

        let target = self.config.crawler.target_url.as_deref().ok_or_else(|| {
            ConfigError::Validation("a target URL is required".to_string())
        })?;
        let seed = parse_seed(target)?;

        let scope_domain = seed
            .host_str()
            .and_then(registrable_domain)
            .ok_or_else(|| AuditError::NoRegistrableDomain {
                url: seed.to_string(),
            })?;

        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(SystemResolver) as Arc<dyn Resolver>);
        let guard = HostGuard::new(resolver);

        let include = compile_pattern(self.config.crawler.include_pattern.as_deref())?;
        let exclude = compile_pattern(self.config.crawler.exclude_pattern.as_deref())?;
        let normalizer = Normalizer::new(scope_domain, guard.clone()).with_patterns(include, exclude);

        let fetcher = Fetcher::new(&self.config, guard.clone(), &self.pins)?;

        Ok(Crawler {
            config: self.config,
            seed,
            guard,
            fetcher,
            normalizer: Arc::new(normalizer),
        })
    }
}

/// Main crawler structure
///
/// # Example
///
/// ```no_run
/// use sumi_audit::config::Config;
/// use sumi_audit::Crawler;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> sumi_audit::Result<()> {
/// let mut config = Config::default();
/// config.crawler.target_url = Some("https://example.com/".to_string());
///
/// let output = Crawler::builder(config).build()?.run(CancellationToken::new()).await?;
/// println!("Kept {} pages", output.pages.len());
/// # Ok(())
/// # }
/// ```
pub struct Crawler {
    config: Config,
    seed: Url,
    guard: HostGuard,
    fetcher: Fetcher,
    normalizer: Arc<Normalizer>,
}

impl Crawler {
    pub fn builder(config: Config) -> CrawlerBuilder {
        CrawlerBuilder {
            config,
            resolver: None,
            pins: Vec::new(),
        }
    }

    /// The validated seed URL
    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Runs the main crawl loop
    ///
    /// This is the core crawling logic that:
    /// 1. Rejects a seed whose host resolves to non-public space
    /// 2. Loads robots.txt once from the seed's origin
    /// 3. Dispatches frontier URLs to at most `workers` concurrent tasks
    ///    while the processed count stays below the page budget
    /// 4. Enqueues same-site links from kept pages (soft budget cap)
    /// 5. Applies the thin-content filter to the kept pages
    ///
    /// Cancelling the token stops new dispatches; in-flight fetches finish
    /// and partial results are returned. A worker task that panics is
    /// recorded as `task_failed` and the crawl carries on.
    pub async fn run(&self, cancel: CancellationToken) -> Result<CrawlOutput> {
        let max_pages = self.config.crawler.max_pages;
        let workers = self.config.crawler.workers.max(1);

        if self.guard.is_unsafe_url(&self.seed).await {
            return Err(AuditError::UnsafeSeed {
                host: self.seed.host_str().unwrap_or("").to_string(),
            });
        }

        let mut stats = CrawlStats::new();
        tracing::info!(
            "Starting crawl of {} (scope {}, budget {} pages, {} workers)",
            self.seed,
            self.normalizer.scope_domain(),
            max_pages,
            workers
        );

        let robots = load_robots(
            &self.fetcher,
            &self.seed,
            &self.config.user_agent.crawler_name,
        )
        .await;
        stats.robots = robots.status().clone();

        let ctx = Arc::new(WorkerContext {
            fetcher: self.fetcher.clone(),
            guard: self.guard.clone(),
            normalizer: Arc::clone(&self.normalizer),
            politeness: PolitenessController::new(
                self.config.crawler.domain_concurrency,
                Duration::from_millis(self.config.crawler.delay_ms),
            ),
            robots,
        });

        let mut frontier = VecDeque::new();
        let mut visited = HashSet::new();
        visited.insert(self.seed.to_string());
        frontier.push_back(CrawlTarget {
            url: self.seed.clone(),
            depth: 0,
        });

        let mut tasks: JoinSet<(CrawlTarget, TaskOutcome)> = JoinSet::new();
        let mut in_flight: HashMap<Id, CrawlTarget> = HashMap::new();
        let mut kept: Vec<PageRecord> = Vec::new();
        let mut outcomes = Vec::new();
        let mut processed = 0usize;
        let mut cancelled = false;

        loop {
            if !cancelled && cancel.is_cancelled() {
                tracing::info!("Crawl cancelled, no further fetches will start");
                cancelled = true;
            }

            // Fill the worker pool
            while !cancelled && tasks.len() < workers && processed + tasks.len() < max_pages {
                let Some(target) = frontier.pop_front() else {
                    break;
                };
                tracing::debug!("Dispatching {} (depth {})", target.url, target.depth);
                let ctx = Arc::clone(&ctx);
                let task_target = target.clone();
                let handle = tasks.spawn(async move {
                    let outcome = process_target(&ctx, &task_target).await;
                    (task_target, outcome)
                });
                in_flight.insert(handle.id(), target);
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled(), if !cancelled => {
                    tracing::info!(
                        "Crawl cancelled, waiting for {} in-flight fetches",
                        tasks.len()
                    );
                    cancelled = true;
                }
                Some(joined) = tasks.join_next() => {
                    processed += 1;
                    let (target, outcome) = match joined {
                        Ok((target, outcome)) => {
                            in_flight.retain(|_, pending| pending.url != target.url);
                            (target, outcome)
                        }
                        Err(e) => {
                            let url = in_flight
                                .remove(&e.id())
                                .map(|pending| pending.url.to_string())
                                .unwrap_or_default();
                            tracing::error!("Crawl task for {} failed: {}", url, e);
                            record_task_failure(&mut stats, &mut outcomes, &url);
                            continue;
                        }
                    };

                    match outcome {
                        TaskOutcome::RobotsDenied(outcome) => {
                            stats.robots_denied += 1;
                            outcomes.push(outcome);
                        }
                        TaskOutcome::UnsafeDenied(outcome) => {
                            stats.unsafe_denied += 1;
                            outcomes.push(outcome);
                        }
                        TaskOutcome::FetchFailed { outcome, sample, redirected } => {
                            stats.crawled += 1;
                            stats.fetch_error += 1;
                            stats.redirected += u64::from(redirected);
                            stats.push_sample(sample);
                            outcomes.push(outcome);
                        }
                        TaskOutcome::Skipped { outcome, redirected } => {
                            stats.crawled += 1;
                            stats.status_200_html += 1;
                            stats.skipped_noindex += 1;
                            stats.redirected += u64::from(redirected);
                            outcomes.push(outcome);
                        }
                        TaskOutcome::Kept(record) => {
                            stats.crawled += 1;
                            stats.status_200_html += 1;
                            stats.redirected += u64::from(record.redirected);

                            // Soft cap: in-flight fetches are not counted
                            for link in &record.links {
                                if processed + frontier.len() >= max_pages {
                                    break;
                                }
                                let Ok(url) = Url::parse(link) else {
                                    continue;
                                };
                                if visited.insert(url.to_string()) {
                                    frontier.push_back(CrawlTarget {
                                        url,
                                        depth: target.depth + 1,
                                    });
                                }
                            }
                            kept.push(*record);
                        }
                    }
                }
            }
        }

        if !frontier.is_empty() {
            tracing::debug!("{} URLs left in the frontier", frontier.len());
        }

        let mut pages = HashMap::new();
        for record in kept {
            if self.config.crawler.include_thin || record.word_count >= self.config.crawler.min_words {
                stats.final_kept += 1;
                pages.insert(record.url.clone(), record);
            } else {
                tracing::debug!(
                    "Filtering thin page {} ({} words)",
                    record.url,
                    record.word_count
                );
                stats.filtered_thin += 1;
            }
        }

        stats.finish(cancelled);
        tracing::info!(
            "Crawl finished: {} fetched, {} kept, {} thin, {} errors",
            stats.crawled,
            stats.final_kept,
            stats.filtered_thin,
            stats.fetch_error
        );

        Ok(CrawlOutput {
            pages,
            stats,
            outcomes,
        })
    }
}

/// Processes one URL: robots, guard, politeness, fetch, extract
async fn process_target(ctx: &WorkerContext, target: &CrawlTarget) -> TaskOutcome {
    let url = &target.url;

    if !ctx.robots.is_allowed(url) {
        tracing::debug!("robots.txt disallows {}", url);
        return TaskOutcome::RobotsDenied(OutcomeRecord::denied(
            url.as_str(),
            ReasonCode::RobotsDisallowed,
        ));
    }

    if ctx.guard.is_unsafe_url(url).await {
        tracing::warn!("Refusing {}: host resolves to non-public address", url);
        return TaskOutcome::UnsafeDenied(OutcomeRecord::denied(
            url.as_str(),
            ReasonCode::UnsafeHost,
        ));
    }

    let domain = url_registrable_domain(url)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_default();

    let response = {
        let _permit = ctx.politeness.acquire(&domain).await;
        ctx.fetcher.fetch(url).await
    };

    if !response.is_success() {
        let status = response.status;
        let reason = response.diagnostics.reason.unwrap_or(ReasonCode::HttpStatus);
        let state = reason.terminal_state();
        tracing::debug!("{} ended as {} ({}, status {})", url, state, reason, status);
        return fetch_failure(url, status, reason, &response.diagnostics);
    }

    let FetchResponse {
        status,
        body,
        diagnostics,
    } = response;
    let body = body.unwrap_or_default();

    if diagnostics
        .x_robots_tag
        .as_deref()
        .is_some_and(is_skip_directive)
    {
        tracing::debug!("X-Robots-Tag excludes {}", url);
        return TaskOutcome::Skipped {
            outcome: OutcomeRecord::new(url.as_str(), status, ReasonCode::MetaNoindex),
            redirected: diagnostics.redirected,
        };
    }

    let base = Url::parse(&diagnostics.final_url).unwrap_or_else(|_| url.clone());
    let extraction = {
        let normalizer = Arc::clone(&ctx.normalizer);
        let base = base.clone();
        tokio::task::spawn_blocking(move || parser::extract(&base, &body, &normalizer)).await
    };

    match extraction {
        Ok(Extraction::SkipByMeta) => {
            tracing::debug!("Robots meta tag excludes {}", url);
            TaskOutcome::Skipped {
                outcome: OutcomeRecord::new(url.as_str(), status, ReasonCode::MetaNoindex),
                redirected: diagnostics.redirected,
            }
        }
        Ok(Extraction::Page(mut record)) => {
            record.url = url.to_string();
            record.final_url = base.to_string();
            record.status = status;
            record.depth = target.depth;
            record.redirected = diagnostics.redirected;
            record.links = safe_links(&ctx.normalizer, &base, &record.links).await;

            tracing::debug!(
                "Kept {} ({} words, {} links)",
                url,
                record.word_count,
                record.links.len()
            );
            TaskOutcome::Kept(record)
        }
        Err(e) => {
            tracing::error!("Extraction of {} failed: {}", url, e);
            let mut diagnostics = diagnostics;
            diagnostics.detail = format!("extraction failed: {}", e);
            fetch_failure(url, status, ReasonCode::TransportError, &diagnostics)
        }
    }
}

/// Keeps only links whose host passes the guard
async fn safe_links(
    normalizer: &Normalizer,
    base: &Url,
    links: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut safe = BTreeSet::new();
    for link in links {
        if let Some(url) = normalizer.normalize(base, link).await {
            safe.insert(url.to_string());
        }
    }
    safe
}

fn fetch_failure(
    url: &Url,
    status: u16,
    reason: ReasonCode,
    diagnostics: &FetchDiagnostics,
) -> TaskOutcome {
    let reason_text = if diagnostics.detail.is_empty() {
        reason.as_str().to_string()
    } else {
        format!("{}: {}", reason, diagnostics.detail)
    };

    if reason.is_policy_denial() {
        tracing::warn!("Fetch of {} denied: {}", url, reason_text);
    }

    TaskOutcome::FetchFailed {
        outcome: OutcomeRecord::new(url.as_str(), status, reason),
        sample: FailureSample {
            url: url.to_string(),
            status,
            final_url: diagnostics.final_url.clone(),
            is_html: diagnostics.is_html,
            content_type: diagnostics.content_type.clone(),
            reason: reason_text,
        },
        redirected: diagnostics.redirected,
    }
}

/// Accounts for a worker task that died before reporting an outcome
fn record_task_failure(stats: &mut CrawlStats, outcomes: &mut Vec<OutcomeRecord>, url: &str) {
    stats.task_failed += 1;
    outcomes.push(OutcomeRecord::new(
        url,
        STATUS_TRANSPORT_FAILURE,
        ReasonCode::TaskFailed,
    ));
}

/// Crawls a site with default settings
///
/// # Arguments
///
/// * `root_url` - Seed URL; only its registrable domain is crawled
/// * `max_pages` - Page budget (default 50)
/// * `min_words` - Thin-content threshold (default 400)
/// * `include_thin` - Keep pages below `min_words`
///
/// # Returns
///
/// * `Ok(CrawlOutput)` - Kept pages, statistics, and outcome records
/// * `Err(AuditError)` - Invalid or unsafe seed, or HTTP client failure
pub async fn crawl_site(
    root_url: &str,
    max_pages: usize,
    min_words: usize,
    include_thin: bool,
) -> Result<CrawlOutput> {
    let mut config = Config::default();
    config.crawler.target_url = Some(root_url.to_string());
    config.crawler.max_pages = max_pages;
    config.crawler.min_words = min_words;
    config.crawler.include_thin = include_thin;

    Crawler::builder(config)
        .build()?
        .run(CancellationToken::new())
        .await
}
