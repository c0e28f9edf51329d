//! Robots.txt handling module
//!
//! robots.txt is fetched once per run from the seed's origin, with the
//! fetcher's retry policy for transport errors and 5xx responses. Any failure
//! that survives the retries (transport error, 4xx, 5xx) allows everything,
//! and the condition is surfaced through `RobotsStatus`.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use std::fmt;
use url::Url;

/// How the run's robots.txt was obtained
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RobotsStatus {
    /// No attempt was made yet
    #[default]
    NotChecked,

    /// robots.txt was fetched and its rules apply
    Loaded,

    /// The server answered with a non-200 status; everything is allowed
    Missing(u16),

    /// robots.txt could not be fetched; everything is allowed
    Unavailable(String),
}

impl RobotsStatus {
    /// Returns true if the run fell back to allow-all
    pub fn is_fail_open(&self) -> bool {
        matches!(self, Self::Missing(_) | Self::Unavailable(_))
    }
}

impl fmt::Display for RobotsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotChecked => write!(f, "not checked"),
            Self::Loaded => write!(f, "loaded"),
            Self::Missing(status) => write!(f, "missing (HTTP {}), allowing all", status),
            Self::Unavailable(reason) => write!(f, "unavailable ({}), allowing all", reason),
        }
    }
}

/// The robots.txt allow/deny predicate for one crawl run
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    rules: ParsedRobots,
    status: RobotsStatus,
    user_agent: String,
}

impl RobotsPolicy {
    pub fn new(rules: ParsedRobots, status: RobotsStatus, user_agent: impl Into<String>) -> Self {
        Self {
            rules,
            status,
            user_agent: user_agent.into(),
        }
    }

    /// A policy that allows every URL
    pub fn allow_all(user_agent: impl Into<String>, status: RobotsStatus) -> Self {
        Self::new(ParsedRobots::allow_all(), status, user_agent)
    }

    /// Checks if a URL is allowed for this run's user agent
    pub fn is_allowed(&self, url: &Url) -> bool {
        self.rules.is_allowed(url, &self.user_agent)
    }

    pub fn status(&self) -> &RobotsStatus {
        &self.status
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Returns `{scheme}://{host[:port]}/robots.txt` for a URL's origin
pub fn robots_url(url: &Url) -> Option<Url> {
    let mut robots = url.join("/robots.txt").ok()?;
    robots.set_query(None);
    robots.set_fragment(None);
    Some(robots)
}

/// Fetches and parses robots.txt for the seed's origin
///
/// Transient failures are retried like page fetches. Never fails: every
/// remaining problem yields an allow-all policy with the reason recorded in
/// its status.
///
/// # Arguments
///
/// * `fetcher` - The run's fetcher (same client, caps, and host checks)
/// * `seed` - The crawl's seed URL
/// * `user_agent` - The product token matched against `User-agent` lines
pub async fn load_robots(fetcher: &Fetcher, seed: &Url, user_agent: &str) -> RobotsPolicy {
    let Some(url) = robots_url(seed) else {
        return RobotsPolicy::allow_all(
            user_agent,
            RobotsStatus::Unavailable("no origin".to_string()),
        );
    };

    match fetcher.fetch_text(&url).await {
        Ok(response) if response.status == 200 => {
            tracing::info!("Loaded robots.txt from {}", url);
            RobotsPolicy::new(
                ParsedRobots::from_content(&response.body),
                RobotsStatus::Loaded,
                user_agent,
            )
        }
        Ok(response) => {
            tracing::warn!(
                "robots.txt at {} returned HTTP {}, allowing all",
                url,
                response.status
            );
            RobotsPolicy::allow_all(user_agent, RobotsStatus::Missing(response.status))
        }
        Err(failure) => {
            tracing::warn!("Failed to fetch robots.txt at {}: {}, allowing all", url, failure);
            RobotsPolicy::allow_all(user_agent, RobotsStatus::Unavailable(failure.to_string()))
        }
    }
}
