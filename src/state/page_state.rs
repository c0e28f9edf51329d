/// Page state definitions for tracking crawl progress
///
/// Every URL moves through `Queued → Fetching` and ends in exactly one
/// terminal state. Reason codes explain the non-kept terminal states.
use std::fmt;

/// Represents the current state of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// URL is in the frontier waiting for a worker
    Queued,

    /// URL is currently held by a worker
    Fetching,

    // ===== Terminal States =====
    /// Page was fetched, parsed, and retained for analysis
    Kept,

    /// Page declared noindex/nofollow about itself
    SkippedByMeta,

    /// URL was refused by policy (robots.txt, unsafe host, or unsafe redirect)
    Denied,

    /// Fetch or content checks failed
    Failed,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state (URL may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Fetching)
    }

    /// Returns true if this state contributes to the result map
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Kept)
    }

    /// Converts the state to its log/report representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Kept => "kept",
            Self::SkippedByMeta => "skipped_by_meta",
            Self::Denied => "denied",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable reason attached to every URL that was not kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    // ===== Policy denials =====
    /// robots.txt disallows the URL for our user agent
    RobotsDisallowed,

    /// The URL's own host resolves to a private/reserved address (or not at all)
    UnsafeHost,

    /// Redirects left the seed's registrable domain
    RedirectOutOfScope,

    /// Redirects ended on a host that resolves to a private/reserved address
    RedirectUnsafeHost,

    // ===== Transport failures =====
    /// Connect or total timeout elapsed
    Timeout,

    /// Connection could not be established
    ConnectError,

    /// Any other transport-level error, including body read failures
    TransportError,

    // ===== Content rejections =====
    /// Successful response that is not HTML
    NonHtml,

    /// HTML response with no bytes
    EmptyBody,

    /// Body exceeded the byte cap
    BodyTooLarge,

    /// Non-200 HTTP status
    HttpStatus,

    // ===== Deliberate exclusions =====
    /// Page carries a noindex/nofollow robots directive
    MetaNoindex,

    // ===== Internal =====
    /// The worker task processing the URL panicked or was aborted
    TaskFailed,
}

impl ReasonCode {
    /// Short code used in outcome records, failure samples, and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RobotsDisallowed => "robots_disallowed",
            Self::UnsafeHost => "unsafe_host",
            Self::RedirectOutOfScope => "redirect_out_of_scope",
            Self::RedirectUnsafeHost => "redirect_unsafe_host",
            Self::Timeout => "timeout",
            Self::ConnectError => "connect_error",
            Self::TransportError => "transport_error",
            Self::NonHtml => "non_html",
            Self::EmptyBody => "empty_body",
            Self::BodyTooLarge => "body_too_large",
            Self::HttpStatus => "http_status",
            Self::MetaNoindex => "meta_noindex",
            Self::TaskFailed => "task_failed",
        }
    }

    /// Returns true for policy denials, which are never retried
    pub fn is_policy_denial(&self) -> bool {
        matches!(
            self,
            Self::RobotsDisallowed
                | Self::UnsafeHost
                | Self::RedirectOutOfScope
                | Self::RedirectUnsafeHost
        )
    }

    /// Returns true for transport failures, which the fetcher retries
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectError | Self::TransportError
        )
    }

    /// The terminal page state a URL ends in when it carries this reason
    pub fn terminal_state(&self) -> PageState {
        match self {
            Self::RobotsDisallowed
            | Self::UnsafeHost
            | Self::RedirectOutOfScope
            | Self::RedirectUnsafeHost => PageState::Denied,
            Self::MetaNoindex => PageState::SkippedByMeta,
            _ => PageState::Failed,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
