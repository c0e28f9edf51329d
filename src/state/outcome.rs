//! Outcome records for URLs that did not become kept pages

use crate::state::{PageState, ReasonCode};

/// HTTP status recorded for transport failures
pub const STATUS_TRANSPORT_FAILURE: u16 = 0;

/// HTTP status recorded for policy denials ("Unavailable For Legal Reasons")
pub const STATUS_POLICY_DENIED: u16 = 451;

/// Why a URL did not yield a usable page record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    /// The URL as it was enqueued
    pub url: String,

    /// HTTP status (0 for transport failure, 451 for policy denial)
    pub status: u16,

    /// Machine-readable reason
    pub reason: ReasonCode,
}

impl OutcomeRecord {
    pub fn new(url: impl Into<String>, status: u16, reason: ReasonCode) -> Self {
        Self {
            url: url.into(),
            status,
            reason,
        }
    }

    /// A URL refused before any request was sent
    pub fn denied(url: impl Into<String>, reason: ReasonCode) -> Self {
        Self::new(url, STATUS_POLICY_DENIED, reason)
    }

    /// The terminal state this outcome represents
    pub fn state(&self) -> PageState {
        self.reason.terminal_state()
    }
}
