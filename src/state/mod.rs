//! State module for tracking crawl progress
//!
//! This module provides state management for URLs and domains during a crawl run.
//!
//! # Components
//!
//! - `PageState`: the per-URL state machine (queued, fetching, kept, skipped, denied, failed)
//! - `ReasonCode`: machine-readable explanation for every non-kept URL
//! - `OutcomeRecord`: the diagnostic record for a non-kept URL
//! - `DomainState`: per-domain request history used by the politeness controller

mod domain_state;
mod outcome;
mod page_state;

// Re-export main types
pub use domain_state::DomainState;
pub use outcome::{OutcomeRecord, STATUS_POLICY_DENIED, STATUS_TRANSPORT_FAILURE};
pub use page_state::{PageState, ReasonCode};
