//! Per-domain politeness control
//!
//! This module handles:
//! - Per-domain concurrency limiting via semaphores
//! - A fixed minimum delay between request starts to the same domain
//! - Lazy creation of per-domain state under a single lock

use crate::state::DomainState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};

/// Limiter and request history for one registrable domain
#[derive(Debug)]
struct DomainSlot {
    semaphore: Arc<Semaphore>,
    state: AsyncMutex<DomainState>,
}

/// Permission to send one request to a domain
///
/// The concurrency slot is released when the permit is dropped.
#[derive(Debug)]
pub struct PolitePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

/// PolitenessController gates requests per registrable domain
///
/// The controller coordinates:
/// - Per-domain concurrency limits (at most `concurrency` requests in flight)
/// - Per-domain rate limits (minimum time between request starts)
///
/// Waiters are served in FIFO order, since both the semaphore and the
/// state mutex are fair.
#[derive(Debug)]
pub struct PolitenessController {
    /// Per-domain slots, created on first use
    slots: Mutex<HashMap<String, Arc<DomainSlot>>>,

    /// Maximum in-flight requests per domain
    concurrency: usize,

    /// Minimum time between request starts to the same domain
    delay: Duration,
}

impl PolitenessController {
    /// Creates a new controller
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum in-flight requests per domain (at least 1)
    /// * `delay` - Minimum time between request starts to one domain
    pub fn new(concurrency: usize, delay: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            concurrency: concurrency.max(1),
            delay,
        }
    }

    /// Waits until a request to `domain` is allowed
    ///
    /// This method:
    /// 1. Waits for a free concurrency slot for the domain
    /// 2. Waits until the delay since the previous request start has elapsed
    /// 3. Records the request start
    ///
    /// The returned permit must be held for the duration of the request.
    pub async fn acquire(&self, domain: &str) -> PolitePermit {
        let slot = self.slot(domain);

        // Slot semaphores are never closed, so this only fails in theory
        let permit = Arc::clone(&slot.semaphore).acquire_owned().await.ok();

        let mut state = slot.state.lock().await;
        if let Some(wait) = state.time_until_next_request(self.delay, Instant::now()) {
            tracing::trace!("Waiting {:?} before next request to {}", wait, domain);
            tokio::time::sleep(wait).await;
        }
        state.record_request(Instant::now());
        tracing::trace!("Request {} to {}", state.request_count, domain);
        drop(state);

        PolitePermit { _permit: permit }
    }

    /// Returns the slot for a domain, creating it under the creation lock
    fn slot(&self, domain: &str) -> Arc<DomainSlot> {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };

        Arc::clone(slots.entry(domain.to_string()).or_insert_with(|| {
            Arc::new(DomainSlot {
                semaphore: Arc::new(Semaphore::new(self.concurrency)),
                state: AsyncMutex::new(DomainState::new()),
            })
        }))
    }
}
