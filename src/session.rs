//! Request bookkeeping for estimate runs.
//!
//! Estimates are produced around network calls that may be overtaken by
//! newer requests. [`RequestSequencer`] hands out increasing generations so
//! a caller can drop results from superseded requests, and
//! [`RunningProperties`] keeps the same address from being estimated twice
//! at once. Both are plain values passed to whoever needs them.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    /// Generation number of this ticket.
    #[allow(dead_code)] // Exposed for logging by callers
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Last-request-wins sequencing.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every earlier ticket.
    pub fn begin(&self) -> RequestTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Started request generation {}", generation);
        RequestTicket(generation)
    }

    /// Whether `ticket` is still the most recent request.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Return `value` only if `ticket` is still current.
    pub fn accept<T>(&self, ticket: &RequestTicket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            debug!("Discarding stale result for generation {}", ticket.0);
            None
        }
    }

    /// Run `request` under a new ticket. Resolves to `None` when another
    /// request began before this one finished.
    pub async fn run_latest<F: Future>(&self, request: F) -> Option<F::Output> {
        let ticket = self.begin();
        let value = request.await;
        self.accept(&ticket, value)
    }
}

/// Addresses with an estimate currently in progress.
#[derive(Debug, Clone, Default)]
pub struct RunningProperties {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl RunningProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `address` as running. Returns `None` if it already is.
    pub fn try_start(&self, address: &str) -> Option<RunningGuard> {
        let mut running = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(address.to_string()) {
            return None;
        }

        Some(RunningGuard {
            address: address.to_string(),
            inner: Arc::clone(&self.inner),
        })
    }

    #[allow(dead_code)] // Query utility
    pub fn is_running(&self, address: &str) -> bool {
        self.inner
            .lock()
            .map(|running| running.contains(address))
            .unwrap_or(false)
    }
}

/// Clears the running mark when dropped.
#[derive(Debug)]
pub struct RunningGuard {
    address: String,
    inner: Arc<Mutex<HashSet<String>>>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut running = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.address);
    }
}
