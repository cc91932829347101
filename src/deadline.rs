//! Deadlines and cancellation

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::errors::SearchError;

/// A start time and an optional time budget.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    timeout: Option<Duration>,
}

impl Deadline {
    /// Starts the clock now.
    pub fn start(timeout: Option<Duration>) -> Self {
        Deadline {
            start: Instant::now(),
            timeout,
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self::start(None)
    }

    /// Time since the clock started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Whether the budget is used up. A zero budget is expired from the start.
    pub fn expired(&self) -> bool {
        self.timeout.is_some_and(|timeout| self.start.elapsed() >= timeout)
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Transaction-wide cancellation flag.
///
/// Clones share the flag. Factories poll it before every pop and combination
/// step and stop with [`SearchError::Aborted`] once it trips.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
    deadline: Option<Deadline>,
}

impl AbortSignal {
    /// A signal that only trips when [`AbortSignal::abort`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that also trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        AbortSignal {
            flag: Arc::default(),
            deadline: Some(Deadline::start(Some(timeout))),
        }
    }

    /// Trips the signal for every clone.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether the transaction should stop
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|deadline| deadline.expired())
    }

    /// Returns [`SearchError::Aborted`] once the signal has tripped.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Aborted`]: the transaction was cancelled or timed out.
    pub fn check(&self) -> Result<(), SearchError> {
        if self.is_aborted() {
            return Err(SearchError::Aborted);
        }

        Ok(())
    }
}
