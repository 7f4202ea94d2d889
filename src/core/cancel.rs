//! Cooperative cancellation and scoped reentrancy counters.
//!
//! ## Cancellation
//!
//! `CancellationToken` / `CancellationHandle` pair: the token travels with the
//! background work (and into every external command it runs), while the handle
//! stays with the owner to request an abort. An abort is either `Graceful`
//! (ask the running process to close) or `Kill` (terminate it outright).
//!
//! ## Scoped counters
//!
//! `ScopedCounter` is an atomic counter whose increments are only reachable
//! through a [`CounterGuard`]; dropping the guard performs the matching
//! decrement, so every acquire is paired with exactly one release.

use crate::core::shell::{AbortRequest, ShellMonitor};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

const NOT_ABORTED: u8 = 0;
const ABORT_GRACEFUL: u8 = 1;
const ABORT_KILL: u8 = 2;

/// Token checked by background work to detect cancellation.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    flag: Arc<AtomicU8>,
}

/// Handle held by the owner to cancel in-flight work.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    flag: Arc<AtomicU8>,
}

/// Create a new cancellation pair (token, handle).
pub fn cancellation_pair() -> (CancellationToken, CancellationHandle) {
    let flag = Arc::new(AtomicU8::new(NOT_ABORTED));
    (
        CancellationToken {
            flag: Arc::clone(&flag),
        },
        CancellationHandle { flag },
    )
}

fn decode(value: u8) -> AbortRequest {
    match value {
        NOT_ABORTED => AbortRequest::None,
        ABORT_GRACEFUL => AbortRequest::Graceful,
        _ => AbortRequest::Kill,
    }
}

impl CancellationToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        cancellation_pair().0
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire) != NOT_ABORTED
    }

    pub fn request(&self) -> AbortRequest {
        decode(self.flag.load(Ordering::Acquire))
    }
}

impl CancellationHandle {
    /// Request cancellation. A `kill` request is never downgraded by a later
    /// graceful one.
    pub fn cancel(&self, kill: bool) {
        let value = if kill { ABORT_KILL } else { ABORT_GRACEFUL };
        self.flag.fetch_max(value, Ordering::AcqRel);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire) != NOT_ABORTED
    }
}

impl ShellMonitor for CancellationToken {
    fn abort_request(&self) -> AbortRequest {
        self.request()
    }
}

/// Thread-safe counter whose increments are released by dropping a guard.
#[derive(Clone, Debug, Default)]
pub struct ScopedCounter {
    count: Arc<AtomicUsize>,
}

/// Releases one count of its [`ScopedCounter`] when dropped.
#[derive(Debug)]
#[must_use = "the count is released as soon as the guard is dropped"]
pub struct CounterGuard {
    count: Arc<AtomicUsize>,
}

impl ScopedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> CounterGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        CounterGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn is_held(&self) -> bool {
        self.count.load(Ordering::Acquire) > 0
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

impl Drop for CounterGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
