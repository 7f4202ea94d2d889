//! Generic refresh engine for a cached table fed by an expensive source.
//!
//! A [`DatabaseScheduler`] owns the live table and is driven entirely from the
//! consumer thread: [`invalidate_database`](DatabaseScheduler::invalidate_database)
//! starts a refresh cycle, [`tick`](DatabaseScheduler::tick) reconciles a
//! finished cycle into the table. Each cycle runs the source's
//! [`DatabaseSource::gather`] on its own thread and hands the result back
//! through a write-once slot; the worker never touches the table.
//!
//! ## Cycle lifecycle
//!
//! ```text
//! Idle --invalidate--> Updating --tick: published--> Idle (+ changed event)
//!                         |
//!                         +--before_shutdown--> snapshot with pending_update
//! ```
//!
//! The durable `pending_update` flag is set when a cycle starts and cleared
//! when its result is consumed. A snapshot written while it is set makes the
//! next warm start begin a fresh cycle instead of serving the stored table.
//! The same flag, shared with the worker, marks a cycle as superseded: a
//! worker whose flag was cleared discards its result.

use crate::core::cancel::{
    cancellation_pair, CancellationHandle, CancellationToken, CounterGuard, ScopedCounter,
};
use crate::core::error::{ErrorCategory, Result};
use crate::core::operation::{TickControl, TickLoop};
use crate::core::reporter::ErrorReporter;
use crate::core::snapshot::{Snapshot, SnapshotStore};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Domain half of a cache: how to gather entries and build the table.
pub trait DatabaseSource: Send + Sync + 'static {
    type Entry: Send + 'static;
    type Table: Default + Serialize + DeserializeOwned + 'static;

    /// Used for thread names and log lines
    const NAME: &'static str;

    /// Runs on the worker thread. Must return promptly once
    /// `ctx.token` is cancelled.
    fn gather(&self, ctx: &GatherContext) -> Result<Vec<Self::Entry>>;

    /// Runs on the consumer thread. `table` is empty on entry.
    fn apply(&self, entries: Vec<Self::Entry>, table: &mut Self::Table);
}

/// What a worker gets besides its source
pub struct GatherContext {
    pub token: CancellationToken,
    pub reporter: Arc<ErrorReporter>,
}

/// The environment hosting the cache
pub trait HostEnvironment {
    /// The host is tearing down or reloading, don't start work now
    fn is_busy(&self) -> bool;
}

/// A host that is never busy
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleHost;

impl HostEnvironment for IdleHost {
    fn is_busy(&self) -> bool {
        false
    }
}

enum Published<E> {
    Replace(Vec<E>),
    /// Data error: the previous table stays
    Keep,
}

struct CycleShared<E> {
    pending: AtomicBool,
    published: Mutex<Option<Published<E>>>,
}

struct RefreshCycle<E> {
    generation: u64,
    worker: JoinHandle<()>,
    shared: Arc<CycleShared<E>>,
    cancel: CancellationHandle,
}

type ChangedListener = Box<dyn FnMut()>;

pub struct DatabaseScheduler<S: DatabaseSource> {
    source: Arc<S>,
    table: S::Table,
    is_active: bool,
    is_ready: bool,
    is_updating: bool,
    pending_update: bool,
    generation: u64,
    cycle: Option<RefreshCycle<S::Entry>>,
    suspension: ScopedCounter,
    auto_refresh: Option<Duration>,
    last_refresh: Option<Instant>,
    last_refreshed_at: Option<DateTime<Utc>>,
    restart_deferred: bool,
    host: Box<dyn HostEnvironment>,
    store: Option<SnapshotStore>,
    listeners: Vec<ChangedListener>,
    reporter: Arc<ErrorReporter>,
}

impl<S: DatabaseSource> DatabaseScheduler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            table: S::Table::default(),
            is_active: false,
            is_ready: false,
            is_updating: false,
            pending_update: false,
            generation: 0,
            cycle: None,
            suspension: ScopedCounter::new(),
            auto_refresh: None,
            last_refresh: None,
            last_refreshed_at: None,
            restart_deferred: false,
            host: Box::new(IdleHost),
            store: None,
            listeners: Vec::new(),
            reporter: Arc::new(ErrorReporter::new()),
        }
    }

    /// Persist the pending flag and table through `store`
    pub fn with_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Refresh when `interval` has passed since the last cycle. `None`
    /// disables automatic refreshes.
    pub fn with_auto_refresh(mut self, interval: Option<Duration>) -> Self {
        self.auto_refresh = interval.filter(|interval| !interval.is_zero());
        self
    }

    pub fn with_host(mut self, host: impl HostEnvironment + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Activate the cache. A fresh instance starts its first cycle right
    /// away. A warm restart rehydrates from the snapshot store; if the stored
    /// snapshot was taken mid-cycle, a new cycle is started (or deferred while
    /// the host is busy) and the stale table is not served.
    pub fn initialize(&mut self, was_freshly_created: bool) {
        self.is_active = true;

        let snapshot = if was_freshly_created {
            None
        } else {
            self.load_snapshot()
        };

        let Some(snapshot) = snapshot else {
            log::debug!("{}: cold start", S::NAME);
            self.table = S::Table::default();
            self.is_ready = false;
            self.invalidate_database();
            return;
        };

        self.last_refreshed_at = snapshot.last_refreshed;
        if !snapshot.pending_update {
            log::debug!("{}: warm start from snapshot", S::NAME);
            self.table = snapshot.table;
            self.is_ready = true;
            self.last_refresh = Some(Instant::now());
            return;
        }

        log::info!("{}: previous refresh was interrupted, restarting it", S::NAME);
        self.table = S::Table::default();
        self.is_ready = false;
        self.pending_update = true;
        if self.host.is_busy() {
            log::debug!("{}: host busy, deferring restart", S::NAME);
            self.restart_deferred = true;
        } else {
            self.start_cycle();
        }
    }

    fn load_snapshot(&self) -> Option<Snapshot<S::Table>> {
        let store = self.store.as_ref()?;
        match store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("{}: ignoring unreadable snapshot: {e}", S::NAME);
                None
            }
        }
    }

    /// Start a refresh cycle. Does nothing while inactive, suspended or
    /// already updating. Returns whether a cycle was started.
    pub fn invalidate_database(&mut self) -> bool {
        if !self.is_active || self.is_updating || self.suspension.is_held() {
            log::debug!(
                "{}: invalidate ignored (active = {}, updating = {}, suspended = {})",
                S::NAME,
                self.is_active,
                self.is_updating,
                self.suspension.is_held()
            );
            return false;
        }
        self.start_cycle()
    }

    /// Abandon the running cycle, if any, and start a new one
    pub fn force_refresh(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(cycle) = self.cycle.take() {
            log::debug!("{}: superseding cycle {}", S::NAME, cycle.generation);
            cycle.shared.pending.store(false, Ordering::Release);
            cycle.cancel.cancel(false);
            self.is_updating = false;
        }
        self.start_cycle()
    }

    fn start_cycle(&mut self) -> bool {
        self.restart_deferred = false;
        self.generation += 1;
        let generation = self.generation;

        let (token, cancel) = cancellation_pair();
        let shared = Arc::new(CycleShared {
            pending: AtomicBool::new(true),
            published: Mutex::new(None),
        });
        let ctx = GatherContext {
            token,
            reporter: Arc::clone(&self.reporter),
        };
        let source = Arc::clone(&self.source);
        let worker_shared = Arc::clone(&shared);

        let spawned = thread::Builder::new()
            .name(format!("{}-refresh", S::NAME))
            .spawn(move || run_cycle(source.as_ref(), &ctx, &worker_shared, generation));
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                log::error!("{}: failed to start refresh thread: {e}", S::NAME);
                return false;
            }
        };

        log::debug!("{}: started cycle {generation}", S::NAME);
        self.cycle = Some(RefreshCycle {
            generation,
            worker,
            shared,
            cancel,
        });
        self.is_updating = true;
        self.pending_update = true;
        self.save_snapshot();
        true
    }

    /// Consumer-thread housekeeping: apply a finished cycle, run a deferred
    /// restart, and trigger automatic refreshes.
    pub fn tick(&mut self) {
        self.reconcile();

        if self.restart_deferred && self.is_active && !self.is_updating && !self.host.is_busy() {
            log::debug!("{}: running deferred restart", S::NAME);
            self.start_cycle();
        }

        if let Some(interval) = self.auto_refresh {
            let due = self
                .last_refresh
                .map_or(true, |last| last.elapsed() >= interval);
            if due && self.is_active && !self.is_updating && !self.restart_deferred {
                self.invalidate_database();
            }
        }
    }

    fn reconcile(&mut self) {
        let Some(cycle) = &self.cycle else {
            return;
        };

        // Checked before the slot: a finished worker has already published
        let finished = cycle.worker.is_finished();
        let published = cycle
            .shared
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let published = match published {
            Some(published) => published,
            None if finished => {
                log::warn!(
                    "{}: cycle {} ended without a result",
                    S::NAME,
                    cycle.generation
                );
                Published::Keep
            }
            None => return,
        };

        let Some(cycle) = self.cycle.take() else {
            return;
        };
        cycle.shared.pending.store(false, Ordering::Release);
        self.pending_update = false;
        self.is_updating = false;
        self.last_refresh = Some(Instant::now());
        self.last_refreshed_at = Some(Utc::now());

        if !self.is_active {
            log::debug!(
                "{}: discarding cycle {} of an inactive cache",
                S::NAME,
                cycle.generation
            );
            self.table = S::Table::default();
        } else {
            match published {
                Published::Replace(entries) => {
                    log::info!(
                        "{}: cycle {} applied {} entries",
                        S::NAME,
                        cycle.generation,
                        entries.len()
                    );
                    let mut table = S::Table::default();
                    self.source.apply(entries, &mut table);
                    self.table = table;
                }
                Published::Keep => {
                    log::info!(
                        "{}: cycle {} kept the previous table",
                        S::NAME,
                        cycle.generation
                    );
                }
            }
            self.is_ready = true;
            self.save_snapshot();
        }

        for listener in &mut self.listeners {
            listener();
        }
    }

    /// Stop serving. A running cycle is asked to stop and its result is
    /// discarded when it arrives.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.is_ready = false;
        self.restart_deferred = false;
        self.table = S::Table::default();
        if let Some(cycle) = &self.cycle {
            cycle.cancel.cancel(false);
        }
    }

    /// The host is about to tear down background threads. Ask the running
    /// cycle to stop now and persist the state so the next start resumes.
    pub fn before_shutdown(&mut self) {
        if let Some(cycle) = &self.cycle {
            log::debug!("{}: aborting cycle {} before shutdown", S::NAME, cycle.generation);
            cycle.cancel.cancel(false);
        }
        self.save_snapshot();
    }

    fn save_snapshot(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = Snapshot {
            pending_update: self.pending_update,
            last_refreshed: self.last_refreshed_at,
            table: &self.table,
        };
        if let Err(e) = store.save(&snapshot) {
            log::warn!("{}: failed to persist snapshot: {e}", S::NAME);
        }
    }

    /// No cycle starts until the guard is dropped
    pub fn suspend(&self) -> CounterGuard {
        self.suspension.acquire()
    }

    /// Called once per completed cycle, on the consumer thread
    pub fn subscribe_changed(&mut self, listener: impl FnMut() + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Tick this scheduler from `tick_loop` for as long as it is alive
    pub fn attach(this: &Rc<RefCell<Self>>, tick_loop: &TickLoop) {
        let weak = Rc::downgrade(this);
        tick_loop.subscribe(move || match weak.upgrade() {
            Some(scheduler) => {
                scheduler.borrow_mut().tick();
                TickControl::Continue
            }
            None => TickControl::Unsubscribe,
        });
    }

    pub fn table(&self) -> &S::Table {
        &self.table
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn reporter(&self) -> &Arc<ErrorReporter> {
        &self.reporter
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// At least one cycle has been applied since activation
    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn is_updating(&self) -> bool {
        self.is_updating
    }

    pub fn pending_update(&self) -> bool {
        self.pending_update
    }

    pub fn restart_deferred(&self) -> bool {
        self.restart_deferred
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed_at
    }

    /// Number of cycles started by this instance
    pub fn cycles_started(&self) -> u64 {
        self.generation
    }
}

fn run_cycle<S: DatabaseSource>(
    source: &S,
    ctx: &GatherContext,
    shared: &CycleShared<S::Entry>,
    generation: u64,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.gather(ctx)));
    let published = match outcome {
        Ok(Ok(entries)) => Published::Replace(entries),
        Ok(Err(e)) => match e.category() {
            ErrorCategory::Data => {
                log::warn!("{}: dropping undecodable result: {e}", S::NAME);
                Published::Keep
            }
            ErrorCategory::Recoverable => {
                log::debug!("{}: {e}", S::NAME);
                Published::Replace(Vec::new())
            }
            ErrorCategory::Configuration => {
                ctx.reporter.report_error(&e);
                Published::Replace(Vec::new())
            }
            ErrorCategory::Fatal => {
                log::error!("{}: refresh failed: {e:?}", S::NAME);
                Published::Replace(Vec::new())
            }
        },
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{}: refresh worker panicked: {message}", S::NAME);
            Published::Replace(Vec::new())
        }
    };

    if !shared.pending.load(Ordering::Acquire) {
        log::debug!("{}: cycle {generation} was superseded, dropping its result", S::NAME);
        return;
    }
    *shared
        .published
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(published);
}
