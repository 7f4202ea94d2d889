use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use svn_status_cache::core::reporter::ErrorReporter;
use svn_status_cache::core::scheduler::{
    DatabaseScheduler, DatabaseSource, GatherContext, HostEnvironment,
};
use svn_status_cache::core::snapshot::{Snapshot, SnapshotStore};
use svn_status_cache::core::{SvnCacheError, TickLoop};
use tempfile::TempDir;

/// What the next gather does once released
enum Step {
    Return(Vec<u32>),
    Fail(SvnCacheError),
    Panic,
}

/// A source whose gathers block until the test releases them
struct FakeSource {
    steps: Receiver<Step>,
    gathers: Arc<AtomicUsize>,
    saw_cancel: Arc<AtomicBool>,
}

impl DatabaseSource for FakeSource {
    type Entry = u32;
    type Table = Vec<u32>;

    const NAME: &'static str = "fake";

    fn gather(&self, ctx: &GatherContext) -> svn_status_cache::Result<Vec<u32>> {
        self.gathers.fetch_add(1, Ordering::SeqCst);
        loop {
            match self.steps.recv_timeout(Duration::from_millis(5)) {
                Ok(Step::Return(entries)) => return Ok(entries),
                Ok(Step::Fail(e)) => return Err(e),
                Ok(Step::Panic) => panic!("gather exploded"),
                Err(RecvTimeoutError::Timeout) => {
                    if ctx.token.is_cancelled() {
                        self.saw_cancel.store(true, Ordering::SeqCst);
                        return Ok(Vec::new());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(Vec::new()),
            }
        }
    }

    fn apply(&self, entries: Vec<u32>, table: &mut Vec<u32>) {
        table.extend(entries);
    }
}

struct Harness {
    scheduler: DatabaseScheduler<FakeSource>,
    steps: Sender<Step>,
    gathers: Arc<AtomicUsize>,
    saw_cancel: Arc<AtomicBool>,
    changes: Rc<Cell<u32>>,
}

impl Harness {
    fn new() -> Self {
        Self::with(|scheduler| scheduler)
    }

    fn with(
        configure: impl FnOnce(DatabaseScheduler<FakeSource>) -> DatabaseScheduler<FakeSource>,
    ) -> Self {
        let (steps, receiver) = unbounded();
        let gathers = Arc::new(AtomicUsize::new(0));
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let source = FakeSource {
            steps: receiver,
            gathers: Arc::clone(&gathers),
            saw_cancel: Arc::clone(&saw_cancel),
        };
        let mut scheduler = configure(DatabaseScheduler::new(source));
        let changes = Rc::new(Cell::new(0));
        {
            let changes = Rc::clone(&changes);
            scheduler.subscribe_changed(move || changes.set(changes.get() + 1));
        }
        Self {
            scheduler,
            steps,
            gathers,
            saw_cancel,
            changes,
        }
    }

    fn release(&self, step: Step) {
        self.steps.send(step).unwrap();
    }

    fn tick_until(&mut self, done: impl Fn(&DatabaseScheduler<FakeSource>) -> bool) {
        let start = Instant::now();
        while !done(&self.scheduler) {
            assert!(start.elapsed() < Duration::from_secs(10), "timed out");
            self.scheduler.tick();
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn wait_for_cancel(&self) {
        let start = Instant::now();
        while !self.saw_cancel.load(Ordering::SeqCst) {
            assert!(start.elapsed() < Duration::from_secs(10), "worker never saw the abort");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn wait_for_gathers(&self, count: usize) {
        let start = Instant::now();
        while self.gathers.load(Ordering::SeqCst) < count {
            assert!(start.elapsed() < Duration::from_secs(10), "gather never started");
            thread::sleep(Duration::from_millis(2));
        }
    }
}

#[derive(Clone, Default)]
struct SwitchableHost {
    busy: Rc<Cell<bool>>,
}

impl HostEnvironment for SwitchableHost {
    fn is_busy(&self) -> bool {
        self.busy.get()
    }
}

fn write_snapshot(
    dir: &TempDir,
    pending_update: bool,
    table: Vec<u32>,
) -> anyhow::Result<SnapshotStore> {
    let store = SnapshotStore::at(dir.path().join("fake.json"));
    store.save(&Snapshot {
        pending_update,
        last_refreshed: None,
        table,
    })?;
    Ok(store)
}

#[test]
fn test_cold_start_runs_one_cycle_and_fires_changed() {
    let mut h = Harness::new();
    h.scheduler.initialize(true);
    assert!(h.scheduler.is_updating());
    assert!(h.scheduler.pending_update());
    assert!(!h.scheduler.is_ready());

    h.release(Step::Return(vec![1, 2, 3]));
    h.tick_until(|s| !s.is_updating());

    assert!(h.scheduler.is_ready());
    assert!(!h.scheduler.pending_update());
    assert_eq!(h.scheduler.table(), &vec![1, 2, 3]);
    assert_eq!(h.changes.get(), 1);
    assert!(h.scheduler.last_refreshed().is_some());
}

#[test]
fn test_invalidate_while_updating_is_a_noop() {
    let mut h = Harness::new();
    h.scheduler.initialize(true);
    h.wait_for_gathers(1);

    assert!(!h.scheduler.invalidate_database());
    assert!(!h.scheduler.invalidate_database());
    assert_eq!(h.scheduler.cycles_started(), 1);

    h.release(Step::Return(vec![7]));
    h.tick_until(|s| !s.is_updating());
    assert_eq!(h.gathers.load(Ordering::SeqCst), 1);
    assert_eq!(h.changes.get(), 1);

    // Idle again: the next invalidation starts a new cycle that replaces the table
    assert!(h.scheduler.invalidate_database());
    h.release(Step::Return(vec![8, 9]));
    h.tick_until(|s| !s.is_updating());
    assert_eq!(h.scheduler.table(), &vec![8, 9]);
    assert_eq!(h.changes.get(), 2);
}

#[test]
fn test_invalidate_ignored_when_inactive_or_suspended() {
    let mut h = Harness::new();
    assert!(!h.scheduler.invalidate_database());

    h.scheduler.initialize(true);
    h.release(Step::Return(vec![1]));
    h.tick_until(|s| !s.is_updating());

    {
        let _guard = h.scheduler.suspend();
        assert!(!h.scheduler.invalidate_database());
    }
    assert!(h.scheduler.invalidate_database());
    h.release(Step::Return(vec![2]));
    h.tick_until(|s| !s.is_updating());
}

#[test]
fn test_interrupted_cycle_restarts_on_warm_start() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = write_snapshot(&dir, true, vec![41, 42])?;

    let mut h = Harness::with(|s| s.with_store(store.clone()));
    h.scheduler.initialize(false);

    // Exactly one new cycle, and the stale table is not served
    assert_eq!(h.scheduler.cycles_started(), 1);
    assert!(h.scheduler.is_updating());
    assert!(!h.scheduler.is_ready());
    assert!(h.scheduler.table().is_empty());
    assert_eq!(h.changes.get(), 0);

    h.release(Step::Return(vec![1]));
    h.tick_until(|s| !s.is_updating());
    assert_eq!(h.changes.get(), 1);
    assert_eq!(h.scheduler.table(), &vec![1]);
    assert_eq!(h.scheduler.cycles_started(), 1);

    let saved: Snapshot<Vec<u32>> = store.load()?.expect("snapshot written");
    assert!(!saved.pending_update);
    assert_eq!(saved.table, vec![1]);
    Ok(())
}

#[test]
fn test_warm_start_without_pending_serves_snapshot() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = write_snapshot(&dir, false, vec![5, 6])?;

    let mut h = Harness::with(|s| s.with_store(store));
    h.scheduler.initialize(false);

    assert!(h.scheduler.is_ready());
    assert!(!h.scheduler.is_updating());
    assert_eq!(h.scheduler.cycles_started(), 0);
    assert_eq!(h.scheduler.table(), &vec![5, 6]);
    Ok(())
}

#[test]
fn test_restart_deferred_while_host_busy() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = write_snapshot(&dir, true, Vec::new())?;
    let host = SwitchableHost::default();
    host.busy.set(true);

    let mut h = Harness::with(|s| {
        s.with_store(store)
            .with_host(host.clone())
            .with_auto_refresh(Some(Duration::from_millis(1)))
    });
    h.scheduler.initialize(false);
    assert!(h.scheduler.restart_deferred());
    assert_eq!(h.scheduler.cycles_started(), 0);

    for _ in 0..5 {
        h.scheduler.tick();
    }
    assert_eq!(h.scheduler.cycles_started(), 0);

    host.busy.set(false);
    h.scheduler.tick();
    assert!(!h.scheduler.restart_deferred());
    assert_eq!(h.scheduler.cycles_started(), 1);

    h.release(Step::Return(vec![3]));
    h.tick_until(|s| s.is_ready());
    Ok(())
}

#[test]
fn test_auto_refresh_after_interval() {
    let mut h = Harness::with(|s| s.with_auto_refresh(Some(Duration::from_millis(300))));
    h.scheduler.initialize(true);
    h.release(Step::Return(vec![1]));
    h.tick_until(|s| !s.is_updating());
    assert_eq!(h.scheduler.cycles_started(), 1);

    // Not due yet
    h.scheduler.tick();
    assert_eq!(h.scheduler.cycles_started(), 1);

    thread::sleep(Duration::from_millis(400));
    h.scheduler.tick();
    assert_eq!(h.scheduler.cycles_started(), 2);

    h.release(Step::Return(vec![2]));
    h.tick_until(|s| !s.is_updating());
    assert_eq!(h.scheduler.table(), &vec![2]);
}

#[test]
fn test_zero_interval_disables_auto_refresh() {
    let mut h = Harness::with(|s| s.with_auto_refresh(Some(Duration::ZERO)));
    h.scheduler.initialize(true);
    h.release(Step::Return(vec![1]));
    h.tick_until(|s| !s.is_updating());

    thread::sleep(Duration::from_millis(20));
    h.scheduler.tick();
    assert_eq!(h.scheduler.cycles_started(), 1);
}

#[test]
fn test_data_error_keeps_previous_table() {
    let mut h = Harness::new();
    h.scheduler.initialize(true);
    h.release(Step::Return(vec![1, 2]));
    h.tick_until(|s| !s.is_updating());

    h.scheduler.invalidate_database();
    h.release(Step::Fail(SvnCacheError::malformed_line("garbage")));
    h.tick_until(|s| !s.is_updating());

    assert_eq!(h.scheduler.table(), &vec![1, 2]);
    assert_eq!(h.changes.get(), 2);
}

#[test]
fn test_failed_gather_yields_empty_table() {
    let mut h = Harness::new();
    h.scheduler.initialize(true);
    h.release(Step::Return(vec![1, 2]));
    h.tick_until(|s| !s.is_updating());

    h.scheduler.invalidate_database();
    h.release(Step::Fail(SvnCacheError::command_failed("svn status", "boom")));
    h.tick_until(|s| !s.is_updating());
    assert!(h.scheduler.table().is_empty());
    assert!(h.scheduler.is_ready());
}

#[test]
fn test_panicking_gather_yields_empty_table() {
    let mut h = Harness::new();
    h.scheduler.initialize(true);
    h.release(Step::Panic);
    h.tick_until(|s| !s.is_updating());
    assert!(h.scheduler.table().is_empty());
    assert_eq!(h.changes.get(), 1);
}

#[test]
fn test_configuration_errors_reported_once() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let reporter = {
        let seen = Arc::clone(&seen);
        Arc::new(ErrorReporter::with_sink(move |message| {
            seen.lock().unwrap().push(message.to_string())
        }))
    };
    let mut h = Harness::with(|s| s.with_reporter(reporter));
    h.scheduler.initialize(true);

    for _ in 0..3 {
        h.release(Step::Fail(SvnCacheError::Connection {
            message: "E170013: Unable to connect".to_string(),
        }));
        h.tick_until(|s| !s.is_updating());
        h.scheduler.invalidate_database();
    }
    h.release(Step::Return(Vec::new()));
    h.tick_until(|s| !s.is_updating());

    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_deactivate_discards_running_cycle() {
    let mut h = Harness::new();
    h.scheduler.initialize(true);
    h.wait_for_gathers(1);

    h.scheduler.deactivate();
    assert!(!h.scheduler.is_active());

    // The worker observes the graceful abort and returns
    h.wait_for_cancel();
    h.tick_until(|s| !s.is_updating());
    assert!(h.scheduler.table().is_empty());
    assert!(!h.scheduler.is_ready());
}

#[test]
fn test_force_refresh_discards_superseded_result() {
    let mut h = Harness::new();
    h.scheduler.initialize(true);
    h.wait_for_gathers(1);

    assert!(h.scheduler.force_refresh());
    assert_eq!(h.scheduler.cycles_started(), 2);
    h.wait_for_gathers(2);
    // Both workers share the step channel, let the superseded one exit first
    h.wait_for_cancel();

    h.release(Step::Return(vec![99]));
    h.tick_until(|s| !s.is_updating());
    assert_eq!(h.scheduler.table(), &vec![99]);
    assert_eq!(h.changes.get(), 1);

    // Nothing left over from the first cycle
    for _ in 0..10 {
        h.scheduler.tick();
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(h.changes.get(), 1);
}

#[test]
fn test_before_shutdown_persists_pending_flag_and_aborts() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = SnapshotStore::at(dir.path().join("fake.json"));

    let mut h = Harness::with(|s| s.with_store(store.clone()));
    h.scheduler.initialize(true);
    h.wait_for_gathers(1);
    h.scheduler.before_shutdown();

    let saved: Snapshot<Vec<u32>> = store.load()?.expect("snapshot written");
    assert!(saved.pending_update);
    h.wait_for_cancel();
    Ok(())
}

#[test]
fn test_attach_ticks_from_tick_loop() {
    let h = Harness::new();
    let steps = h.steps.clone();
    let changes = Rc::clone(&h.changes);
    let scheduler = Rc::new(RefCell::new(h.scheduler));
    let tick_loop = TickLoop::new();
    DatabaseScheduler::attach(&scheduler, &tick_loop);

    scheduler.borrow_mut().initialize(true);
    steps.send(Step::Return(vec![4])).unwrap();

    let start = Instant::now();
    while changes.get() == 0 {
        assert!(start.elapsed() < Duration::from_secs(10));
        tick_loop.tick();
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(scheduler.borrow().table(), &vec![4]);

    drop(scheduler);
    tick_loop.tick();
    assert_eq!(tick_loop.subscriber_count(), 0);
}
