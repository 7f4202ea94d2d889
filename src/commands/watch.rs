use crate::commands::load_config;
use crate::core::{
    error::Result,
    print_error, print_success,
    reporter::ErrorReporter,
    scheduler::{DatabaseScheduler, DatabaseSource},
    snapshot::SnapshotStore,
    status_cache::{StatusCache, StatusSource},
    svn::SvnClient,
    svn_status::FileState,
    TickLoop,
};
use chrono::Local;
use colored::*;
use std::cell::{Cell, RefCell};
use std::env;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Run the status cache on a tick loop. Without `seconds` the command returns
/// after the first refresh cycle completes.
pub fn execute_watch(seconds: Option<u64>) -> Result<()> {
    let mut config = load_config();
    let working_copy = env::current_dir()?;
    let client = SvnClient::from_config(&working_copy, &config);

    let was_freshly_created =
        !SnapshotStore::for_working_copy(&working_copy, StatusSource::NAME)?.exists();
    let reporter = Arc::new(ErrorReporter::with_sink(print_error));
    let cache: StatusCache =
        StatusCache::for_working_copy(client, &config)?.with_reporter(reporter);
    let cache = Rc::new(RefCell::new(cache));

    let changes = Rc::new(Cell::new(0u64));
    {
        let changes = Rc::clone(&changes);
        cache
            .borrow_mut()
            .subscribe_changed(move || changes.set(changes.get() + 1));
    }

    let tick_loop = TickLoop::new();
    DatabaseScheduler::attach(&cache, &tick_loop);
    cache.borrow_mut().initialize(was_freshly_created);
    if !was_freshly_created && cache.borrow().is_ready() {
        print_summary(&cache.borrow(), "Loaded snapshot");
        // Serve the snapshot while a fresh cycle runs
        cache.borrow_mut().invalidate_database();
    }

    let deadline = seconds.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut seen = 0;
    loop {
        tick_loop.tick();

        if changes.get() != seen {
            seen = changes.get();
            print_summary(&cache.borrow(), "Status refreshed");
            if deadline.is_none() {
                break;
            }
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        thread::sleep(TICK_INTERVAL);
    }

    tick_loop.notify_before_shutdown();
    cache.borrow_mut().before_shutdown();

    config.mark_refreshed();
    if let Err(e) = config.save() {
        log::warn!("Failed to save configuration: {e}");
    }
    print_success("Snapshot saved");
    Ok(())
}

fn print_summary(cache: &StatusCache, title: &str) {
    let table = cache.table();
    let entries = table.sorted();
    let count = |state: FileState| {
        entries
            .iter()
            .filter(|entry| entry.merged.file_state == state)
            .count()
    };
    println!(
        "{} {} {} entries ({} modified, {} conflicted, {} unversioned)",
        Local::now().format("%H:%M:%S").to_string().bright_black(),
        title.white(),
        table.len().to_string().cyan(),
        count(FileState::Modified),
        count(FileState::Conflicted),
        count(FileState::Unversioned),
    );
}
