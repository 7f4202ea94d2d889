//! Background work delivered to a single-threaded consumer.
//!
//! ## TickLoop
//!
//! The consumer side owns a [`TickLoop`] and calls [`TickLoop::tick`] from its
//! own thread. Subscribers run in subscription order and remove themselves by
//! returning [`TickControl::Unsubscribe`].
//!
//! ## AsyncOperation
//!
//! [`AsyncOperation::start`] runs a closure on a dedicated worker thread. Lines
//! the closure emits through its [`OperationHandle`] are queued and replayed on
//! the tick thread in FIFO order, followed by exactly one completion callback.
//! A panic inside the closure never escapes the worker: the consumer receives
//! `T::default()` and the panic message is logged and delivered as an error
//! line during the tick that completes the operation.

use crate::core::cancel::{cancellation_pair, CancellationHandle, CancellationToken};
use crate::core::shell::{AbortRequest, ShellMonitor};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;

/// Returned by tick subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Unsubscribe,
}

type TickCallback = Box<dyn FnMut() -> TickControl>;

/// Something running in the background that can be told to stop.
pub trait Abortable: Send + Sync {
    fn abort(&self, kill: bool);
    fn has_finished(&self) -> bool;
}

/// Single-threaded update loop of the consumer
#[derive(Default)]
pub struct TickLoop {
    subscribers: RefCell<Vec<TickCallback>>,
    abortables: RefCell<Vec<Weak<dyn Abortable>>>,
}

impl TickLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` on every tick until it returns `Unsubscribe`.
    /// Subscribing from inside a tick takes effect on the next tick.
    pub fn subscribe(&self, callback: impl FnMut() -> TickControl + 'static) {
        self.subscribers.borrow_mut().push(Box::new(callback));
    }

    pub fn tick(&self) {
        let mut current = std::mem::take(&mut *self.subscribers.borrow_mut());
        current.retain_mut(|callback| callback() == TickControl::Continue);

        let mut subscribers = self.subscribers.borrow_mut();
        let added = std::mem::take(&mut *subscribers);
        *subscribers = current;
        subscribers.extend(added);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Track background work so a shutdown notice can stop it first.
    pub fn register_abortable(&self, abortable: Weak<dyn Abortable>) {
        let mut abortables = self.abortables.borrow_mut();
        abortables.retain(|weak| weak.strong_count() > 0);
        abortables.push(abortable);
    }

    /// The host is about to tear down background threads. Ask every running
    /// operation to stop now, while it can still exit cleanly.
    pub fn notify_before_shutdown(&self) {
        let abortables = std::mem::take(&mut *self.abortables.borrow_mut());
        for abortable in abortables.iter().filter_map(Weak::upgrade) {
            if !abortable.has_finished() {
                log::debug!("Aborting background operation before shutdown");
                abortable.abort(false);
            }
        }
    }
}

/// Lines produced by an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    Output(String),
    Error(String),
}

struct OperationCore {
    events: Sender<OperationEvent>,
    token: CancellationToken,
    cancel: CancellationHandle,
    finished: AtomicBool,
}

impl Abortable for OperationCore {
    fn abort(&self, kill: bool) {
        self.cancel.cancel(kill);
    }

    fn has_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Worker-side view of an operation, passed to the work closure
#[derive(Clone)]
pub struct OperationHandle {
    core: Arc<OperationCore>,
}

impl OperationHandle {
    /// Queue an output line for delivery on the tick thread
    pub fn output(&self, line: impl Into<String>) {
        let _ = self.core.events.send(OperationEvent::Output(line.into()));
    }

    /// Queue an error line for delivery on the tick thread
    pub fn error(&self, line: impl Into<String>) {
        let _ = self.core.events.send(OperationEvent::Error(line.into()));
    }

    pub fn is_aborted(&self) -> bool {
        self.core.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.core.token.clone()
    }
}

impl ShellMonitor for OperationHandle {
    fn abort_request(&self) -> AbortRequest {
        self.core.token.request()
    }

    fn on_output_line(&self, line: &str) {
        self.output(line);
    }

    fn on_error_line(&self, line: &str) {
        self.error(line);
    }
}

type LineCallback = Box<dyn FnMut(&str)>;

struct Handlers<T> {
    on_output: Vec<LineCallback>,
    on_error: Vec<LineCallback>,
    on_completed: Option<Box<dyn FnOnce(T)>>,
}

impl<T> Default for Handlers<T> {
    fn default() -> Self {
        Self {
            on_output: Vec::new(),
            on_error: Vec::new(),
            on_completed: None,
        }
    }
}

impl<T> Handlers<T> {
    fn deliver(&mut self, event: &OperationEvent) {
        match event {
            OperationEvent::Output(line) => self.on_output.iter_mut().for_each(|f| f(line)),
            OperationEvent::Error(line) => self.on_error.iter_mut().for_each(|f| f(line)),
        }
    }
}

type WorkerSlot<T> = Arc<Mutex<Option<Result<T, String>>>>;

/// Consumer-side handle of a background operation
pub struct AsyncOperation<T> {
    core: Arc<OperationCore>,
    handlers: Rc<RefCell<Handlers<T>>>,
    completed: Rc<Cell<bool>>,
}

impl<T: Send + Default + 'static> AsyncOperation<T> {
    /// Spawn `work` on a new thread and deliver its events through `tick_loop`.
    pub fn start<F>(tick_loop: &TickLoop, work: F) -> Self
    where
        F: FnOnce(&OperationHandle) -> T + Send + 'static,
    {
        let (events_tx, events_rx) = unbounded();
        let (token, cancel) = cancellation_pair();
        let core = Arc::new(OperationCore {
            events: events_tx,
            token,
            cancel,
            finished: AtomicBool::new(false),
        });
        let slot: WorkerSlot<T> = Arc::new(Mutex::new(None));

        let worker = OperationHandle {
            core: Arc::clone(&core),
        };
        let worker_slot = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name("async-operation".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&worker)))
                    .map_err(|payload| panic_message(payload.as_ref()));
                *worker_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
                worker.core.finished.store(true, Ordering::Release);
            });
        if let Err(e) = spawned {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(Err(format!("failed to spawn worker thread: {e}")));
            core.finished.store(true, Ordering::Release);
        }

        let abortable: Arc<dyn Abortable> = Arc::clone(&core) as Arc<dyn Abortable>;
        let weak_core: Weak<dyn Abortable> = Arc::downgrade(&abortable);
        tick_loop.register_abortable(weak_core);

        let handlers: Rc<RefCell<Handlers<T>>> = Rc::new(RefCell::new(Handlers::default()));
        let completed = Rc::new(Cell::new(false));
        tick_loop.subscribe(Self::pump(
            Arc::clone(&core),
            events_rx,
            slot,
            Rc::clone(&handlers),
            Rc::clone(&completed),
        ));

        Self {
            core,
            handlers,
            completed,
        }
    }

    fn pump(
        core: Arc<OperationCore>,
        events: Receiver<OperationEvent>,
        slot: WorkerSlot<T>,
        handlers: Rc<RefCell<Handlers<T>>>,
        completed: Rc<Cell<bool>>,
    ) -> impl FnMut() -> TickControl {
        move || {
            // Read the flag first: every event sent before it was set is queued by now
            let finished = core.finished.load(Ordering::Acquire);
            for event in events.try_iter() {
                handlers.borrow_mut().deliver(&event);
            }
            if !finished {
                return TickControl::Continue;
            }

            let outcome = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            let value = match outcome {
                Some(Ok(value)) => value,
                Some(Err(message)) => {
                    log::error!("Background operation failed: {message}");
                    handlers
                        .borrow_mut()
                        .deliver(&OperationEvent::Error(message));
                    T::default()
                }
                None => T::default(),
            };

            completed.set(true);
            let on_completed = handlers.borrow_mut().on_completed.take();
            if let Some(on_completed) = on_completed {
                on_completed(value);
            }
            TickControl::Unsubscribe
        }
    }
}

impl<T> AsyncOperation<T> {
    pub fn on_output(&self, callback: impl FnMut(&str) + 'static) -> &Self {
        self.handlers.borrow_mut().on_output.push(Box::new(callback));
        self
    }

    pub fn on_error(&self, callback: impl FnMut(&str) + 'static) -> &Self {
        self.handlers.borrow_mut().on_error.push(Box::new(callback));
        self
    }

    /// Called once, on the tick thread, with the result of the work
    pub fn on_completed(&self, callback: impl FnOnce(T) + 'static) -> &Self {
        self.handlers.borrow_mut().on_completed = Some(Box::new(callback));
        self
    }

    /// Request cancellation. With `kill` a running process is terminated
    /// instead of being asked to close. Safe to call from any thread holding a
    /// [`OperationHandle`]; from the consumer use this method.
    pub fn abort(&self, kill: bool) {
        self.core.abort(kill);
    }

    /// The worker has returned
    pub fn has_finished(&self) -> bool {
        self.core.has_finished()
    }

    /// The completion callback has been delivered
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    pub fn handle(&self) -> OperationHandle {
        OperationHandle {
            core: Arc::clone(&self.core),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
