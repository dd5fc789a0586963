#![forbid(unsafe_code)]

//! Tick scheduler with a main context and a worker pool.
//!
//! The host drives the clock by calling [`TickScheduler::tick`] once per tick
//! on its main thread. Repeating callbacks declare an [`Affinity`]:
//!
//! - [`Affinity::Main`] callbacks run inline on the thread calling `tick()`.
//! - [`Affinity::Worker`] callbacks run on a fixed pool of worker threads.
//!
//! # How a tick runs
//!
//! 1. Pending main-context hand-off requests are serviced.
//! 2. Every callback whose due tick has arrived is collected and rescheduled
//!    `period` ticks later.
//! 3. Worker callbacks are dispatched; main callbacks run inline.
//! 4. `tick()` keeps servicing hand-off requests until every worker callback
//!    of this tick has finished, then advances the clock.
//!
//! Because of step 4 a callback never overlaps its own next invocation, and a
//! worker blocked in [`SchedulerHandle::call_sync`] is always answered while
//! the tick is in flight.
//!
//! # Invariants
//!
//! 1. The thread that creates the scheduler is the main context.
//! 2. `call_sync` from the main context fails with
//!    [`HandoffError::CalledFromMain`] instead of deadlocking.
//! 3. A cancelled callback is never collected again; one already collected for
//!    the current tick may still run once.
//! 4. A panicking callback is logged and does not take down its worker.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::error::HandoffError;

/// Identifier of a scheduled repeating callback.
pub type CallbackId = u64;

/// Where a callback must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    /// On the thread driving `tick()`.
    Main,
    /// On any worker thread.
    Worker,
}

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its data consistent, so a
/// poisoned lock carries no torn state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Events delivered to the main context.
enum MainEvent {
    /// A hand-off request to run on the main context.
    Run(Box<dyn FnOnce() + Send>),
    /// A worker finished one callback.
    WorkerDone,
}

struct Scheduled {
    id: CallbackId,
    affinity: Affinity,
    period: u64,
    next_due: u64,
    callback: Callback,
}

struct Shared {
    entries: Mutex<Vec<Scheduled>>,
    next_id: AtomicU64,
    current_tick: AtomicU64,
    main_thread: ThreadId,
    /// `None` once the scheduler has shut down.
    main_tx: Mutex<Option<mpsc::Sender<MainEvent>>>,
    handoff_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

struct WorkerJob {
    callback: Callback,
    done: mpsc::Sender<MainEvent>,
}

struct WorkerPool {
    sender: Option<mpsc::Sender<WorkerJob>>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    fn new(size: usize) -> Self {
        if size == 0 {
            return Self {
                sender: None,
                threads: Vec::new(),
            };
        }
        let (sender, receiver) = mpsc::channel::<WorkerJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let threads = (0..size)
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("herald-worker-{index}"))
                    .spawn(move || worker_loop(&receiver))
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
            })
            .collect();
        Self {
            sender: Some(sender),
            threads,
        }
    }

    /// Hand `job` to a worker, or give it back if there are none.
    fn submit(&self, job: WorkerJob) -> Result<(), WorkerJob> {
        match &self.sender {
            Some(sender) => sender.send(job).map_err(|e| e.0),
            None => Err(job),
        }
    }

    fn shutdown(&mut self) {
        self.sender = None;
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: &Mutex<mpsc::Receiver<WorkerJob>>) {
    loop {
        let job = match lock(receiver).recv() {
            Ok(job) => job,
            Err(_) => break,
        };
        run_guarded(&job.callback);
        if job.done.send(MainEvent::WorkerDone).is_err() {
            break;
        }
    }
}

fn run_guarded(callback: &Callback) {
    if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
        tracing::error!("scheduled callback panicked");
    }
}

// ---------------------------------------------------------------------------
// TickScheduler
// ---------------------------------------------------------------------------

/// Owns the clock, the worker pool and the main-context queue.
pub struct TickScheduler {
    shared: Arc<Shared>,
    main_rx: mpsc::Receiver<MainEvent>,
    pool: WorkerPool,
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("tick", &self.current_tick())
            .field("scheduled", &lock(&self.shared.entries).len())
            .field("workers", &self.pool.threads.len())
            .finish()
    }
}

impl TickScheduler {
    /// Create a scheduler; the calling thread becomes the main context.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        let (main_tx, main_rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            current_tick: AtomicU64::new(0),
            main_thread: thread::current().id(),
            main_tx: Mutex::new(Some(main_tx)),
            handoff_timeout: config.handoff_timeout,
        });
        tracing::debug!(workers = config.worker_threads, "tick scheduler created");
        Self {
            shared,
            main_rx,
            pool: WorkerPool::new(config.worker_threads),
        }
    }

    /// A cloneable handle for scheduling from any thread.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Index of the next tick to run.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.shared.current_tick.load(Ordering::Acquire)
    }

    /// Number of scheduled repeating callbacks.
    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        lock(&self.shared.entries).len()
    }

    /// Run one tick. Must be called from the main context.
    pub fn tick(&mut self) {
        debug_assert_eq!(
            thread::current().id(),
            self.shared.main_thread,
            "tick() must run on the main context"
        );
        let tick = self.current_tick();
        self.drain_main_requests();

        let due = self.collect_due(tick);
        tracing::trace!(tick, due = due.len(), "tick");

        let mut main_callbacks = Vec::new();
        let mut pending = 0usize;
        for (affinity, callback) in due {
            match affinity {
                Affinity::Main => main_callbacks.push(callback),
                Affinity::Worker => match self.worker_sender() {
                    Some(done) => match self.pool.submit(WorkerJob { callback, done }) {
                        Ok(()) => pending += 1,
                        Err(job) => main_callbacks.push(job.callback),
                    },
                    None => main_callbacks.push(callback),
                },
            }
        }

        for callback in &main_callbacks {
            run_guarded(callback);
        }

        while pending > 0 {
            match self.main_rx.recv() {
                Ok(MainEvent::Run(request)) => request(),
                Ok(MainEvent::WorkerDone) => pending -= 1,
                Err(_) => break,
            }
        }

        self.shared.current_tick.store(tick + 1, Ordering::Release);
    }

    /// Run `n` ticks back to back.
    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Service hand-off requests without advancing the clock.
    pub fn drain_main_requests(&mut self) {
        while let Ok(event) = self.main_rx.try_recv() {
            if let MainEvent::Run(request) = event {
                request();
            }
        }
    }

    fn worker_sender(&self) -> Option<mpsc::Sender<MainEvent>> {
        lock(&self.shared.main_tx).clone()
    }

    fn collect_due(&self, tick: u64) -> Vec<(Affinity, Callback)> {
        let mut entries = lock(&self.shared.entries);
        entries
            .iter_mut()
            .filter(|entry| entry.next_due <= tick)
            .map(|entry| {
                entry.next_due = tick + entry.period;
                (entry.affinity, Arc::clone(&entry.callback))
            })
            .collect()
    }

    /// Cancel everything and stop the worker pool.
    ///
    /// Outstanding hand-off requests fail with [`HandoffError::Cancelled`].
    pub fn shutdown(&mut self) {
        lock(&self.shared.main_tx).take();
        let dropped = {
            let mut entries = lock(&self.shared.entries);
            std::mem::take(&mut *entries)
        };
        // Drop queued hand-off closures so their callers see a disconnect.
        while self.main_rx.try_recv().is_ok() {}
        self.pool.shutdown();
        tracing::debug!(cancelled = dropped.len(), "tick scheduler shut down");
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// SchedulerHandle
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe access to a [`TickScheduler`].
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("tick", &self.current_tick())
            .finish()
    }
}

impl SchedulerHandle {
    /// Run `callback` every `period` ticks, first after `delay` ticks.
    ///
    /// A `delay` of zero runs on the next tick the scheduler executes.
    pub fn schedule_repeating(
        &self,
        affinity: Affinity,
        delay: u64,
        period: u64,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> CallbackId {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let next_due = self.current_tick() + delay;
        lock(&self.shared.entries).push(Scheduled {
            id,
            affinity,
            period: period.max(1),
            next_due,
            callback: Arc::new(callback),
        });
        tracing::trace!(callback_id = id, ?affinity, delay, period, "callback scheduled");
        id
    }

    /// Cancel a scheduled callback. Returns `false` if it was not scheduled.
    pub fn cancel(&self, id: CallbackId) -> bool {
        let mut entries = lock(&self.shared.entries);
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() < before
    }

    /// Whether `id` is still scheduled.
    #[must_use]
    pub fn is_scheduled(&self, id: CallbackId) -> bool {
        lock(&self.shared.entries).iter().any(|entry| entry.id == id)
    }

    /// Index of the next tick to run.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.shared.current_tick.load(Ordering::Acquire)
    }

    /// Whether the calling thread is the main context.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.shared.main_thread
    }

    /// Run `f` on the main context and wait for its result.
    ///
    /// Blocks until the main context services the request (during the current
    /// or next tick), the hand-off timeout elapses, or the scheduler shuts
    /// down.
    pub fn call_sync<T, F>(&self, f: F) -> Result<T, HandoffError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_main_thread() {
            return Err(HandoffError::CalledFromMain);
        }
        let sender = lock(&self.shared.main_tx)
            .clone()
            .ok_or(HandoffError::Cancelled)?;
        let (result_tx, result_rx) = mpsc::sync_channel(1);
        sender
            .send(MainEvent::Run(Box::new(move || {
                let _ = result_tx.send(f());
            })))
            .map_err(|_| HandoffError::Cancelled)?;

        match result_rx.recv_timeout(self.shared.handoff_timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout = ?self.shared.handoff_timeout,
                    "main-context hand-off timed out"
                );
                Err(HandoffError::TimedOut(self.shared.handoff_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(HandoffError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn scheduler(workers: usize) -> TickScheduler {
        TickScheduler::new(&RuntimeConfig::default().worker_threads(workers))
    }

    #[test]
    fn repeating_callback_honors_delay_and_period() {
        let mut sched = scheduler(0);
        let hits = Arc::new(Mutex::new(Vec::new()));
        let handle = sched.handle();
        let recorded = Arc::clone(&hits);
        let ticks = handle.clone();
        handle.schedule_repeating(Affinity::Main, 2, 3, move || {
            lock(&recorded).push(ticks.current_tick());
        });
        sched.run_ticks(10);
        assert_eq!(*lock(&hits), vec![2, 5, 8]);
    }

    #[test]
    fn cancel_stops_future_runs() {
        let mut sched = scheduler(1);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let id = sched.handle().schedule_repeating(Affinity::Worker, 0, 1, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sched.run_ticks(3);
        assert!(sched.handle().cancel(id));
        assert!(!sched.handle().cancel(id));
        sched.run_ticks(3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(sched.scheduled_count(), 0);
    }

    #[test]
    fn worker_callbacks_finish_within_their_tick() {
        let mut sched = scheduler(3);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let c = Arc::clone(&count);
            sched.handle().schedule_repeating(Affinity::Worker, 0, 1, move || {
                thread::sleep(Duration::from_millis(2));
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        sched.tick();
        assert_eq!(count.load(Ordering::SeqCst), 8);
        sched.tick();
        assert_eq!(count.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn worker_runs_off_main_and_main_runs_inline() {
        let mut sched = scheduler(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for affinity in [Affinity::Main, Affinity::Worker] {
            let seen = Arc::clone(&seen);
            let handle = sched.handle();
            handle.clone().schedule_repeating(affinity, 0, 1, move || {
                lock(&seen).push((affinity, handle.is_main_thread()));
            });
        }
        sched.tick();
        let mut seen = lock(&seen).clone();
        seen.sort_by_key(|(a, _)| *a == Affinity::Worker);
        assert_eq!(seen, vec![(Affinity::Main, true), (Affinity::Worker, false)]);
    }

    #[test]
    fn call_sync_is_serviced_during_tick() {
        let mut sched = scheduler(2);
        let results = Arc::new(Mutex::new(Vec::new()));
        let handle = sched.handle();
        let out = Arc::clone(&results);
        let h = handle.clone();
        handle.schedule_repeating(Affinity::Worker, 0, 1, move || {
            let on_main = h.call_sync({
                let h = h.clone();
                move || h.is_main_thread()
            });
            lock(&out).push(on_main);
        });
        sched.tick();
        assert_eq!(*lock(&results), vec![Ok(true)]);
    }

    #[test]
    fn call_sync_from_main_is_rejected() {
        let sched = scheduler(0);
        assert_eq!(sched.handle().call_sync(|| 1), Err(HandoffError::CalledFromMain));
    }

    #[test]
    fn call_sync_times_out_without_ticks() {
        let sched = TickScheduler::new(
            &RuntimeConfig::default()
                .worker_threads(0)
                .handoff_timeout(Duration::from_millis(20)),
        );
        let handle = sched.handle();
        let result = thread::spawn(move || handle.call_sync(|| 5)).join().unwrap();
        assert_eq!(result, Err(HandoffError::TimedOut(Duration::from_millis(20))));
    }

    #[test]
    fn call_sync_after_shutdown_is_cancelled() {
        let mut sched = scheduler(0);
        let handle = sched.handle();
        sched.shutdown();
        let result = thread::spawn(move || handle.call_sync(|| 5)).join().unwrap();
        assert_eq!(result, Err(HandoffError::Cancelled));
    }

    #[test]
    fn panicking_callback_does_not_stall_tick() {
        let mut sched = scheduler(1);
        let count = Arc::new(AtomicUsize::new(0));
        sched
            .handle()
            .schedule_repeating(Affinity::Worker, 0, 1, || panic!("boom"));
        let c = Arc::clone(&count);
        sched.handle().schedule_repeating(Affinity::Worker, 0, 1, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sched.run_ticks(2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callbacks_scheduled_mid_tick_start_next_tick() {
        let mut sched = scheduler(0);
        let count = Arc::new(AtomicUsize::new(0));
        let handle = sched.handle();
        let h = handle.clone();
        let c = Arc::clone(&count);
        let armed = Arc::new(Mutex::new(false));
        handle.schedule_repeating(Affinity::Main, 0, 100, move || {
            let mut armed = lock(&armed);
            if !*armed {
                *armed = true;
                let c = Arc::clone(&c);
                h.schedule_repeating(Affinity::Main, 0, 1, move || {
                    c.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        sched.tick();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sched.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
