#![forbid(unsafe_code)]

//! The `UpdateTask` state machine.
//!
//! An [`UpdateTask`] wraps a [`TaskBody`] and drives it from a repeating
//! scheduler callback:
//!
//! ```text
//! Idle --start()--> Running --stop() / predicate false--> Stopped
//!                     ^  |
//!                     +--+ start() while Running: implicit stop, then restart
//! ```
//!
//! Each tick: if `should_continue(ticks_lived)` is false the task stops and
//! that tick's `update` is skipped; otherwise `update(ticks_lived)` runs and
//! `ticks_lived` is incremented.
//!
//! # Invariants
//!
//! 1. `update` calls of one task never overlap and arrive in tick order.
//! 2. `on_stop` runs exactly once per Running -> Stopped transition.
//! 3. The stop callback fires at most once per task, outside the task lock,
//!    so it may freely start or stop other tasks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::scheduler::{Affinity, CallbackId, SchedulerHandle, lock};

/// Unique id of an [`UpdateTask`].
pub type TaskId = u64;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of an [`UpdateTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Idle,
    Running,
    Stopped,
}

/// The behavior an [`UpdateTask`] drives.
pub trait TaskBody: Send + 'static {
    /// Context the periodic callback must run on.
    fn affinity(&self) -> Affinity {
        Affinity::Worker
    }

    /// Ticks between updates.
    fn period(&self) -> u64 {
        1
    }

    /// Whether the task should keep running at `ticks_lived`.
    fn should_continue(&mut self, ticks_lived: u64) -> bool;

    /// Render and push the frame for `ticks_lived`.
    fn update(&mut self, ticks_lived: u64);

    /// Finalizer, run once when the task leaves `Running`.
    fn on_stop(&mut self) {}
}

type StopCallback = Box<dyn FnOnce(TaskId) + Send>;

struct Inner {
    state: TaskState,
    ticks_lived: u64,
    /// Bumped on every start so stale callbacks can tell they are stale.
    generation: u64,
    callback_id: Option<CallbackId>,
    body: Box<dyn TaskBody>,
    stop_callback: Option<StopCallback>,
}

/// A cloneable handle to a scheduled task.
#[derive(Clone)]
pub struct UpdateTask {
    id: TaskId,
    inner: Arc<Mutex<Inner>>,
    scheduler: SchedulerHandle,
}

impl fmt::Debug for UpdateTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("UpdateTask")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("ticks_lived", &inner.ticks_lived)
            .finish()
    }
}

impl UpdateTask {
    /// Wrap `body` in an idle task.
    pub fn new(scheduler: SchedulerHandle, body: impl TaskBody) -> Self {
        Self::from_boxed(scheduler, Box::new(body))
    }

    pub(crate) fn from_boxed(scheduler: SchedulerHandle, body: Box<dyn TaskBody>) -> Self {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(Mutex::new(Inner {
                state: TaskState::Idle,
                ticks_lived: 0,
                generation: 0,
                callback_id: None,
                body,
                stop_callback: None,
            })),
            scheduler,
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        lock(&self.inner).state
    }

    #[must_use]
    pub fn ticks_lived(&self) -> u64 {
        lock(&self.inner).ticks_lived
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// Register the callback fired when this task stops.
    ///
    /// Replaces any previously registered callback.
    pub fn set_stop_callback(&self, callback: impl FnOnce(TaskId) + Send + 'static) {
        lock(&self.inner).stop_callback = Some(Box::new(callback));
    }

    /// Start (or restart) the task from `ticks_lived = 0`.
    ///
    /// A running task is stopped first, which runs its finalizer. The stop
    /// and the restart happen under one lock, so concurrent starts leave
    /// exactly one live scheduler entry.
    pub fn start(&self) {
        let callback = {
            let mut inner = lock(&self.inner);
            let callback = match inner.state {
                TaskState::Running => self.halt(&mut inner),
                TaskState::Idle | TaskState::Stopped => None,
            };
            self.begin(&mut inner);
            callback
        };
        if let Some(callback) = callback {
            callback(self.id);
        }
    }

    /// Start only if the task has never run. Returns whether it started.
    pub(crate) fn start_if_idle(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.state != TaskState::Idle {
            return false;
        }
        self.begin(&mut inner);
        true
    }

    fn begin(&self, inner: &mut Inner) {
        inner.state = TaskState::Running;
        inner.ticks_lived = 0;
        inner.generation += 1;
        let generation = inner.generation;
        let affinity = inner.body.affinity();
        let period = inner.body.period();

        let task = self.clone();
        let id = self
            .scheduler
            .schedule_repeating(affinity, 0, period, move || task.run_tick(generation));
        inner.callback_id = Some(id);
        tracing::debug!(task_id = self.id, ?affinity, "task started");
    }

    /// Running -> Stopped: cancel the callback and run the finalizer.
    fn halt(&self, inner: &mut Inner) -> Option<StopCallback> {
        inner.state = TaskState::Stopped;
        if let Some(id) = inner.callback_id.take() {
            self.scheduler.cancel(id);
        }
        inner.body.on_stop();
        tracing::debug!(task_id = self.id, ticks_lived = inner.ticks_lived, "task stopped");
        inner.stop_callback.take()
    }

    /// Stop the task. Safe to call repeatedly and from any context.
    ///
    /// Stopping an idle task marks it stopped without running the finalizer.
    pub fn stop(&self) {
        let callback = {
            let mut inner = lock(&self.inner);
            match inner.state {
                TaskState::Stopped => return,
                TaskState::Idle => {
                    inner.state = TaskState::Stopped;
                    return;
                }
                TaskState::Running => self.halt(&mut inner),
            }
        };
        if let Some(callback) = callback {
            callback(self.id);
        }
    }

    fn run_tick(&self, generation: u64) {
        let finished = {
            let mut inner = lock(&self.inner);
            if inner.state != TaskState::Running || inner.generation != generation {
                return;
            }
            let ticks = inner.ticks_lived;
            if inner.body.should_continue(ticks) {
                inner.body.update(ticks);
                inner.ticks_lived += 1;
                false
            } else {
                true
            }
        };
        if finished {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::scheduler::TickScheduler;

    #[derive(Default)]
    struct Log {
        updates: Vec<u64>,
        stops: usize,
    }

    struct Counted {
        lifetime: u64,
        log: Arc<Mutex<Log>>,
    }

    impl TaskBody for Counted {
        fn affinity(&self) -> Affinity {
            Affinity::Main
        }

        fn should_continue(&mut self, ticks_lived: u64) -> bool {
            ticks_lived < self.lifetime
        }

        fn update(&mut self, ticks_lived: u64) {
            lock(&self.log).updates.push(ticks_lived);
        }

        fn on_stop(&mut self) {
            lock(&self.log).stops += 1;
        }
    }

    fn setup(lifetime: u64) -> (TickScheduler, UpdateTask, Arc<Mutex<Log>>) {
        let sched = TickScheduler::new(&RuntimeConfig::default().worker_threads(0));
        let log = Arc::new(Mutex::new(Log::default()));
        let task = UpdateTask::new(
            sched.handle(),
            Counted {
                lifetime,
                log: Arc::clone(&log),
            },
        );
        (sched, task, log)
    }

    #[test]
    fn runs_until_predicate_fails() {
        let (mut sched, task, log) = setup(3);
        assert_eq!(task.state(), TaskState::Idle);
        task.start();
        sched.run_ticks(10);
        assert_eq!(task.state(), TaskState::Stopped);
        assert_eq!(lock(&log).updates, vec![0, 1, 2]);
        assert_eq!(lock(&log).stops, 1);
        assert_eq!(sched.scheduled_count(), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut sched, task, log) = setup(100);
        task.start();
        sched.run_ticks(2);
        task.stop();
        task.stop();
        sched.run_ticks(2);
        assert_eq!(lock(&log).updates, vec![0, 1]);
        assert_eq!(lock(&log).stops, 1);
    }

    #[test]
    fn restart_resets_ticks_and_finalizes_once() {
        let (mut sched, task, log) = setup(100);
        task.start();
        sched.run_ticks(3);
        task.start();
        sched.run_ticks(2);
        assert_eq!(lock(&log).updates, vec![0, 1, 2, 0, 1]);
        assert_eq!(lock(&log).stops, 1);
        assert_eq!(task.ticks_lived(), 2);
    }

    #[test]
    fn stop_callback_fires_once() {
        let (mut sched, task, _log) = setup(1);
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        task.set_stop_callback(move |id| lock(&sink).push(id));
        task.start();
        sched.run_ticks(3);
        task.stop();
        assert_eq!(*lock(&fired), vec![task.id()]);
    }

    #[test]
    fn stopping_idle_task_skips_finalizer() {
        let (_sched, task, log) = setup(5);
        task.stop();
        assert_eq!(task.state(), TaskState::Stopped);
        assert_eq!(lock(&log).stops, 0);
        assert!(!task.start_if_idle());
    }

    #[test]
    fn stop_callback_may_touch_the_task() {
        let (mut sched, task, _log) = setup(1);
        let observed = Arc::new(Mutex::new(None));
        let handle = task.clone();
        let slot = Arc::clone(&observed);
        task.set_stop_callback(move |_| *lock(&slot) = Some(handle.state()));
        task.start();
        sched.run_ticks(2);
        assert_eq!(*lock(&observed), Some(TaskState::Stopped));
    }

    #[test]
    fn concurrent_restarts_leave_one_live_callback() {
        let (mut sched, task, log) = setup(1000);
        task.start();
        sched.tick();
        let starters: Vec<_> = (0..8)
            .map(|_| {
                let task = task.clone();
                std::thread::spawn(move || task.start())
            })
            .collect();
        for starter in starters {
            starter.join().unwrap();
        }
        assert_eq!(sched.scheduled_count(), 1);

        lock(&log).updates.clear();
        sched.run_ticks(3);
        assert_eq!(lock(&log).updates, vec![0, 1, 2]);

        task.stop();
        sched.run_ticks(3);
        assert_eq!(sched.scheduled_count(), 0);
        assert_eq!(lock(&log).updates, vec![0, 1, 2]);
        assert_eq!(lock(&log).stops, 9);
    }
}
