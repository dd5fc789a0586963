#![forbid(unsafe_code)]

//! Display Tracker: at most one active job per `(recipient, kind)`.
//!
//! Tracked kinds have a registry mapping each recipient to its running task.
//! Starting a new job of a tracked kind preempts the previous one, so two
//! animations never fight over the same presentation slot. Untracked kinds
//! are started directly.
//!
//! # Ordering
//!
//! The new task replaces the registry entry first, then the previous task is
//! stopped (finalizer and stop callback included), and only then is the new
//! task scheduled. The old finalizer therefore completes before the new
//! task's first `update`, whichever thread calls in. A new task stopped by a
//! concurrent preemption while still idle never starts and is untracked;
//! every preempted task that was running runs its finalizer exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::host::RecipientId;
use crate::scheduler::{SchedulerHandle, lock};
use crate::task::{TaskBody, TaskId, UpdateTask};

/// Presentation slot a display job targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    Overlay,
    Banner,
    Progress,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Overlay, JobKind::Banner, JobKind::Progress];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Overlay => "overlay",
            Self::Banner => "banner",
            Self::Progress => "progress",
        }
    }
}

/// A task body that presents to one recipient in one slot.
pub trait DisplayJob: TaskBody {
    fn kind(&self) -> JobKind;
    fn recipient(&self) -> &RecipientId;
}

type Registry = Mutex<HashMap<RecipientId, UpdateTask>>;

/// Per-kind registries of running display jobs.
#[derive(Clone)]
pub struct DisplayTracker {
    scheduler: SchedulerHandle,
    registries: HashMap<JobKind, Arc<Registry>>,
}

impl std::fmt::Debug for DisplayTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.registries.keys().copied().collect();
        kinds.sort();
        f.debug_struct("DisplayTracker")
            .field("tracked", &kinds)
            .finish()
    }
}

impl DisplayTracker {
    /// Tracker for overlays and banners. Progress bars carry their own bar
    /// id and may stack, so they are untracked.
    #[must_use]
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self::with_kinds(scheduler, &[JobKind::Overlay, JobKind::Banner])
    }

    /// Tracker for an explicit set of kinds.
    #[must_use]
    pub fn with_kinds(scheduler: SchedulerHandle, kinds: &[JobKind]) -> Self {
        let registries = kinds
            .iter()
            .map(|kind| (*kind, Arc::new(Mutex::new(HashMap::new()))))
            .collect();
        Self {
            scheduler,
            registries,
        }
    }

    #[must_use]
    pub fn is_tracked(&self, kind: JobKind) -> bool {
        self.registries.contains_key(&kind)
    }

    /// Start `job`, preempting any tracked job in the same slot.
    pub fn start_and_track(&self, job: impl DisplayJob) -> UpdateTask {
        let kind = job.kind();
        let recipient = job.recipient().clone();
        let task = UpdateTask::new(self.scheduler.clone(), job);

        let Some(registry) = self.registries.get(&kind) else {
            task.start_if_idle();
            return task;
        };

        let weak = Arc::downgrade(registry);
        let key = recipient.clone();
        task.set_stop_callback(move |id| untrack(&weak, &key, id));

        let previous = lock(registry).insert(recipient.clone(), task.clone());
        if let Some(previous) = previous {
            tracing::debug!(
                recipient = %recipient,
                kind = kind.name(),
                task_id = previous.id(),
                "preempting display job"
            );
            previous.stop();
        }
        // A concurrent preemption may already have stopped the idle task.
        if !task.start_if_idle() {
            untrack(&Arc::downgrade(registry), &recipient, task.id());
        }
        task
    }

    /// Number of tracked running jobs of `kind`.
    #[must_use]
    pub fn active_count(&self, kind: JobKind) -> usize {
        self.registries
            .get(&kind)
            .map_or(0, |registry| lock(registry).len())
    }

    /// The tracked job of `kind` for `recipient`, if any.
    #[must_use]
    pub fn active(&self, kind: JobKind, recipient: &RecipientId) -> Option<UpdateTask> {
        self.registries
            .get(&kind)
            .and_then(|registry| lock(registry).get(recipient).cloned())
    }

    /// Stop every tracked job.
    pub fn stop_all(&self) {
        for registry in self.registries.values() {
            let tasks: Vec<UpdateTask> = lock(registry).drain().map(|(_, task)| task).collect();
            for task in tasks {
                task.stop();
            }
        }
    }
}

/// Remove `recipient`'s entry only if it still belongs to task `id`.
fn untrack(registry: &Weak<Registry>, recipient: &RecipientId, id: TaskId) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let mut map = lock(&registry);
    if map.get(recipient).is_some_and(|task| task.id() == id) {
        map.remove(recipient);
    }
}
