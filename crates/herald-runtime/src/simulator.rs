#![forbid(unsafe_code)]

//! Deterministic in-memory host for testing.
//!
//! [`RecordingHost`] implements every host trait, records each presenter and
//! command call as a [`HostEvent`], and lets tests change the roster,
//! permissions and AFK state between ticks. [`Simulation`] bundles it with a
//! scheduler and a broadcaster.
//!
//! # Example
//!
//! ```
//! use herald_runtime::config::{ContentSetDescriptor, Interval, MessageSpec};
//! use herald_runtime::simulator::{HostEvent, Simulation};
//!
//! let mut sim = Simulation::new().online(["alex"]);
//! sim.broadcaster()
//!     .start_content_set(
//!         ContentSetDescriptor::new("tips", Interval::ticks(2)).message(MessageSpec::chat("hi")),
//!     )
//!     .unwrap();
//! sim.step();
//! assert_eq!(
//!     sim.host().take_events(),
//!     [HostEvent::Chat { to: "alex".into(), text: "hi".into() }]
//! );
//! ```
//!
//! Permissions are granted unless explicitly denied. The placeholder
//! expander replaces `{player}` with the recipient id.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crate::broadcast::Broadcaster;
use crate::config::RuntimeConfig;
use crate::host::{
    BannerFrame, BarId, CommandSink, Host, Permissions, Placeholders, Presenter, ProgressFrame,
    RecipientId, Roster, Sound,
};
use crate::scheduler::{TickScheduler, lock};

/// Placeholder the recording host expands to the recipient id.
pub const PLAYER_PLACEHOLDER: &str = "{player}";

/// One recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Chat { to: RecipientId, text: String },
    Overlay { to: RecipientId, text: String },
    Banner { to: RecipientId, frame: BannerFrame },
    ClearBanner { to: RecipientId },
    ProgressShow { to: RecipientId, bar: BarId, frame: ProgressFrame },
    ProgressUpdate { to: RecipientId, bar: BarId, frame: ProgressFrame },
    ProgressHide { to: RecipientId, bar: BarId },
    Sound { to: RecipientId, sound: Sound },
    Console { command: String },
    CommandAs { who: RecipientId, command: String },
}

impl HostEvent {
    /// Recipient the event targets; `None` for console commands.
    #[must_use]
    pub fn recipient(&self) -> Option<&RecipientId> {
        match self {
            Self::Chat { to, .. }
            | Self::Overlay { to, .. }
            | Self::Banner { to, .. }
            | Self::ClearBanner { to }
            | Self::ProgressShow { to, .. }
            | Self::ProgressUpdate { to, .. }
            | Self::ProgressHide { to, .. }
            | Self::Sound { to, .. } => Some(to),
            Self::CommandAs { who, .. } => Some(who),
            Self::Console { .. } => None,
        }
    }
}

#[derive(Default)]
struct World {
    online: Vec<RecipientId>,
    denied: HashMap<RecipientId, HashSet<String>>,
    afk: HashSet<RecipientId>,
}

struct Recorder {
    main_thread: ThreadId,
    world: Mutex<World>,
    events: Mutex<Vec<HostEvent>>,
    off_main_roster_reads: AtomicUsize,
}

/// A cloneable recording host; clones share state.
#[derive(Clone)]
pub struct RecordingHost {
    inner: Arc<Recorder>,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecordingHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingHost")
            .field("online", &lock(&self.inner.world).online)
            .field("events", &lock(&self.inner.events).len())
            .finish()
    }
}

impl RecordingHost {
    /// Empty host; the calling thread is treated as the main context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Recorder {
                main_thread: thread::current().id(),
                world: Mutex::new(World::default()),
                events: Mutex::new(Vec::new()),
                off_main_roster_reads: AtomicUsize::new(0),
            }),
        }
    }

    /// Set the roster (builder).
    #[must_use]
    pub fn online<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RecipientId>,
    {
        self.set_online(ids);
        self
    }

    /// Deny `permission` to `who` (builder).
    #[must_use]
    pub fn deny(self, who: impl Into<RecipientId>, permission: impl Into<String>) -> Self {
        lock(&self.inner.world)
            .denied
            .entry(who.into())
            .or_default()
            .insert(permission.into());
        self
    }

    /// Mark `who` as away from keyboard (builder).
    #[must_use]
    pub fn afk(self, who: impl Into<RecipientId>) -> Self {
        self.set_afk(who, true);
        self
    }

    pub fn set_online<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<RecipientId>,
    {
        lock(&self.inner.world).online = ids.into_iter().map(Into::into).collect();
    }

    pub fn set_afk(&self, who: impl Into<RecipientId>, afk: bool) {
        let who = who.into();
        let mut world = lock(&self.inner.world);
        if afk {
            world.afk.insert(who);
        } else {
            world.afk.remove(&who);
        }
    }

    /// Bundle this recorder as a [`Host`].
    #[must_use]
    pub fn host(&self) -> Host {
        let shared = Arc::new(self.clone());
        Host::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
        )
        .with_placeholders(shared)
    }

    /// Drain recorded events.
    pub fn take_events(&self) -> Vec<HostEvent> {
        std::mem::take(&mut *lock(&self.inner.events))
    }

    /// Recorded events without draining.
    #[must_use]
    pub fn events(&self) -> Vec<HostEvent> {
        lock(&self.inner.events).clone()
    }

    /// How often `online()` was called off the main context.
    #[must_use]
    pub fn off_main_roster_reads(&self) -> usize {
        self.inner.off_main_roster_reads.load(Ordering::SeqCst)
    }

    fn record(&self, event: HostEvent) {
        lock(&self.inner.events).push(event);
    }
}

impl Roster for RecordingHost {
    fn online(&self) -> Vec<RecipientId> {
        if thread::current().id() != self.inner.main_thread {
            self.inner.off_main_roster_reads.fetch_add(1, Ordering::SeqCst);
        }
        lock(&self.inner.world).online.clone()
    }

    fn is_online(&self, id: &RecipientId) -> bool {
        lock(&self.inner.world).online.contains(id)
    }
}

impl Permissions for RecordingHost {
    fn has_permission(&self, id: &RecipientId, permission: &str) -> bool {
        !lock(&self.inner.world)
            .denied
            .get(id)
            .is_some_and(|denied| denied.contains(permission))
    }

    fn is_afk(&self, id: &RecipientId) -> bool {
        lock(&self.inner.world).afk.contains(id)
    }
}

impl Presenter for RecordingHost {
    fn send_chat(&self, to: &RecipientId, text: &str) {
        self.record(HostEvent::Chat {
            to: to.clone(),
            text: text.to_string(),
        });
    }

    fn show_overlay(&self, to: &RecipientId, text: &str) {
        self.record(HostEvent::Overlay {
            to: to.clone(),
            text: text.to_string(),
        });
    }

    fn show_banner(&self, to: &RecipientId, frame: &BannerFrame) {
        self.record(HostEvent::Banner {
            to: to.clone(),
            frame: frame.clone(),
        });
    }

    fn clear_banner(&self, to: &RecipientId) {
        self.record(HostEvent::ClearBanner { to: to.clone() });
    }

    fn show_progress(&self, to: &RecipientId, bar: BarId, frame: &ProgressFrame) {
        self.record(HostEvent::ProgressShow {
            to: to.clone(),
            bar,
            frame: frame.clone(),
        });
    }

    fn update_progress(&self, to: &RecipientId, bar: BarId, frame: &ProgressFrame) {
        self.record(HostEvent::ProgressUpdate {
            to: to.clone(),
            bar,
            frame: frame.clone(),
        });
    }

    fn hide_progress(&self, to: &RecipientId, bar: BarId) {
        self.record(HostEvent::ProgressHide { to: to.clone(), bar });
    }

    fn play_sound(&self, to: &RecipientId, sound: &Sound) {
        self.record(HostEvent::Sound {
            to: to.clone(),
            sound: sound.clone(),
        });
    }
}

impl CommandSink for RecordingHost {
    fn dispatch_console(&self, command: &str) {
        self.record(HostEvent::Console {
            command: command.to_string(),
        });
    }

    fn dispatch_as(&self, who: &RecipientId, command: &str) {
        self.record(HostEvent::CommandAs {
            who: who.clone(),
            command: command.to_string(),
        });
    }
}

impl Placeholders for RecordingHost {
    fn apply(&self, who: &RecipientId, text: &str) -> String {
        text.replace(PLAYER_PLACEHOLDER, who.as_str())
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Scheduler, recording host and broadcaster wired together.
#[derive(Debug)]
pub struct Simulation {
    scheduler: TickScheduler,
    host: RecordingHost,
    broadcaster: Broadcaster,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// Simulation without worker threads: every callback runs inline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default().worker_threads(0))
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        let host = RecordingHost::new();
        let scheduler = TickScheduler::new(&config);
        let broadcaster = Broadcaster::new(host.host(), scheduler.handle(), config);
        Self {
            scheduler,
            host,
            broadcaster,
        }
    }

    /// Set the roster (builder).
    #[must_use]
    pub fn online<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RecipientId>,
    {
        self.host.set_online(ids);
        self
    }

    #[must_use]
    pub fn host(&self) -> &RecordingHost {
        &self.host
    }

    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    #[must_use]
    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    /// Run one tick.
    pub fn step(&mut self) {
        self.scheduler.tick();
    }

    /// Run `n` ticks.
    pub fn run(&mut self, n: u64) {
        self.scheduler.run_ticks(n);
    }

    /// Run one tick and return the events it produced.
    pub fn step_events(&mut self) -> Vec<HostEvent> {
        self.step();
        self.host.take_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_are_granted_unless_denied() {
        let host = RecordingHost::new().deny("alex", "a.b");
        assert!(!host.has_permission(&"alex".into(), "a.b"));
        assert!(host.has_permission(&"alex".into(), "a.c"));
        assert!(host.has_permission(&"blair".into(), "a.b"));
    }

    #[test]
    fn roster_reads_off_main_are_counted() {
        let host = RecordingHost::new().online(["alex"]);
        assert_eq!(Roster::online(&host), vec![RecipientId::from("alex")]);
        let remote = host.clone();
        thread::spawn(move || Roster::online(&remote)).join().unwrap();
        assert_eq!(host.off_main_roster_reads(), 1);
    }

    #[test]
    fn placeholders_expand_player() {
        let host = RecordingHost::new();
        assert_eq!(host.apply(&"alex".into(), "hi {player}!"), "hi alex!");
    }

    #[test]
    fn afk_toggles() {
        let host = RecordingHost::new().afk("alex");
        assert!(host.is_afk(&"alex".into()));
        host.set_afk("alex", false);
        assert!(!host.is_afk(&"alex".into()));
    }
}
