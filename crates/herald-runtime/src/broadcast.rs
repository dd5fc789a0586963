#![forbid(unsafe_code)]

//! Broadcast Scheduler: periodic content-sets, previews and announcements.
//!
//! Each running content-set owns one repeating worker timer. On every firing
//! it:
//!
//! 1. fetches the roster (through a main-context hand-off when off main),
//! 2. pops the next message, refilling the queue once per full cycle,
//! 3. runs the set's cycle commands once,
//! 4. delivers the message to each eligible recipient in roster order.
//!
//! Delivery to one recipient expands placeholders, sends chat lines, plays
//! sounds, runs commands and starts the message's display jobs through the
//! [`DisplayTracker`].
//!
//! Stopping a content-set cancels its timer only; display jobs already started
//! expire on their own.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use herald_anim::{AnimatedText, WeightedPool};
use rand::seq::SliceRandom;

use crate::config::{
    AnnouncementAudience, AnnouncementSpec, ContentSetDescriptor, MessageSpec, RuntimeConfig,
    validate_all,
};
use crate::error::{BroadcastError, BroadcastResult, ConfigError};
use crate::host::{Host, Permissions, RecipientId};
use crate::jobs::{BannerJob, OverlayJob, ProgressJob};
use crate::scheduler::{Affinity, CallbackId, SchedulerHandle, lock};
use crate::task::UpdateTask;
use crate::tracker::{DisplayJob, DisplayTracker};

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// The per-recipient pipeline shared by cycles, previews and announcements.
#[derive(Clone)]
struct Delivery {
    host: Host,
    tracker: DisplayTracker,
    config: RuntimeConfig,
}

impl Delivery {
    fn deliver(&self, to: &RecipientId, message: &MessageSpec) {
        let host = &self.host;
        let expand = |text: &str| host.placeholders.apply(to, text);

        for line in &message.chat {
            let frame = AnimatedText::parse(expand(line)).render_next();
            host.presenter.send_chat(to, &frame);
        }
        for sound in &message.sounds {
            host.presenter.play_sound(to, sound);
        }
        for command in &message.recipient_commands {
            host.commands.dispatch_as(to, &expand(command));
        }
        for command in &message.console_commands {
            host.commands.dispatch_console(&expand(command));
        }
        if let Some(spec) = &message.overlay {
            self.tracker.start_and_track(OverlayJob::from_spec(host, to, spec));
        }
        if let Some(spec) = &message.banner {
            self.tracker.start_and_track(BannerJob::from_spec(host, to, spec, &self.config));
        }
        if let Some(spec) = &message.progress {
            self.tracker.start_and_track(ProgressJob::from_spec(host, to, spec, &self.config));
        }
        tracing::trace!(recipient = %to, "message delivered");
    }

    /// Connected recipients, read on the main context.
    fn roster(&self, scheduler: &SchedulerHandle) -> Option<Vec<RecipientId>> {
        if scheduler.is_main_thread() {
            return Some(self.host.roster.online());
        }
        let roster = Arc::clone(&self.host.roster);
        match scheduler.call_sync(move || roster.online()) {
            Ok(online) => Some(online),
            Err(e) => {
                tracing::warn!(error = %e, "roster unavailable, skipping delivery");
                None
            }
        }
    }
}

/// `who` holds `view` and is not an AFK holder of `afk_exempt`.
fn is_eligible(
    permissions: &dyn Permissions,
    who: &RecipientId,
    view: &str,
    afk_exempt: Option<&str>,
) -> bool {
    if !permissions.has_permission(who, view) {
        return false;
    }
    match afk_exempt {
        Some(exempt) => !(permissions.has_permission(who, exempt) && permissions.is_afk(who)),
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Content-set cycle
// ---------------------------------------------------------------------------

struct ContentSetCycle {
    descriptor: ContentSetDescriptor,
    view_permission: String,
    queue: Mutex<VecDeque<usize>>,
    delivery: Delivery,
    scheduler: SchedulerHandle,
}

impl ContentSetCycle {
    fn new(
        descriptor: ContentSetDescriptor,
        delivery: Delivery,
        scheduler: SchedulerHandle,
    ) -> Self {
        Self {
            view_permission: descriptor.view_permission(),
            descriptor,
            queue: Mutex::new(VecDeque::new()),
            delivery,
            scheduler,
        }
    }

    fn next_index(&self) -> usize {
        let mut queue = lock(&self.queue);
        if queue.is_empty() {
            let mut order: Vec<usize> = (0..self.descriptor.messages.len()).collect();
            if self.descriptor.random_order {
                order.shuffle(&mut rand::thread_rng());
            }
            tracing::debug!(set_id = %self.descriptor.id, ?order, "content-set queue refilled");
            queue.extend(order);
        }
        queue.pop_front().unwrap_or(0)
    }

    fn is_eligible(&self, who: &RecipientId) -> bool {
        is_eligible(
            &*self.delivery.host.permissions,
            who,
            &self.view_permission,
            self.descriptor.afk_exempt_permission.as_deref(),
        )
    }

    fn fire(&self) {
        let Some(online) = self.delivery.roster(&self.scheduler) else {
            return;
        };
        let index = self.next_index();
        let Some(message) = self.descriptor.messages.get(index) else {
            return;
        };

        for command in &self.descriptor.cycle_commands {
            self.delivery.host.commands.dispatch_console(command);
        }

        let mut delivered = 0usize;
        for who in online.iter().filter(|who| self.is_eligible(who)) {
            self.delivery.deliver(who, message);
            delivered += 1;
        }
        tracing::debug!(
            set_id = %self.descriptor.id,
            message = index,
            recipients = delivered,
            tick = self.scheduler.current_tick(),
            "content-set fired"
        );
    }
}

struct RunningSet {
    cycle: Arc<ContentSetCycle>,
    callback: CallbackId,
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Owns the running content-sets and the display tracker.
pub struct Broadcaster {
    delivery: Delivery,
    scheduler: SchedulerHandle,
    running: Mutex<HashMap<String, RunningSet>>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("running", &self.running_ids())
            .field("tracker", &self.delivery.tracker)
            .finish()
    }
}

impl Broadcaster {
    pub fn new(host: Host, scheduler: SchedulerHandle, config: RuntimeConfig) -> Self {
        let tracker = DisplayTracker::new(scheduler.clone());
        Self::with_tracker(host, scheduler, config, tracker)
    }

    /// Use an explicitly configured tracker.
    pub fn with_tracker(
        host: Host,
        scheduler: SchedulerHandle,
        config: RuntimeConfig,
        tracker: DisplayTracker,
    ) -> Self {
        Self {
            delivery: Delivery {
                host,
                tracker,
                config,
            },
            scheduler,
            running: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &DisplayTracker {
        &self.delivery.tracker
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.delivery.config
    }

    /// Start broadcasting `descriptor`. Its first message goes out on the
    /// next tick.
    pub fn start_content_set(&self, descriptor: ContentSetDescriptor) -> BroadcastResult<()> {
        descriptor.validate(self.delivery.config.ticks_per_second)?;
        let mut running = lock(&self.running);
        if running.contains_key(&descriptor.id) {
            return Err(BroadcastError::AlreadyRunning(descriptor.id));
        }
        self.launch(&mut running, descriptor);
        Ok(())
    }

    fn launch(&self, running: &mut HashMap<String, RunningSet>, descriptor: ContentSetDescriptor) {
        let period = descriptor
            .interval
            .to_ticks(self.delivery.config.ticks_per_second);
        let id = descriptor.id.clone();
        let cycle = Arc::new(ContentSetCycle::new(
            descriptor,
            self.delivery.clone(),
            self.scheduler.clone(),
        ));
        let timer = Arc::clone(&cycle);
        let callback = self
            .scheduler
            .schedule_repeating(Affinity::Worker, 0, period, move || timer.fire());
        tracing::debug!(set_id = %id, period, "content-set started");
        running.insert(id, RunningSet { cycle, callback });
    }

    /// Stop a content-set's timer. Returns `false` if it was not running.
    pub fn stop_content_set(&self, id: &str) -> bool {
        let removed = lock(&self.running).remove(id);
        match removed {
            Some(set) => {
                self.scheduler.cancel(set.callback);
                tracing::debug!(set_id = %id, "content-set stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every content-set.
    pub fn stop_all(&self) {
        let drained: Vec<(String, RunningSet)> = lock(&self.running).drain().collect();
        for (id, set) in drained {
            self.scheduler.cancel(set.callback);
            tracing::debug!(set_id = %id, "content-set stopped");
        }
    }

    /// Replace every running content-set with `sets`.
    ///
    /// All descriptors are validated first; on error nothing changes.
    pub fn reload(&self, sets: Vec<ContentSetDescriptor>) -> BroadcastResult<()> {
        if let Err(e) = validate_all(&sets, self.delivery.config.ticks_per_second) {
            tracing::warn!(error = %e, "reload rejected, keeping current content-sets");
            return Err(e.into());
        }
        let mut running = lock(&self.running);
        for (_, set) in running.drain() {
            self.scheduler.cancel(set.callback);
        }
        let count = sets.len();
        for descriptor in sets {
            self.launch(&mut running, descriptor);
        }
        tracing::debug!(content_sets = count, "content-sets reloaded");
        Ok(())
    }

    /// Pick one of several alternatives by weight and start it.
    ///
    /// Returns the id of the started set.
    pub fn start_random(
        &self,
        alternatives: Vec<(f64, ContentSetDescriptor)>,
    ) -> BroadcastResult<String> {
        let pool: WeightedPool<ContentSetDescriptor> = alternatives.into_iter().collect();
        if pool.is_empty() {
            return Err(ConfigError::NoAlternatives.into());
        }
        let chosen = pool.select().clone();
        let id = chosen.id.clone();
        self.start_content_set(chosen)?;
        Ok(id)
    }

    /// Ids of the running content-sets, sorted.
    #[must_use]
    pub fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.running).keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn is_running(&self, id: &str) -> bool {
        lock(&self.running).contains_key(id)
    }

    /// Show message `index` of running set `set_id` to `to` right away,
    /// outside the cycle. Returns `false` if there is no such message.
    pub fn preview(&self, to: &RecipientId, set_id: &str, index: usize) -> bool {
        let cycle = match lock(&self.running).get(set_id) {
            Some(set) => Arc::clone(&set.cycle),
            None => return false,
        };
        let Some(message) = cycle.descriptor.messages.get(index) else {
            return false;
        };
        tracing::debug!(set_id, message = index, recipient = %to, "preview");
        self.delivery.deliver(to, message);
        true
    }

    /// Start an ad-hoc display job outside any cycle.
    pub fn start_and_track(&self, job: impl DisplayJob) -> UpdateTask {
        self.delivery.tracker.start_and_track(job)
    }

    /// Build an announcer for join/quit events, shown to the default
    /// audience. See [`Announcer::with_audience`].
    #[must_use]
    pub fn announcer(&self, join: &[AnnouncementSpec], quit: &[AnnouncementSpec]) -> Announcer {
        Announcer {
            delivery: self.delivery.clone(),
            scheduler: self.scheduler.clone(),
            join: announcement_pool(join),
            quit: announcement_pool(quit),
            audience: AnnouncementAudience::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Announcer
// ---------------------------------------------------------------------------

/// Placeholder replaced with the joining or leaving recipient's id.
pub const WHO_PLACEHOLDER: &str = "{who}";

fn announcement_pool(specs: &[AnnouncementSpec]) -> Option<WeightedPool<Arc<MessageSpec>>> {
    let pool: WeightedPool<Arc<MessageSpec>> = specs
        .iter()
        .map(|spec| (spec.weight, Arc::new(spec.message.clone())))
        .collect();
    (!pool.is_empty()).then_some(pool)
}

/// Fans a weighted join or quit message out to eligible recipients.
///
/// Eligibility follows the content-set rule: the event's view permission is
/// required, and AFK holders of the exempt permission are skipped.
pub struct Announcer {
    delivery: Delivery,
    scheduler: SchedulerHandle,
    join: Option<WeightedPool<Arc<MessageSpec>>>,
    quit: Option<WeightedPool<Arc<MessageSpec>>>,
    audience: AnnouncementAudience,
}

impl std::fmt::Debug for Announcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Announcer")
            .field("join", &self.join.as_ref().map_or(0, WeightedPool::len))
            .field("quit", &self.quit.as_ref().map_or(0, WeightedPool::len))
            .finish()
    }
}

impl Announcer {
    #[must_use]
    pub fn with_audience(mut self, audience: AnnouncementAudience) -> Self {
        self.audience = audience;
        self
    }

    /// Announce that `who` joined. Returns the number of recipients reached.
    pub fn announce_join(&self, who: &RecipientId) -> usize {
        let view = self.audience.join_view_permission();
        self.announce(self.join.as_ref(), who, view, "join")
    }

    /// Announce that `who` left. Returns the number of recipients reached.
    pub fn announce_quit(&self, who: &RecipientId) -> usize {
        let view = self.audience.quit_view_permission();
        self.announce(self.quit.as_ref(), who, view, "quit")
    }

    fn announce(
        &self,
        pool: Option<&WeightedPool<Arc<MessageSpec>>>,
        who: &RecipientId,
        view: &str,
        event: &str,
    ) -> usize {
        let Some(pool) = pool else {
            return 0;
        };
        let Some(online) = self.delivery.roster(&self.scheduler) else {
            return 0;
        };
        let message = with_who(pool.select(), who);
        let permissions = &*self.delivery.host.permissions;
        let afk_exempt = self.audience.afk_exempt_permission.as_deref();
        let mut delivered = 0usize;
        for to in online
            .iter()
            .filter(|to| is_eligible(permissions, to, view, afk_exempt))
        {
            self.delivery.deliver(to, &message);
            delivered += 1;
        }
        tracing::debug!(recipient = %who, event, recipients = delivered, "announcement sent");
        delivered
    }
}

/// Copy of `message` with every `{who}` replaced.
fn with_who(message: &MessageSpec, who: &RecipientId) -> MessageSpec {
    let sub = |text: &String| text.replace(WHO_PLACEHOLDER, who.as_str());
    let mut out = message.clone();
    out.chat = message.chat.iter().map(sub).collect();
    out.recipient_commands = message.recipient_commands.iter().map(sub).collect();
    out.console_commands = message.console_commands.iter().map(sub).collect();
    if let Some(overlay) = &mut out.overlay {
        overlay.text = sub(&overlay.text);
    }
    if let Some(banner) = &mut out.banner {
        banner.title = sub(&banner.title);
        banner.subtitle = sub(&banner.subtitle);
    }
    if let Some(progress) = &mut out.progress {
        progress.text = sub(&progress.text);
    }
    out
}
