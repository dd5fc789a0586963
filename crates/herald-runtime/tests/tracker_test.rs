//! Display tracker behavior under concurrent and cross-thread starts.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use herald_runtime::config::RuntimeConfig;
use herald_runtime::host::{BannerFrame, BarId, Host, Presenter, ProgressFrame, RecipientId, Sound};
use herald_runtime::jobs::OverlayJob;
use herald_runtime::scheduler::{Affinity, TickScheduler};
use herald_runtime::simulator::{HostEvent, RecordingHost};
use herald_runtime::task::{TaskState, UpdateTask};
use herald_runtime::tracker::{DisplayTracker, JobKind};

#[test]
fn concurrent_starts_leave_one_tracked_job() {
    let rec = RecordingHost::new().online(["alex"]);
    let mut sched = TickScheduler::new(&RuntimeConfig::default().worker_threads(4));
    let tracker = Arc::new(DisplayTracker::new(sched.handle()));

    let starters = 8;
    let started: Arc<Mutex<Vec<UpdateTask>>> = Arc::default();
    for i in 0..starters {
        let tracker = Arc::clone(&tracker);
        let started = Arc::clone(&started);
        let host = rec.host();
        sched
            .handle()
            .schedule_repeating(Affinity::Worker, 0, 1_000, move || {
                let job =
                    OverlayJob::new(host.clone(), "alex".into(), format!("job {i}"), 1_000, false);
                let task = tracker.start_and_track(job);
                started.lock().unwrap().push(task);
            });
    }
    sched.tick();
    assert_eq!(tracker.active_count(JobKind::Overlay), 1);
    let running = started
        .lock()
        .unwrap()
        .iter()
        .filter(|task| task.is_running())
        .count();
    assert_eq!(running, 1);

    sched.tick();
    let events = rec.take_events();
    let clears = events
        .iter()
        .filter(|e| matches!(e, HostEvent::Overlay { text, .. } if text.is_empty()))
        .count();
    // Jobs preempted before their first tick never rendered and skip the clear.
    assert!(clears < starters, "{events:?}");
    assert!(
        matches!(events.last(), Some(HostEvent::Overlay { text, .. }) if !text.is_empty()),
        "the survivor's frame comes last: {events:?}"
    );

    let frames: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            HostEvent::Overlay { text, .. } if !text.is_empty() => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(frames.len(), 1, "only the surviving job renders: {frames:?}");

    let survivor = tracker
        .active(JobKind::Overlay, &"alex".into())
        .expect("one job stays tracked");
    assert_eq!(survivor.state(), TaskState::Running);
    assert_eq!(survivor.ticks_lived(), 1);
}

#[test]
fn stop_all_clears_every_slot() {
    let rec = RecordingHost::new().online(["alex", "blair"]);
    let mut sched = TickScheduler::new(&RuntimeConfig::default().worker_threads(1));
    let tracker = DisplayTracker::new(sched.handle());
    for who in ["alex", "blair"] {
        tracker.start_and_track(OverlayJob::new(rec.host(), who.into(), "x", 50, true));
    }
    sched.tick();
    assert_eq!(tracker.active_count(JobKind::Overlay), 2);
    tracker.stop_all();
    assert_eq!(tracker.active_count(JobKind::Overlay), 0);
    sched.run_ticks(3);
    // Fading overlays are not cleared and stop rendering.
    let after: usize = rec.take_events().len();
    assert_eq!(after, 2);
}

/// Records through a [`RecordingHost`] but takes its time clearing overlays.
struct SlowClear(RecordingHost);

impl Presenter for SlowClear {
    fn send_chat(&self, to: &RecipientId, text: &str) {
        self.0.send_chat(to, text);
    }

    fn show_overlay(&self, to: &RecipientId, text: &str) {
        if text.is_empty() {
            thread::sleep(Duration::from_millis(100));
        }
        self.0.show_overlay(to, text);
    }

    fn show_banner(&self, to: &RecipientId, frame: &BannerFrame) {
        self.0.show_banner(to, frame);
    }

    fn clear_banner(&self, to: &RecipientId) {
        self.0.clear_banner(to);
    }

    fn show_progress(&self, to: &RecipientId, bar: BarId, frame: &ProgressFrame) {
        self.0.show_progress(to, bar, frame);
    }

    fn update_progress(&self, to: &RecipientId, bar: BarId, frame: &ProgressFrame) {
        self.0.update_progress(to, bar, frame);
    }

    fn hide_progress(&self, to: &RecipientId, bar: BarId) {
        self.0.hide_progress(to, bar);
    }

    fn play_sound(&self, to: &RecipientId, sound: &Sound) {
        self.0.play_sound(to, sound);
    }
}

#[test]
fn outside_thread_preemption_clears_before_the_new_job_renders() {
    let rec = RecordingHost::new().online(["alex"]);
    let shared = Arc::new(rec.clone());
    let host = Host::new(
        shared.clone(),
        shared.clone(),
        Arc::new(SlowClear(rec.clone())),
        shared,
    );
    let mut sched = TickScheduler::new(&RuntimeConfig::default().worker_threads(0));
    let tracker = DisplayTracker::new(sched.handle());

    tracker.start_and_track(OverlayJob::new(host.clone(), "alex".into(), "A", 1_000, false));
    sched.run_ticks(3);

    let outside = {
        let tracker = tracker.clone();
        let host = host.clone();
        thread::spawn(move || {
            tracker.start_and_track(OverlayJob::new(host, "alex".into(), "B", 1_000, false));
        })
    };
    for _ in 0..30 {
        sched.tick();
        thread::sleep(Duration::from_millis(10));
    }
    outside.join().unwrap();
    sched.run_ticks(2);

    let texts: Vec<String> = rec
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            HostEvent::Overlay { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    let clear = texts.iter().position(String::is_empty).expect("A is cleared");
    let first_b = texts.iter().position(|t| t == "B").expect("B renders");
    assert!(clear < first_b, "{texts:?}");
    assert!(texts[clear + 1..].iter().all(|t| t == "B"), "{texts:?}");
    assert_eq!(tracker.active_count(JobKind::Overlay), 1);
}
