#![forbid(unsafe_code)]

//! Concrete display jobs: overlay, banner and progress bar.
//!
//! Every job owns one [`AnimatedText`] per animated field and renders each of
//! them exactly once per tick, so frames stay in lockstep with `ticks_lived`.
//! All jobs stop early when their recipient disconnects.
//!
//! | Job | Lifetime | Tracked | Affinity |
//! |-----|----------|---------|----------|
//! | [`OverlayJob`] | `duration_ticks` | yes | worker |
//! | [`BannerJob`] | `fade_in + stay` | yes | worker |
//! | [`ProgressJob`] | `seconds * ticks_per_second` | no | main |

use std::sync::atomic::{AtomicU64, Ordering};

use herald_anim::AnimatedText;

use crate::config::{BannerSpec, FillMode, OverlaySpec, ProgressSpec, RuntimeConfig};
use crate::host::{
    BannerFrame, BannerTiming, BarColor, BarId, BarStyle, Host, ProgressFrame, RecipientId,
};
use crate::scheduler::Affinity;
use crate::task::TaskBody;
use crate::tracker::{DisplayJob, JobKind};

static NEXT_BAR_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// A short-lived overlay line.
pub struct OverlayJob {
    host: Host,
    recipient: RecipientId,
    text: AnimatedText,
    duration: u64,
    fade: bool,
}

impl OverlayJob {
    pub fn new(
        host: Host,
        recipient: RecipientId,
        text: impl Into<String>,
        duration_ticks: u64,
        fade: bool,
    ) -> Self {
        Self {
            host,
            recipient,
            text: AnimatedText::parse(text),
            duration: duration_ticks,
            fade,
        }
    }

    /// Build from an [`OverlaySpec`], expanding placeholders for `recipient`.
    pub fn from_spec(host: &Host, recipient: &RecipientId, spec: &OverlaySpec) -> Self {
        let text = host.placeholders.apply(recipient, &spec.text);
        Self::new(
            host.clone(),
            recipient.clone(),
            text,
            spec.duration_ticks,
            spec.fade,
        )
    }
}

impl TaskBody for OverlayJob {
    fn should_continue(&mut self, ticks_lived: u64) -> bool {
        ticks_lived < self.duration && self.host.roster.is_online(&self.recipient)
    }

    fn update(&mut self, _ticks_lived: u64) {
        let frame = self.text.render_next();
        self.host.presenter.show_overlay(&self.recipient, &frame);
    }

    fn on_stop(&mut self) {
        if !self.fade && self.host.roster.is_online(&self.recipient) {
            self.host.presenter.show_overlay(&self.recipient, "");
        }
    }
}

impl DisplayJob for OverlayJob {
    fn kind(&self) -> JobKind {
        JobKind::Overlay
    }

    fn recipient(&self) -> &RecipientId {
        &self.recipient
    }
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

/// Title and subtitle with fade-in, hold and fade-out phases.
///
/// Frames carry timing only when the client's fade state must change:
///
/// - tick 0: the fade-in presentation, or the hold directly when
///   `fade_in == 0`;
/// - the first tick past `fade_in`: the hold, re-issued once;
/// - every other tick: text only.
///
/// On stop a fade-out frame is sent, or the banner is cleared outright when
/// `fade_out == 0`.
pub struct BannerJob {
    host: Host,
    recipient: RecipientId,
    title: AnimatedText,
    subtitle: AnimatedText,
    fade_in: u64,
    stay: u64,
    fade_out: u64,
    hold_issued: bool,
}

impl BannerJob {
    /// Phase lengths are in ticks.
    pub fn new(
        host: Host,
        recipient: RecipientId,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        fade_in: u64,
        stay: u64,
        fade_out: u64,
    ) -> Self {
        Self {
            host,
            recipient,
            title: AnimatedText::parse(title),
            subtitle: AnimatedText::parse(subtitle),
            fade_in,
            stay,
            fade_out,
            hold_issued: false,
        }
    }

    /// Build from a [`BannerSpec`], converting seconds to ticks.
    pub fn from_spec(
        host: &Host,
        recipient: &RecipientId,
        spec: &BannerSpec,
        config: &RuntimeConfig,
    ) -> Self {
        Self::new(
            host.clone(),
            recipient.clone(),
            host.placeholders.apply(recipient, &spec.title),
            host.placeholders.apply(recipient, &spec.subtitle),
            config.seconds_to_ticks(spec.fade_in),
            config.seconds_to_ticks(spec.stay),
            config.seconds_to_ticks(spec.fade_out),
        )
    }

    /// Ticks the job stays alive: fade-in plus hold.
    #[must_use]
    pub fn lifetime(&self) -> u64 {
        self.fade_in + self.stay
    }

    fn hold_timing(&self) -> BannerTiming {
        BannerTiming {
            fade_in: 0,
            stay: self.stay,
            fade_out: 0,
        }
    }

    fn timing_for(&mut self, ticks_lived: u64) -> Option<BannerTiming> {
        if ticks_lived == 0 {
            if self.fade_in == 0 {
                self.hold_issued = true;
                return Some(self.hold_timing());
            }
            return Some(BannerTiming {
                fade_in: self.fade_in,
                stay: self.stay,
                fade_out: 0,
            });
        }
        if !self.hold_issued && ticks_lived > self.fade_in {
            self.hold_issued = true;
            return Some(self.hold_timing());
        }
        None
    }
}

impl TaskBody for BannerJob {
    fn should_continue(&mut self, ticks_lived: u64) -> bool {
        ticks_lived < self.lifetime() && self.host.roster.is_online(&self.recipient)
    }

    fn update(&mut self, ticks_lived: u64) {
        let frame = BannerFrame {
            title: self.title.render_next(),
            subtitle: self.subtitle.render_next(),
            timing: self.timing_for(ticks_lived),
        };
        self.host.presenter.show_banner(&self.recipient, &frame);
    }

    fn on_stop(&mut self) {
        if !self.host.roster.is_online(&self.recipient) {
            return;
        }
        if self.fade_out == 0 {
            self.host.presenter.clear_banner(&self.recipient);
            return;
        }
        let frame = BannerFrame {
            title: self.title.render_current(),
            subtitle: self.subtitle.render_current(),
            timing: Some(BannerTiming {
                fade_in: 0,
                stay: 0,
                fade_out: self.fade_out,
            }),
        };
        self.host.presenter.show_banner(&self.recipient, &frame);
    }
}

impl DisplayJob for BannerJob {
    fn kind(&self) -> JobKind {
        JobKind::Banner
    }

    fn recipient(&self) -> &RecipientId {
        &self.recipient
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// A progress bar whose fill follows a [`FillMode`].
pub struct ProgressJob {
    host: Host,
    recipient: RecipientId,
    bar: BarId,
    text: AnimatedText,
    color: BarColor,
    style: BarStyle,
    fill: FillMode,
    lifetime: u64,
}

impl ProgressJob {
    /// `lifetime` is in ticks and clamped to at least one.
    pub fn new(
        host: Host,
        recipient: RecipientId,
        text: impl Into<String>,
        color: BarColor,
        style: BarStyle,
        fill: FillMode,
        lifetime: u64,
    ) -> Self {
        Self {
            host,
            recipient,
            bar: NEXT_BAR_ID.fetch_add(1, Ordering::Relaxed),
            text: AnimatedText::parse(text),
            color,
            style,
            fill,
            lifetime: lifetime.max(1),
        }
    }

    pub fn from_spec(
        host: &Host,
        recipient: &RecipientId,
        spec: &ProgressSpec,
        config: &RuntimeConfig,
    ) -> Self {
        Self::new(
            host.clone(),
            recipient.clone(),
            host.placeholders.apply(recipient, &spec.text),
            spec.color,
            spec.style,
            spec.fill,
            config.seconds_to_ticks(spec.seconds),
        )
    }

    #[must_use]
    pub fn bar_id(&self) -> BarId {
        self.bar
    }

    #[must_use]
    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    /// Fill level at `ticks_lived`, in `[0, 1]`.
    #[must_use]
    pub fn progress_at(&self, ticks_lived: u64) -> f32 {
        let raw = (ticks_lived as f64 / self.lifetime as f64).clamp(0.0, 1.0) as f32;
        match self.fill {
            FillMode::Fill => raw,
            FillMode::Drain => 1.0 - raw,
            FillMode::Full => 1.0,
            FillMode::Empty => 0.0,
        }
    }

    fn frame(&mut self, progress: Option<f32>) -> ProgressFrame {
        ProgressFrame {
            text: self.text.render_next(),
            progress,
            color: self.color,
            style: self.style,
        }
    }
}

impl TaskBody for ProgressJob {
    fn affinity(&self) -> Affinity {
        Affinity::Main
    }

    fn should_continue(&mut self, ticks_lived: u64) -> bool {
        ticks_lived < self.lifetime && self.host.roster.is_online(&self.recipient)
    }

    fn update(&mut self, ticks_lived: u64) {
        if ticks_lived == 0 {
            let frame = self.frame(Some(self.progress_at(0)));
            self.host.presenter.show_progress(&self.recipient, self.bar, &frame);
            return;
        }
        let progress = match self.fill {
            FillMode::Fill | FillMode::Drain => Some(self.progress_at(ticks_lived)),
            FillMode::Full | FillMode::Empty => None,
        };
        let frame = self.frame(progress);
        self.host.presenter.update_progress(&self.recipient, self.bar, &frame);
    }

    fn on_stop(&mut self) {
        self.host.presenter.hide_progress(&self.recipient, self.bar);
    }
}

impl DisplayJob for ProgressJob {
    fn kind(&self) -> JobKind {
        JobKind::Progress
    }

    fn recipient(&self) -> &RecipientId {
        &self.recipient
    }
}
