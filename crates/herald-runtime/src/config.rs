#![forbid(unsafe_code)]

//! Runtime settings and content-set descriptors.
//!
//! Descriptors are plain data. They can be built in code or deserialized from
//! TOML with [`HeraldConfig::from_toml_str`]:
//!
//! ```toml
//! [[content_set]]
//! id = "tips"
//! interval = { unit = "seconds", amount = 90 }
//! random_order = true
//!
//! [[content_set.messages]]
//! chat = ["<{animate:flash:gold,yellow:5}>Tip:</> vote daily!"]
//! overlay = { text = "{animate:typewriter:Vote daily!:2}", duration_ticks = 80 }
//! ```
//!
//! Validation happens once, before anything starts, so a bad reload never
//! half-applies.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::host::{BarColor, BarStyle, Sound};

/// Ticks per second of the host clock unless configured otherwise.
pub const DEFAULT_TICKS_PER_SECOND: u32 = 20;

/// Worker threads unless configured otherwise.
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Upper bound on a main-context hand-off.
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(5);

/// Prefix of the default per-content-set view permission.
pub const VIEW_PERMISSION_PREFIX: &str = "herald.view.";

/// Default view permission for join announcements.
pub const JOIN_VIEW_PERMISSION: &str = "herald.view.join";

/// Default view permission for quit announcements.
pub const QUIT_VIEW_PERMISSION: &str = "herald.view.quit";

// ---------------------------------------------------------------------------
// RuntimeConfig
// ---------------------------------------------------------------------------

/// Scheduler and clock settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Host ticks per second; converts second-based durations to ticks.
    pub ticks_per_second: u32,
    /// Size of the worker pool.
    pub worker_threads: usize,
    /// How long a worker waits for the main context to answer a hand-off.
    pub handoff_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            worker_threads: DEFAULT_WORKER_THREADS,
            handoff_timeout: DEFAULT_HANDOFF_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn ticks_per_second(mut self, tps: u32) -> Self {
        self.ticks_per_second = tps.max(1);
        self
    }

    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    #[must_use]
    pub fn handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout = timeout;
        self
    }

    /// Convert seconds to whole ticks, rounding to nearest.
    #[must_use]
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        (seconds * f64::from(self.ticks_per_second)).round() as u64
    }
}

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// Unit of a broadcast interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Ticks,
    Seconds,
    Minutes,
    Hours,
}

/// Operator-facing interval: `amount` of `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Interval {
    pub unit: IntervalUnit,
    pub amount: u64,
}

impl Interval {
    #[must_use]
    pub const fn ticks(amount: u64) -> Self {
        Self {
            unit: IntervalUnit::Ticks,
            amount,
        }
    }

    #[must_use]
    pub const fn seconds(amount: u64) -> Self {
        Self {
            unit: IntervalUnit::Seconds,
            amount,
        }
    }

    #[must_use]
    pub const fn minutes(amount: u64) -> Self {
        Self {
            unit: IntervalUnit::Minutes,
            amount,
        }
    }

    /// Length in ticks at `ticks_per_second`.
    #[must_use]
    pub fn to_ticks(self, ticks_per_second: u32) -> u64 {
        let tps = u64::from(ticks_per_second);
        let per_unit = match self.unit {
            IntervalUnit::Ticks => 1,
            IntervalUnit::Seconds => tps,
            IntervalUnit::Minutes => tps * 60,
            IntervalUnit::Hours => tps * 3600,
        };
        self.amount.saturating_mul(per_unit)
    }
}

// ---------------------------------------------------------------------------
// Message payloads
// ---------------------------------------------------------------------------

/// How a progress bar fills over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Rises from 0 to 1.
    #[default]
    Fill,
    /// Falls from 1 to 0.
    Drain,
    /// Pinned at 1.
    Full,
    /// Pinned at 0.
    Empty,
}

/// Overlay line shown for a fixed number of ticks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverlaySpec {
    pub text: String,
    #[serde(default = "default_overlay_ticks")]
    pub duration_ticks: u64,
    /// Let the client fade the last frame out instead of clearing it.
    #[serde(default)]
    pub fade: bool,
}

fn default_overlay_ticks() -> u64 {
    60
}

/// Title/subtitle banner; phase lengths are in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BannerSpec {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default = "default_banner_fade")]
    pub fade_in: f64,
    #[serde(default = "default_banner_stay")]
    pub stay: f64,
    #[serde(default = "default_banner_fade")]
    pub fade_out: f64,
}

fn default_banner_fade() -> f64 {
    0.5
}

fn default_banner_stay() -> f64 {
    3.0
}

/// Persistent progress bar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressSpec {
    pub text: String,
    #[serde(default)]
    pub color: BarColor,
    #[serde(default)]
    pub style: BarStyle,
    #[serde(default)]
    pub fill: FillMode,
    #[serde(default = "default_progress_seconds")]
    pub seconds: f64,
}

fn default_progress_seconds() -> f64 {
    10.0
}

/// One broadcast message and everything it triggers per recipient.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MessageSpec {
    #[serde(default)]
    pub chat: Vec<String>,
    #[serde(default)]
    pub overlay: Option<OverlaySpec>,
    #[serde(default)]
    pub banner: Option<BannerSpec>,
    #[serde(default)]
    pub progress: Option<ProgressSpec>,
    #[serde(default)]
    pub sounds: Vec<Sound>,
    /// Run as each recipient.
    #[serde(default)]
    pub recipient_commands: Vec<String>,
    /// Run as the console once per recipient, after placeholder expansion.
    #[serde(default)]
    pub console_commands: Vec<String>,
}

impl MessageSpec {
    /// A chat-only message.
    #[must_use]
    pub fn chat(line: impl Into<String>) -> Self {
        Self {
            chat: vec![line.into()],
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ContentSetDescriptor
// ---------------------------------------------------------------------------

/// A named, independently scheduled collection of messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentSetDescriptor {
    pub id: String,
    pub messages: Vec<MessageSpec>,
    pub interval: Interval,
    #[serde(default)]
    pub random_order: bool,
    /// View permission; defaults to `herald.view.<id>`.
    #[serde(default)]
    pub permission: Option<String>,
    /// Recipients holding this permission are skipped while AFK.
    #[serde(default)]
    pub afk_exempt_permission: Option<String>,
    /// Console commands run once per firing, regardless of recipients.
    #[serde(default)]
    pub cycle_commands: Vec<String>,
}

impl ContentSetDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>, interval: Interval) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            interval,
            random_order: false,
            permission: None,
            afk_exempt_permission: None,
            cycle_commands: Vec::new(),
        }
    }

    /// Append a message (builder).
    #[must_use]
    pub fn message(mut self, message: MessageSpec) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn random_order(mut self, random: bool) -> Self {
        self.random_order = random;
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    #[must_use]
    pub fn afk_exempt_permission(mut self, permission: impl Into<String>) -> Self {
        self.afk_exempt_permission = Some(permission.into());
        self
    }

    #[must_use]
    pub fn cycle_command(mut self, command: impl Into<String>) -> Self {
        self.cycle_commands.push(command.into());
        self
    }

    /// Effective view permission.
    #[must_use]
    pub fn view_permission(&self) -> String {
        self.permission
            .clone()
            .unwrap_or_else(|| format!("{VIEW_PERMISSION_PREFIX}{}", self.id))
    }

    /// Check the descriptor can be scheduled at `ticks_per_second`.
    pub fn validate(&self, ticks_per_second: u32) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if self.messages.is_empty() {
            return Err(ConfigError::NoMessages(self.id.clone()));
        }
        if self.interval.to_ticks(ticks_per_second) == 0 {
            return Err(ConfigError::ZeroInterval(self.id.clone()));
        }
        Ok(())
    }
}

/// Validate a whole batch, including id uniqueness.
pub fn validate_all(
    sets: &[ContentSetDescriptor],
    ticks_per_second: u32,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for set in sets {
        set.validate(ticks_per_second)?;
        if !seen.insert(set.id.as_str()) {
            return Err(ConfigError::DuplicateId(set.id.clone()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// HeraldConfig
// ---------------------------------------------------------------------------

/// A weighted alternative for join/quit announcements.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnouncementSpec {
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(flatten)]
    pub message: MessageSpec,
}

fn default_weight() -> f64 {
    1.0
}

/// Who receives join/quit announcements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AnnouncementAudience {
    /// Defaults to [`JOIN_VIEW_PERMISSION`].
    #[serde(default)]
    pub join_permission: Option<String>,
    /// Defaults to [`QUIT_VIEW_PERMISSION`].
    #[serde(default)]
    pub quit_permission: Option<String>,
    /// Recipients holding this permission are skipped while AFK.
    #[serde(default)]
    pub afk_exempt_permission: Option<String>,
}

impl AnnouncementAudience {
    #[must_use]
    pub fn join_view_permission(&self) -> &str {
        self.join_permission.as_deref().unwrap_or(JOIN_VIEW_PERMISSION)
    }

    #[must_use]
    pub fn quit_view_permission(&self) -> &str {
        self.quit_permission.as_deref().unwrap_or(QUIT_VIEW_PERMISSION)
    }

    #[must_use]
    pub fn afk_exempt_permission(mut self, permission: impl Into<String>) -> Self {
        self.afk_exempt_permission = Some(permission.into());
        self
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct HeraldConfig {
    #[serde(default, rename = "content_set")]
    pub content_sets: Vec<ContentSetDescriptor>,
    #[serde(default)]
    pub join: Vec<AnnouncementSpec>,
    #[serde(default)]
    pub quit: Vec<AnnouncementSpec>,
    #[serde(default)]
    pub announcements: AnnouncementAudience,
}

impl HeraldConfig {
    /// Parse a TOML document. Descriptors are not validated here.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }
}
