#![forbid(unsafe_code)]

//! Seams to the host environment.
//!
//! The runtime never talks to players, permissions or commands directly. It
//! goes through the traits here, bundled into a cloneable [`Host`]:
//!
//! - [`Roster`] - who is connected. `online()` is main-context only.
//! - [`Permissions`] - permission checks and away-from-keyboard state.
//! - [`Presenter`] - renders fully substituted text as a concrete payload.
//! - [`CommandSink`] - runs commands as the console or as a recipient.
//! - [`Placeholders`] - per-recipient text expansion before token parsing.
//!
//! Markup in presented strings is opaque to the runtime; the presenter owns
//! parsing and serialization.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

/// Identifier of a connected recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientId(String);

impl RecipientId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecipientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Client-side banner timing, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerTiming {
    pub fade_in: u64,
    pub stay: u64,
    pub fade_out: u64,
}

/// One banner frame.
///
/// `timing: None` updates the text without touching the client's fade state;
/// `Some` (re)issues the presentation with new timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerFrame {
    pub title: String,
    pub subtitle: String,
    pub timing: Option<BannerTiming>,
}

/// Progress-bar color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarColor {
    Pink,
    Blue,
    Red,
    Green,
    Yellow,
    Purple,
    #[default]
    White,
}

/// Progress-bar segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarStyle {
    #[default]
    Solid,
    Notched6,
    Notched10,
    Notched12,
    Notched20,
}

/// Handle distinguishing concurrently shown progress bars.
pub type BarId = u64;

/// One progress-bar frame. `progress: None` leaves the fill unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressFrame {
    pub text: String,
    pub progress: Option<f32>,
    pub color: BarColor,
    pub style: BarStyle,
}

/// A sound cue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sound {
    pub name: String,
    #[serde(default = "default_unit")]
    pub volume: f32,
    #[serde(default = "default_unit")]
    pub pitch: f32,
}

fn default_unit() -> f32 {
    1.0
}

impl Sound {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: 1.0,
            pitch: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The set of connected recipients.
pub trait Roster: Send + Sync {
    /// All connected recipients, in roster order.
    ///
    /// Only valid on the main context. Worker code must go through
    /// [`SchedulerHandle::call_sync`](crate::scheduler::SchedulerHandle::call_sync).
    fn online(&self) -> Vec<RecipientId>;

    /// Whether `id` is still connected. Safe from any context.
    fn is_online(&self, id: &RecipientId) -> bool;
}

/// Permission and presence checks.
pub trait Permissions: Send + Sync {
    fn has_permission(&self, id: &RecipientId, permission: &str) -> bool;

    /// Whether `id` is currently away from keyboard.
    fn is_afk(&self, id: &RecipientId) -> bool;
}

/// Renders substituted text to one recipient.
pub trait Presenter: Send + Sync {
    fn send_chat(&self, to: &RecipientId, text: &str);

    /// Transient overlay line. An empty string clears it.
    fn show_overlay(&self, to: &RecipientId, text: &str);

    fn show_banner(&self, to: &RecipientId, frame: &BannerFrame);

    fn clear_banner(&self, to: &RecipientId);

    fn show_progress(&self, to: &RecipientId, bar: BarId, frame: &ProgressFrame);

    fn update_progress(&self, to: &RecipientId, bar: BarId, frame: &ProgressFrame);

    fn hide_progress(&self, to: &RecipientId, bar: BarId);

    fn play_sound(&self, to: &RecipientId, sound: &Sound);
}

/// Executes command strings.
pub trait CommandSink: Send + Sync {
    /// Run as the anonymous operator console.
    fn dispatch_console(&self, command: &str);

    /// Run as `who`.
    fn dispatch_as(&self, who: &RecipientId, command: &str);
}

/// Per-recipient text expansion, applied before token parsing.
pub trait Placeholders: Send + Sync {
    fn apply(&self, who: &RecipientId, text: &str) -> String;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlaceholders;

impl Placeholders for NoPlaceholders {
    fn apply(&self, _who: &RecipientId, text: &str) -> String {
        text.to_string()
    }
}

/// Cloneable bundle of host services.
#[derive(Clone)]
pub struct Host {
    pub roster: Arc<dyn Roster>,
    pub permissions: Arc<dyn Permissions>,
    pub presenter: Arc<dyn Presenter>,
    pub commands: Arc<dyn CommandSink>,
    pub placeholders: Arc<dyn Placeholders>,
}

impl Host {
    /// Bundle host services with no placeholder expansion.
    pub fn new(
        roster: Arc<dyn Roster>,
        permissions: Arc<dyn Permissions>,
        presenter: Arc<dyn Presenter>,
        commands: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            roster,
            permissions,
            presenter,
            commands,
            placeholders: Arc::new(NoPlaceholders),
        }
    }

    /// Replace the placeholder expander (builder).
    #[must_use]
    pub fn with_placeholders(mut self, placeholders: Arc<dyn Placeholders>) -> Self {
        self.placeholders = placeholders;
        self
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
