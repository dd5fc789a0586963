#![forbid(unsafe_code)]

//! Tick-driven runtime for Herald broadcasts.
//!
//! The host calls [`TickScheduler::tick`] once per tick on its main thread.
//! Everything else hangs off that clock:
//!
//! - [`scheduler`] - repeating callbacks on the main context or a worker
//!   pool, plus the blocking main-context hand-off
//! - [`task`] - the [`UpdateTask`] state machine
//! - [`tracker`] - one active display job per recipient and slot
//! - [`jobs`] - overlay, banner and progress-bar jobs
//! - [`broadcast`] - content-set cycles, reload, previews, announcements
//! - [`host`] - the traits a host environment implements
//! - [`config`] - runtime settings and TOML-loadable descriptors
//! - [`simulator`] - a recording host for deterministic tests

pub mod broadcast;
pub mod config;
pub mod error;
pub mod host;
pub mod jobs;
pub mod scheduler;
pub mod simulator;
pub mod task;
pub mod tracker;

pub use broadcast::{Announcer, Broadcaster};
pub use config::{
    AnnouncementAudience, AnnouncementSpec, BannerSpec, ContentSetDescriptor, FillMode,
    HeraldConfig, Interval, IntervalUnit, MessageSpec, OverlaySpec, ProgressSpec, RuntimeConfig,
};
pub use error::{BroadcastError, BroadcastResult, ConfigError, HandoffError};
pub use host::{
    BannerFrame, BannerTiming, BarColor, BarId, BarStyle, CommandSink, Host, NoPlaceholders,
    Permissions, Placeholders, Presenter, ProgressFrame, RecipientId, Roster, Sound,
};
pub use jobs::{BannerJob, OverlayJob, ProgressJob};
pub use scheduler::{Affinity, CallbackId, SchedulerHandle, TickScheduler};
pub use task::{TaskBody, TaskId, TaskState, UpdateTask};
pub use tracker::{DisplayJob, DisplayTracker, JobKind};
