#![forbid(unsafe_code)]

//! Herald public facade crate.
//!
//! Re-exports the animation and runtime crates and offers a prelude for the
//! usual wiring: build a [`Host`], create a [`TickScheduler`] on the main
//! thread, hand a [`Broadcaster`] the scheduler handle, and call `tick()` once
//! per host tick.

// --- Animation re-exports --------------------------------------------------

pub use herald_anim::{
    AnimatedText, Animation, AnimationKind, AnimationPrimitive, AnimationToken, Rgb, WeightedPool,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use herald_runtime::{
    Announcer, BroadcastError, BroadcastResult, Broadcaster, ConfigError, ContentSetDescriptor,
    DisplayTracker, HandoffError, HeraldConfig, Host, Interval, JobKind, MessageSpec,
    RecipientId, RuntimeConfig, SchedulerHandle, TickScheduler,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{AnimatedText, Animation, WeightedPool};

    #[cfg(feature = "runtime")]
    pub use crate::{
        Broadcaster, ContentSetDescriptor, HeraldConfig, Host, Interval, MessageSpec, RecipientId,
        RuntimeConfig, TickScheduler,
    };

    pub use crate::anim;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use herald_anim as anim;
#[cfg(feature = "runtime")]
pub use herald_runtime as runtime;
