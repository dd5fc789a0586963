#![forbid(unsafe_code)]

//! Animated text templates for Herald.
//!
//! Message templates embed `{animate:...}` tokens that expand to a fresh frame
//! every tick. This crate holds everything that is independent of threads and
//! of the host environment:
//!
//! - [`color`] - named/hex RGB colors and interpolation
//! - [`animation`] - the closed set of tick-stepped primitives
//! - [`token`] - the token grammar and kind lookup
//! - [`holder`] - [`AnimatedText`], a template bound to its primitives
//! - [`weighted`] - [`WeightedPool`] for weighted random choice

pub mod animation;
pub mod color;
pub mod holder;
pub mod token;
pub mod weighted;

pub use animation::{
    Animation, AnimationPrimitive, FlashingText, PulsingColor, RandomColor, RandomMode,
    ScrollingGradient, ScrollingText, Typewriter,
};
pub use color::Rgb;
pub use holder::AnimatedText;
pub use token::{AnimationKind, AnimationToken};
pub use weighted::WeightedPool;
