#![forbid(unsafe_code)]

//! Animation token grammar.
//!
//! A token is a literal `{animate:<kind>[:<arg>]*}` substring of a template.
//! The first segment selects the primitive; the remaining segments are
//! positional arguments, each with its own default when missing or
//! unparsable. A dangling `/` before the closing brace is tolerated.
//!
//! Parsing is permissive: an unknown kind yields no token, so the text is
//! left as-is. Nothing in this module can fail.

use std::ops::Range;

use rand::Rng;

use crate::animation::{
    AnimationPrimitive, FlashingText, MAX_SCROLL_WINDOW, PulsingColor, RandomColor, RandomMode,
    ScrollingGradient, ScrollingText, Typewriter,
};
use crate::color::Rgb;

/// Opening sequence of every token.
pub const TOKEN_PREFIX: &str = "{animate:";

/// Default gradient increment per tick.
pub const DEFAULT_GRADIENT_INCREMENT: f64 = 0.1;
/// Default ticks per color for flash and pulse kinds.
pub const DEFAULT_COLOR_TICKS: u32 = 10;
/// Default ticks per revealed character.
pub const DEFAULT_TYPEWRITER_TICKS: u32 = 2;
/// Default marquee width in characters.
pub const DEFAULT_SCROLL_WINDOW: usize = 16;
/// Default ticks per marquee step.
pub const DEFAULT_SCROLL_TICKS: u32 = 2;

const DEFAULT_FLASH_COLORS: &[&str] = &["white"];
const DEFAULT_PULSE_COLORS: &[&str] = &["white", "black"];

/// Primitive selected by a token's first segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationKind {
    Gradient,
    Flash,
    Pulse,
    Typewriter,
    Scroll,
    RandomFlash,
    RandomPulse,
}

/// Kind-name lookup table. Names are matched case-insensitively.
const KINDS: &[(&str, AnimationKind)] = &[
    ("gradient", AnimationKind::Gradient),
    ("flash", AnimationKind::Flash),
    ("pulse", AnimationKind::Pulse),
    ("typewriter", AnimationKind::Typewriter),
    ("scroll", AnimationKind::Scroll),
    ("randomflash", AnimationKind::RandomFlash),
    ("randompulse", AnimationKind::RandomPulse),
];

impl AnimationKind {
    /// Resolve a kind name, or `None` if it is not recognized.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        KINDS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name.trim()))
            .map(|(_, kind)| *kind)
    }

    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        KINDS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map_or("", |(name, _)| name)
    }
}

/// A parsed token: its exact literal text, kind and raw arguments.
///
/// Identity is textual: two tokens with the same `literal` are the same token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnimationToken {
    literal: String,
    kind: AnimationKind,
    args: Vec<String>,
}

impl AnimationToken {
    /// Parse one literal token (`{animate:...}` including braces).
    ///
    /// Returns `None` when the literal is not a token or names an unknown kind.
    #[must_use]
    pub fn parse(literal: &str) -> Option<Self> {
        let inner = literal.strip_prefix(TOKEN_PREFIX)?.strip_suffix('}')?;
        let inner = inner.strip_suffix('/').unwrap_or(inner);
        let mut segments = inner.split(':');
        let kind = AnimationKind::from_name(segments.next()?)?;
        Some(Self {
            literal: literal.to_string(),
            kind,
            args: segments.map(str::to_string).collect(),
        })
    }

    /// The exact substring replaced on render.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    #[must_use]
    pub fn kind(&self) -> AnimationKind {
        self.kind
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|s| s.trim())
    }

    fn arg_f64(&self, index: usize, default: f64) -> f64 {
        self.arg(index)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    fn arg_u32(&self, index: usize, default: u32) -> u32 {
        self.arg(index)
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(default)
            .max(1)
    }

    /// Window width; values above [`MAX_SCROLL_WINDOW`] fall back to `default`.
    fn arg_window(&self, index: usize, default: usize) -> usize {
        self.arg(index)
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|w| *w <= MAX_SCROLL_WINDOW)
            .unwrap_or(default)
            .max(1)
    }

    fn arg_text(&self, index: usize) -> String {
        self.args.get(index).cloned().unwrap_or_default()
    }

    fn arg_colors(&self, index: usize, default: &[&str]) -> Vec<String> {
        let colors: Vec<String> = self
            .arg(index)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if colors.is_empty() {
            default.iter().map(|c| c.to_string()).collect()
        } else {
            colors
        }
    }

    /// Build a fresh primitive for this token.
    ///
    /// `rng` is only consulted by the random-palette kinds.
    pub fn instantiate<R: Rng>(&self, rng: &mut R) -> AnimationPrimitive {
        match self.kind {
            AnimationKind::Gradient => AnimationPrimitive::Gradient(ScrollingGradient::new(
                self.arg_f64(0, DEFAULT_GRADIENT_INCREMENT),
            )),
            AnimationKind::Flash => AnimationPrimitive::Flash(FlashingText::new(
                self.arg_colors(0, DEFAULT_FLASH_COLORS),
                self.arg_u32(1, DEFAULT_COLOR_TICKS),
            )),
            AnimationKind::Pulse => {
                let mut colors: Vec<Rgb> = self
                    .arg_colors(0, DEFAULT_PULSE_COLORS)
                    .iter()
                    .filter_map(|c| Rgb::parse(c))
                    .collect();
                if colors.is_empty() {
                    colors = DEFAULT_PULSE_COLORS
                        .iter()
                        .filter_map(|c| Rgb::parse(c))
                        .collect();
                }
                AnimationPrimitive::Pulse(PulsingColor::new(
                    colors,
                    self.arg_u32(1, DEFAULT_COLOR_TICKS),
                ))
            }
            AnimationKind::Typewriter => AnimationPrimitive::Typewriter(Typewriter::new(
                &self.arg_text(0),
                self.arg_u32(1, DEFAULT_TYPEWRITER_TICKS),
            )),
            AnimationKind::Scroll => AnimationPrimitive::Scroll(ScrollingText::new(
                &self.arg_text(0),
                self.arg_window(1, DEFAULT_SCROLL_WINDOW),
                self.arg_u32(2, DEFAULT_SCROLL_TICKS),
            )),
            AnimationKind::RandomFlash => RandomColor::build(
                RandomMode::Flash,
                self.arg_u32(0, DEFAULT_COLOR_TICKS),
                rng,
            ),
            AnimationKind::RandomPulse => RandomColor::build(
                RandomMode::Pulse,
                self.arg_u32(0, DEFAULT_COLOR_TICKS),
                rng,
            ),
        }
    }
}

/// Byte ranges of every recognized token in `template`, in order.
///
/// Candidates with an unknown kind or without a closing brace are skipped.
#[must_use]
pub fn scan(template: &str) -> Vec<(Range<usize>, AnimationToken)> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = template[cursor..].find(TOKEN_PREFIX) {
        let start = cursor + rel;
        let body = start + TOKEN_PREFIX.len();
        let Some(close) = template[body..].find('}') else {
            break;
        };
        let end = body + close + 1;
        match AnimationToken::parse(&template[start..end]) {
            Some(token) => {
                found.push((start..end, token));
                cursor = end;
            }
            // Unknown kind: keep scanning right after the prefix so a nested
            // candidate is still found.
            None => cursor = body,
        }
    }
    found
}
