#![forbid(unsafe_code)]

//! Tick-stepped animation primitives.
//!
//! Each primitive owns a small amount of mutable state (a phase, an index,
//! an elapsed-tick counter) and renders the current frame as a string that is
//! spliced into a message template.
//!
//! # Contract
//!
//! - [`Animation::value`] is pure: any number of calls between two advances
//!   return the same string.
//! - [`Animation::advance`] steps exactly one tick and returns the new frame.
//!   Callers advance at most once per logical tick.
//! - Every primitive is deterministic given its state. The only randomness is
//!   the one-time palette draw in [`RandomColor`], at construction.

use rand::Rng;

use crate::color::Rgb;

/// Number of colors in a [`RandomColor`] palette.
pub const RANDOM_PALETTE_SIZE: usize = 64;

/// Ticks the typewriter cursor stays visible (and then hidden).
pub const CURSOR_BLINK_TICKS: u32 = 5;

/// Cursor glyph appended by [`Typewriter`] while visible.
pub const CURSOR_GLYPH: char = '_';

/// Widest marquee window a [`ScrollingText`] accepts.
pub const MAX_SCROLL_WINDOW: usize = 256;

// ---------------------------------------------------------------------------
// Animation trait
// ---------------------------------------------------------------------------

/// A tick-stepped generator of string frames.
pub trait Animation {
    /// Current frame. Does not mutate state.
    fn value(&self) -> String;

    /// Step one tick and return the new frame.
    fn advance(&mut self) -> String;

    /// Return to the initial state.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// ScrollingGradient
// ---------------------------------------------------------------------------

/// A gradient phase in [-1, 1) that scrolls by a fixed increment per tick.
///
/// The frame is the phase as a decimal string, consumed downstream as a
/// gradient interpolation offset. When the phase would reach 1 it wraps to
/// exactly -1, not to `phase - 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollingGradient {
    phase: f64,
    increment: f64,
}

impl ScrollingGradient {
    /// Phase every gradient starts from.
    pub const START: f64 = -1.0;

    /// Create a gradient that advances by `increment` per tick.
    #[must_use]
    pub fn new(increment: f64) -> Self {
        Self {
            phase: Self::START,
            increment,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> f64 {
        self.phase
    }
}

impl Animation for ScrollingGradient {
    fn value(&self) -> String {
        format_decimal(self.phase)
    }

    fn advance(&mut self) -> String {
        // Quantize so repeated fractional increments don't drift past a wrap.
        let next = ((self.phase + self.increment) * 1e6).round() / 1e6;
        self.phase = if next >= 1.0 || next < Self::START {
            Self::START
        } else {
            next
        };
        self.value()
    }

    fn reset(&mut self) {
        self.phase = Self::START;
    }
}

/// Render with up to six decimals, trimming trailing zeros but keeping one.
fn format_decimal(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    let mut out = format!("{value:.6}");
    while out.ends_with('0') && !out.ends_with(".0") {
        out.pop();
    }
    out
}

// ---------------------------------------------------------------------------
// FlashingText
// ---------------------------------------------------------------------------

/// Cycles through a list of colors, holding each for `ticks_per_frame` ticks.
///
/// With colors `[A, B, C]` and two ticks per frame, advances 1–2 yield `A`,
/// 3–4 yield `B`, 5–6 yield `C`, and the cycle restarts at 7.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashingText {
    colors: Vec<String>,
    ticks_per_frame: u32,
    index: usize,
    elapsed: u32,
}

impl FlashingText {
    /// Create a flash over `colors`. An empty list renders as an empty string.
    #[must_use]
    pub fn new(colors: Vec<String>, ticks_per_frame: u32) -> Self {
        Self {
            colors,
            ticks_per_frame: ticks_per_frame.max(1),
            index: 0,
            elapsed: 0,
        }
    }

    /// Index of the color currently shown.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Animation for FlashingText {
    fn value(&self) -> String {
        self.colors.get(self.index).cloned().unwrap_or_default()
    }

    fn advance(&mut self) -> String {
        if self.colors.is_empty() {
            return String::new();
        }
        if self.elapsed >= self.ticks_per_frame {
            self.elapsed = 0;
            self.index = (self.index + 1) % self.colors.len();
        }
        self.elapsed += 1;
        self.value()
    }

    fn reset(&mut self) {
        self.index = 0;
        self.elapsed = 0;
    }
}

// ---------------------------------------------------------------------------
// PulsingColor
// ---------------------------------------------------------------------------

/// Smoothly interpolates between consecutive colors in a closed loop.
///
/// Each segment runs from `colors[i]` to `colors[i + 1]` (the last color links
/// back to the first) and takes `ticks_per_segment` ticks. Frames are
/// rendered as `#rrggbb`.
#[derive(Debug, Clone, PartialEq)]
pub struct PulsingColor {
    colors: Vec<Rgb>,
    ticks_per_segment: u32,
    segment: usize,
    step: u32,
}

impl PulsingColor {
    /// Create a pulse. An empty list renders as an empty string.
    #[must_use]
    pub fn new(colors: Vec<Rgb>, ticks_per_segment: u32) -> Self {
        Self {
            colors,
            ticks_per_segment: ticks_per_segment.max(1),
            segment: 0,
            step: 0,
        }
    }

    /// Current color, if the palette is non-empty.
    #[must_use]
    pub fn color(&self) -> Option<Rgb> {
        let from = *self.colors.get(self.segment)?;
        let to = self.colors[(self.segment + 1) % self.colors.len()];
        let t = f64::from(self.step) / f64::from(self.ticks_per_segment);
        Some(from.lerp(to, t))
    }
}

impl Animation for PulsingColor {
    fn value(&self) -> String {
        self.color().map(Rgb::to_hex).unwrap_or_default()
    }

    fn advance(&mut self) -> String {
        if self.colors.is_empty() {
            return String::new();
        }
        self.step += 1;
        if self.step >= self.ticks_per_segment {
            self.step = 0;
            self.segment = (self.segment + 1) % self.colors.len();
        }
        self.value()
    }

    fn reset(&mut self) {
        self.segment = 0;
        self.step = 0;
    }
}

// ---------------------------------------------------------------------------
// Typewriter
// ---------------------------------------------------------------------------

/// Reveals `text` one character every `ticks_per_char` ticks, with a blinking
/// cursor. After the full text has been shown it starts over from empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Typewriter {
    chars: Vec<char>,
    ticks_per_char: u32,
    revealed: usize,
    elapsed: u32,
}

impl Typewriter {
    /// Create a typewriter over `text`.
    #[must_use]
    pub fn new(text: &str, ticks_per_char: u32) -> Self {
        Self {
            chars: text.chars().collect(),
            ticks_per_char: ticks_per_char.max(1),
            revealed: 0,
            elapsed: 0,
        }
    }

    /// Number of characters currently revealed.
    #[must_use]
    pub fn revealed(&self) -> usize {
        self.revealed
    }

    fn cursor_visible(&self) -> bool {
        (self.elapsed / CURSOR_BLINK_TICKS) % 2 == 0
    }
}

impl Animation for Typewriter {
    fn value(&self) -> String {
        let mut out: String = self.chars[..self.revealed].iter().collect();
        out.push(if self.cursor_visible() { CURSOR_GLYPH } else { ' ' });
        out
    }

    fn advance(&mut self) -> String {
        self.elapsed = self.elapsed.wrapping_add(1);
        if self.elapsed % self.ticks_per_char == 0 {
            if self.revealed >= self.chars.len() {
                self.revealed = 0;
            } else {
                self.revealed += 1;
            }
        }
        self.value()
    }

    fn reset(&mut self) {
        self.revealed = 0;
        self.elapsed = 0;
    }
}

// ---------------------------------------------------------------------------
// ScrollingText
// ---------------------------------------------------------------------------

/// A marquee: a fixed-width window sliding over `text` padded with
/// `window` blanks on both ends. The window is clamped to
/// `1..=`[`MAX_SCROLL_WINDOW`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollingText {
    padded: Vec<char>,
    window: usize,
    ticks_per_step: u32,
    offset: usize,
    elapsed: u32,
}

impl ScrollingText {
    /// Create a marquee over `text`.
    #[must_use]
    pub fn new(text: &str, window: usize, ticks_per_step: u32) -> Self {
        let window = window.clamp(1, MAX_SCROLL_WINDOW);
        let mut padded = vec![' '; window];
        padded.extend(text.chars());
        padded.extend(std::iter::repeat_n(' ', window));
        Self {
            padded,
            window,
            ticks_per_step: ticks_per_step.max(1),
            offset: 0,
            elapsed: 0,
        }
    }

    /// Left edge of the window within the padded text.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Animation for ScrollingText {
    fn value(&self) -> String {
        self.padded[self.offset..self.offset + self.window]
            .iter()
            .collect()
    }

    fn advance(&mut self) -> String {
        self.elapsed += 1;
        if self.elapsed >= self.ticks_per_step {
            self.elapsed = 0;
            self.offset += 1;
            if self.offset + self.window > self.padded.len() {
                self.offset = 0;
            }
        }
        self.value()
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.elapsed = 0;
    }
}

// ---------------------------------------------------------------------------
// RandomColor
// ---------------------------------------------------------------------------

/// Stepping rule used by a [`RandomColor`] palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomMode {
    /// Hard cuts between random colors.
    Flash,
    /// Smooth interpolation between random colors.
    Pulse,
}

/// Factory for flash/pulse primitives seeded with a random palette.
///
/// Draws [`RANDOM_PALETTE_SIZE`] uniformly random colors once and hands them
/// to [`FlashingText`] or [`PulsingColor`]; it has no stepping rule of its own.
#[derive(Debug)]
pub struct RandomColor;

impl RandomColor {
    /// Draw a fresh palette from `rng`.
    pub fn palette<R: Rng>(rng: &mut R) -> Vec<Rgb> {
        (0..RANDOM_PALETTE_SIZE)
            .map(|_| {
                Rgb::new(
                    rng.gen_range(0..=255),
                    rng.gen_range(0..=255),
                    rng.gen_range(0..=255),
                )
            })
            .collect()
    }

    /// Build a primitive for `mode` over a palette drawn from `rng`.
    pub fn build<R: Rng>(mode: RandomMode, ticks: u32, rng: &mut R) -> AnimationPrimitive {
        let palette = Self::palette(rng);
        match mode {
            RandomMode::Flash => AnimationPrimitive::Flash(FlashingText::new(
                palette.into_iter().map(Rgb::to_hex).collect(),
                ticks,
            )),
            RandomMode::Pulse => AnimationPrimitive::Pulse(PulsingColor::new(palette, ticks)),
        }
    }
}

// ---------------------------------------------------------------------------
// AnimationPrimitive
// ---------------------------------------------------------------------------

/// The closed set of primitives a template token can instantiate.
///
/// Random palettes resolve to `Flash`/`Pulse` at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationPrimitive {
    Gradient(ScrollingGradient),
    Flash(FlashingText),
    Pulse(PulsingColor),
    Typewriter(Typewriter),
    Scroll(ScrollingText),
}

impl Animation for AnimationPrimitive {
    fn value(&self) -> String {
        match self {
            Self::Gradient(a) => a.value(),
            Self::Flash(a) => a.value(),
            Self::Pulse(a) => a.value(),
            Self::Typewriter(a) => a.value(),
            Self::Scroll(a) => a.value(),
        }
    }

    fn advance(&mut self) -> String {
        match self {
            Self::Gradient(a) => a.advance(),
            Self::Flash(a) => a.advance(),
            Self::Pulse(a) => a.advance(),
            Self::Typewriter(a) => a.advance(),
            Self::Scroll(a) => a.advance(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Gradient(a) => a.reset(),
            Self::Flash(a) => a.reset(),
            Self::Pulse(a) => a.reset(),
            Self::Typewriter(a) => a.reset(),
            Self::Scroll(a) => a.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn advance_n(anim: &mut impl Animation, n: usize) -> Vec<String> {
        (0..n).map(|_| anim.advance()).collect()
    }

    #[test]
    fn gradient_wraps_to_minus_one() {
        let mut g = ScrollingGradient::new(0.5);
        assert_eq!(g.value(), "-1.0");
        assert_eq!(advance_n(&mut g, 4), ["-0.5", "0.0", "0.5", "-1.0"]);
    }

    #[test]
    fn gradient_small_increment_does_not_drift() {
        let mut g = ScrollingGradient::new(0.1);
        let frames = advance_n(&mut g, 20);
        assert_eq!(frames[9], "0.0");
        assert_eq!(frames[18], "0.9");
        assert_eq!(frames[19], "-1.0");
    }

    #[test]
    fn flash_holds_each_color() {
        let mut f = FlashingText::new(vec!["A".into(), "B".into(), "C".into()], 2);
        assert_eq!(f.value(), "A");
        assert_eq!(
            advance_n(&mut f, 8),
            ["A", "A", "B", "B", "C", "C", "A", "A"]
        );
    }

    #[test]
    fn flash_empty_palette_is_blank() {
        let mut f = FlashingText::new(Vec::new(), 3);
        assert_eq!(f.advance(), "");
        assert_eq!(f.value(), "");
    }

    #[test]
    fn value_is_idempotent() {
        let mut f = FlashingText::new(vec!["red".into(), "blue".into()], 1);
        f.advance();
        f.advance();
        let v = f.value();
        assert_eq!(f.value(), v);
        assert_eq!(f.value(), v);
    }

    #[test]
    fn pulse_interpolates_and_loops() {
        let black = Rgb::new(0, 0, 0);
        let white = Rgb::new(255, 255, 255);
        let mut p = PulsingColor::new(vec![black, white], 2);
        assert_eq!(p.value(), "#000000");
        assert_eq!(p.advance(), "#808080");
        assert_eq!(p.advance(), "#ffffff");
        assert_eq!(p.advance(), "#808080");
        assert_eq!(p.advance(), "#000000");
    }

    #[test]
    fn typewriter_reveals_then_loops() {
        let mut t = Typewriter::new("ab", 1);
        assert_eq!(t.value(), "_");
        assert_eq!(t.advance(), "a_");
        assert_eq!(t.advance(), "ab_");
        assert_eq!(t.advance(), "_");
        assert_eq!(t.revealed(), 0);
    }

    #[test]
    fn typewriter_cursor_blinks_every_five_ticks() {
        let mut t = Typewriter::new("abcdefghijklmnop", 100);
        let frames = advance_n(&mut t, 10);
        assert!(frames[..4].iter().all(|f| f == "_"));
        assert!(frames[4..9].iter().all(|f| f == " "));
        assert_eq!(frames[9], "_");
    }

    #[test]
    fn scrolling_text_slides_and_wraps() {
        let mut s = ScrollingText::new("ab", 2, 1);
        assert_eq!(s.value(), "  ");
        assert_eq!(advance_n(&mut s, 5), [" a", "ab", "b ", "  ", "  "]);
        assert_eq!(s.offset(), 0);
    }

    #[test]
    fn scrolling_window_is_bounded() {
        let s = ScrollingText::new("news", usize::MAX, 1);
        assert_eq!(s.value().chars().count(), MAX_SCROLL_WINDOW);
    }

    #[test]
    fn random_palette_has_fixed_size_and_is_seeded() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let pa = RandomColor::palette(&mut a);
        assert_eq!(pa.len(), RANDOM_PALETTE_SIZE);
        assert_eq!(pa, RandomColor::palette(&mut b));
    }

    #[test]
    fn random_color_delegates_to_flash_or_pulse() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            RandomColor::build(RandomMode::Flash, 3, &mut rng),
            AnimationPrimitive::Flash(_)
        ));
        assert!(matches!(
            RandomColor::build(RandomMode::Pulse, 3, &mut rng),
            AnimationPrimitive::Pulse(_)
        ));
    }

    #[test]
    fn reset_restores_initial_frame() {
        let mut p = AnimationPrimitive::Scroll(ScrollingText::new("hello", 3, 1));
        let initial = p.value();
        advance_n(&mut p, 4);
        assert_ne!(p.value(), initial);
        p.reset();
        assert_eq!(p.value(), initial);
    }
}
