#![forbid(unsafe_code)]

//! Animated text: a template plus one primitive per distinct token.
//!
//! An [`AnimatedText`] is built once from a template string. Every distinct
//! token literal gets exactly one primitive, shared by all occurrences of that
//! literal within the template; separate `AnimatedText` values never share
//! state.
//!
//! # Usage
//!
//! ```ignore
//! use herald_anim::holder::AnimatedText;
//!
//! let mut text = AnimatedText::parse("<gradient:gold:red:{animate:gradient:0.2}>Sale!");
//! let frame = text.render_next();   // advances every token once
//! let again = text.render_current(); // same frame, no state change
//! ```
//!
//! # Invariants
//!
//! 1. `render_next()` advances each distinct token exactly once, regardless of
//!    how many times the literal occurs.
//! 2. `render_current()` never mutates state.
//! 3. Rendering is a single pass over pre-split segments; literal text between
//!    tokens is copied verbatim, so frame contents can never be re-matched as
//!    tokens.

use std::fmt;
use std::ops::Range;

use rand::Rng;

use crate::animation::{Animation, AnimationPrimitive};
use crate::token::{self, AnimationToken};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A piece of the pre-split template.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(Range<usize>),
    /// Index into `AnimatedText::members`.
    Token(usize),
}

/// A token literal and the primitive that renders it.
struct Member {
    token: AnimationToken,
    animation: AnimationPrimitive,
    frame: String,
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("literal", &self.token.literal())
            .field("frame", &self.frame)
            .finish()
    }
}

/// A message template with its animation state.
pub struct AnimatedText {
    template: String,
    segments: Vec<Segment>,
    members: Vec<Member>,
}

impl fmt::Debug for AnimatedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatedText")
            .field("template", &self.template)
            .field("tokens", &self.members.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl AnimatedText {
    /// Parse `template`, drawing any random palettes from the thread RNG.
    #[must_use]
    pub fn parse(template: impl Into<String>) -> Self {
        Self::parse_with_rng(template, &mut rand::thread_rng())
    }

    /// Parse `template` with an explicit RNG for random palettes.
    pub fn parse_with_rng<R: Rng>(template: impl Into<String>, rng: &mut R) -> Self {
        let template = template.into();
        let mut segments = Vec::new();
        let mut members: Vec<Member> = Vec::new();
        let mut cursor = 0;

        for (range, token) in token::scan(&template) {
            if range.start > cursor {
                segments.push(Segment::Literal(cursor..range.start));
            }
            let index = match members
                .iter()
                .position(|m| m.token.literal() == token.literal())
            {
                Some(index) => index,
                None => {
                    let animation = token.instantiate(rng);
                    let frame = animation.value();
                    members.push(Member {
                        token,
                        animation,
                        frame,
                    });
                    members.len() - 1
                }
            };
            segments.push(Segment::Token(index));
            cursor = range.end;
        }
        if cursor < template.len() {
            segments.push(Segment::Literal(cursor..template.len()));
        }

        tracing::trace!(
            tokens = members.len(),
            segments = segments.len(),
            "parsed animated template"
        );

        Self {
            template,
            segments,
            members,
        }
    }

    /// The raw template this text was built from.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Number of distinct token literals.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.members.len()
    }

    /// Whether the template contains any recognized token.
    #[must_use]
    pub fn is_animated(&self) -> bool {
        !self.members.is_empty()
    }

    /// Distinct token literals in first-appearance order.
    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.token.literal())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

impl AnimatedText {
    /// Advance every distinct token once and render the new frame.
    pub fn render_next(&mut self) -> String {
        for member in &mut self.members {
            member.frame = member.animation.advance();
        }
        self.render_current()
    }

    /// Render the current frame without advancing.
    #[must_use]
    pub fn render_current(&self) -> String {
        if self.members.is_empty() {
            return self.template.clone();
        }
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(range) => out.push_str(&self.template[range.clone()]),
                Segment::Token(index) => out.push_str(&self.members[*index].frame),
            }
        }
        out
    }

    /// Reset every primitive to its initial frame.
    pub fn reset(&mut self) {
        for member in &mut self.members {
            member.animation.reset();
            member.frame = member.animation.value();
        }
    }
}

impl Clone for AnimatedText {
    /// Clones carry their own copy of the animation state.
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            segments: self.segments.clone(),
            members: self
                .members
                .iter()
                .map(|m| Member {
                    token: m.token.clone(),
                    animation: m.animation.clone(),
                    frame: m.frame.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn parse(template: &str) -> AnimatedText {
        AnimatedText::parse_with_rng(template, &mut StdRng::seed_from_u64(3))
    }

    #[test]
    fn plain_text_renders_verbatim() {
        let mut text = parse("hello world");
        assert!(!text.is_animated());
        assert_eq!(text.render_next(), "hello world");
        assert_eq!(text.render_current(), "hello world");
    }

    #[test]
    fn duplicate_literals_share_one_primitive() {
        let mut text = parse("{animate:flash:a,b:1}-{animate:flash:a,b:1}");
        assert_eq!(text.token_count(), 1);
        assert_eq!(text.render_next(), "a-a");
        assert_eq!(text.render_next(), "b-b");
        assert_eq!(text.render_next(), "a-a");
    }

    #[test]
    fn distinct_literals_step_independently() {
        let mut text = parse("{animate:flash:a,b:1}|{animate:flash:a,b:2}");
        assert_eq!(text.token_count(), 2);
        assert_eq!(text.render_next(), "a|a");
        assert_eq!(text.render_next(), "b|a");
        assert_eq!(text.render_next(), "a|b");
    }

    #[test]
    fn render_current_is_stable() {
        let mut text = parse("<{animate:gradient:0.25}>");
        assert_eq!(text.render_current(), "<-1.0>");
        text.render_next();
        assert_eq!(text.render_current(), "<-0.75>");
        assert_eq!(text.render_current(), "<-0.75>");
    }

    #[test]
    fn unknown_tokens_stay_literal() {
        let mut text = parse("x{animate:wobble:3}y{animate:flash:red}z");
        assert_eq!(text.token_count(), 1);
        assert_eq!(text.render_next(), "x{animate:wobble:3}yredz");
    }

    #[test]
    fn token_ends_at_first_closing_brace() {
        let mut text = parse("{animate:typewriter:{animate:flash:red}:1}");
        assert_eq!(text.token_count(), 1);
        assert_eq!(
            text.literals().collect::<Vec<_>>(),
            ["{animate:typewriter:{animate:flash:red}"]
        );
        // Typewriter text is "{animate" with the default speed; one tick in,
        // nothing is revealed yet and the trailing ":1}" stays literal.
        assert_eq!(text.render_next(), "_:1}");
    }

    #[test]
    fn frames_are_not_rematched_as_tokens() {
        let mut text = parse("{animate:flash:{animate:1}!");
        assert_eq!(text.render_next(), "{animate!");
        assert_eq!(text.render_next(), "{animate!");
    }

    #[test]
    fn instances_do_not_share_state() {
        let mut a = parse("{animate:flash:a,b:1}");
        let mut b = parse("{animate:flash:a,b:1}");
        a.render_next();
        a.render_next();
        assert_eq!(a.render_current(), "b");
        assert_eq!(b.render_next(), "a");
    }

    #[test]
    fn clone_forks_state() {
        let mut a = parse("{animate:flash:a,b:1}");
        a.render_next();
        let mut b = a.clone();
        assert_eq!(a.render_next(), "b");
        assert_eq!(b.render_next(), "b");
    }

    #[test]
    fn reset_returns_to_first_frame() {
        let mut text = parse("{animate:scroll:abc:2:1}");
        let first = text.render_current();
        text.render_next();
        text.render_next();
        text.reset();
        assert_eq!(text.render_current(), first);
    }
}
