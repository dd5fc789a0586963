//! Integration tests for animated templates.

use herald_anim::animation::*;
use herald_anim::token::{AnimationToken, DEFAULT_SCROLL_WINDOW};
use herald_anim::{AnimatedText, WeightedPool};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

const TOKENS: &[&str] = &[
    "{animate:gradient:0.3}",
    "{animate:gradient}",
    "{animate:flash:red,gold,#00ff00:2}",
    "{animate:flash:a,b:1}",
    "{animate:pulse:red,blue:3}",
    "{animate:typewriter:Welcome aboard:1}",
    "{animate:scroll:Server restart soon:8:1}",
    "{animate:scroll:x:2/}",
];

#[test]
fn gradient_sequence_matches_documented_values() {
    let mut g = ScrollingGradient::new(0.5);
    let frames: Vec<String> = (0..4).map(|_| g.advance()).collect();
    assert_eq!(frames, ["-0.5", "0.0", "0.5", "-1.0"]);
}

#[test]
fn flash_period_is_colors_times_ticks() {
    let mut f = FlashingText::new(vec!["A".into(), "B".into(), "C".into()], 2);
    let frames: Vec<String> = (0..12).map(|_| f.advance()).collect();
    assert_eq!(frames[..6], frames[6..]);
    assert_eq!(frames[..6], ["A", "A", "B", "B", "C", "C"]);
}

#[test]
fn chat_style_template_renders_every_occurrence() {
    let mut text = AnimatedText::parse(
        "<color:{animate:flash:red,blue:1}>[!]</color> <color:{animate:flash:red,blue:1}>Vote now",
    );
    assert_eq!(
        text.render_next(),
        "<color:red>[!]</color> <color:red>Vote now"
    );
    assert_eq!(
        text.render_next(),
        "<color:blue>[!]</color> <color:blue>Vote now"
    );
}

#[test]
fn absurd_scroll_window_renders_a_default_marquee() {
    let mut text = AnimatedText::parse("hi {animate:scroll:news:18446744073709551615:1}");
    let frame = text.render_next();
    assert_eq!(frame.chars().count(), "hi ".len() + DEFAULT_SCROLL_WINDOW);
}

#[test]
fn random_kinds_produce_hex_frames() {
    let mut text = AnimatedText::parse_with_rng(
        "{animate:randomflash:1} {animate:randompulse:4}",
        &mut StdRng::seed_from_u64(11),
    );
    let frame = text.render_next();
    let parts: Vec<&str> = frame.split(' ').collect();
    assert_eq!(parts.len(), 2);
    for part in parts {
        assert!(part.starts_with('#') && part.len() == 7, "frame {part}");
    }
}

#[test]
fn weighted_pool_picks_template_alternatives() {
    let pool = WeightedPool::new()
        .with(1.0, "{animate:flash:red}")
        .with(0.0, "never");
    let mut rng = StdRng::seed_from_u64(5);
    let mut text = AnimatedText::parse(*pool.select_with(&mut rng));
    assert_eq!(text.render_next(), "red");
}

fn template_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (0..TOKENS.len(), "[a-z ]{0,6}"),
        0..6,
    )
    .prop_map(|parts| {
        parts
            .into_iter()
            .map(|(idx, filler)| format!("{filler}{}", TOKENS[idx]))
            .collect::<String>()
    })
}

proptest! {
    #[test]
    fn render_next_matches_independent_primitives(
        template in template_strategy(),
        k in 1usize..40,
    ) {
        let mut text = AnimatedText::parse(template.clone());
        let mut rendered = String::new();
        for _ in 0..k {
            rendered = text.render_next();
        }

        let mut expected = template.clone();
        for literal in TOKENS {
            if !template.contains(literal) {
                continue;
            }
            let token = AnimationToken::parse(literal).expect("fixture token parses");
            let mut prim = token.instantiate(&mut rand::thread_rng());
            let mut frame = prim.value();
            for _ in 0..k {
                frame = prim.advance();
            }
            expected = expected.replace(literal, &frame);
        }
        prop_assert_eq!(rendered, expected);
    }

    #[test]
    fn value_never_changes_without_advance(idx in 0..TOKENS.len(), k in 0usize..30) {
        let token = AnimationToken::parse(TOKENS[idx]).expect("fixture token parses");
        let mut prim = token.instantiate(&mut rand::thread_rng());
        for _ in 0..k {
            prim.advance();
        }
        let first = prim.value();
        prop_assert_eq!(prim.value(), first);
    }

    #[test]
    fn gradient_phase_stays_in_range(increment in 0.001f64..2.0, steps in 0usize..500) {
        let mut g = ScrollingGradient::new(increment);
        for _ in 0..steps {
            g.advance();
            prop_assert!(g.phase() >= -1.0 && g.phase() < 1.0);
        }
    }

    #[test]
    fn weighted_select_returns_positive_weight_entry(
        weights in prop::collection::vec(-1.0f64..5.0, 1..10),
    ) {
        let pool: WeightedPool<usize> = weights
            .iter()
            .copied()
            .enumerate()
            .map(|(i, w)| (w, i))
            .collect();
        prop_assume!(!pool.is_empty());
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..50 {
            let chosen = *pool.select_with(&mut rng);
            prop_assert!(weights[chosen] > 0.0);
        }
    }
}
