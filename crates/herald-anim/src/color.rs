#![forbid(unsafe_code)]

//! RGB colors as they appear in message templates.
//!
//! Templates name colors either by one of the sixteen classic chat color
//! names (`gold`, `dark_aqua`, ...) or by a `#rrggbb` hex literal. Both forms
//! parse into [`Rgb`]; interpolated colors are always written back as hex.

use std::fmt;

/// RGB color (opaque).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red channel (0–255).
    pub r: u8,
    /// Green channel (0–255).
    pub g: u8,
    /// Blue channel (0–255).
    pub b: u8,
}

/// The sixteen named chat colors and their canonical RGB values.
pub const NAMED_COLORS: [(&str, Rgb); 16] = [
    ("black", Rgb::new(0x00, 0x00, 0x00)),
    ("dark_blue", Rgb::new(0x00, 0x00, 0xAA)),
    ("dark_green", Rgb::new(0x00, 0xAA, 0x00)),
    ("dark_aqua", Rgb::new(0x00, 0xAA, 0xAA)),
    ("dark_red", Rgb::new(0xAA, 0x00, 0x00)),
    ("dark_purple", Rgb::new(0xAA, 0x00, 0xAA)),
    ("gold", Rgb::new(0xFF, 0xAA, 0x00)),
    ("gray", Rgb::new(0xAA, 0xAA, 0xAA)),
    ("dark_gray", Rgb::new(0x55, 0x55, 0x55)),
    ("blue", Rgb::new(0x55, 0x55, 0xFF)),
    ("green", Rgb::new(0x55, 0xFF, 0x55)),
    ("aqua", Rgb::new(0x55, 0xFF, 0xFF)),
    ("red", Rgb::new(0xFF, 0x55, 0x55)),
    ("light_purple", Rgb::new(0xFF, 0x55, 0xFF)),
    ("yellow", Rgb::new(0xFF, 0xFF, 0x55)),
    ("white", Rgb::new(0xFF, 0xFF, 0xFF)),
];

impl Rgb {
    /// Create a new RGB color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a named color or a `#rrggbb` literal.
    ///
    /// Names are matched case-insensitively; `grey` is accepted for `gray`.
    /// Returns `None` for anything else, including 3-digit hex shorthands.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some(hex) = input.strip_prefix('#') {
            return Self::from_hex_digits(hex);
        }
        let name = input.to_ascii_lowercase().replace("grey", "gray");
        NAMED_COLORS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, rgb)| *rgb)
    }

    fn from_hex_digits(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Linear interpolation per channel; `t` is clamped to [0, 1].
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| {
            let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Self::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Lowercase `#rrggbb` form.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_colors_case_insensitively() {
        assert_eq!(Rgb::parse("GOLD"), Some(Rgb::new(0xFF, 0xAA, 0x00)));
        assert_eq!(Rgb::parse("dark_grey"), Some(Rgb::new(0x55, 0x55, 0x55)));
        assert_eq!(Rgb::parse(" white "), Some(Rgb::new(255, 255, 255)));
    }

    #[test]
    fn parses_hex_literals() {
        assert_eq!(Rgb::parse("#12aBef"), Some(Rgb::new(0x12, 0xAB, 0xEF)));
        assert_eq!(Rgb::parse("#fff"), None);
        assert_eq!(Rgb::parse("#gg0000"), None);
        assert_eq!(Rgb::parse("chartreuse"), None);
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let black = Rgb::new(0, 0, 0);
        let white = Rgb::new(255, 255, 255);
        assert_eq!(black.lerp(white, 0.0), black);
        assert_eq!(black.lerp(white, 1.0), white);
        assert_eq!(black.lerp(white, 0.5), Rgb::new(128, 128, 128));
        assert_eq!(black.lerp(white, 7.0), white);
    }

    #[test]
    fn hex_output_is_lowercase_and_padded() {
        assert_eq!(Rgb::new(1, 0xAB, 0).to_hex(), "#01ab00");
        assert_eq!(Rgb::new(1, 0xAB, 0).to_string(), "#01ab00");
    }
}
