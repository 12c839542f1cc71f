//! Fur patterns and packed-color helpers
//!
//! Colors are packed `0xRRGGBB` integers throughout the crate.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fallback color for unparseable input
pub const WHITE: u32 = 0xFFFFFF;

/// Available fur pattern types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    None,
    Stripes,
    Spots,
    Gradient,
    TwoTone,
    Tiger,
    Tabby,
    Husky,
    Calico,
}

impl PatternType {
    pub const ALL: [PatternType; 9] = [
        PatternType::None,
        PatternType::Stripes,
        PatternType::Spots,
        PatternType::Gradient,
        PatternType::TwoTone,
        PatternType::Tiger,
        PatternType::Tabby,
        PatternType::Husky,
        PatternType::Calico,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PatternType::None => "none",
            PatternType::Stripes => "stripes",
            PatternType::Spots => "spots",
            PatternType::Gradient => "gradient",
            PatternType::TwoTone => "two_tone",
            PatternType::Tiger => "tiger",
            PatternType::Tabby => "tabby",
            PatternType::Husky => "husky",
            PatternType::Calico => "calico",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PatternType::None => "No Pattern",
            PatternType::Stripes => "Stripes",
            PatternType::Spots => "Spots",
            PatternType::Gradient => "Gradient",
            PatternType::TwoTone => "Two-Tone",
            PatternType::Tiger => "Tiger Stripes",
            PatternType::Tabby => "Tabby",
            PatternType::Husky => "Husky Markings",
            PatternType::Calico => "Calico",
        }
    }

    /// Case-insensitive lookup, unknown ids give [`PatternType::None`]
    pub fn from_id(id: &str) -> PatternType {
        Self::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(id))
            .unwrap_or(PatternType::None)
    }
}

#[inline]
fn channels(color: u32) -> (u32, u32, u32) {
    ((color >> 16) & 0xFF, (color >> 8) & 0xFF, color & 0xFF)
}

/// Linearly interpolate between two colors, `factor` is clamped to `0.0..=1.0`
pub fn blend_colors(from: u32, to: u32, factor: f32) -> u32 {
    let factor = factor.clamp(0.0, 1.0);
    let (r1, g1, b1) = channels(from);
    let (r2, g2, b2) = channels(to);

    let lerp = |a: u32, b: u32| -> u32 { (a as f32 + (b as f32 - a as f32) * factor) as u32 };

    (lerp(r1, r2) << 16) | (lerp(g1, g2) << 8) | lerp(b1, b2)
}

/// Parse "#RRGGBB", "0xRRGGBB" or "RRGGBB". Invalid input logs a warning and
/// yields [`WHITE`].
pub fn parse_color(hex: &str) -> u32 {
    let trimmed = hex.trim();
    let digits = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let well_formed =
        !digits.is_empty() && digits.len() <= 6 && digits.bytes().all(|b| b.is_ascii_hexdigit());

    match u32::from_str_radix(digits, 16) {
        Ok(color) if well_formed => color,
        _ => {
            warn!(input = %hex, "Invalid color");
            WHITE
        }
    }
}

/// Format a color as "#RRGGBB"
pub fn color_to_hex(color: u32) -> String {
    format!("#{:06X}", color & 0xFFFFFF)
}

/// Normalized `[r, g, b]` in `0.0..=1.0`
pub fn color_to_rgb_f32(color: u32) -> [f32; 3] {
    let (r, g, b) = channels(color);
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_from_id() {
        assert_eq!(PatternType::from_id("stripes"), PatternType::Stripes);
        assert_eq!(PatternType::from_id("TWO_TONE"), PatternType::TwoTone);
        assert_eq!(PatternType::from_id("plaid"), PatternType::None);
    }

    #[test]
    fn test_blend_colors() {
        assert_eq!(blend_colors(0x000000, 0xFFFFFF, 0.0), 0x000000);
        assert_eq!(blend_colors(0x000000, 0xFFFFFF, 1.0), 0xFFFFFF);
        assert_eq!(blend_colors(0x000000, 0x640000, 0.5), 0x320000);
        assert_eq!(blend_colors(0x102030, 0x102030, 0.7), 0x102030);
        assert_eq!(blend_colors(0x000000, 0xFFFFFF, 3.0), 0xFFFFFF);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#224466"), 0x224466);
        assert_eq!(parse_color("0x224466"), 0x224466);
        assert_eq!(parse_color("224466"), 0x224466);
        assert_eq!(parse_color("ff0000"), 0xFF0000);
        assert_eq!(parse_color("nope"), WHITE);
        assert_eq!(parse_color("#1234567"), WHITE);
        assert_eq!(parse_color("+FFFFF"), WHITE);
        assert_eq!(parse_color("#+12345"), WHITE);
        assert_eq!(parse_color("#"), WHITE);
    }

    #[test]
    fn test_color_to_hex() {
        assert_eq!(color_to_hex(0x224466), "#224466");
        assert_eq!(color_to_hex(0xFF), "#0000FF");
        assert_eq!(color_to_hex(0xAB224466), "#224466");
    }

    #[test]
    fn test_color_to_rgb_f32() {
        assert_eq!(color_to_rgb_f32(0xFF0000), [1.0, 0.0, 0.0]);
        assert_eq!(color_to_rgb_f32(0x000000), [0.0, 0.0, 0.0]);
    }
}
