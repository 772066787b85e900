//! # Style System
//!
//! The handful of style properties a field carries: font, colors, background
//! visibility and horizontal alignment. Colors are stored as the strings the
//! user picked (`"#1a2b3c"`, `"black"`) so they round-trip through the layout
//! document unchanged, and parsed to [`Color`] only when drawing.

use serde::{Deserialize, Serialize};

/// Default font family for new fields. Resolves to Helvetica metrics.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";
/// Default font size for new fields, in page points.
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

/// An RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64, // 0.0 - 1.0
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    /// Parse `#rgb`, `#rrggbb` or a named color.
    ///
    /// Returns `None` for anything unrecognised; callers pick their own
    /// fallback (black text, white background).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        Self::named(&value.to_ascii_lowercase())
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
                let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
                let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
                Some(Self::from_bytes(r, g, b))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::from_bytes(r, g, b))
            }
            _ => None,
        }
    }

    fn named(name: &str) -> Option<Self> {
        let (r, g, b) = match name {
            "black" => (0, 0, 0),
            "white" => (255, 255, 255),
            "red" => (255, 0, 0),
            "green" => (0, 128, 0),
            "blue" => (0, 0, 255),
            "yellow" => (255, 255, 0),
            "orange" => (255, 165, 0),
            "purple" => (128, 0, 128),
            "gray" | "grey" => (128, 128, 128),
            "lightgray" | "lightgrey" => (211, 211, 211),
            "darkgray" | "darkgrey" => (169, 169, 169),
            "navy" => (0, 0, 128),
            "maroon" => (128, 0, 0),
            "teal" => (0, 128, 128),
            _ => return None,
        };
        Some(Self::from_bytes(r, g, b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Horizontal text anchor inside a field's box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// The visual style shared by top-level fields and group-local copies.
///
/// `font_size` is in whatever unit space the owner lives in: screen space
/// on a live [`crate::model::Field`], page space in a
/// [`crate::model::GroupFieldConf`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStyle {
    pub font_family: String,
    pub font_size: f64,
    pub bold: bool,
    pub text_color: String,
    pub bg_color: String,
    pub bg_visible: bool,
    pub align: Align,
    pub auto_font: bool,
}

impl Default for FieldStyle {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            bold: false,
            text_color: "black".to_string(),
            bg_color: "white".to_string(),
            bg_visible: true,
            align: Align::Left,
            auto_font: true,
        }
    }
}

impl FieldStyle {
    /// Resolved text color, black when the stored string is unparseable.
    pub fn text_rgb(&self) -> Color {
        Color::parse(&self.text_color).unwrap_or(Color::BLACK)
    }

    /// Resolved background color, white when the stored string is unparseable.
    pub fn bg_rgb(&self) -> Color {
        Color::parse(&self.bg_color).unwrap_or(Color::WHITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_long_and_short() {
        assert_eq!(Color::parse("#ff0000"), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(Color::parse("#0f0"), Some(Color::rgb(0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_parse_named_is_case_insensitive() {
        assert_eq!(Color::parse("White"), Some(Color::WHITE));
        assert_eq!(Color::parse("black"), Some(Color::BLACK));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("#gggggg"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn test_style_color_fallbacks() {
        let style = FieldStyle {
            text_color: "nope".to_string(),
            bg_color: "".to_string(),
            ..Default::default()
        };
        assert_eq!(style.text_rgb(), Color::BLACK);
        assert_eq!(style.bg_rgb(), Color::WHITE);
    }

    #[test]
    fn test_align_serde_lowercase() {
        let json = serde_json::to_string(&Align::Center).unwrap();
        assert_eq!(json, "\"center\"");
        let back: Align = serde_json::from_str("\"right\"").unwrap();
        assert_eq!(back, Align::Right);
    }
}
