//! # Font Management
//!
//! Fields draw with the standard (non-embedded) PDF fonts. Family names the
//! user picks in the editor are mapped onto them: Courier-like names resolve
//! to Courier, everything else (Arial, Helvetica, unknown) to Helvetica.
//!
//! The same metrics drive on-screen auto-fit and PDF text placement, so the
//! canvas preview and the generated page agree on sizes.

pub mod metrics;

pub use metrics::StandardFontMetrics;

/// Padding kept free on every side of a field when fitting or anchoring text.
pub const TEXT_PADDING: f64 = 2.0;

/// Line height as a multiple of the font size.
pub const LINE_SPACING: f64 = 1.15;

/// Upper bound for auto-fit, so degenerate boxes cannot spin forever.
const MAX_FIT_SIZE: u32 = 1000;

/// The standard PDF fonts fields can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
        }
    }

    pub fn metrics(&self) -> StandardFontMetrics {
        match self {
            Self::Helvetica => StandardFontMetrics::HELVETICA,
            Self::HelveticaBold => StandardFontMetrics::HELVETICA_BOLD,
            Self::Courier | Self::CourierBold => StandardFontMetrics::COURIER,
        }
    }
}

/// Text measurement shared by the canvas and the render pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct FontContext;

impl FontContext {
    pub fn new() -> Self {
        Self
    }

    /// Map a family name and weight onto a standard font.
    pub fn resolve(&self, family: &str, bold: bool) -> StandardFont {
        let family = family.to_ascii_lowercase();
        let courier = family.contains("courier") || family.contains("mono");
        match (courier, bold) {
            (true, false) => StandardFont::Courier,
            (true, true) => StandardFont::CourierBold,
            (false, false) => StandardFont::Helvetica,
            (false, true) => StandardFont::HelveticaBold,
        }
    }

    /// Measure the width of a string in the current unit space.
    pub fn measure_string(&self, text: &str, font: StandardFont, font_size: f64) -> f64 {
        font.metrics().measure_string(text, font_size, 0.0)
    }

    /// Height of one line of text at `font_size`.
    pub fn line_height(&self, font_size: f64) -> f64 {
        font_size * LINE_SPACING
    }

    /// Offset from a box's vertical center down to the text baseline that
    /// centers the glyphs' ascender–descender band in the box.
    pub fn baseline_offset(&self, font: StandardFont, font_size: f64) -> f64 {
        let m = font.metrics();
        (m.ascender as f64 + m.descender as f64) / 2000.0 * font_size
    }

    /// Largest integer font size whose rendered `text` fits inside a
    /// `width` × `height` box less [`TEXT_PADDING`] on each side.
    ///
    /// Never returns less than 1.
    pub fn fit_font_size(&self, text: &str, font: StandardFont, width: f64, height: f64) -> f64 {
        let avail_w = width - 2.0 * TEXT_PADDING;
        let avail_h = height - 2.0 * TEXT_PADDING;
        let mut size = 1u32;
        while size <= MAX_FIT_SIZE {
            let s = size as f64;
            if self.measure_string(text, font, s) > avail_w || self.line_height(s) > avail_h {
                break;
            }
            size += 1;
        }
        size.saturating_sub(1).max(1) as f64
    }
}
