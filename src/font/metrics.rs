//! Glyph advance widths for the standard PDF fonts we draw with.
//!
//! Widths are in 1/1000 em for the printable ASCII range (0x20..=0x7E),
//! taken from the Adobe AFM files. Characters outside the table use
//! [`StandardFontMetrics::default_width`].

/// Helvetica advance widths, 0x20..=0x7E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Helvetica-Bold advance widths, 0x20..=0x7E.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    333, 333, 584, 584, 584, 611, 975, // ':'..'@'
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    333, 278, 333, 584, 556, 333, // '['..'`'
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // 'a'..'m'
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // 'n'..'z'
    389, 280, 389, 584, // '{'..'~'
];

/// Width table and vertical metrics for one standard font.
#[derive(Debug, Clone, Copy)]
pub struct StandardFontMetrics {
    widths: Option<&'static [u16; 95]>,
    /// Width used for characters outside the table (and every character of
    /// a monospaced font).
    pub default_width: u16,
    pub ascender: i16,
    pub descender: i16,
}

impl StandardFontMetrics {
    pub const HELVETICA: Self = Self {
        widths: Some(&HELVETICA_WIDTHS),
        default_width: 556,
        ascender: 718,
        descender: -207,
    };

    pub const HELVETICA_BOLD: Self = Self {
        widths: Some(&HELVETICA_BOLD_WIDTHS),
        default_width: 611,
        ascender: 718,
        descender: -207,
    };

    /// Courier and Courier-Bold share one advance for every glyph.
    pub const COURIER: Self = Self {
        widths: None,
        default_width: 600,
        ascender: 629,
        descender: -157,
    };

    /// Advance width of `ch` in 1/1000 em.
    pub fn advance(&self, ch: char) -> u16 {
        let code = ch as u32;
        match self.widths {
            Some(table) if (0x20..=0x7E).contains(&code) => table[(code - 0x20) as usize],
            _ => self.default_width,
        }
    }

    /// Advance width of `ch` in points at `font_size`.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        self.advance(ch) as f64 / 1000.0 * font_size
    }

    /// Width of a whole string in points.
    pub fn measure_string(&self, text: &str, font_size: f64, letter_spacing: f64) -> f64 {
        text.chars()
            .map(|ch| self.char_width(ch, font_size) + letter_spacing)
            .sum()
    }
}
