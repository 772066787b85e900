use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

use super::{snap_size, Rect};
use crate::font::{FontContext, TEXT_PADDING};
use crate::style::{Align, Color, FieldStyle};

/// Where a field's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldBinding {
    /// A spreadsheet column; the field is named `sheet:column`.
    Column { sheet: String, column: String },
    /// A user-named static field with fixed text.
    Static,
}

impl FieldBinding {
    /// Classify a field name. Everything before the first `:` is the sheet.
    pub fn from_name(name: &str) -> Self {
        match name.split_once(':') {
            Some((sheet, column)) => FieldBinding::Column {
                sheet: sheet.to_string(),
                column: column.to_string(),
            },
            None => FieldBinding::Static,
        }
    }
}

/// A decoded raster image shown in a field, plus a copy resized to the
/// field's current pixel box.
#[derive(Debug, Clone)]
pub struct DisplayImage {
    pub source: Arc<DynamicImage>,
    pub display: Arc<RgbaImage>,
}

impl DisplayImage {
    pub fn new(source: Arc<DynamicImage>, width: f64, height: f64) -> Self {
        let display = Arc::new(resize_for_display(&source, width, height));
        Self { source, display }
    }

    /// Re-derive the display copy for a new box size.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.display = Arc::new(resize_for_display(&self.source, width, height));
    }
}

fn resize_for_display(image: &DynamicImage, width: f64, height: f64) -> RgbaImage {
    let w = (width.round() as u32).max(1);
    let h = (height.round() as u32).max(1);
    image.resize_exact(w, h, FilterType::Lanczos3).to_rgba8()
}

/// What the field currently shows.
#[derive(Debug, Clone, Default)]
pub enum FieldDisplay {
    #[default]
    Text,
    Image(DisplayImage),
}

/// A named rectangle on the template canvas. Geometry and `style.font_size`
/// are in screen space.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    /// Current value shown on the canvas (the raw text, or the image
    /// reference when an image is displayed).
    pub text: String,
    pub rect: Rect,
    pub style: FieldStyle,
    /// Draw order among top-level fields, >= 1.
    pub layer: u32,
    pub display: FieldDisplay,
}

impl Field {
    pub fn new(name: impl Into<String>, text: impl Into<String>, rect: Rect, layer: u32) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            rect,
            style: FieldStyle::default(),
            layer,
            display: FieldDisplay::Text,
        }
    }

    pub fn binding(&self) -> FieldBinding {
        FieldBinding::from_name(&self.name)
    }

    pub fn is_image(&self) -> bool {
        matches!(self.display, FieldDisplay::Image(_))
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.rect.x += dx;
        self.rect.y += dy;
    }

    /// Snap position and size to the grid.
    pub fn snap_to_grid(&mut self, step: f64) {
        self.rect = self.rect.snapped(step);
    }

    /// Resize anchored at the top-left corner from a size captured at the
    /// start of the gesture. With `square`, the larger-magnitude delta drives
    /// both axes.
    pub fn resize_from(&mut self, start_w: f64, start_h: f64, dx: f64, dy: f64, square: bool, min: f64) {
        let (dx, dy) = if square {
            let d = if dx.abs() > dy.abs() { dx } else { dy };
            (d, d)
        } else {
            (dx, dy)
        };
        self.rect.width = (start_w + dx).max(min);
        self.rect.height = (start_h + dy).max(min);
    }

    /// Finish a resize: snap the size to the grid.
    pub fn snap_size(&mut self, step: f64) {
        self.rect.width = snap_size(self.rect.width, step);
        self.rect.height = snap_size(self.rect.height, step);
    }

    /// Multiply every screen-space quantity by `factor`.
    pub fn scale_by(&mut self, factor: f64) {
        self.rect = self.rect.scaled(factor);
        self.style.font_size *= factor;
    }

    /// Manually set the font size, which turns auto-fit off.
    pub fn set_font_size(&mut self, size: f64) {
        self.style.font_size = size;
        self.style.auto_font = false;
    }

    /// Recompute the font size to fit the box, when auto-fit is on and the
    /// field shows text.
    pub fn apply_auto_font(&mut self, fonts: &FontContext) {
        if !self.style.auto_font || self.is_image() {
            return;
        }
        let font = fonts.resolve(&self.style.font_family, self.style.bold);
        self.style.font_size =
            fonts.fit_font_size(&self.text, font, self.rect.width, self.rect.height);
    }

    /// Bring derived state in line after a geometry, style or value change:
    /// refit the font and resize the displayed image.
    pub fn sync(&mut self, fonts: &FontContext) {
        if let FieldDisplay::Image(image) = &mut self.display {
            image.resize(self.rect.width, self.rect.height);
        }
        self.apply_auto_font(fonts);
    }

    /// Background fill to draw, if any. Image fields are always transparent.
    pub fn background(&self) -> Option<Color> {
        if self.is_image() || !self.style.bg_visible {
            None
        } else {
            Some(self.style.bg_rgb())
        }
    }

    /// Anchor point of the text label: the vertical center of the box and
    /// the left inset, right inset or horizontal center per alignment.
    pub fn label_anchor(&self) -> (f64, f64) {
        let r = &self.rect;
        let y = r.y + r.height / 2.0;
        let x = match self.style.align {
            Align::Left => r.x + TEXT_PADDING,
            Align::Right => r.right() - TEXT_PADDING,
            Align::Center => r.x + r.width / 2.0,
        };
        (x, y)
    }
}
