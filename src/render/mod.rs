//! # Render Pass
//!
//! Turns a frozen [`Template`] plus one row of values into a [`PageDrawing`]:
//! a flat list of fills, text runs and images in PDF page space (points,
//! bottom-left origin, y up). The PDF writer serializes it without further
//! layout decisions.
//!
//! ## Order
//!
//! 1. Groups, by name. Each group stacks its visible members
//!    ([`crate::layout::auto_stack`]) and draws them by their conf layer.
//! 2. Top-level fields by ascending layer, skipping hidden ones.
//!
//! ## Coordinates
//!
//! Template geometry is in screen space. A box `(x, y, w, h)` maps to the
//! page as `x / scale` and `page_height - y / scale - h / scale`. Group
//! member positions are already page units relative to the group corner.
//!
//! Auto-fit text is sized the way the canvas sizes it (in screen space,
//! with the same padding) and then divided by the scale, so the page matches
//! what the editor shows.

pub mod visibility;

use std::sync::Arc;

pub use visibility::{field_value, resolve_row_values, RowValues, Visibility};

use crate::content::Content;
use crate::font::{FontContext, StandardFont, TEXT_PADDING};
use crate::image_loader::{ImageLoader, LoadedImage};
use crate::layout::auto_stack;
use crate::model::{Rect, Template};
use crate::style::{Align, Color, FieldStyle};

/// One drawing operation, in page space.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    },
    /// A single line of text starting at `(x, y)` on its baseline.
    Text {
        x: f64,
        y: f64,
        font: StandardFont,
        size: f64,
        color: Color,
        text: String,
    },
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image: Arc<LoadedImage>,
    },
}

/// Everything drawn on one output page.
#[derive(Debug, Clone)]
pub struct PageDrawing {
    pub width: f64,
    pub height: f64,
    pub commands: Vec<DrawCommand>,
}

impl PageDrawing {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    /// Every text run, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Renders rows of a template. Holds only shared read-only services, so one
/// pass can be reused for every row of a batch.
pub struct RenderPass<'a> {
    fonts: &'a FontContext,
    images: &'a ImageLoader,
}

impl<'a> RenderPass<'a> {
    pub fn new(fonts: &'a FontContext, images: &'a ImageLoader) -> Self {
        Self { fonts, images }
    }

    pub fn render(&self, template: &Template, values: &RowValues) -> PageDrawing {
        let mut page = PageDrawing::new(template.page_width, template.page_height);
        let visibility = Visibility::resolve(template, values);
        let scale = template.scale;

        for group in template.groups.values() {
            let conf_for = |name: &str| group.conf_for(name, template.fields.get(name), scale);
            let items = group.stack_items(&conf_for, |name| {
                !visibility.excludes_member(&group.name, name, values)
            });
            let origin = group.rect.scaled(1.0 / scale);
            let mut placed = auto_stack(&items, origin.height);
            placed.sort_by_key(|p| conf_for(&p.name).layer);

            for p in placed {
                let conf = conf_for(&p.name);
                let bounds = Rect::new(origin.x + p.rect.x, origin.y + p.rect.y, p.rect.width, p.rect.height);
                let value = values.get(&p.name).map(String::as_str).unwrap_or("");
                self.draw_field(&mut page, &conf.style(), bounds, value, scale);
            }
        }

        for field in template.stacking_order() {
            if visibility.is_hidden(&field.name) {
                continue;
            }
            let mut style = field.style.clone();
            style.font_size /= scale;
            let bounds = field.rect.scaled(1.0 / scale);
            let value = values.get(&field.name).map(String::as_str).unwrap_or("");
            self.draw_field(&mut page, &style, bounds, value, scale);
        }

        page
    }

    /// Draw one field. `bounds` is top-left page space; `style.font_size` is
    /// in points.
    fn draw_field(&self, page: &mut PageDrawing, style: &FieldStyle, bounds: Rect, value: &str, scale: f64) {
        let y = page.height - bounds.y - bounds.height;
        let content = self.images.resolve(value);

        if content.is_image() {
            match self.images.load_for_pdf(&content) {
                Ok(image) => {
                    page.commands.push(DrawCommand::Image {
                        x: bounds.x,
                        y,
                        width: bounds.width,
                        height: bounds.height,
                        image: Arc::new(image),
                    });
                    return;
                }
                Err(e) => log::warn!("{}; drawing '{}' as text", e, value),
            }
        }

        if style.bg_visible {
            page.commands.push(DrawCommand::FillRect {
                x: bounds.x,
                y,
                width: bounds.width,
                height: bounds.height,
                color: style.bg_rgb(),
            });
        }

        if matches!(content, Content::Missing) {
            return;
        }

        let font = self.fonts.resolve(&style.font_family, style.bold);
        let size = if style.auto_font {
            self.fonts
                .fit_font_size(value, font, bounds.width * scale, bounds.height * scale)
                / scale
        } else {
            style.font_size
        };
        let width = self.fonts.measure_string(value, font, size);
        let inset = TEXT_PADDING / scale;
        let x = match style.align {
            Align::Left => bounds.x + inset,
            Align::Right => bounds.right() - inset - width,
            Align::Center => bounds.x + (bounds.width - width) / 2.0,
        };
        let center = y + bounds.height / 2.0;
        page.commands.push(DrawCommand::Text {
            x,
            y: center - self.fonts.baseline_offset(font, size),
            font,
            size,
            color: style.text_rgb(),
            text: value.to_string(),
        });
    }
}
