//! # pdsgen
//!
//! Visual template layout and batch PDF generation.
//!
//! A template is a single fixed-size page holding axis-aligned fields (text or
//! a raster image) and groups. Groups auto-stack their member fields so that
//! blank or hidden values collapse instead of leaving holes. The template is
//! edited interactively in screen space (zoomed), and rendered once per
//! spreadsheet row in page space.
//!
//! ## Architecture
//!
//! ```text
//! Persisted layout (JSON)
//!       ↓
//!   [config]   : LayoutDocument, page-space units
//!       ↓
//!   [session]  : Template + history + data, screen-space units
//!       ↕
//!   [canvas]   : drag / resize / guides / zoom / pan
//!       ↓
//!   [render]   : per-row visibility + auto-stack → PageDrawing
//!       ↓
//!   [pdf]      : serialize one page to PDF bytes
//!       ↓
//!   [batch]    : background worker, one file per row
//! ```
//!
//! The render pass is a pure function of a frozen [`model::Template`] and one
//! row of values, which is what the batch worker relies on.

pub mod error;
pub mod style;
pub mod font;
pub mod model;
pub mod data;
pub mod content;
pub mod image_loader;
pub mod layout;
pub mod canvas;
pub mod history;
pub mod session;
pub mod config;
pub mod render;
pub mod pdf;
pub mod batch;

pub use error::PdsError;

use data::DataSource;
use font::FontContext;
use image_loader::ImageLoader;
use model::Template;
use pdf::PdfWriter;
use render::RenderPass;

/// Render one data row of a template to PDF bytes.
///
/// This is the single-row entry point used by row preview; [`batch`] runs
/// the same pass for every row on a worker thread.
pub fn render_row(
    template: &Template,
    data: &DataSource,
    row: usize,
    images: &ImageLoader,
) -> Result<Vec<u8>, PdsError> {
    let font_context = FontContext::new();
    let values = render::resolve_row_values(template, data, row);
    let page = RenderPass::new(&font_context, images).render(template, &values);
    PdfWriter::new().write(&page)
}
