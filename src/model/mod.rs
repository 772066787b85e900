//! # Template Model
//!
//! The in-memory form of a template: top-level fields, groups, global
//! conditions and static field values on one fixed-size page.
//!
//! Geometry of fields and groups lives in **screen space**: page units
//! multiplied by the current zoom [`Template::scale`]. Changing the zoom
//! rescales every stored quantity (see [`Template::set_scale`]), and anything
//! that leaves the editor (layout document, PDF) divides by the scale again.
//! Group-local positions and styles ([`Group::field_pos`],
//! [`Group::field_conf`]) are the exception: they are kept in page units.

mod field;
mod group;

pub use field::{Field, FieldBinding, FieldDisplay, DisplayImage};
pub use group::{Group, GroupFieldConf, NEW_FIELD_POS};

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Grid step in page units; the on-screen step is this times the zoom.
pub const GRID_SIZE: f64 = 5.0;

/// Named page sizes in points.
pub const PAGE_SIZES: [(&str, f64, f64); 2] = [("A4", 595.0, 842.0), ("B5", 516.0, 729.0)];

/// Highest layer a field can take.
pub const MAX_LAYER: u32 = 9999;

/// Static fields every new session offers.
pub const DEFAULT_STATIC_FIELDS: [&str; 3] = ["Date", "Header", "Footer"];

/// An axis-aligned rectangle, top-left origin, y growing downward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Two rectangles overlap iff they intersect with positive area on both
    /// axes. Touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    /// Whether `other` lies entirely inside `self` (edges inclusive).
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// Multiply every component by `factor`.
    pub fn scaled(&self, factor: f64) -> Rect {
        Rect {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Snap the top-left corner to the nearest grid multiple and the size to
    /// the nearest non-zero grid multiple.
    pub fn snapped(&self, step: f64) -> Rect {
        Rect {
            x: snap(self.x, step),
            y: snap(self.y, step),
            width: snap_size(self.width, step),
            height: snap_size(self.height, step),
        }
    }

    /// Normalise a rectangle spanned by two arbitrary corners.
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }
}

/// Round `value` to the nearest multiple of `step`.
pub fn snap(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).round() * step
}

/// Like [`snap`], but never below one step.
pub fn snap_size(value: f64, step: f64) -> f64 {
    snap(value, step).max(step)
}

/// A visibility rule: hide `target` when `source` resolves to an empty value.
///
/// Serialized as a two-element array `[source, target]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Condition {
    pub source: String,
    pub target: String,
}

impl Condition {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl From<(String, String)> for Condition {
    fn from((source, target): (String, String)) -> Self {
        Self { source, target }
    }
}

impl From<Condition> for (String, String) {
    fn from(c: Condition) -> Self {
        (c.source, c.target)
    }
}

/// Parse a page size: a named size (case-insensitive) or `WxH` in points.
///
/// `WxH` applies only when both sides are numbers, and both must be
/// positive. Anything else is a name; unknown names fall back to A4.
pub fn parse_page_size(value: &str) -> Result<(f64, f64), crate::PdsError> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();
    let dims = lower
        .split_once('x')
        .and_then(|(w, h)| Some((w.trim().parse::<f64>().ok()?, h.trim().parse::<f64>().ok()?)));
    if let Some((w, h)) = dims {
        if !(w > 0.0 && h > 0.0) || !w.is_finite() || !h.is_finite() {
            return Err(crate::PdsError::InvalidInput(format!(
                "invalid page size '{}', expected e.g. 595x842",
                value
            )));
        }
        return Ok((w.trunc(), h.trunc()));
    }
    let upper = value.to_ascii_uppercase();
    let (_, w, h) = PAGE_SIZES
        .iter()
        .find(|(name, _, _)| *name == upper)
        .copied()
        .unwrap_or(PAGE_SIZES[0]);
    Ok((w, h))
}

/// Name of a page size for display: `"A4"` or `"612x792"`.
pub fn page_size_name(width: f64, height: f64) -> String {
    PAGE_SIZES
        .iter()
        .find(|(_, w, h)| (w - width).abs() < 1.0 && (h - height).abs() < 1.0)
        .map(|(name, _, _)| name.to_string())
        .unwrap_or_else(|| format!("{}x{}", width as i64, height as i64))
}

/// A complete template: page, fields, groups and their rules.
#[derive(Debug, Clone)]
pub struct Template {
    /// Page size in page units (points).
    pub page_width: f64,
    pub page_height: f64,
    /// Current zoom: screen units per page unit.
    pub scale: f64,
    pub grid_size: f64,
    /// Top-level fields by name.
    pub fields: BTreeMap<String, Field>,
    /// Groups by name.
    pub groups: BTreeMap<String, Group>,
    /// Global conditions; only pairs of top-level fields take effect.
    pub conditions: Vec<Condition>,
    /// Fixed text of static (non-spreadsheet) fields by name.
    pub static_fields: BTreeMap<String, String>,
    /// The bound data source, if any.
    pub data_path: Option<PathBuf>,
}

impl Default for Template {
    fn default() -> Self {
        let (_, w, h) = PAGE_SIZES[0];
        Self {
            page_width: w,
            page_height: h,
            scale: 1.0,
            grid_size: GRID_SIZE,
            fields: BTreeMap::new(),
            groups: BTreeMap::new(),
            conditions: Vec::new(),
            static_fields: DEFAULT_STATIC_FIELDS
                .iter()
                .map(|name| (name.to_string(), String::new()))
                .collect(),
            data_path: None,
        }
    }
}

impl Template {
    /// The on-screen grid step.
    pub fn snap_step(&self) -> f64 {
        self.grid_size * self.scale
    }

    /// The page rectangle in screen space.
    pub fn page_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.page_width * self.scale, self.page_height * self.scale)
    }

    /// Change the zoom, rescaling every stored screen-space quantity by
    /// `new_scale / scale`.
    pub fn set_scale(&mut self, new_scale: f64) {
        if new_scale <= 0.0 || !new_scale.is_finite() {
            return;
        }
        let factor = new_scale / self.scale;
        for field in self.fields.values_mut() {
            field.scale_by(factor);
        }
        for group in self.groups.values_mut() {
            group.rect = group.rect.scaled(factor);
        }
        self.scale = new_scale;
    }

    /// Names of every field assigned to any group.
    pub fn group_field_names(&self) -> BTreeSet<&str> {
        self.groups
            .values()
            .flat_map(|g| g.fields.iter().map(String::as_str))
            .collect()
    }

    /// Top-level fields in draw order: ascending layer, ties by name.
    pub fn stacking_order(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.values().collect();
        fields.sort_by_key(|f| f.layer);
        fields
    }

    /// Layer for a newly created field: one above the current top.
    pub fn next_layer(&self) -> u32 {
        let top = self.fields.values().map(|f| f.layer).max().unwrap_or(0);
        top.saturating_add(1).min(MAX_LAYER)
    }

    /// Shift layers so the lowest one is 1 (layer 0 is the page itself).
    pub fn normalize_layers(&mut self) {
        let Some(min) = self.fields.values().map(|f| f.layer).min() else {
            return;
        };
        if min < 1 {
            let shift = 1 - min;
            for field in self.fields.values_mut() {
                field.layer += shift;
            }
        }
    }

    /// Top-level fields lying entirely inside the group's rectangle.
    pub fn fields_inside(&self, group: &Group) -> Vec<String> {
        self.fields
            .values()
            .filter(|f| group.rect.contains(&f.rect))
            .map(|f| f.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_predicate() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        // touching edges do not overlap
        assert!(!a.overlaps(&Rect::new(10.0, 0.0, 10.0, 10.0)));
        assert!(!a.overlaps(&Rect::new(0.0, 10.0, 10.0, 10.0)));
    }

    #[test]
    fn test_snap_is_idempotent() {
        for step in [5.0, 7.5, 6.05] {
            for r in [
                Rect::new(12.3, 47.9, 101.2, 2.0),
                Rect::new(-3.3, 0.4, 0.0, 55.55),
                Rect::new(999.99, 123.456, 33.3, 18.1),
            ] {
                let once = r.snapped(step);
                let twice = once.snapped(step);
                assert!((once.x - twice.x).abs() < 1e-9);
                assert!((once.y - twice.y).abs() < 1e-9);
                assert!((once.width - twice.width).abs() < 1e-9);
                assert!((once.height - twice.height).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_snap_size_has_minimum_step() {
        assert_eq!(snap_size(1.0, 5.0), 5.0);
        assert_eq!(snap_size(0.0, 5.0), 5.0);
        assert_eq!(snap_size(13.0, 5.0), 15.0);
    }

    #[test]
    fn test_scale_round_trip() {
        let mut t = Template::default();
        t.fields.insert(
            "A".into(),
            Field::new("A", "A", Rect::new(35.0, 70.0, 100.0, 40.0), 1),
        );
        let before = t.fields["A"].rect;
        t.set_scale(1.7);
        t.set_scale(1.0);
        let after = t.fields["A"].rect;
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
        assert!((before.width - after.width).abs() < 1e-9);
        assert!((before.height - after.height).abs() < 1e-9);
    }

    #[test]
    fn test_set_scale_rescales_font_and_groups() {
        let mut t = Template::default();
        t.fields
            .insert("A".into(), Field::new("A", "A", Rect::new(10.0, 10.0, 100.0, 40.0), 1));
        t.groups.insert("G".into(), Group::new("G", Rect::new(0.0, 0.0, 100.0, 100.0)));
        t.set_scale(2.0);
        assert_eq!(t.fields["A"].style.font_size, 24.0);
        assert_eq!(t.groups["G"].rect, Rect::new(0.0, 0.0, 200.0, 200.0));
        assert_eq!(t.snap_step(), 10.0);
    }

    #[test]
    fn test_parse_page_size() {
        assert_eq!(parse_page_size("a4").unwrap(), (595.0, 842.0));
        assert_eq!(parse_page_size("B5").unwrap(), (516.0, 729.0));
        assert_eq!(parse_page_size("612x792").unwrap(), (612.0, 792.0));
        assert_eq!(parse_page_size("Letter").unwrap(), (595.0, 842.0));
        assert_eq!(parse_page_size("Box").unwrap(), (595.0, 842.0));
        assert_eq!(parse_page_size("12xabc").unwrap(), (595.0, 842.0));
        assert!(parse_page_size("0x842").is_err());
        assert!(parse_page_size("-5 x 10").is_err());
        assert_eq!(page_size_name(516.0, 729.0), "B5");
        assert_eq!(page_size_name(612.0, 792.0), "612x792");
    }

    #[test]
    fn test_condition_serializes_as_pair() {
        let json = serde_json::to_string(&Condition::new("A", "B")).unwrap();
        assert_eq!(json, "[\"A\",\"B\"]");
        let c: Condition = serde_json::from_str("[\"X\",\"Y\"]").unwrap();
        assert_eq!(c, Condition::new("X", "Y"));
    }

    #[test]
    fn test_normalize_layers_and_next_layer() {
        let mut t = Template::default();
        t.fields.insert("A".into(), Field::new("A", "", Rect::default(), 0));
        t.fields.insert("B".into(), Field::new("B", "", Rect::default(), 3));
        t.normalize_layers();
        assert_eq!(t.fields["A"].layer, 1);
        assert_eq!(t.fields["B"].layer, 4);
        assert_eq!(t.next_layer(), 5);
    }
}
