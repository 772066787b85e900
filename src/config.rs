//! # Layout Document
//!
//! The persisted form of a template, as JSON. Geometry and font sizes are
//! stored in page units (points): the editor divides by its zoom on save and
//! multiplies on load, so a layout saved at one zoom opens correctly at any
//! other. Values are stored unrounded.
//!
//! Every key is optional on input and falls back to its default, so older or
//! hand-edited files still load. A file that cannot be read or parsed at all
//! is treated as "no layout yet" by [`load_or_default`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PdsError;
use crate::model::{
    Condition, Field, Group, GroupFieldConf, Rect, Template, DEFAULT_STATIC_FIELDS, PAGE_SIZES,
};
use crate::style::{Align, FieldStyle, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE};

/// One top-level field, page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRecord {
    pub name: String,
    /// Shown value; the field name when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
    pub font_family: String,
    pub bold: bool,
    pub auto_font: bool,
    pub text_color: String,
    pub bg_color: String,
    pub bg_visible: bool,
    pub align: Align,
    pub layer: u32,
}

impl Default for FieldRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            text: None,
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 40.0,
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            bold: false,
            auto_font: true,
            text_color: "black".to_string(),
            bg_color: "white".to_string(),
            bg_visible: true,
            align: Align::Left,
            layer: 1,
        }
    }
}

impl FieldRecord {
    /// Capture a screen-space field.
    pub fn from_field(field: &Field, scale: f64) -> Self {
        let s = &field.style;
        Self {
            name: field.name.clone(),
            text: Some(field.text.clone()),
            x: field.rect.x / scale,
            y: field.rect.y / scale,
            width: field.rect.width / scale,
            height: field.rect.height / scale,
            font_size: s.font_size / scale,
            font_family: s.font_family.clone(),
            bold: s.bold,
            auto_font: s.auto_font,
            text_color: s.text_color.clone(),
            bg_color: s.bg_color.clone(),
            bg_visible: s.bg_visible,
            align: s.align,
            layer: field.layer,
        }
    }

    /// Rebuild the field in screen space at `scale`. The result shows text;
    /// image values are resolved again by the session.
    pub fn to_field(&self, scale: f64) -> Field {
        let text = self.text.clone().unwrap_or_else(|| self.name.clone());
        let rect = Rect::new(self.x, self.y, self.width, self.height).scaled(scale);
        let mut field = Field::new(self.name.clone(), text, rect, self.layer);
        field.style = FieldStyle {
            font_family: self.font_family.clone(),
            font_size: self.font_size * scale,
            bold: self.bold,
            text_color: self.text_color.clone(),
            bg_color: self.bg_color.clone(),
            bg_visible: self.bg_visible,
            align: self.align,
            auto_font: self.auto_font,
        };
        field
    }
}

/// One group, page units.
///
/// `fields` keeps membership in insertion order, which decides stacking
/// ties. Files without it fall back to the key set of `field_pos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRecord {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    pub field_pos: BTreeMap<String, (f64, f64)>,
    pub field_conf: BTreeMap<String, GroupFieldConf>,
    pub conditions: Vec<Condition>,
}

impl Default for GroupRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            fields: Vec::new(),
            field_pos: BTreeMap::new(),
            field_conf: BTreeMap::new(),
            conditions: Vec::new(),
        }
    }
}

impl GroupRecord {
    pub fn from_group(group: &Group, scale: f64) -> Self {
        let rect = group.rect.scaled(1.0 / scale);
        let mut field_pos = group.field_pos.clone();
        for name in &group.fields {
            field_pos.entry(name.clone()).or_insert((0.0, 0.0));
        }
        field_pos.retain(|name, _| group.has_field(name));
        Self {
            name: group.name.clone(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            fields: group.fields.clone(),
            field_pos,
            field_conf: group.field_conf.clone(),
            conditions: group.conditions.clone(),
        }
    }

    /// Members in stacking order: `fields` first, then any other key of
    /// `field_pos`.
    pub fn members(&self) -> Vec<String> {
        let mut members: Vec<String> = Vec::with_capacity(self.field_pos.len());
        for name in self.fields.iter().chain(self.field_pos.keys()) {
            if !members.contains(name) {
                members.push(name.clone());
            }
        }
        members
    }

    pub fn to_group(&self, scale: f64) -> Group {
        let rect = Rect::new(self.x, self.y, self.width, self.height).scaled(scale);
        let mut group = Group::new(self.name.clone(), rect);
        group.fields = self.members();
        group.field_pos = self.field_pos.clone();
        for name in &group.fields {
            group.field_pos.entry(name.clone()).or_insert((0.0, 0.0));
        }
        group.field_conf = self.field_conf.clone();
        group.conditions = self.conditions.clone();
        group
    }
}

/// The whole persisted layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutDocument {
    /// Path of the bound data source; empty when none.
    pub excel_path: String,
    pub page_width: f64,
    pub page_height: f64,
    pub elements: Vec<FieldRecord>,
    pub static_fields: BTreeMap<String, String>,
    pub conditions: Vec<Condition>,
    pub groups: Vec<GroupRecord>,
    pub ignore_updates: bool,
}

impl Default for LayoutDocument {
    fn default() -> Self {
        let (_, w, h) = PAGE_SIZES[0];
        Self {
            excel_path: String::new(),
            page_width: w,
            page_height: h,
            elements: Vec::new(),
            static_fields: BTreeMap::new(),
            conditions: Vec::new(),
            groups: Vec::new(),
            ignore_updates: false,
        }
    }
}

impl LayoutDocument {
    /// Capture a template, normalizing screen space to page units.
    pub fn from_template(template: &Template) -> Self {
        let scale = template.scale;
        Self {
            excel_path: template
                .data_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            page_width: template.page_width,
            page_height: template.page_height,
            elements: template
                .fields
                .values()
                .map(|f| FieldRecord::from_field(f, scale))
                .collect(),
            static_fields: template.static_fields.clone(),
            conditions: template.conditions.clone(),
            groups: template
                .groups
                .values()
                .map(|g| GroupRecord::from_group(g, scale))
                .collect(),
            ignore_updates: false,
        }
    }

    /// Build a template at zoom `scale`. Static fields from the document are
    /// added to the default ones.
    pub fn to_template(&self, scale: f64) -> Template {
        let mut template = Template {
            page_width: self.page_width,
            page_height: self.page_height,
            scale,
            ..Template::default()
        };
        for record in &self.elements {
            if record.name.is_empty() {
                continue;
            }
            template
                .fields
                .insert(record.name.clone(), record.to_field(scale));
        }
        for record in &self.groups {
            if record.name.is_empty() {
                continue;
            }
            template
                .groups
                .insert(record.name.clone(), record.to_group(scale));
        }
        template.conditions = self.conditions.clone();
        template.static_fields.extend(self.static_fields.clone());
        if !self.excel_path.is_empty() {
            template.data_path = Some(PathBuf::from(&self.excel_path));
        }
        template.normalize_layers();
        template
    }

    pub fn from_json(json: &str) -> Result<Self, PdsError> {
        let doc: LayoutDocument = serde_json::from_str(json)?;
        if !(doc.page_width > 0.0 && doc.page_height > 0.0) {
            return Err(PdsError::InvalidInput(format!(
                "page size must be positive, got {}x{}",
                doc.page_width, doc.page_height
            )));
        }
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String, PdsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, PdsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), PdsError> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("saved layout to {}", path.display());
        Ok(())
    }

    /// A small layout showing every feature: a bound field, a static footer,
    /// a condition and a group.
    pub fn example() -> Self {
        let mut group = GroupRecord {
            name: "Group1".to_string(),
            x: 50.0,
            y: 200.0,
            width: 250.0,
            height: 100.0,
            ..Default::default()
        };
        for (name, y) in [("Sheet1:Phone", 0.0), ("Sheet1:Email", 30.0)] {
            group.fields.push(name.to_string());
            group.field_pos.insert(name.to_string(), (0.0, y));
            group.field_conf.insert(
                name.to_string(),
                GroupFieldConf {
                    width: 200.0,
                    height: 25.0,
                    ..Default::default()
                },
            );
        }
        Self {
            elements: vec![
                FieldRecord {
                    name: "Sheet1:Name".to_string(),
                    x: 50.0,
                    y: 50.0,
                    width: 300.0,
                    height: 40.0,
                    bold: true,
                    ..Default::default()
                },
                FieldRecord {
                    name: "Sheet1:Title".to_string(),
                    x: 50.0,
                    y: 100.0,
                    width: 300.0,
                    height: 25.0,
                    layer: 2,
                    ..Default::default()
                },
                FieldRecord {
                    name: "Footer".to_string(),
                    x: 50.0,
                    y: 780.0,
                    width: 495.0,
                    height: 20.0,
                    align: Align::Center,
                    auto_font: false,
                    font_size: 9.0,
                    layer: 3,
                    ..Default::default()
                },
            ],
            static_fields: DEFAULT_STATIC_FIELDS
                .iter()
                .map(|n| (n.to_string(), String::new()))
                .chain([("Footer".to_string(), "Confidential".to_string())])
                .collect(),
            conditions: vec![Condition::new("Sheet1:Name", "Sheet1:Title")],
            groups: vec![group],
            ..Default::default()
        }
    }
}

/// Load a layout, or the defaults when the file is missing or unreadable.
pub fn load_or_default(path: &Path) -> LayoutDocument {
    match LayoutDocument::load(path) {
        Ok(doc) => doc,
        Err(PdsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            LayoutDocument::default()
        }
        Err(e) => {
            log::warn!("failed to load layout from {}: {}", path.display(), e);
            LayoutDocument::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template_at(scale: f64) -> Template {
        LayoutDocument::example().to_template(scale)
    }

    #[test]
    fn test_save_load_round_trip_across_scales() {
        let doc = LayoutDocument::from_template(&template_at(1.7));
        let reloaded = LayoutDocument::from_template(&doc.to_template(0.6));
        assert_eq!(reloaded.elements.len(), doc.elements.len());
        for (a, b) in doc.elements.iter().zip(&reloaded.elements) {
            assert_eq!(a.name, b.name);
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
            assert!((a.width - b.width).abs() < 1e-9);
            assert!((a.font_size - b.font_size).abs() < 1e-9);
        }
        assert!((doc.groups[0].height - reloaded.groups[0].height).abs() < 1e-9);
    }

    #[test]
    fn test_screen_geometry_scales_with_zoom() {
        let t1 = template_at(1.0);
        let t2 = template_at(2.5);
        let a = t1.fields["Sheet1:Name"].rect;
        let b = t2.fields["Sheet1:Name"].rect;
        assert!((b.x - a.x * 2.5).abs() < 1e-9);
        assert!((b.width - a.width * 2.5).abs() < 1e-9);
        assert!((t2.fields["Sheet1:Name"].style.font_size - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let doc = LayoutDocument::from_json(
            r#"{"elements": [{"name": "S:A", "x": 10}], "groups": [{"name": "G", "field_pos": {"S:B": [0, 5]}}]}"#,
        )
        .unwrap();
        assert_eq!((doc.page_width, doc.page_height), (595.0, 842.0));
        let t = doc.to_template(1.0);
        let f = &t.fields["S:A"];
        assert_eq!(f.text, "S:A");
        assert_eq!((f.rect.x, f.rect.width, f.rect.height), (10.0, 100.0, 40.0));
        assert!(f.style.auto_font);
        assert_eq!(t.groups["G"].fields, vec!["S:B".to_string()]);
        assert_eq!(t.groups["G"].rect.height, 100.0);
        // default static fields are always offered
        assert!(t.static_fields.contains_key("Footer"));
    }

    #[test]
    fn test_load_or_default_on_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(load_or_default(&missing), LayoutDocument::default());

        let corrupt = dir.path().join("bad.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(load_or_default(&corrupt), LayoutDocument::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let doc = LayoutDocument::example();
        doc.save(&path).unwrap();
        assert_eq!(LayoutDocument::load(&path).unwrap(), doc);
    }

    #[test]
    fn test_group_member_order_survives_round_trip() {
        let mut group = Group::new("G", Rect::new(0.0, 0.0, 200.0, 200.0));
        for name in ["Sheet1:Zeta", "Sheet1:Alpha"] {
            group.fields.push(name.to_string());
            group.field_pos.insert(name.to_string(), (0.0, 0.0));
        }
        let record = GroupRecord::from_group(&group, 1.0);
        let json = serde_json::to_string(&record).unwrap();
        let back: GroupRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_group(1.0).fields, group.fields);
    }

    #[test]
    fn test_group_without_field_list_uses_positions() {
        let record: GroupRecord =
            serde_json::from_str(r#"{"name": "G", "field_pos": {"S:B": [0, 5], "S:A": [0, 0]}}"#)
                .unwrap();
        assert_eq!(record.members(), vec!["S:A".to_string(), "S:B".to_string()]);
    }

    #[test]
    fn test_rejects_non_positive_page() {
        assert!(matches!(
            LayoutDocument::from_json(r#"{"page_width": 0}"#),
            Err(PdsError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_conditions_serialize_as_pairs() {
        let json = LayoutDocument::example().to_json().unwrap();
        assert!(json.contains("\"Sheet1:Name\",\n      \"Sheet1:Title\""));
    }
}
