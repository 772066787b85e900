use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Condition, Field, Rect};
use crate::layout::StackItem;
use crate::style::{Align, FieldStyle, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE};

/// Local position of a newly added group field, in page units.
pub const NEW_FIELD_POS: (f64, f64) = (10.0, 10.0);

/// Style and size of one field as drawn inside a group. Page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupFieldConf {
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
    pub font_family: String,
    pub bold: bool,
    pub text_color: String,
    pub bg_color: String,
    pub bg_visible: bool,
    pub align: Align,
    pub auto_font: bool,
    pub layer: u32,
}

impl Default for GroupFieldConf {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 40.0,
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            bold: false,
            text_color: "black".to_string(),
            bg_color: "white".to_string(),
            bg_visible: true,
            align: Align::Left,
            auto_font: true,
            layer: 1,
        }
    }
}

impl GroupFieldConf {
    /// Capture a screen-space field as a page-space conf.
    pub fn from_field(field: &Field, scale: f64) -> Self {
        let s = &field.style;
        Self {
            width: field.rect.width / scale,
            height: field.rect.height / scale,
            font_size: s.font_size / scale,
            font_family: s.font_family.clone(),
            bold: s.bold,
            text_color: s.text_color.clone(),
            bg_color: s.bg_color.clone(),
            bg_visible: s.bg_visible,
            align: s.align,
            auto_font: s.auto_font,
            layer: field.layer,
        }
    }

    pub fn style(&self) -> FieldStyle {
        FieldStyle {
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            bold: self.bold,
            text_color: self.text_color.clone(),
            bg_color: self.bg_color.clone(),
            bg_visible: self.bg_visible,
            align: self.align,
            auto_font: self.auto_font,
        }
    }
}

/// A rectangular container whose member fields are placed by auto-stacking.
///
/// `rect` is in screen space like every top-level field. `field_pos` and
/// `field_conf` are in page units, relative to the group's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub rect: Rect,
    /// Member field names in insertion order.
    pub fields: Vec<String>,
    pub field_pos: BTreeMap<String, (f64, f64)>,
    pub field_conf: BTreeMap<String, GroupFieldConf>,
    /// Visibility rules between members of this group.
    pub conditions: Vec<Condition>,
}

impl Group {
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
            fields: Vec::new(),
            field_pos: BTreeMap::new(),
            field_conf: BTreeMap::new(),
            conditions: Vec::new(),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Local position of a member, page units. Members without a recorded
    /// position sit at the origin.
    pub fn local_pos(&self, name: &str) -> (f64, f64) {
        self.field_pos.get(name).copied().unwrap_or((0.0, 0.0))
    }

    /// Effective conf of a member: its own conf, else the style of the
    /// top-level field with the same name, else the defaults.
    pub fn conf_for(&self, name: &str, global: Option<&Field>, scale: f64) -> GroupFieldConf {
        if let Some(conf) = self.field_conf.get(name) {
            return conf.clone();
        }
        match global {
            Some(field) => GroupFieldConf::from_field(field, scale),
            None => GroupFieldConf::default(),
        }
    }

    /// Whether a condition only references members of this group.
    pub fn condition_in_scope(&self, condition: &Condition) -> bool {
        self.has_field(&condition.source) && self.has_field(&condition.target)
    }

    /// Stacking input for the members accepted by `include`, in page units.
    pub fn stack_items(
        &self,
        confs: impl Fn(&str) -> GroupFieldConf,
        include: impl Fn(&str) -> bool,
    ) -> Vec<StackItem> {
        self.fields
            .iter()
            .filter(|name| include(name))
            .map(|name| {
                let (x, y) = self.local_pos(name);
                let conf = confs(name);
                StackItem {
                    name: name.clone(),
                    x,
                    y,
                    width: conf.width,
                    height: conf.height,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conf_fallback_order() {
        let mut g = Group::new("G", Rect::new(0.0, 0.0, 200.0, 200.0));
        g.fields.push("S:A".into());

        assert_eq!(g.conf_for("S:A", None, 1.0), GroupFieldConf::default());

        let mut global = Field::new("S:A", "", Rect::new(0.0, 0.0, 60.0, 30.0), 3);
        global.style.bold = true;
        global.style.font_size = 20.0;
        let conf = g.conf_for("S:A", Some(&global), 2.0);
        assert_eq!((conf.width, conf.height, conf.font_size), (30.0, 15.0, 10.0));
        assert!(conf.bold);
        assert_eq!(conf.layer, 3);

        let own = GroupFieldConf {
            width: 77.0,
            ..Default::default()
        };
        g.field_conf.insert("S:A".into(), own.clone());
        assert_eq!(g.conf_for("S:A", Some(&global), 2.0), own);
    }

    #[test]
    fn test_conf_deserializes_with_defaults() {
        let conf: GroupFieldConf = serde_json::from_str(r#"{"width": 50, "bold": true}"#).unwrap();
        assert_eq!(conf.width, 50.0);
        assert_eq!(conf.height, 40.0);
        assert!(conf.bold);
        assert!(conf.auto_font);
        assert_eq!(conf.layer, 1);
    }

    #[test]
    fn test_condition_scope() {
        let mut g = Group::new("G", Rect::default());
        g.fields = vec!["A".into(), "B".into()];
        assert!(g.condition_in_scope(&Condition::new("A", "B")));
        assert!(!g.condition_in_scope(&Condition::new("A", "C")));
    }

    #[test]
    fn test_stack_items_filters_and_uses_local_pos() {
        let mut g = Group::new("G", Rect::default());
        g.fields = vec!["A".into(), "B".into()];
        g.field_pos.insert("A".into(), (0.0, 5.0));
        g.field_pos.insert("B".into(), (50.0, 0.0));
        let items = g.stack_items(|_| GroupFieldConf::default(), |name| name != "A");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "B");
        assert_eq!((items[0].x, items[0].y), (50.0, 0.0));
        assert_eq!(items[0].height, 40.0);
    }
}
