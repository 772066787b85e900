//! Group editor sub-session.
//!
//! A group's members are edited on a page of their own, the size of the
//! group, with the same canvas controller as the main template. Nothing
//! reaches the group until [`GroupEditor::commit`].

use std::collections::BTreeMap;

use super::style::{apply_style, StyleEdit};
use crate::canvas::{CanvasController, Modifiers};
use crate::error::PdsError;
use crate::font::FontContext;
use crate::model::{Condition, Field, Group, GroupFieldConf, Rect, Template, NEW_FIELD_POS};

fn field_from_conf(name: &str, conf: &GroupFieldConf, pos: (f64, f64), scale: f64, fonts: &FontContext) -> Field {
    let rect = Rect::new(pos.0, pos.1, conf.width, conf.height).scaled(scale);
    let mut field = Field::new(name, name, rect, conf.layer);
    field.style = conf.style();
    field.style.font_size *= scale;
    field.sync(fonts);
    field
}

pub struct GroupEditor {
    group: String,
    template: Template,
    canvas: CanvasController,
    /// Members in the order they joined the group.
    members: Vec<String>,
    conditions: Vec<Condition>,
    /// Conf a field gets when toggled on: its stored conf, else the style
    /// of the top-level field with the same name.
    initial: BTreeMap<String, GroupFieldConf>,
}

impl GroupEditor {
    /// Open the editor on group `name` of `template`. `available` lists every
    /// field name that may join the group.
    pub fn open(
        template: &Template,
        name: &str,
        available: Vec<String>,
        fonts: &FontContext,
    ) -> Result<Self, PdsError> {
        let group = template
            .groups
            .get(name)
            .ok_or_else(|| PdsError::InvalidInput(format!("no group '{}'", name)))?;
        let scale = template.scale;
        let initial: BTreeMap<String, GroupFieldConf> = available
            .iter()
            .chain(group.fields.iter())
            .map(|n| (n.clone(), group.conf_for(n, template.fields.get(n), scale)))
            .collect();

        let mut page = Template {
            page_width: group.rect.width / scale,
            page_height: group.rect.height / scale,
            scale,
            grid_size: template.grid_size,
            static_fields: template.static_fields.clone(),
            ..Template::default()
        };
        for member in &group.fields {
            let conf = &initial[member];
            let field = field_from_conf(member, conf, group.local_pos(member), scale, fonts);
            page.fields.insert(member.clone(), field);
        }
        page.normalize_layers();

        Ok(Self {
            group: name.to_string(),
            template: page,
            canvas: CanvasController::default(),
            members: group.fields.clone(),
            conditions: group.conditions.clone(),
            initial,
        })
    }

    pub fn group_name(&self) -> &str {
        &self.group
    }

    /// The group's page, in the editor's screen space.
    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn canvas(&self) -> &CanvasController {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut CanvasController {
        &mut self.canvas
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Every name that can be toggled, members first.
    pub fn available(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.members.iter().map(String::as_str).collect();
        names.extend(
            self.initial
                .keys()
                .map(String::as_str)
                .filter(|n| !self.members.iter().any(|m| m == n)),
        );
        names
    }

    /// Add a field to the group at the default local position, or take it
    /// out. Returns whether membership changed.
    pub fn toggle_field(&mut self, name: &str, on: bool, fonts: &FontContext) -> bool {
        let member = self.members.iter().any(|m| m == name);
        if on == member {
            return false;
        }
        if on {
            let conf = self.initial.get(name).cloned().unwrap_or_default();
            let mut field = field_from_conf(name, &conf, NEW_FIELD_POS, self.template.scale, fonts);
            field.layer = self.template.next_layer();
            self.template.fields.insert(name.to_string(), field);
            self.members.push(name.to_string());
        } else {
            self.template.fields.remove(name);
            self.members.retain(|m| m != name);
            self.canvas.retain_existing(&self.template);
            self.template.normalize_layers();
        }
        true
    }

    pub fn press(&mut self, x: f64, y: f64, mods: Modifiers) {
        self.canvas.press(&self.template, x, y, mods);
    }

    pub fn drag(&mut self, x: f64, y: f64, mods: Modifiers, fonts: &FontContext) {
        self.canvas.drag(&mut self.template, fonts, x, y, mods);
    }

    pub fn release(&mut self, x: f64, y: f64, fonts: &FontContext) -> bool {
        self.canvas.release(&mut self.template, fonts, x, y)
    }

    pub fn wheel_zoom(&mut self, x: f64, y: f64, delta: f64, fonts: &FontContext) -> bool {
        self.canvas
            .wheel_zoom(&mut self.template, fonts, x, y, delta)
    }

    pub fn zoom_by(&mut self, factor: f64, fonts: &FontContext) -> bool {
        self.canvas.zoom_by(&mut self.template, fonts, factor)
    }

    pub fn fit_to_window(&mut self, fonts: &FontContext) {
        self.canvas.fit_to_window(&mut self.template, fonts);
    }

    pub fn resize_viewport(&mut self, width: f64, height: f64, fonts: &FontContext) {
        self.canvas
            .resize_viewport(&mut self.template, fonts, width, height);
    }

    /// Apply a style edit to the editor's selection.
    pub fn edit_style(&mut self, edit: &StyleEdit, fonts: &FontContext) -> Result<bool, PdsError> {
        let names = self.canvas.selection().to_vec();
        apply_style(&mut self.template, &names, edit, fonts)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Add a group condition. Returns `Ok(false)` for a duplicate.
    pub fn add_condition(&mut self, source: &str, target: &str) -> Result<bool, PdsError> {
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            return Err(PdsError::InvalidInput(
                "a condition needs a source and a target".to_string(),
            ));
        }
        let condition = Condition::new(source, target);
        if self.conditions.contains(&condition) {
            return Ok(false);
        }
        if !self.members.iter().any(|m| m == source) || !self.members.iter().any(|m| m == target) {
            log::warn!(
                "condition '{}' -> '{}' in group '{}' references a non-member and will have no effect",
                source,
                target,
                self.group
            );
        }
        self.conditions.push(condition);
        Ok(true)
    }

    pub fn remove_condition(&mut self, index: usize) -> Option<Condition> {
        (index < self.conditions.len()).then(|| self.conditions.remove(index))
    }

    /// Write membership, positions (whole page units), confs and conditions
    /// into `group`.
    pub fn commit(&self, group: &mut Group) {
        let scale = self.template.scale;
        group.fields = self.members.clone();
        group.field_pos.clear();
        group.field_conf.clear();
        for name in &self.members {
            let Some(field) = self.template.fields.get(name) else {
                continue;
            };
            group.field_pos.insert(
                name.clone(),
                ((field.rect.x / scale).round(), (field.rect.y / scale).round()),
            );
            group
                .field_conf
                .insert(name.clone(), GroupFieldConf::from_field(field, scale));
        }
        group.conditions = self.conditions.clone();
    }
}
