//! # Canvas Controller
//!
//! Turns pointer input into edits of a [`Template`]: hit-testing, selection,
//! rubber-band marquee, dragging with alignment guides, resizing, zoom and
//! pan. The controller keeps only gesture state; all geometry lives in the
//! template, in screen space.
//!
//! Pointer positions are given in viewport coordinates (relative to the
//! visible area). [`Viewport::to_canvas`] maps them to screen space, where
//! the page's top-left corner is the origin.
//!
//! The controller never records history. [`CanvasController::release`]
//! reports whether the gesture changed the template, and the owner decides
//! what to do with that.

pub mod guides;

pub use guides::{align, Alignment, GuideLine, GUIDE_TOLERANCE};

use crate::font::FontContext;
use crate::model::{snap_size, Rect, Template};

/// Side of the square resize handle in a field's bottom-right corner.
pub const HANDLE_SIZE: f64 = 8.0;
/// Side of a group's resize handle.
pub const GROUP_HANDLE_SIZE: f64 = 12.0;
/// Upper zoom bound.
pub const MAX_SCALE: f64 = 4.0;
pub const ZOOM_IN_FACTOR: f64 = 1.1;
pub const ZOOM_OUT_FACTOR: f64 = 0.9;

/// Something on the canvas that can be hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Field(String),
    Group(String),
}

/// Which part of a target was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Body,
    Handle,
}

/// Keyboard modifiers held during a pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
    };
}

fn handle_rect(rect: &Rect, size: f64) -> Rect {
    Rect::new(rect.right() - size, rect.bottom() - size, size, size)
}

/// Find the topmost thing under a screen-space point.
///
/// Group handles stay reachable above everything; group bodies sit beneath
/// all fields. Fields are searched from the highest layer down.
pub fn hit_test(template: &Template, x: f64, y: f64) -> Option<(Target, Part)> {
    for group in template.groups.values().rev() {
        if handle_rect(&group.rect, GROUP_HANDLE_SIZE).contains_point(x, y) {
            return Some((Target::Group(group.name.clone()), Part::Handle));
        }
    }
    for field in template.stacking_order().into_iter().rev() {
        if handle_rect(&field.rect, HANDLE_SIZE).contains_point(x, y) {
            return Some((Target::Field(field.name.clone()), Part::Handle));
        }
        if field.rect.contains_point(x, y) {
            return Some((Target::Field(field.name.clone()), Part::Body));
        }
    }
    for group in template.groups.values().rev() {
        if group.rect.contains_point(x, y) {
            return Some((Target::Group(group.name.clone()), Part::Body));
        }
    }
    None
}

/// The visible window onto the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    /// Screen-space position of the viewport's top-left corner. Negative
    /// when a page smaller than the viewport is centered in it.
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
            min_scale: 1.0,
            max_scale: MAX_SCALE,
        }
    }

    pub fn to_canvas(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.scroll_x, y + self.scroll_y)
    }

    pub fn has_size(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// The smallest zoom is the one that fits the whole page, but never
    /// above 1.
    pub fn update_min_scale(&mut self, page_width: f64, page_height: f64) {
        if !self.has_size() || page_width <= 0.0 || page_height <= 0.0 {
            return;
        }
        self.min_scale = 1.0_f64
            .min(self.width / page_width)
            .min(self.height / page_height);
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.max(self.min_scale).min(self.max_scale)
    }

    /// Zoom that fits a page of the given size, within bounds.
    pub fn fit_scale(&self, page_width: f64, page_height: f64) -> Option<f64> {
        if !self.has_size() || page_width <= 0.0 || page_height <= 0.0 {
            return None;
        }
        let scale = (self.width / page_width).min(self.height / page_height);
        Some(self.clamp_scale(scale))
    }

    /// Keep the scroll offset inside the page extent. An axis where the page
    /// is smaller than the viewport is centered instead.
    pub fn clamp_scroll(&mut self, extent_width: f64, extent_height: f64) {
        self.scroll_x = clamp_axis(self.scroll_x, extent_width, self.width);
        self.scroll_y = clamp_axis(self.scroll_y, extent_height, self.height);
    }

    pub fn center(&mut self, extent_width: f64, extent_height: f64) {
        self.scroll_x = (extent_width - self.width) / 2.0;
        self.scroll_y = (extent_height - self.height) / 2.0;
        self.clamp_scroll(extent_width, extent_height);
    }
}

fn clamp_axis(scroll: f64, extent: f64, view: f64) -> f64 {
    if extent <= view {
        (extent - view) / 2.0
    } else {
        scroll.max(0.0).min(extent - view)
    }
}

#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    Idle,
    MoveFields {
        anchor: String,
        last: (f64, f64),
        before: Vec<(String, Rect)>,
    },
    MoveGroup {
        name: String,
        carried: Vec<String>,
        last: (f64, f64),
        before: Rect,
    },
    ResizeField {
        name: String,
        press: (f64, f64),
        start: (f64, f64),
        before: Rect,
    },
    ResizeGroup {
        name: String,
        press: (f64, f64),
        start: (f64, f64),
        before: Rect,
    },
    Marquee {
        start: (f64, f64),
        current: (f64, f64),
    },
    Pan {
        last: (f64, f64),
    },
}

/// Pointer-gesture state for one canvas.
#[derive(Debug, Clone, Default)]
pub struct CanvasController {
    pub viewport: Viewport,
    selection: Vec<String>,
    gesture: Gesture,
    guides: Vec<GuideLine>,
}

impl CanvasController {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            ..Default::default()
        }
    }

    /// Selected field names, in selection order.
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// The most recently selected field; style edits act on it.
    pub fn primary(&self) -> Option<&str> {
        self.selection.last().map(String::as_str)
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selection.iter().any(|s| s == name)
    }

    /// Select `name`, replacing the selection unless `additive`. `None`
    /// with `additive == false` clears it.
    pub fn select(&mut self, name: Option<&str>, additive: bool) {
        self.guides.clear();
        if !additive {
            self.selection.clear();
        }
        if let Some(name) = name {
            if !self.is_selected(name) {
                self.selection.push(name.to_string());
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.select(None, false);
    }

    /// Drop selected names that no longer exist in the template.
    pub fn retain_existing(&mut self, template: &Template) {
        self.selection
            .retain(|name| template.fields.contains_key(name));
    }

    /// Guide lines of the gesture in progress.
    pub fn guides(&self) -> &[GuideLine] {
        &self.guides
    }

    /// The rubber-band rectangle while one is being drawn.
    pub fn marquee(&self) -> Option<Rect> {
        match self.gesture {
            Gesture::Marquee { start, current } => {
                Some(Rect::from_corners(start.0, start.1, current.0, current.1))
            }
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    /// Primary button press.
    pub fn press(&mut self, template: &Template, x: f64, y: f64, mods: Modifiers) {
        let (cx, cy) = self.viewport.to_canvas(x, y);
        self.guides.clear();
        self.gesture = match hit_test(template, cx, cy) {
            Some((Target::Field(name), Part::Body)) => {
                let additive = mods.shift || mods.ctrl || self.is_selected(&name);
                self.select(Some(&name), additive);
                let before = self
                    .selection
                    .iter()
                    .filter_map(|n| template.fields.get(n).map(|f| (n.clone(), f.rect)))
                    .collect();
                Gesture::MoveFields {
                    anchor: name,
                    last: (cx, cy),
                    before,
                }
            }
            Some((Target::Field(name), Part::Handle)) => {
                self.select(Some(&name), false);
                match template.fields.get(&name) {
                    Some(field) => Gesture::ResizeField {
                        press: (cx, cy),
                        start: (field.rect.width, field.rect.height),
                        before: field.rect,
                        name,
                    },
                    None => Gesture::Idle,
                }
            }
            Some((Target::Group(name), part)) => match template.groups.get(&name) {
                Some(group) if part == Part::Body => Gesture::MoveGroup {
                    carried: template.fields_inside(group),
                    last: (cx, cy),
                    before: group.rect,
                    name,
                },
                Some(group) => Gesture::ResizeGroup {
                    press: (cx, cy),
                    start: (group.rect.width, group.rect.height),
                    before: group.rect,
                    name,
                },
                None => Gesture::Idle,
            },
            None => {
                self.clear_selection();
                Gesture::Marquee {
                    start: (cx, cy),
                    current: (cx, cy),
                }
            }
        };
    }

    /// Middle button press: start panning.
    pub fn start_pan(&mut self, x: f64, y: f64) {
        self.gesture = Gesture::Pan { last: (x, y) };
    }

    /// Pointer motion with a button held.
    pub fn drag(&mut self, template: &mut Template, fonts: &FontContext, x: f64, y: f64, mods: Modifiers) {
        let (cx, cy) = self.viewport.to_canvas(x, y);
        let step = template.snap_step();
        let mut gesture = std::mem::take(&mut self.gesture);
        match &mut gesture {
            Gesture::Idle => {}
            Gesture::MoveFields { anchor, last, .. } => {
                let (dx, dy) = (cx - last.0, cy - last.1);
                self.translate_selection(template, dx, dy);
                *last = (cx, cy);

                let others = self.others(template, &self.selection, None);
                if let Some(field) = template.fields.get(anchor.as_str()) {
                    let alignment = align(&field.rect, &others, false);
                    if alignment.snapped() {
                        self.translate_selection(template, alignment.dx, alignment.dy);
                        last.0 += alignment.dx;
                        last.1 += alignment.dy;
                    }
                    self.guides = alignment.lines();
                }
            }
            Gesture::MoveGroup {
                name,
                carried,
                last,
                ..
            } => {
                let (dx, dy) = (cx - last.0, cy - last.1);
                translate_group(template, name, carried, dx, dy);
                *last = (cx, cy);

                let others = self.others(template, carried, Some(name.as_str()));
                if let Some(group) = template.groups.get(name.as_str()) {
                    let alignment = align(&group.rect, &others, false);
                    if alignment.snapped() {
                        translate_group(template, name, carried, alignment.dx, alignment.dy);
                        last.0 += alignment.dx;
                        last.1 += alignment.dy;
                    }
                    self.guides = alignment.lines();
                }
            }
            Gesture::ResizeField {
                name, press, start, ..
            } => {
                let others = self.others(template, std::slice::from_ref(name), None);
                if let Some(field) = template.fields.get_mut(name.as_str()) {
                    let (dx, dy) = (cx - press.0, cy - press.1);
                    field.resize_from(start.0, start.1, dx, dy, mods.ctrl, step);
                    let alignment = align(&field.rect, &others, true);
                    if alignment.snapped() {
                        field.rect.width += alignment.dx;
                        field.rect.height += alignment.dy;
                        start.0 += alignment.dx;
                        start.1 += alignment.dy;
                    }
                    field.sync(fonts);
                    self.guides = alignment.lines();
                }
            }
            Gesture::ResizeGroup {
                name, press, start, ..
            } => {
                let others = self.others(template, &[], Some(name.as_str()));
                if let Some(group) = template.groups.get_mut(name.as_str()) {
                    group.rect.width = (start.0 + cx - press.0).max(step);
                    group.rect.height = (start.1 + cy - press.1).max(step);
                    let alignment = align(&group.rect, &others, true);
                    if alignment.snapped() {
                        group.rect.width += alignment.dx;
                        group.rect.height += alignment.dy;
                        start.0 += alignment.dx;
                        start.1 += alignment.dy;
                    }
                    self.guides = alignment.lines();
                }
            }
            Gesture::Marquee { current, .. } => {
                *current = (cx, cy);
            }
            Gesture::Pan { last } => {
                self.viewport.scroll_x -= x - last.0;
                self.viewport.scroll_y -= y - last.1;
                *last = (x, y);
                self.viewport
                    .clamp_scroll(template.page_rect().width, template.page_rect().height);
            }
        }
        self.gesture = gesture;
    }

    /// Button release. Snaps what was dragged to the grid and returns whether
    /// the template changed.
    pub fn release(&mut self, template: &mut Template, fonts: &FontContext, x: f64, y: f64) -> bool {
        let (cx, cy) = self.viewport.to_canvas(x, y);
        let step = template.snap_step();
        self.guides.clear();
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle | Gesture::Pan { .. } => false,
            Gesture::MoveFields { before, .. } => {
                for name in &self.selection {
                    if let Some(field) = template.fields.get_mut(name) {
                        field.snap_to_grid(step);
                        field.sync(fonts);
                    }
                }
                before
                    .iter()
                    .any(|(name, rect)| template.fields.get(name).map(|f| f.rect) != Some(*rect))
            }
            Gesture::MoveGroup {
                name,
                carried,
                before,
                ..
            } => {
                let Some(group) = template.groups.get_mut(&name) else {
                    return false;
                };
                let snapped = group.rect.snapped(step);
                let (dx, dy) = (snapped.x - group.rect.x, snapped.y - group.rect.y);
                group.rect = snapped;
                for field in &carried {
                    if let Some(field) = template.fields.get_mut(field) {
                        field.translate(dx, dy);
                    }
                }
                template.groups.get(&name).map(|g| g.rect) != Some(before)
            }
            Gesture::ResizeField { name, before, .. } => {
                let Some(field) = template.fields.get_mut(&name) else {
                    return false;
                };
                field.snap_size(step);
                field.sync(fonts);
                field.rect != before
            }
            Gesture::ResizeGroup { name, before, .. } => {
                let Some(group) = template.groups.get_mut(&name) else {
                    return false;
                };
                group.rect.width = snap_size(group.rect.width, step);
                group.rect.height = snap_size(group.rect.height, step);
                group.rect != before
            }
            Gesture::Marquee { start, .. } => {
                let area = Rect::from_corners(start.0, start.1, cx, cy);
                self.clear_selection();
                for field in template.fields.values() {
                    if area.contains(&field.rect) {
                        self.selection.push(field.name.clone());
                    }
                }
                false
            }
        }
    }

    /// Ctrl + wheel: zoom one step in or out, keeping the point under the
    /// cursor fixed. Returns whether the zoom changed.
    pub fn wheel_zoom(&mut self, template: &mut Template, fonts: &FontContext, x: f64, y: f64, delta: f64) -> bool {
        let factor = if delta > 0.0 {
            ZOOM_IN_FACTOR
        } else {
            ZOOM_OUT_FACTOR
        };
        self.zoom_at(template, fonts, x, y, factor)
    }

    /// Zoom by `factor` around a viewport point.
    pub fn zoom_at(&mut self, template: &mut Template, fonts: &FontContext, x: f64, y: f64, factor: f64) -> bool {
        let old = template.scale;
        let new = self.viewport.clamp_scale(old * factor);
        if (new - old).abs() < f64::EPSILON {
            return false;
        }
        let (cx, cy) = self.viewport.to_canvas(x, y);
        apply_scale(template, fonts, new);
        let f = new / old;
        self.viewport.scroll_x = cx * f - x;
        self.viewport.scroll_y = cy * f - y;
        let page = template.page_rect();
        self.viewport.clamp_scroll(page.width, page.height);
        true
    }

    /// Zoom around the viewport's center.
    pub fn zoom_by(&mut self, template: &mut Template, fonts: &FontContext, factor: f64) -> bool {
        let (x, y) = (self.viewport.width / 2.0, self.viewport.height / 2.0);
        self.zoom_at(template, fonts, x, y, factor)
    }

    /// Zoom so the whole page fits the viewport, then center it.
    pub fn fit_to_window(&mut self, template: &mut Template, fonts: &FontContext) {
        let Some(scale) = self
            .viewport
            .fit_scale(template.page_width, template.page_height)
        else {
            return;
        };
        apply_scale(template, fonts, scale);
        let page = template.page_rect();
        self.viewport.center(page.width, page.height);
    }

    /// The viewport was resized. Recomputes the minimum zoom and fits the
    /// page when the current zoom fell below it.
    pub fn resize_viewport(&mut self, template: &mut Template, fonts: &FontContext, width: f64, height: f64) {
        self.viewport.width = width;
        self.viewport.height = height;
        if !self.viewport.has_size() {
            return;
        }
        self.viewport
            .update_min_scale(template.page_width, template.page_height);
        if template.scale < self.viewport.min_scale {
            self.fit_to_window(template, fonts);
        } else {
            let page = template.page_rect();
            self.viewport.center(page.width, page.height);
        }
    }

    fn translate_selection(&self, template: &mut Template, dx: f64, dy: f64) {
        for name in &self.selection {
            if let Some(field) = template.fields.get_mut(name) {
                field.translate(dx, dy);
            }
        }
    }

    /// Rectangles the moving item may align to: every field except
    /// `moving_fields` and every group except `moving_group`.
    fn others(&self, template: &Template, moving_fields: &[String], moving_group: Option<&str>) -> Vec<Rect> {
        template
            .fields
            .values()
            .filter(|f| !moving_fields.contains(&f.name))
            .map(|f| f.rect)
            .chain(
                template
                    .groups
                    .values()
                    .filter(|g| Some(g.name.as_str()) != moving_group)
                    .map(|g| g.rect),
            )
            .collect()
    }
}

fn translate_group(template: &mut Template, name: &str, carried: &[String], dx: f64, dy: f64) {
    if let Some(group) = template.groups.get_mut(name) {
        group.rect.x += dx;
        group.rect.y += dy;
    }
    for field in carried {
        if let Some(field) = template.fields.get_mut(field) {
            field.translate(dx, dy);
        }
    }
}

/// Change the zoom and bring every field's derived state up to date.
pub fn apply_scale(template: &mut Template, fonts: &FontContext, scale: f64) {
    template.set_scale(scale);
    for field in template.fields.values_mut() {
        field.sync(fonts);
    }
}
