//! # Editing Session
//!
//! The document being edited: one [`Template`] plus everything that acts on
//! it. That covers undo history, the bound data source, the image loader
//! and the canvas controller. Every committed edit pushes a history snapshot;
//! gestures in progress and zoom changes do not.
//!
//! A session is driven from a single thread. Batch generation takes a copy
//! of the template when it starts (see [`Session::start_batch`]), so later
//! edits never reach a running batch.

pub mod group_editor;
mod style;

pub use group_editor::GroupEditor;
pub use style::{apply_style, StyleEdit};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::batch::{self, BatchHandle};
use crate::canvas::{hit_test, CanvasController, Modifiers, Part, Target, Viewport};
use crate::config::{self, LayoutDocument};
use crate::data::{self, DataSource};
use crate::error::PdsError;
use crate::font::FontContext;
use crate::history::{History, Snapshot};
use crate::image_loader::ImageLoader;
use crate::layout::{auto_stack, Placement};
use crate::model::{
    parse_page_size, snap, snap_size, Condition, DisplayImage, Field, FieldBinding, FieldDisplay,
    Group, Rect, Template, MAX_LAYER,
};
use crate::render::field_value;
use crate::style::DEFAULT_FONT_SIZE;

/// Size of a new field, page units.
pub const NEW_FIELD_SIZE: (f64, f64) = (100.0, 40.0);
/// Size of a new group, page units.
pub const NEW_GROUP_SIZE: (f64, f64) = (100.0, 100.0);

/// Show `value` in a field: an image when it names one that loads, text
/// otherwise.
pub(crate) fn show_value(field: &mut Field, value: &str, images: &ImageLoader, fonts: &FontContext) {
    let content = images.resolve(value);
    field.display = FieldDisplay::Text;
    if content.is_image() {
        match images.load_for_display(&content) {
            Ok(image) => {
                field.display = FieldDisplay::Image(DisplayImage::new(
                    image,
                    field.rect.width,
                    field.rect.height,
                ));
            }
            Err(e) => log::warn!("{}; showing '{}' as text", e, value),
        }
    }
    field.text = value.to_string();
    field.sync(fonts);
}

/// Smallest `{prefix}{n}`, n >= 1, for which `taken` is false.
fn next_name(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    (1..)
        .map(|i| format!("{}{}", prefix, i))
        .find(|name| !taken(name))
        .unwrap_or_else(|| prefix.to_string())
}

pub struct Session {
    template: Template,
    canvas: CanvasController,
    history: History,
    fonts: FontContext,
    images: ImageLoader,
    data: Option<DataSource>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ImageLoader::new(None))
    }
}

impl Session {
    /// An empty A4 session. `images` resolves and loads field images; its
    /// base directory follows the data source once one is loaded.
    pub fn new(images: ImageLoader) -> Self {
        let template = Template::default();
        let mut history = History::default();
        history.reset(Snapshot::capture(&template));
        Self {
            template,
            canvas: CanvasController::default(),
            history,
            fonts: FontContext::new(),
            images,
            data: None,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn canvas(&self) -> &CanvasController {
        &self.canvas
    }

    pub fn data(&self) -> Option<&DataSource> {
        self.data.as_ref()
    }

    pub fn fonts(&self) -> &FontContext {
        &self.fonts
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Record the current state as a new history entry.
    pub fn push_history(&mut self) {
        self.history.push(Snapshot::capture(&self.template));
    }

    // ── Data ──────────────────────────────────────────────────────

    /// Load and bind a data file. On failure the session keeps its current
    /// data.
    pub fn load_data(&mut self, path: &Path) -> Result<(), PdsError> {
        let data = DataSource::load(path)?;
        self.set_data(data);
        Ok(())
    }

    /// Bind an already loaded data source.
    pub fn set_data(&mut self, data: DataSource) {
        self.images.set_base_dir(data.base_dir());
        self.template.data_path = data.path.clone();
        self.data = Some(data);
    }

    /// Names of the spreadsheet columns that can become fields.
    pub fn column_fields(&self) -> Vec<String> {
        self.data
            .as_ref()
            .map(DataSource::column_fields)
            .unwrap_or_default()
    }

    /// Every name a field can have: columns, then static fields.
    pub fn available_fields(&self) -> Vec<String> {
        let mut names = self.column_fields();
        names.extend(self.template.static_fields.keys().cloned());
        names
    }

    /// List label of a field: `name: value` when it has a value.
    pub fn display_name(&self, name: &str) -> String {
        let value = self
            .template
            .static_fields
            .get(name)
            .filter(|v| !v.is_empty())
            .or_else(|| {
                self.template
                    .fields
                    .get(name)
                    .map(|f| &f.text)
                    .filter(|t| !t.is_empty() && t.as_str() != name)
            });
        match value {
            Some(value) => format!("{}: {}", name, value),
            None => name.to_string(),
        }
    }

    // ── Fields ────────────────────────────────────────────────────

    fn new_field(&self, name: &str, value: &str) -> Field {
        let s = self.template.scale;
        let (w, h) = NEW_FIELD_SIZE;
        let rect = Rect::new(
            (self.template.page_width - w) / 2.0,
            (self.template.page_height - h) / 2.0,
            w,
            h,
        )
        .scaled(s);
        let mut field = Field::new(name, value, rect, self.template.next_layer());
        field.style.font_size = DEFAULT_FONT_SIZE * s;
        show_value(&mut field, value, &self.images, &self.fonts);
        field
    }

    fn insert_field(&mut self, name: &str, value: &str) {
        if self.template.fields.contains_key(name) {
            return;
        }
        let field = self.new_field(name, value);
        self.template.fields.insert(name.to_string(), field);
        self.template.normalize_layers();
    }

    /// Put a spreadsheet column on the page, or take it off.
    pub fn toggle_column(&mut self, name: &str, on: bool) -> Result<(), PdsError> {
        if !matches!(FieldBinding::from_name(name), FieldBinding::Column { .. }) {
            return Err(PdsError::InvalidInput(format!(
                "'{}' is not a sheet:column name",
                name
            )));
        }
        if on {
            self.insert_field(name, name);
        } else {
            self.remove_field_inner(name);
        }
        self.push_history();
        Ok(())
    }

    /// Add a new static field `StaticN` with empty text. It is not placed on
    /// the page until toggled on.
    pub fn add_static_field(&mut self) -> String {
        let statics = &self.template.static_fields;
        let name = next_name("Static", |n| statics.contains_key(n));
        self.template.static_fields.insert(name.clone(), String::new());
        name
    }

    /// Change a static field's text, updating its live field if placed.
    pub fn set_static_value(&mut self, name: &str, value: &str) -> Result<(), PdsError> {
        let Some(slot) = self.template.static_fields.get_mut(name) else {
            return Err(PdsError::InvalidInput(format!("no static field '{}'", name)));
        };
        *slot = value.to_string();
        if let Some(field) = self.template.fields.get_mut(name) {
            show_value(field, value, &self.images, &self.fonts);
            self.push_history();
        }
        Ok(())
    }

    /// Place a static field on the page showing its text, or take it off.
    pub fn toggle_static(&mut self, name: &str, on: bool) -> Result<(), PdsError> {
        let Some(value) = self.template.static_fields.get(name).cloned() else {
            return Err(PdsError::InvalidInput(format!("no static field '{}'", name)));
        };
        if on {
            match self.template.fields.get_mut(name) {
                Some(field) => show_value(field, &value, &self.images, &self.fonts),
                None => self.insert_field(name, &value),
            }
        } else {
            self.remove_field_inner(name);
        }
        self.push_history();
        Ok(())
    }

    /// Forget a static field entirely.
    pub fn remove_static_field(&mut self, name: &str) -> bool {
        if self.template.static_fields.remove(name).is_none() {
            return false;
        }
        self.remove_field_inner(name);
        self.push_history();
        true
    }

    fn remove_field_inner(&mut self, name: &str) -> bool {
        let removed = self.template.fields.remove(name).is_some();
        if removed {
            self.canvas.retain_existing(&self.template);
            self.template.normalize_layers();
        }
        removed
    }

    pub fn remove_field(&mut self, name: &str) -> bool {
        let removed = self.remove_field_inner(name);
        if removed {
            self.push_history();
        }
        removed
    }

    /// Remove every selected field.
    pub fn delete_selection(&mut self) -> usize {
        let names = self.canvas.selection().to_vec();
        let removed = names
            .iter()
            .filter(|name| self.template.fields.remove(name.as_str()).is_some())
            .count();
        self.canvas.clear_selection();
        if removed > 0 {
            self.template.normalize_layers();
            self.push_history();
        }
        removed
    }

    // ── Style and layers ──────────────────────────────────────────

    /// Apply a style edit to the selection.
    pub fn edit_style(&mut self, edit: StyleEdit) -> Result<bool, PdsError> {
        let names = self.canvas.selection().to_vec();
        let changed = apply_style(&mut self.template, &names, &edit, &self.fonts)?;
        if changed {
            self.push_history();
        }
        Ok(changed)
    }

    /// Move a field one layer up, stopping at `MAX_LAYER`.
    pub fn raise_layer(&mut self, name: &str) -> bool {
        let Some(field) = self.template.fields.get_mut(name) else {
            return false;
        };
        if field.layer >= MAX_LAYER {
            return false;
        }
        field.layer += 1;
        self.push_history();
        true
    }

    /// Move a field one layer down. Layer 1 is the bottom.
    pub fn lower_layer(&mut self, name: &str) -> bool {
        let Some(field) = self.template.fields.get_mut(name) else {
            return false;
        };
        if field.layer <= 1 {
            return false;
        }
        field.layer -= 1;
        self.push_history();
        true
    }

    pub fn center_horizontally(&mut self) -> bool {
        let page_w = self.template.page_rect().width;
        self.for_selection(|f| f.rect.x = (page_w - f.rect.width) / 2.0)
    }

    pub fn center_vertically(&mut self) -> bool {
        let page_h = self.template.page_rect().height;
        self.for_selection(|f| f.rect.y = (page_h - f.rect.height) / 2.0)
    }

    fn for_selection(&mut self, mut edit: impl FnMut(&mut Field)) -> bool {
        let mut changed = false;
        for name in self.canvas.selection() {
            if let Some(field) = self.template.fields.get_mut(name) {
                edit(field);
                changed = true;
            }
        }
        if changed {
            self.push_history();
        }
        changed
    }

    // ── Groups ────────────────────────────────────────────────────

    /// Add an empty group `GroupN` centred on the page.
    pub fn add_group(&mut self) -> String {
        let groups = &self.template.groups;
        let name = next_name("Group", |n| groups.contains_key(n));
        let (w, h) = NEW_GROUP_SIZE;
        let rect = Rect::new(
            (self.template.page_width - w) / 2.0,
            (self.template.page_height - h) / 2.0,
            w,
            h,
        )
        .scaled(self.template.scale);
        self.template
            .groups
            .insert(name.clone(), Group::new(name.clone(), rect));
        self.push_history();
        name
    }

    pub fn remove_group(&mut self, name: &str) -> bool {
        if self.template.groups.remove(name).is_none() {
            return false;
        }
        self.push_history();
        true
    }

    /// Group under a viewport point, e.g. for a double click.
    pub fn group_at(&self, x: f64, y: f64) -> Option<String> {
        let (cx, cy) = self.canvas.viewport.to_canvas(x, y);
        match hit_test(&self.template, cx, cy) {
            Some((Target::Group(name), Part::Body | Part::Handle)) => Some(name),
            _ => None,
        }
    }

    /// Auto-stacked placement of every member of a group, in group-local
    /// page units. Values are not consulted: this is the editor preview.
    pub fn group_preview(&self, name: &str) -> Vec<Placement> {
        let Some(group) = self.template.groups.get(name) else {
            return Vec::new();
        };
        let scale = self.template.scale;
        let conf = |n: &str| group.conf_for(n, self.template.fields.get(n), scale);
        let items = group.stack_items(&conf, |_| true);
        auto_stack(&items, group.rect.height / scale)
    }

    pub fn open_group_editor(&self, name: &str) -> Result<GroupEditor, PdsError> {
        GroupEditor::open(&self.template, name, self.available_fields(), &self.fonts)
    }

    /// Write the editor's state back into its group.
    pub fn close_group_editor(&mut self, editor: GroupEditor) -> Result<(), PdsError> {
        let Some(group) = self.template.groups.get_mut(editor.group_name()) else {
            return Err(PdsError::InvalidInput(format!(
                "group '{}' no longer exists",
                editor.group_name()
            )));
        };
        editor.commit(group);
        self.push_history();
        Ok(())
    }

    // ── Conditions ────────────────────────────────────────────────

    pub fn conditions(&self) -> &[Condition] {
        &self.template.conditions
    }

    /// Add a global condition: hide `target` when `source` is blank.
    ///
    /// Returns `Ok(false)` for a duplicate. A condition touching a grouped
    /// field is kept but never takes effect.
    pub fn add_condition(&mut self, source: &str, target: &str) -> Result<bool, PdsError> {
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            return Err(PdsError::InvalidInput(
                "a condition needs a source and a target".to_string(),
            ));
        }
        let condition = Condition::new(source, target);
        if self.template.conditions.contains(&condition) {
            return Ok(false);
        }
        let grouped = self.template.group_field_names();
        if grouped.contains(source) || grouped.contains(target) {
            log::warn!(
                "condition '{}' -> '{}' references a grouped field and will have no effect",
                source,
                target
            );
        }
        self.template.conditions.push(condition);
        Ok(true)
    }

    pub fn remove_condition(&mut self, index: usize) -> Option<Condition> {
        (index < self.template.conditions.len()).then(|| self.template.conditions.remove(index))
    }

    // ── Page ──────────────────────────────────────────────────────

    /// Change the page size (`"A4"`, `"B5"` or `"WxH"`). Fields and groups
    /// stretch with the page, font sizes with its height, and everything is
    /// snapped to the grid afterwards.
    pub fn set_page_size(&mut self, value: &str) -> Result<(), PdsError> {
        let (width, height) = parse_page_size(value)?;
        let fw = width / self.template.page_width;
        let fh = height / self.template.page_height;
        self.template.page_width = width;
        self.template.page_height = height;
        let step = self.template.snap_step();
        let stretch = |r: Rect| Rect {
            x: snap(r.x * fw, step),
            y: snap(r.y * fh, step),
            width: snap_size(r.width * fw, step),
            height: snap_size(r.height * fh, step),
        };
        for field in self.template.fields.values_mut() {
            field.rect = stretch(field.rect);
            field.style.font_size *= fh;
            field.sync(&self.fonts);
        }
        for group in self.template.groups.values_mut() {
            group.rect = stretch(group.rect);
        }
        let (vw, vh) = (self.canvas.viewport.width, self.canvas.viewport.height);
        self.canvas
            .resize_viewport(&mut self.template, &self.fonts, vw, vh);
        self.push_history();
        Ok(())
    }

    // ── Preview ───────────────────────────────────────────────────

    /// Show the values of a 1-based data row in every top-level field.
    /// Returns the 0-based row index.
    pub fn preview_row(&mut self, row: &str) -> Result<usize, PdsError> {
        let source = self
            .data
            .as_ref()
            .ok_or_else(|| PdsError::InvalidInput("no data source loaded".to_string()))?;
        let row = data::parse_row_number(row, source.row_count())?;
        let values: Vec<(String, String)> = self
            .template
            .fields
            .keys()
            .map(|name| (name.clone(), field_value(&self.template, source, row, name)))
            .collect();
        for (name, value) in values {
            if let Some(field) = self.template.fields.get_mut(&name) {
                show_value(field, &value, &self.images, &self.fonts);
            }
        }
        Ok(row)
    }

    // ── Pointer input ─────────────────────────────────────────────

    pub fn press(&mut self, x: f64, y: f64, mods: Modifiers) {
        self.canvas.press(&self.template, x, y, mods);
    }

    pub fn drag(&mut self, x: f64, y: f64, mods: Modifiers) {
        self.canvas
            .drag(&mut self.template, &self.fonts, x, y, mods);
    }

    /// Finish a gesture; a change to the template is recorded in history.
    pub fn release(&mut self, x: f64, y: f64) -> bool {
        let changed = self.canvas.release(&mut self.template, &self.fonts, x, y);
        if changed {
            self.push_history();
        }
        changed
    }

    pub fn select(&mut self, name: Option<&str>, additive: bool) {
        self.canvas.select(name, additive);
    }

    pub fn start_pan(&mut self, x: f64, y: f64) {
        self.canvas.start_pan(x, y);
    }

    pub fn wheel_zoom(&mut self, x: f64, y: f64, delta: f64) -> bool {
        self.canvas
            .wheel_zoom(&mut self.template, &self.fonts, x, y, delta)
    }

    pub fn zoom_by(&mut self, factor: f64) -> bool {
        self.canvas.zoom_by(&mut self.template, &self.fonts, factor)
    }

    pub fn fit_to_window(&mut self) {
        self.canvas.fit_to_window(&mut self.template, &self.fonts);
    }

    pub fn resize_viewport(&mut self, width: f64, height: f64) {
        self.canvas
            .resize_viewport(&mut self.template, &self.fonts, width, height);
    }

    pub fn viewport(&self) -> &Viewport {
        &self.canvas.viewport
    }

    // ── History ───────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo().cloned() else {
            return false;
        };
        self.restore(&snapshot);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo().cloned() else {
            return false;
        };
        self.restore(&snapshot);
        true
    }

    /// Make the template match a snapshot exactly: drop what it lacks,
    /// create what is missing and overwrite everything else. Restoring the
    /// same snapshot twice changes nothing.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        let scale = self.template.scale;
        let keep: BTreeSet<&str> = snapshot.fields.iter().map(|r| r.name.as_str()).collect();
        self.template
            .fields
            .retain(|name, _| keep.contains(name.as_str()));

        for record in &snapshot.fields {
            let restored = record.to_field(scale);
            match self.template.fields.get_mut(&record.name) {
                Some(field) => {
                    let same_value = field.text == restored.text;
                    field.rect = restored.rect;
                    field.style = restored.style;
                    field.layer = restored.layer;
                    if same_value {
                        field.sync(&self.fonts);
                    } else {
                        show_value(field, &restored.text, &self.images, &self.fonts);
                    }
                }
                None => {
                    let mut field = restored;
                    let value = field.text.clone();
                    show_value(&mut field, &value, &self.images, &self.fonts);
                    self.template.fields.insert(record.name.clone(), field);
                }
            }
        }

        self.template.groups = snapshot
            .groups
            .iter()
            .map(|record| (record.name.clone(), record.to_group(scale)))
            .collect();
        self.template.normalize_layers();
        self.canvas.retain_existing(&self.template);
    }

    // ── Persistence ───────────────────────────────────────────────

    /// Replace the template with a layout document at the current zoom and
    /// start a new history from it.
    pub fn apply_document(&mut self, doc: &LayoutDocument) {
        self.template = doc.to_template(self.template.scale);
        for field in self.template.fields.values_mut() {
            let value = field.text.clone();
            show_value(field, &value, &self.images, &self.fonts);
        }
        self.canvas.clear_selection();
        let (vw, vh) = (self.canvas.viewport.width, self.canvas.viewport.height);
        self.canvas
            .resize_viewport(&mut self.template, &self.fonts, vw, vh);
        self.history.reset(Snapshot::capture(&self.template));
    }

    /// Load a layout file and the data file it points at.
    ///
    /// The layout is applied even when its data file fails to load; that
    /// failure is returned so the caller can report it.
    pub fn load_layout(&mut self, path: &Path) -> Result<(), PdsError> {
        let doc = LayoutDocument::load(path)?;
        self.apply_document(&doc);
        self.load_bound_data()
    }

    /// Like [`Session::load_layout`], but a missing or unreadable layout
    /// starts an empty session.
    pub fn open_layout_or_default(&mut self, path: &Path) -> Result<(), PdsError> {
        let doc = config::load_or_default(path);
        self.apply_document(&doc);
        self.load_bound_data()
    }

    fn load_bound_data(&mut self) -> Result<(), PdsError> {
        let Some(path) = self.template.data_path.clone() else {
            return Ok(());
        };
        self.load_data(&path).map_err(|e| {
            log::error!("failed to load data from {}: {}", path.display(), e);
            e
        })
    }

    pub fn to_document(&self) -> LayoutDocument {
        LayoutDocument::from_template(&self.template)
    }

    pub fn save_layout(&self, path: &Path) -> Result<(), PdsError> {
        self.to_document().save(path)
    }

    // ── Generation ────────────────────────────────────────────────

    /// Start generating one PDF per data row on a background thread.
    ///
    /// The worker gets its own copy of the template and data plus a fresh
    /// image cache. Output goes to `output_dir`, or `<data dir>/PDS`.
    pub fn start_batch(&self, output_dir: Option<PathBuf>) -> Result<BatchHandle, PdsError> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| PdsError::InvalidInput("no data source loaded".to_string()))?;
        batch::spawn(
            self.template.clone(),
            data.clone(),
            self.images.fresh(),
            output_dir,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::ImageFetcher;
    use crate::style::Align;
    use pretty_assertions::assert_eq;

    struct NoNetwork;

    impl ImageFetcher for NoNetwork {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, PdsError> {
            Err(PdsError::Image(format!("offline: {}", url)))
        }
    }

    fn session() -> Session {
        let mut s = Session::new(ImageLoader::with_fetcher(None, NoNetwork));
        s.set_data(
            DataSource::from_json(
                r#"{"sheets": [{"name": "Sheet1", "columns": ["Name", "Title"],
                    "rows": [["Jan", "Dr"], ["Ewa", null]]}]}"#,
            )
            .unwrap(),
        );
        s
    }

    #[test]
    fn test_toggle_column_creates_and_removes_field() {
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        let f = &s.template().fields["Sheet1:Name"];
        assert_eq!(f.text, "Sheet1:Name");
        assert_eq!(f.layer, 1);
        assert_eq!(f.rect, Rect::new(247.5, 401.0, 100.0, 40.0));
        s.toggle_column("Sheet1:Title", true).unwrap();
        assert_eq!(s.template().fields["Sheet1:Title"].layer, 2);
        s.toggle_column("Sheet1:Name", false).unwrap();
        assert!(!s.template().fields.contains_key("Sheet1:Name"));
        // remaining layers are renumbered from 1
        assert_eq!(s.template().fields["Sheet1:Title"].layer, 1);
        assert!(s.toggle_column("Footer", true).is_err());
    }

    #[test]
    fn test_static_fields() {
        let mut s = session();
        assert_eq!(s.add_static_field(), "Static1");
        assert_eq!(s.add_static_field(), "Static2");
        s.set_static_value("Static1", "Hello").unwrap();
        s.toggle_static("Static1", true).unwrap();
        assert_eq!(s.template().fields["Static1"].text, "Hello");
        s.set_static_value("Static1", "World").unwrap();
        assert_eq!(s.template().fields["Static1"].text, "World");
        assert_eq!(s.display_name("Static1"), "Static1: World");
        assert!(s.remove_static_field("Static1"));
        assert!(!s.template().fields.contains_key("Static1"));
        assert!(s.set_static_value("Static1", "x").is_err());
        assert_eq!(s.add_static_field(), "Static1");
    }

    #[test]
    fn test_display_name() {
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        assert_eq!(s.display_name("Sheet1:Name"), "Sheet1:Name");
        s.preview_row("1").unwrap();
        assert_eq!(s.display_name("Sheet1:Name"), "Sheet1:Name: Jan");
        assert_eq!(s.display_name("Footer"), "Footer");
    }

    #[test]
    fn test_preview_row_loads_values() {
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        s.toggle_column("Sheet1:Title", true).unwrap();
        s.set_static_value("Footer", "Confidential").unwrap();
        s.toggle_static("Footer", true).unwrap();
        assert_eq!(s.preview_row("2").unwrap(), 1);
        let t = s.template();
        assert_eq!(t.fields["Sheet1:Name"].text, "Ewa");
        assert_eq!(t.fields["Sheet1:Title"].text, "");
        assert_eq!(t.fields["Footer"].text, "Confidential");
        assert!(matches!(s.preview_row("x"), Err(PdsError::InvalidInput(_))));
        assert!(matches!(s.preview_row("9"), Err(PdsError::InvalidInput(_))));
    }

    #[test]
    fn test_remote_value_that_fails_shows_text() {
        let mut s = session();
        s.add_static_field();
        s.set_static_value("Static1", "https://img.test/a.png").unwrap();
        s.toggle_static("Static1", true).unwrap();
        let f = &s.template().fields["Static1"];
        assert!(!f.is_image());
        assert_eq!(f.text, "https://img.test/a.png");
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut s = session();
        let initial = Snapshot::capture(s.template());
        s.toggle_column("Sheet1:Name", true).unwrap();
        s.select(Some("Sheet1:Name"), false);
        s.edit_style(StyleEdit::ToggleBold).unwrap();
        s.edit_style(StyleEdit::Align(Align::Right)).unwrap();
        s.add_group();
        s.center_vertically();
        let last = Snapshot::capture(s.template());

        for _ in 0..5 {
            assert!(s.undo());
        }
        assert!(!s.undo());
        assert_eq!(Snapshot::capture(s.template()), initial);
        for _ in 0..5 {
            assert!(s.redo());
        }
        assert!(!s.redo());
        assert_eq!(Snapshot::capture(s.template()), last);
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        s.add_group();
        let snap = Snapshot::capture(s.template());
        s.toggle_column("Sheet1:Title", true).unwrap();
        s.restore(&snap);
        let once = Snapshot::capture(s.template());
        s.restore(&snap);
        assert_eq!(Snapshot::capture(s.template()), once);
        assert_eq!(once, snap);
    }

    #[test]
    fn test_layers() {
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        assert!(!s.lower_layer("Sheet1:Name"));
        assert!(s.raise_layer("Sheet1:Name"));
        assert_eq!(s.template().fields["Sheet1:Name"].layer, 2);
        assert!(s.lower_layer("Sheet1:Name"));
        assert_eq!(s.template().fields["Sheet1:Name"].layer, 1);
    }

    #[test]
    fn test_conditions() {
        let mut s = session();
        assert!(s.add_condition("A", "B").unwrap());
        assert!(!s.add_condition("A", "B").unwrap());
        assert!(s.add_condition("", "B").is_err());
        assert_eq!(s.conditions().len(), 1);
        assert_eq!(s.remove_condition(0), Some(Condition::new("A", "B")));
        assert_eq!(s.remove_condition(0), None);
    }

    #[test]
    fn test_page_size_change_rescales_and_snaps() {
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        s.set_page_size("B5").unwrap();
        let t = s.template();
        assert_eq!((t.page_width, t.page_height), (516.0, 729.0));
        let r = t.fields["Sheet1:Name"].rect;
        // 247.5 * 516/595 = 214.6 -> 215; 100 * 516/595 = 86.7 -> 85
        assert_eq!((r.x, r.width), (215.0, 85.0));
        assert!(s.set_page_size("10x0").is_err());
        assert_eq!(s.template().page_width, 516.0);
    }

    #[test]
    fn test_center_and_delete_selection() {
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        s.toggle_column("Sheet1:Title", true).unwrap();
        s.select(Some("Sheet1:Name"), false);
        s.select(Some("Sheet1:Title"), true);
        assert!(s.center_horizontally());
        assert_eq!(s.template().fields["Sheet1:Title"].rect.x, 247.5);
        assert_eq!(s.delete_selection(), 2);
        assert!(s.template().fields.is_empty());
        assert!(s.canvas().selection().is_empty());
    }

    #[test]
    fn test_group_preview_stacks_members() {
        let mut s = session();
        let name = s.add_group();
        let mut editor = s.open_group_editor(&name).unwrap();
        editor.toggle_field("Sheet1:Name", true, s.fonts());
        editor.toggle_field("Sheet1:Title", true, s.fonts());
        s.close_group_editor(editor).unwrap();
        let placed = s.group_preview(&name);
        // both sit at local (10, 10), so they share a column and the second
        // stacks under the first
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].name, "Sheet1:Name");
        assert_eq!(placed[0].rect.y, 0.0);
        assert_eq!(placed[1].rect.y, 40.0);
    }

    /// Two members at the same local spot, added Zeta first.
    fn session_with_tied_group() -> (Session, String) {
        let mut s = session();
        let name = s.add_group();
        let mut editor = s.open_group_editor(&name).unwrap();
        editor.toggle_field("Sheet1:Zeta", true, s.fonts());
        editor.toggle_field("Sheet1:Alpha", true, s.fonts());
        s.close_group_editor(editor).unwrap();
        (s, name)
    }

    fn stacked(s: &Session, group: &str) -> Vec<(String, f64)> {
        s.group_preview(group)
            .into_iter()
            .map(|p| (p.name, p.rect.y))
            .collect()
    }

    #[test]
    fn test_undo_keeps_group_member_order() {
        let (mut s, name) = session_with_tied_group();
        let before = stacked(&s, &name);
        assert_eq!(
            before,
            vec![("Sheet1:Zeta".to_string(), 0.0), ("Sheet1:Alpha".to_string(), 40.0)]
        );
        s.toggle_column("Sheet1:Name", true).unwrap();
        assert!(s.undo());
        assert_eq!(s.template().groups[&name].fields, vec!["Sheet1:Zeta", "Sheet1:Alpha"]);
        assert_eq!(stacked(&s, &name), before);
        assert!(s.redo());
        assert_eq!(stacked(&s, &name), before);
    }

    #[test]
    fn test_save_and_load_keeps_group_member_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let (s, name) = session_with_tied_group();
        s.save_layout(&path).unwrap();

        let mut other = Session::new(ImageLoader::with_fetcher(None, NoNetwork));
        other.load_layout(&path).unwrap();
        assert_eq!(other.template().groups[&name].fields, vec!["Sheet1:Zeta", "Sheet1:Alpha"]);
        assert_eq!(stacked(&other, &name), stacked(&s, &name));
    }

    #[test]
    fn test_huge_layer_does_not_break_new_fields() {
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        s.select(Some("Sheet1:Name"), false);
        assert!(s.edit_style(StyleEdit::Layer("99999999999".into())).is_err());
        s.edit_style(StyleEdit::Layer("9999".into())).unwrap();
        assert!(!s.raise_layer("Sheet1:Name"));
        s.toggle_column("Sheet1:Title", true).unwrap();
        assert_eq!(s.template().fields["Sheet1:Title"].layer, MAX_LAYER);
    }

    #[test]
    fn test_layout_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let mut s = session();
        s.toggle_column("Sheet1:Name", true).unwrap();
        s.save_layout(&path).unwrap();

        let mut other = Session::new(ImageLoader::with_fetcher(None, NoNetwork));
        other.load_layout(&path).unwrap();
        assert!(other.template().fields.contains_key("Sheet1:Name"));
        assert!(!other.can_undo());
    }
}
