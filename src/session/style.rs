use crate::error::PdsError;
use crate::font::FontContext;
use crate::model::{Template, MAX_LAYER};
use crate::style::{Align, Color};

/// A style change applied to every selected field.
///
/// Text inputs (font size, layer) are carried as typed so that parsing and
/// validation happen before anything is touched.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleEdit {
    ToggleBold,
    /// One page unit up; turns auto-fit off.
    IncreaseFont,
    /// One page unit down, never below one; turns auto-fit off.
    DecreaseFont,
    /// Font size in page units, as typed.
    FontSize(String),
    /// Layer as typed; values below 1 become 1, values above `MAX_LAYER`
    /// are rejected.
    Layer(String),
    TextColor(String),
    /// Also makes the background visible.
    BgColor(String),
    BgVisible(bool),
    Align(Align),
}

enum Parsed {
    FontSize(f64),
    Layer(u32),
}

fn parse_number(value: &str, what: &str) -> Result<f64, PdsError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PdsError::InvalidInput(format!("invalid {} '{}'", what, value)))
}

fn check_color(value: &str) -> Result<(), PdsError> {
    Color::parse(value)
        .map(|_| ())
        .ok_or_else(|| PdsError::InvalidInput(format!("unknown color '{}'", value)))
}

fn validate(edit: &StyleEdit) -> Result<Option<Parsed>, PdsError> {
    match edit {
        StyleEdit::FontSize(text) => {
            let size = parse_number(text, "font size")?;
            if size <= 0.0 {
                return Err(PdsError::InvalidInput(format!(
                    "font size must be positive, got {}",
                    size
                )));
            }
            Ok(Some(Parsed::FontSize(size)))
        }
        StyleEdit::Layer(text) => {
            let layer = parse_number(text, "layer")?.trunc();
            if layer > MAX_LAYER as f64 {
                return Err(PdsError::InvalidInput(format!(
                    "layer {} is above the maximum of {}",
                    text.trim(),
                    MAX_LAYER
                )));
            }
            Ok(Some(Parsed::Layer(layer.max(1.0) as u32)))
        }
        StyleEdit::TextColor(c) | StyleEdit::BgColor(c) => check_color(c).map(|_| None),
        _ => Ok(None),
    }
}

/// Apply `edit` to the named fields of `template`.
///
/// Returns `Ok(false)` when none of the names exist. Invalid input is
/// rejected before any field changes.
pub fn apply_style(
    template: &mut Template,
    names: &[String],
    edit: &StyleEdit,
    fonts: &FontContext,
) -> Result<bool, PdsError> {
    let parsed = validate(edit)?;
    let scale = template.scale;
    let mut changed = false;
    for name in names {
        let Some(field) = template.fields.get_mut(name) else {
            continue;
        };
        let size = field.style.font_size;
        match (edit, &parsed) {
            (StyleEdit::ToggleBold, _) => field.style.bold = !field.style.bold,
            (StyleEdit::IncreaseFont, _) => field.set_font_size(size + scale),
            (StyleEdit::DecreaseFont, _) => {
                if size <= scale {
                    continue;
                }
                field.set_font_size(size - scale);
            }
            (StyleEdit::FontSize(_), Some(Parsed::FontSize(size))) => {
                field.set_font_size(size * scale)
            }
            (StyleEdit::Layer(_), Some(Parsed::Layer(layer))) => field.layer = *layer,
            (StyleEdit::TextColor(c), _) => field.style.text_color = c.trim().to_string(),
            (StyleEdit::BgColor(c), _) => {
                field.style.bg_color = c.trim().to_string();
                field.style.bg_visible = true;
            }
            (StyleEdit::BgVisible(visible), _) => field.style.bg_visible = *visible,
            (StyleEdit::Align(align), _) => field.style.align = *align,
            _ => continue,
        }
        field.sync(fonts);
        changed = true;
    }
    if changed && matches!(edit, StyleEdit::Layer(_)) {
        template.normalize_layers();
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Rect};

    fn template(scale: f64) -> Template {
        let mut t = Template::default();
        let mut f = Field::new("A", "Hello", Rect::new(0.0, 0.0, 100.0, 40.0), 2);
        f.style.font_size = 12.0;
        t.fields.insert("A".into(), f);
        t.set_scale(scale);
        t
    }

    fn names() -> Vec<String> {
        vec!["A".to_string()]
    }

    #[test]
    fn test_font_steps_are_one_page_unit() {
        let fonts = FontContext::new();
        let mut t = template(2.0);
        apply_style(&mut t, &names(), &StyleEdit::IncreaseFont, &fonts).unwrap();
        assert_eq!(t.fields["A"].style.font_size, 26.0);
        assert!(!t.fields["A"].style.auto_font);
        apply_style(&mut t, &names(), &StyleEdit::DecreaseFont, &fonts).unwrap();
        apply_style(&mut t, &names(), &StyleEdit::DecreaseFont, &fonts).unwrap();
        assert_eq!(t.fields["A"].style.font_size, 22.0);
    }

    #[test]
    fn test_decrease_stops_at_one_unit() {
        let fonts = FontContext::new();
        let mut t = template(1.0);
        apply_style(&mut t, &names(), &StyleEdit::FontSize("1".into()), &fonts).unwrap();
        let changed = apply_style(&mut t, &names(), &StyleEdit::DecreaseFont, &fonts).unwrap();
        assert!(!changed);
        assert_eq!(t.fields["A"].style.font_size, 1.0);
    }

    #[test]
    fn test_font_size_from_text_is_scaled() {
        let fonts = FontContext::new();
        let mut t = template(1.5);
        apply_style(&mut t, &names(), &StyleEdit::FontSize(" 10 ".into()), &fonts).unwrap();
        assert_eq!(t.fields["A"].style.font_size, 15.0);
    }

    #[test]
    fn test_invalid_input_leaves_field_untouched() {
        let fonts = FontContext::new();
        let mut t = template(1.0);
        let before = t.fields["A"].style.clone();
        for edit in [
            StyleEdit::FontSize("abc".into()),
            StyleEdit::FontSize("-3".into()),
            StyleEdit::Layer("x".into()),
            StyleEdit::TextColor("not-a-color".into()),
        ] {
            assert!(matches!(
                apply_style(&mut t, &names(), &edit, &fonts),
                Err(PdsError::InvalidInput(_))
            ));
        }
        assert_eq!(t.fields["A"].style, before);
    }

    #[test]
    fn test_layer_is_clamped_to_one() {
        let fonts = FontContext::new();
        let mut t = template(1.0);
        apply_style(&mut t, &names(), &StyleEdit::Layer("-4".into()), &fonts).unwrap();
        assert_eq!(t.fields["A"].layer, 1);
        apply_style(&mut t, &names(), &StyleEdit::Layer("3.7".into()), &fonts).unwrap();
        assert_eq!(t.fields["A"].layer, 3);
    }

    #[test]
    fn test_layer_above_maximum_is_rejected() {
        let fonts = FontContext::new();
        let mut t = template(1.0);
        let result = apply_style(&mut t, &names(), &StyleEdit::Layer("99999999999".into()), &fonts);
        assert!(matches!(result, Err(PdsError::InvalidInput(_))));
        assert_eq!(t.fields["A"].layer, 2);
        apply_style(&mut t, &names(), &StyleEdit::Layer("9999".into()), &fonts).unwrap();
        assert_eq!(t.fields["A"].layer, MAX_LAYER);
    }

    #[test]
    fn test_bg_color_makes_background_visible() {
        let fonts = FontContext::new();
        let mut t = template(1.0);
        apply_style(&mut t, &names(), &StyleEdit::BgVisible(false), &fonts).unwrap();
        assert!(t.fields["A"].background().is_none());
        apply_style(&mut t, &names(), &StyleEdit::BgColor("#ff0000".into()), &fonts).unwrap();
        assert!(t.fields["A"].style.bg_visible);
        assert_eq!(t.fields["A"].background(), Color::parse("#ff0000"));
    }

    #[test]
    fn test_unknown_names_change_nothing() {
        let fonts = FontContext::new();
        let mut t = template(1.0);
        let changed =
            apply_style(&mut t, &["Z".to_string()], &StyleEdit::ToggleBold, &fonts).unwrap();
        assert!(!changed);
    }
}
