//! Per-row value resolution and conditional visibility.
//!
//! A condition `(source, target)` hides `target` when `source` resolves to an
//! empty value. Global conditions only apply between top-level fields and
//! group conditions only between members of that group; a condition that
//! crosses the two scopes does nothing.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::DataSource;
use crate::model::{Condition, FieldBinding, Template};

/// Resolved text of every field a row needs, by field name.
pub type RowValues = BTreeMap<String, String>;

/// Value of one field for `row`: the cell for `sheet:column` fields, the
/// configured text for static fields, `""` otherwise.
pub fn field_value(template: &Template, data: &DataSource, row: usize, name: &str) -> String {
    match FieldBinding::from_name(name) {
        FieldBinding::Column { sheet, column } => data.value(&sheet, &column, row),
        FieldBinding::Static => template.static_fields.get(name).cloned().unwrap_or_default(),
    }
}

/// Values for every top-level field, group member and static field.
pub fn resolve_row_values(template: &Template, data: &DataSource, row: usize) -> RowValues {
    let mut needed: BTreeSet<&str> = template.fields.keys().map(String::as_str).collect();
    needed.extend(template.group_field_names());
    needed.extend(template.static_fields.keys().map(String::as_str));
    needed
        .into_iter()
        .map(|name| (name.to_string(), field_value(template, data, row, name)))
        .collect()
}

fn is_blank(values: &RowValues, name: &str) -> bool {
    values.get(name).map_or(true, |v| v.is_empty())
}

/// Global conditions that reference a group member on either side. They
/// never take effect.
pub fn cross_scope_conditions(template: &Template) -> Vec<&Condition> {
    let grouped = template.group_field_names();
    template
        .conditions
        .iter()
        .filter(|c| grouped.contains(c.source.as_str()) || grouped.contains(c.target.as_str()))
        .collect()
}

/// Which fields one row hides.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Visibility {
    /// Hidden by global conditions.
    pub hidden: BTreeSet<String>,
    /// Hidden by each group's own conditions, by group name.
    pub group_hidden: BTreeMap<String, BTreeSet<String>>,
}

impl Visibility {
    pub fn resolve(template: &Template, values: &RowValues) -> Self {
        let grouped = template.group_field_names();
        let hidden = template
            .conditions
            .iter()
            .filter(|c| {
                !grouped.contains(c.source.as_str()) && !grouped.contains(c.target.as_str())
            })
            .filter(|c| is_blank(values, &c.source))
            .map(|c| c.target.clone())
            .collect();

        let group_hidden = template
            .groups
            .values()
            .map(|group| {
                let set = group
                    .conditions
                    .iter()
                    .filter(|c| group.condition_in_scope(c))
                    .filter(|c| is_blank(values, &c.source))
                    .map(|c| c.target.clone())
                    .collect();
                (group.name.clone(), set)
            })
            .collect();

        Self {
            hidden,
            group_hidden,
        }
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }

    /// Whether a group member is left out of stacking for this row: hidden by
    /// any condition, or blank.
    pub fn excludes_member(&self, group: &str, name: &str, values: &RowValues) -> bool {
        self.is_hidden(name)
            || self
                .group_hidden
                .get(group)
                .is_some_and(|set| set.contains(name))
            || is_blank(values, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Group, Rect};

    fn values(pairs: &[(&str, &str)]) -> RowValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn template() -> Template {
        let mut t = Template::default();
        for name in ["A", "B"] {
            t.fields
                .insert(name.into(), Field::new(name, name, Rect::default(), 1));
        }
        let mut g = Group::new("G", Rect::default());
        g.fields = vec!["X".into(), "Y".into()];
        g.conditions = vec![Condition::new("X", "Y"), Condition::new("A", "Y")];
        t.groups.insert("G".into(), g);
        t
    }

    #[test]
    fn test_global_condition_hides_on_blank() {
        let mut t = template();
        t.conditions.push(Condition::new("A", "B"));
        let vis = Visibility::resolve(&t, &values(&[("A", ""), ("B", "b")]));
        assert!(vis.is_hidden("B"));
        let vis = Visibility::resolve(&t, &values(&[("A", "a"), ("B", "b")]));
        assert!(!vis.is_hidden("B"));
    }

    #[test]
    fn test_cross_scope_conditions_are_ignored() {
        let mut t = template();
        t.conditions.push(Condition::new("A", "X"));
        t.conditions.push(Condition::new("Y", "B"));
        let vals = values(&[("A", ""), ("B", "b"), ("X", "x"), ("Y", "")]);
        let vis = Visibility::resolve(&t, &vals);
        assert!(vis.hidden.is_empty());
        assert_eq!(cross_scope_conditions(&t).len(), 2);
        // group condition sourcing a top-level field is out of scope too
        let vals = values(&[("A", ""), ("X", "x"), ("Y", "y")]);
        assert!(!Visibility::resolve(&t, &vals).group_hidden["G"].contains("Y"));
    }

    #[test]
    fn test_group_condition_and_blank_members() {
        let t = template();
        let vals = values(&[("X", ""), ("Y", "y")]);
        let vis = Visibility::resolve(&t, &vals);
        assert!(vis.excludes_member("G", "Y", &vals));
        assert!(vis.excludes_member("G", "X", &vals));

        let vals = values(&[("X", "x"), ("Y", "y")]);
        let vis = Visibility::resolve(&t, &vals);
        assert!(!vis.excludes_member("G", "Y", &vals));
    }

    #[test]
    fn test_row_values_cover_static_and_columns() {
        let mut t = Template::default();
        t.fields.insert(
            "Sheet1:Name".into(),
            Field::new("Sheet1:Name", "", Rect::default(), 1),
        );
        t.static_fields.insert("Footer".into(), "Confidential".into());
        let data = DataSource::from_json(
            r#"{"sheets": [{"name": "Sheet1", "columns": ["Name"], "rows": [["Jan"], [null]]}]}"#,
        )
        .unwrap();
        let row0 = resolve_row_values(&t, &data, 0);
        assert_eq!(row0["Sheet1:Name"], "Jan");
        assert_eq!(row0["Footer"], "Confidential");
        assert_eq!(row0["Header"], "");
        let row1 = resolve_row_values(&t, &data, 1);
        assert_eq!(row1["Sheet1:Name"], "");
    }
}
