//! # Group Auto-Stack Layout
//!
//! A group never places its fields freely. Each field carries a local x and a
//! nominal local y; fields sharing the same x form a column and are packed
//! top-down in nominal-y order, each at the first y at or below the column
//! cursor where it collides with nothing placed so far (in any column).
//!
//! Fields that are blank or hidden for a row are simply not passed in, so
//! the fields beneath them move up. A field whose bottom would pass the
//! group's height is dropped for that row; the group never grows.
//!
//! The pass works in group-local page units and is run both for the editor
//! preview and for every generated row, so both see the same placement.

use std::cmp::Ordering;

use crate::model::Rect;

/// One field to stack. `y` orders fields within a column; it is not where
/// the field ends up.
#[derive(Debug, Clone, PartialEq)]
pub struct StackItem {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Where a field landed, in group-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub name: String,
    pub rect: Rect,
}

/// Stack `items` into a group `group_height` tall.
///
/// Columns are processed in ascending x, and ties in nominal y keep their
/// input order, so the result depends only on the input sequence.
pub fn auto_stack(items: &[StackItem], group_height: f64) -> Vec<Placement> {
    let mut columns: Vec<(f64, Vec<&StackItem>)> = Vec::new();
    for item in items {
        match columns.iter_mut().find(|(x, _)| *x == item.x) {
            Some((_, column)) => column.push(item),
            None => columns.push((item.x, vec![item])),
        }
    }
    columns.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut placed: Vec<Placement> = Vec::new();
    for (x, mut column) in columns {
        column.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal));
        let mut cur_y = 0.0;
        for item in column {
            let y = first_free_y(&placed, x, cur_y, item.width, item.height);
            if y + item.height > group_height {
                continue;
            }
            placed.push(Placement {
                name: item.name.clone(),
                rect: Rect::new(x, y, item.width, item.height),
            });
            cur_y = y + item.height;
        }
    }
    placed
}

/// Push a candidate down past every placed rectangle it overlaps.
fn first_free_y(placed: &[Placement], x: f64, start: f64, width: f64, height: f64) -> f64 {
    let mut y = start;
    loop {
        let candidate = Rect::new(x, y, width, height);
        match placed.iter().find(|p| candidate.overlaps(&p.rect)) {
            Some(hit) => y = hit.rect.bottom(),
            None => return y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, x: f64, y: f64, w: f64, h: f64) -> StackItem {
        StackItem {
            name: name.to_string(),
            x,
            y,
            width: w,
            height: h,
        }
    }

    fn find<'a>(placed: &'a [Placement], name: &str) -> Option<&'a Placement> {
        placed.iter().find(|p| p.name == name)
    }

    #[test]
    fn test_column_packs_below_previous() {
        let items = vec![item("a", 0.0, 0.0, 100.0, 20.0), item("b", 0.0, 50.0, 100.0, 30.0)];
        let placed = auto_stack(&items, 200.0);
        assert_eq!(find(&placed, "a").unwrap().rect.y, 0.0);
        assert_eq!(find(&placed, "b").unwrap().rect.y, 20.0);
    }

    #[test]
    fn test_hidden_field_collapses() {
        // only the second field is visible for this row
        let items = vec![item("b", 0.0, 50.0, 100.0, 30.0)];
        let placed = auto_stack(&items, 200.0);
        assert_eq!(placed[0].rect.y, 0.0);
    }

    #[test]
    fn test_nominal_y_orders_column() {
        let items = vec![item("low", 0.0, 90.0, 50.0, 10.0), item("high", 0.0, 5.0, 50.0, 10.0)];
        let placed = auto_stack(&items, 100.0);
        assert_eq!(find(&placed, "high").unwrap().rect.y, 0.0);
        assert_eq!(find(&placed, "low").unwrap().rect.y, 10.0);
    }

    #[test]
    fn test_overflowing_field_dropped_and_next_still_fits() {
        let items = vec![
            item("a", 0.0, 0.0, 50.0, 30.0),
            item("big", 0.0, 1.0, 50.0, 80.0),
            item("c", 0.0, 2.0, 50.0, 10.0),
        ];
        let placed = auto_stack(&items, 50.0);
        assert!(find(&placed, "big").is_none());
        assert_eq!(find(&placed, "c").unwrap().rect.y, 30.0);
    }

    #[test]
    fn test_collision_across_columns() {
        // column at x=40 overlaps the wide field at x=0 horizontally
        let items = vec![item("wide", 0.0, 0.0, 80.0, 25.0), item("right", 40.0, 0.0, 30.0, 10.0)];
        let placed = auto_stack(&items, 100.0);
        assert_eq!(find(&placed, "right").unwrap().rect.y, 25.0);
    }

    #[test]
    fn test_independent_columns_start_at_top() {
        let items = vec![item("l", 0.0, 0.0, 40.0, 25.0), item("r", 50.0, 0.0, 40.0, 10.0)];
        let placed = auto_stack(&items, 100.0);
        assert_eq!(find(&placed, "r").unwrap().rect.y, 0.0);
    }

    #[test]
    fn test_placements_never_overlap_and_stay_inside() {
        let mut items = Vec::new();
        for i in 0..24 {
            let x = [0.0, 30.0, 55.0, 90.0][i % 4];
            let w = 20.0 + (i * 7 % 45) as f64;
            let h = 5.0 + (i * 11 % 30) as f64;
            items.push(item(&format!("f{}", i), x, (i * 13 % 17) as f64, w, h));
        }
        let height = 120.0;
        let placed = auto_stack(&items, height);
        assert!(!placed.is_empty());
        for (i, a) in placed.iter().enumerate() {
            assert!(a.rect.bottom() <= height);
            for b in &placed[i + 1..] {
                assert!(!a.rect.overlaps(&b.rect), "{} overlaps {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let items = vec![
            item("a", 10.0, 3.0, 40.0, 12.0),
            item("b", 0.0, 3.0, 60.0, 8.0),
            item("c", 10.0, 1.0, 40.0, 20.0),
        ];
        let first = auto_stack(&items, 60.0);
        for _ in 0..10 {
            assert_eq!(auto_stack(&items, 60.0), first);
        }
    }
}
