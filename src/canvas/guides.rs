//! Alignment guides shown while dragging or resizing.
//!
//! The moving rectangle's edges are compared to the edges of every other
//! rectangle on the canvas. Per axis, the closest edge within
//! [`GUIDE_TOLERANCE`] wins and produces both a snap delta and one guide
//! line. A move compares both edges of an axis; a resize only the far
//! (right/bottom) edge, since the top-left corner is anchored.

use crate::model::Rect;

/// Maximum edge distance, in screen units, that still snaps.
pub const GUIDE_TOLERANCE: f64 = 5.0;

/// A straight guide segment in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuideLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Result of one guide pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Alignment {
    /// Horizontal correction that lands the matched edge on the guide.
    pub dx: f64,
    pub dy: f64,
    pub vertical: Option<GuideLine>,
    pub horizontal: Option<GuideLine>,
}

impl Alignment {
    pub fn snapped(&self) -> bool {
        self.dx != 0.0 || self.dy != 0.0
    }

    pub fn lines(&self) -> Vec<GuideLine> {
        self.vertical.into_iter().chain(self.horizontal).collect()
    }
}

struct Match {
    delta: f64,
    edge: f64,
    other: Rect,
}

fn closest(edges: &[f64], others: &[Rect], other_edges: impl Fn(&Rect) -> [f64; 2]) -> Option<Match> {
    let mut best: Option<Match> = None;
    for other in others {
        for edge in edges {
            for target in other_edges(other) {
                let delta = target - edge;
                if delta.abs() > GUIDE_TOLERANCE {
                    continue;
                }
                if best.as_ref().map_or(true, |b| delta.abs() < b.delta.abs()) {
                    best = Some(Match {
                        delta,
                        edge: target,
                        other: *other,
                    });
                }
            }
        }
    }
    best
}

/// Compute guides for `moving` against `others`.
///
/// Ties keep the first match in `others` order. The guide lines are built
/// from the rectangle after the snap is applied, spanning both rectangles.
pub fn align(moving: &Rect, others: &[Rect], resize: bool) -> Alignment {
    let x_edges: Vec<f64> = if resize {
        vec![moving.right()]
    } else {
        vec![moving.x, moving.right()]
    };
    let y_edges: Vec<f64> = if resize {
        vec![moving.bottom()]
    } else {
        vec![moving.y, moving.bottom()]
    };

    let vx = closest(&x_edges, others, |o| [o.x, o.right()]);
    let hy = closest(&y_edges, others, |o| [o.y, o.bottom()]);

    let dx = vx.as_ref().map_or(0.0, |m| m.delta);
    let dy = hy.as_ref().map_or(0.0, |m| m.delta);

    // Resizing grows the box instead of translating it.
    let snapped = if resize {
        Rect::new(moving.x, moving.y, moving.width + dx, moving.height + dy)
    } else {
        Rect::new(moving.x + dx, moving.y + dy, moving.width, moving.height)
    };

    let vertical = vx.map(|m| GuideLine {
        x1: m.edge,
        y1: snapped.y.min(m.other.y),
        x2: m.edge,
        y2: snapped.bottom().max(m.other.bottom()),
    });
    let horizontal = hy.map(|m| GuideLine {
        x1: snapped.x.min(m.other.x),
        y1: m.edge,
        x2: snapped.right().max(m.other.right()),
        y2: m.edge,
    });

    Alignment {
        dx,
        dy,
        vertical,
        horizontal,
    }
}
