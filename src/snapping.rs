//! Edge snapping geometry
//!
//! Pure functions over window bounds and the work area; the controller decides
//! when to call them.

use crate::constants::snap::{HIDE_PEEK_PX, REVEAL_ALONG_EDGE_SLOP_PX, REVEAL_HOVER_PX};
use crate::types::{Edge, Point, SnappedEdge, WindowBounds, WorkArea};

/// Clamp that tolerates `min > max` (window larger than the work area) by preferring `min`
fn clamp(n: i32, min: i32, max: i32) -> i32 {
    n.min(max).max(min)
}

/// Find the work-area edge the window is docked against.
/// When several edges qualify (corners) the priority is top > bottom > left > right.
pub fn compute_snapped_edge(bounds: WindowBounds, area: WorkArea, threshold: i32) -> SnappedEdge {
    let left_dist = (bounds.left() - area.left()).abs();
    let top_dist = (bounds.top() - area.top()).abs();
    let right_dist = (area.right() - bounds.right()).abs();
    let bottom_dist = (area.bottom() - bounds.bottom()).abs();

    if top_dist <= threshold {
        Some(Edge::Top)
    } else if bottom_dist <= threshold {
        Some(Edge::Bottom)
    } else if left_dist <= threshold {
        Some(Edge::Left)
    } else if right_dist <= threshold {
        Some(Edge::Right)
    } else {
        None
    }
}

/// Place the window flush against `edge` and keep it fully inside the work area
/// on the other axis. Size is preserved.
pub fn dock_bounds(bounds: WindowBounds, edge: Edge, area: WorkArea) -> WindowBounds {
    let mut x = bounds.x;
    let mut y = bounds.y;

    match edge {
        Edge::Left => x = area.left(),
        Edge::Right => x = area.right() - bounds.width as i32,
        Edge::Top => y = area.top(),
        Edge::Bottom => y = area.bottom() - bounds.height as i32,
    }

    // Clamp both axes so a window dragged half off-screen cannot get lost
    let x = clamp(x, area.left(), area.right() - bounds.width as i32);
    let y = clamp(y, area.top(), area.bottom() - bounds.height as i32);

    bounds.with_position(x, y)
}

/// Bounds that park the window past `edge`, leaving only `HIDE_PEEK_PX` visible
pub fn hidden_bounds(bounds: WindowBounds, edge: Edge, area: WorkArea) -> WindowBounds {
    match edge {
        Edge::Left => bounds.with_position(area.left() - bounds.width as i32 + HIDE_PEEK_PX, bounds.y),
        Edge::Right => bounds.with_position(area.right() - HIDE_PEEK_PX, bounds.y),
        Edge::Top => bounds.with_position(bounds.x, area.top() - bounds.height as i32 + HIDE_PEEK_PX),
        Edge::Bottom => bounds.with_position(bounds.x, area.bottom() - HIDE_PEEK_PX),
    }
}

/// Hover hot-zone test for a hidden window.
///
/// The band spans the peek strip plus `REVEAL_HOVER_PX` perpendicular to the edge,
/// and along the edge only the pre-hide span (`base`) plus `REVEAL_ALONG_EDGE_SLOP_PX`
/// on each side, clipped to the work area.
pub fn is_cursor_in_reveal_band(cursor: Point, area: WorkArea, edge: Edge, base: WindowBounds) -> bool {
    let depth = HIDE_PEEK_PX + REVEAL_HOVER_PX;

    if edge.is_horizontal() {
        let (min_x, max_x) = match edge {
            Edge::Left => (area.left(), area.left() + depth),
            _ => (area.right() - depth, area.right()),
        };
        let min_y = area.top().max(base.top() - REVEAL_ALONG_EDGE_SLOP_PX);
        let max_y = area.bottom().min(base.bottom() + REVEAL_ALONG_EDGE_SLOP_PX);
        (min_x..=max_x).contains(&cursor.x) && (min_y..=max_y).contains(&cursor.y)
    } else {
        let (min_y, max_y) = match edge {
            Edge::Top => (area.top(), area.top() + depth),
            _ => (area.bottom() - depth, area.bottom()),
        };
        let min_x = area.left().max(base.left() - REVEAL_ALONG_EDGE_SLOP_PX);
        let max_x = area.right().min(base.right() + REVEAL_ALONG_EDGE_SLOP_PX);
        (min_y..=max_y).contains(&cursor.y) && (min_x..=max_x).contains(&cursor.x)
    }
}

/// Bounds of the given size centered in the work area
pub fn centered(width: u32, height: u32, area: WorkArea) -> WindowBounds {
    let x = area.x + (area.width as i32 - width as i32) / 2;
    let y = area.y + (area.height as i32 - height as i32) / 2;
    WindowBounds::new(x, y, width, height)
}
