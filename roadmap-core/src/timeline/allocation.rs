//! Even sub-allocation of an epic's span among its stories.

use crate::models::Epic;

use super::position::{bar_geometry, BarGeometry};

/// Share of each story segment the bar occupies; the rest is a visual gap
pub const STORY_FILL: f64 = 0.9;

/// Places story `index` of `total` inside the epic's bar.
///
/// The span is cut into `total` equal segments in index order; each story bar
/// covers the first 90% of its segment.
pub fn story_position(epic_bar: BarGeometry, index: usize, total: usize) -> BarGeometry {
    let segment = epic_bar.width / total.max(1) as f64;
    BarGeometry::new(epic_bar.start + index as f64 * segment, segment * STORY_FILL)
}

/// Positions of all the epic's stories against the `year` timeline
pub fn story_positions(epic: &Epic, year: i32) -> Vec<BarGeometry> {
    let epic_bar = bar_geometry(epic, year);
    let total = epic.stories.len();
    (0..total)
        .map(|index| story_position(epic_bar, index, total))
        .collect()
}
