//! Date arithmetic that places an epic on a year-wide timeline.
//!
//! Every value is a percentage of the year's width in `[0, 100]`. Day counts are
//! divided by a fixed 365 even in leap years; the resulting overshoot on day 366
//! is absorbed by the final clamp.

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;

use crate::models::{Epic, Quarter};

/// Denominator for day-based positions (not corrected for leap years)
pub const DAYS_IN_YEAR: f64 = 365.0;

pub const MONTHS_IN_YEAR: f64 = 12.0;

/// Horizontal placement of a bar, as percentages of the year
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarGeometry {
    pub start: f64,
    pub width: f64,
}

impl BarGeometry {
    pub fn new(start: f64, width: f64) -> Self {
        Self { start, width }
    }

    /// Right edge of the bar
    pub fn end(&self) -> f64 {
        self.start + self.width
    }

    /// A bar is drawn only when it starts inside the year and has extent
    pub fn is_visible(&self) -> bool {
        self.start < 100.0 && self.width > 0.0
    }

    /// Width to draw: at least `min_width` so short bars stay clickable, never
    /// past the right edge, zero for invisible bars.
    pub fn display_width(&self, min_width: f64) -> f64 {
        if !self.is_visible() {
            return 0.0;
        }
        self.width.max(min_width).min(100.0 - self.start)
    }
}

/// 1-based ordinal day of `date` within its own calendar year
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

fn day_percent(day: u32) -> f64 {
    day as f64 / DAYS_IN_YEAR * 100.0
}

fn month_percent(month: u32) -> f64 {
    month as f64 / MONTHS_IN_YEAR * 100.0
}

/// Start of the quarter as a percentage of the year
pub fn quarter_start_percent(quarter: Quarter) -> f64 {
    month_percent(quarter.start_month())
}

/// Width of a quarter (always 25%)
pub fn quarter_width_percent(quarter: Quarter) -> f64 {
    month_percent(quarter.end_month() - quarter.start_month() + 1)
}

/// Left edge of the epic's bar in `year`.
///
/// An explicit start date wins over the quarter: inside `year` it maps to its
/// ordinal day, before `year` it pins to 0, after `year` it pins to 100.
pub fn bar_start(epic: &Epic, year: i32) -> f64 {
    let start = match epic.start() {
        Some(date) if date.year() == year => day_percent(day_of_year(date)),
        Some(date) if date.year() < year => 0.0,
        Some(_) => 100.0,
        None => quarter_start_percent(epic.quarter),
    };
    start.clamp(0.0, 100.0)
}

fn unclamped_width(epic: &Epic, year: i32) -> f64 {
    let (Some(start), Some(end)) = (epic.start(), epic.end()) else {
        return quarter_width_percent(epic.quarter);
    };
    let (Some(year_start), Some(year_end)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0.0;
    };

    let effective_start = start.max(year_start);
    let effective_end = end.min(year_end);
    // Empty when the epic misses the year entirely or the range is inverted
    if effective_start > effective_end {
        return 0.0;
    }

    let days = day_of_year(effective_end) - day_of_year(effective_start) + 1;
    day_percent(days)
}

/// Width of the epic's bar in `year`, never running past the year's right edge
pub fn bar_width(epic: &Epic, year: i32) -> f64 {
    let start = bar_start(epic, year);
    unclamped_width(epic, year).clamp(0.0, 100.0 - start)
}

pub fn bar_geometry(epic: &Epic, year: i32) -> BarGeometry {
    BarGeometry::new(bar_start(epic, year), bar_width(epic, year))
}

/// Position of `today` on the `year` timeline, `None` if it falls in another year
pub fn today_position_on(year: i32, today: NaiveDate) -> Option<f64> {
    if today.year() != year {
        return None;
    }
    Some(day_percent(day_of_year(today)).min(100.0))
}

/// Position of the local current date on the `year` timeline
pub fn today_position(year: i32) -> Option<f64> {
    today_position_on(year, Local::now().date_naive())
}
