//! Presentation-ready Gantt models.
//!
//! These compose bar geometry, story sub-allocation, progress and tones into a
//! nested structure a renderer can draw without doing any date math itself.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::catalog::ProductEpics;
use crate::models::{Epic, Quarter, StoryStatus, UserStory};
use crate::palette::{product_tone, quarter_tone, status_tone, Tone};
use crate::progress::{epic_progress, total_stories};

use super::allocation::story_position;
use super::position::{bar_geometry, today_position_on, BarGeometry, MONTHS_IN_YEAR};

pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Narrowest epic bar drawn, in percent
pub const EPIC_MIN_WIDTH: f64 = 2.0;

/// Narrowest story bar drawn, in percent
pub const STORY_MIN_WIDTH: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterColumn {
    pub quarter: Quarter,
    pub label: String,
    pub start: f64,
    pub width: f64,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthColumn {
    pub label: &'static str,
    pub start: f64,
    pub width: f64,
}

/// Quarter and month header bands plus the today marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineHeader {
    pub year: i32,
    pub quarters: Vec<QuarterColumn>,
    pub months: Vec<MonthColumn>,
    pub today: Option<f64>,
}

impl TimelineHeader {
    pub fn for_year(year: i32) -> Self {
        Self::for_year_on(year, Local::now().date_naive())
    }

    pub fn for_year_on(year: i32, today: NaiveDate) -> Self {
        let month_width = 100.0 / MONTHS_IN_YEAR;
        let months = MONTHS
            .iter()
            .enumerate()
            .map(|(i, &label)| MonthColumn {
                label,
                start: i as f64 * month_width,
                width: month_width,
            })
            .collect();

        let quarters = Quarter::ALL
            .iter()
            .map(|&quarter| QuarterColumn {
                quarter,
                label: format!("{} {}", quarter, year),
                start: quarter.index() as f64 * 3.0 * month_width,
                width: 3.0 * month_width,
                tone: quarter_tone(quarter),
            })
            .collect();

        Self {
            year,
            quarters,
            months,
            today: today_position_on(year, today),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryRow {
    pub story_id: Uuid,
    pub title: String,
    pub status: StoryStatus,
    pub story_points: u32,
    pub bar: BarGeometry,
    pub display_width: f64,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicRow {
    pub epic_id: Uuid,
    pub title: String,
    pub quarter: Quarter,
    pub sprint: String,
    pub bar: BarGeometry,
    pub display_width: f64,
    pub visible: bool,
    pub progress: u32,
    pub tone: Tone,
    /// Only epics with stories can be expanded
    pub expandable: bool,
    /// Story rows are always laid out, whether or not the epic is expanded
    pub stories: Vec<StoryRow>,
}

impl EpicRow {
    pub fn new(epic: &Epic, year: i32) -> Self {
        let bar = bar_geometry(epic, year);
        let total = epic.stories.len();
        let stories = epic
            .stories
            .iter()
            .enumerate()
            .map(|(index, story)| story_row(story, story_position(bar, index, total)))
            .collect();

        Self {
            epic_id: epic.id,
            title: epic.title.clone(),
            quarter: epic.quarter,
            sprint: epic.sprint.clone(),
            bar,
            display_width: bar.display_width(EPIC_MIN_WIDTH),
            visible: bar.is_visible(),
            progress: epic_progress(epic),
            tone: quarter_tone(epic.quarter),
            expandable: total > 0,
            stories,
        }
    }

    /// Story rows to show under the current expansion state
    pub fn visible_stories(&self, expansion: &Expansion) -> &[StoryRow] {
        if self.expandable && expansion.is_epic_expanded(&self.epic_id) {
            &self.stories
        } else {
            &[]
        }
    }
}

fn story_row(story: &UserStory, bar: BarGeometry) -> StoryRow {
    StoryRow {
        story_id: story.id,
        title: story.title.clone(),
        status: story.status,
        story_points: story.story_points,
        bar,
        display_width: bar.display_width(STORY_MIN_WIDTH),
        tone: status_tone(story.status),
    }
}

/// Single-product Gantt chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttChart {
    pub header: TimelineHeader,
    pub rows: Vec<EpicRow>,
}

pub fn gantt_chart(epics: &[Epic], year: i32) -> GanttChart {
    gantt_chart_on(epics, year, Local::now().date_naive())
}

pub fn gantt_chart_on(epics: &[Epic], year: i32, today: NaiveDate) -> GanttChart {
    GanttChart {
        header: TimelineHeader::for_year_on(year, today),
        rows: epics.iter().map(|e| EpicRow::new(e, year)).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductLane {
    pub product_id: &'static str,
    pub name: &'static str,
    pub tone: Tone,
    pub epic_count: usize,
    pub story_count: usize,
    pub rows: Vec<EpicRow>,
}

/// Every product's epics on one shared timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioChart {
    pub header: TimelineHeader,
    pub lanes: Vec<ProductLane>,
    pub total_epics: usize,
    pub total_stories: usize,
    pub completed_stories: usize,
}

pub fn portfolio_chart(products: &[ProductEpics], year: i32) -> PortfolioChart {
    portfolio_chart_on(products, year, Local::now().date_naive())
}

pub fn portfolio_chart_on(products: &[ProductEpics], year: i32, today: NaiveDate) -> PortfolioChart {
    let lanes: Vec<ProductLane> = products
        .iter()
        .map(|pe| ProductLane {
            product_id: pe.product.id,
            name: pe.product.name,
            tone: product_tone(pe.product.id),
            epic_count: pe.epics.len(),
            story_count: total_stories(&pe.epics),
            rows: pe.epics.iter().map(|e| EpicRow::new(e, year)).collect(),
        })
        .collect();

    let completed_stories = products
        .iter()
        .flat_map(|pe| &pe.epics)
        .map(|e| e.count_with_status(StoryStatus::Done))
        .sum();

    PortfolioChart {
        header: TimelineHeader::for_year_on(year, today),
        total_epics: lanes.iter().map(|l| l.epic_count).sum(),
        total_stories: lanes.iter().map(|l| l.story_count).sum(),
        completed_stories,
        lanes,
    }
}

/// Which epics and product lanes are expanded. Pure view state: it never
/// changes geometry.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    epics: HashSet<Uuid>,
    products: HashSet<String>,
}

impl Expansion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_epic_expanded(&self, id: &Uuid) -> bool {
        self.epics.contains(id)
    }

    pub fn is_product_expanded(&self, id: &str) -> bool {
        self.products.contains(id)
    }

    pub fn toggle_epic(&mut self, id: Uuid) {
        if !self.epics.remove(&id) {
            self.epics.insert(id);
        }
    }

    pub fn toggle_product(&mut self, id: &str) {
        if !self.products.remove(id) {
            self.products.insert(id.to_string());
        }
    }

    /// Expands every lane and every epic of the portfolio
    pub fn expand_all(&mut self, chart: &PortfolioChart) {
        for lane in &chart.lanes {
            self.products.insert(lane.product_id.to_string());
            self.epics.extend(lane.rows.iter().map(|r| r.epic_id));
        }
    }

    pub fn collapse_all(&mut self) {
        self.epics.clear();
        self.products.clear();
    }
}
