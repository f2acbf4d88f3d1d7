//! Sprint and quarter boards.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Epic, Quarter};
use crate::palette::{quarter_tone, Tone};

/// A sprint board always shows at least this many columns
pub const MIN_SPRINT_COLUMNS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintColumn {
    /// Sprint label; empty for padding columns
    pub label: String,
    pub start: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintRow {
    pub epic_id: Uuid,
    pub title: String,
    pub quarter: Quarter,
    pub tone: Tone,
    pub story_count: usize,
    /// Index of the epic's sprint column, `None` when it has no sprint
    pub column: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintBoard {
    /// Distinct sprint labels found on the epics, sorted
    pub sprints: Vec<String>,
    pub columns: Vec<SprintColumn>,
    pub rows: Vec<SprintRow>,
}

/// Distinct non-empty sprint labels in ascending order
pub fn distinct_sprints(epics: &[Epic]) -> Vec<String> {
    let mut sprints: Vec<String> = epics
        .iter()
        .map(|e| e.sprint.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    sprints.sort();
    sprints.dedup();
    sprints
}

pub fn sprint_board(epics: &[Epic]) -> SprintBoard {
    let sprints = distinct_sprints(epics);
    let count = sprints.len().max(MIN_SPRINT_COLUMNS);
    let width = 100.0 / count as f64;

    let columns = (0..count)
        .map(|i| {
            let label = if sprints.is_empty() {
                format!("Sprint {}", i + 1)
            } else {
                sprints.get(i).cloned().unwrap_or_default()
            };
            SprintColumn { label, start: i as f64 * width, width }
        })
        .collect();

    let rows = epics
        .iter()
        .map(|epic| SprintRow {
            epic_id: epic.id,
            title: epic.title.clone(),
            quarter: epic.quarter,
            tone: quarter_tone(epic.quarter),
            story_count: epic.stories.len(),
            column: sprints.iter().position(|s| s == epic.sprint.trim()),
        })
        .collect();

    SprintBoard { sprints, columns, rows }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterBucket<'a> {
    pub quarter: Quarter,
    pub tone: Tone,
    pub epics: Vec<&'a Epic>,
}

/// Epics grouped under Q1..Q4, keeping collection order within each bucket
pub fn quarter_board(epics: &[Epic]) -> Vec<QuarterBucket<'_>> {
    Quarter::ALL
        .iter()
        .map(|&quarter| QuarterBucket {
            quarter,
            tone: quarter_tone(quarter),
            epics: epics.iter().filter(|e| e.quarter == quarter).collect(),
        })
        .collect()
}
