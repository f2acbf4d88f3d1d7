//! Completion rollups over epics and their stories.
//!
//! Everything here is derived on demand from a snapshot of epics; nothing is
//! cached or persisted.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Epic, Quarter, StoryStatus};

/// Percentage of the epic's stories that are Done, rounded half-up; 0 without stories
pub fn epic_progress(epic: &Epic) -> u32 {
    percent(epic.count_with_status(StoryStatus::Done), epic.stories.len())
}

fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // round(part / total * 100) with half-up, in integers
    ((200 * part + total) / (2 * total)) as u32
}

pub fn total_stories(epics: &[Epic]) -> usize {
    epics.iter().map(|e| e.stories.len()).sum()
}

/// Story counts per status across all epics; statuses with no stories are absent
pub fn status_counts(epics: &[Epic]) -> BTreeMap<StoryStatus, usize> {
    let mut counts = BTreeMap::new();
    for story in epics.iter().flat_map(|e| &e.stories) {
        *counts.entry(story.status).or_insert(0) += 1;
    }
    counts
}

pub fn quarter_counts(epics: &[Epic]) -> BTreeMap<Quarter, usize> {
    let mut counts = BTreeMap::new();
    for epic in epics {
        *counts.entry(epic.quarter).or_insert(0) += 1;
    }
    counts
}

/// Distinct non-empty customers, sorted
pub fn customers(epics: &[Epic]) -> Vec<String> {
    epics
        .iter()
        .filter_map(|e| e.customer.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Dashboard figures for one product (or any set of epics)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapSummary {
    pub epic_count: usize,
    pub story_count: usize,
    pub done_count: usize,
    pub story_points: u32,
    pub status_counts: BTreeMap<StoryStatus, usize>,
    pub quarter_counts: BTreeMap<Quarter, usize>,
    pub customers: Vec<String>,
    pub stakeholder_count: usize,
    /// Done stories over all stories, 0..=100
    pub completion: u32,
}

pub fn summarize(epics: &[Epic]) -> RoadmapSummary {
    let story_count = total_stories(epics);
    let status_counts = status_counts(epics);
    let done_count = status_counts.get(&StoryStatus::Done).copied().unwrap_or(0);
    let customers = customers(epics);

    RoadmapSummary {
        epic_count: epics.len(),
        story_count,
        done_count,
        story_points: epics.iter().map(Epic::story_points).sum(),
        status_counts,
        quarter_counts: quarter_counts(epics),
        stakeholder_count: customers.len(),
        customers,
        completion: percent(done_count, story_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStory;

    fn epic_with(statuses: &[StoryStatus]) -> Epic {
        let mut epic = Epic::new("horizon", "Epic".into(), Quarter::Q1);
        for (i, status) in statuses.iter().enumerate() {
            let mut story = UserStory::new(epic.id, format!("Story {}", i));
            story.status = *status;
            epic.stories.push(story);
        }
        epic
    }

    #[test]
    fn test_epic_progress() {
        use StoryStatus::*;
        assert_eq!(epic_progress(&epic_with(&[])), 0);
        assert_eq!(epic_progress(&epic_with(&[Done, Draft, Draft, Ready])), 25);
        assert_eq!(epic_progress(&epic_with(&[Done, Done, Draft])), 67);
        assert_eq!(epic_progress(&epic_with(&[Done, Draft, Draft])), 33);
        assert_eq!(epic_progress(&epic_with(&[Done, Done])), 100);
    }

    #[test]
    fn test_progress_rounds_half_up() {
        use StoryStatus::*;
        // 1 of 8 = 12.5%
        let statuses = [Done, Draft, Draft, Draft, Draft, Draft, Draft, Draft];
        assert_eq!(epic_progress(&epic_with(&statuses)), 13);
    }

    #[test]
    fn test_summary_over_empty_input() {
        let summary = summarize(&[]);
        assert_eq!(summary.epic_count, 0);
        assert_eq!(summary.story_count, 0);
        assert_eq!(summary.completion, 0);
        assert!(summary.status_counts.is_empty());
        assert_eq!(summary.stakeholder_count, 0);
    }

    #[test]
    fn test_summary_counts() {
        use StoryStatus::*;
        let mut a = epic_with(&[Done, InProgress]);
        a.customer = Some("Acme Fund".into());
        let mut b = epic_with(&[Draft]);
        b.customer = Some("Acme Fund".into());
        b.quarter = Quarter::Q3;
        let mut c = epic_with(&[]);
        c.customer = Some("  ".into());

        let summary = summarize(&[a, b, c]);
        assert_eq!(summary.epic_count, 3);
        assert_eq!(summary.story_count, 3);
        assert_eq!(summary.done_count, 1);
        assert_eq!(summary.story_points, 9);
        assert_eq!(summary.status_counts.get(&InProgress), Some(&1));
        assert_eq!(summary.status_counts.get(&Ready), None);
        assert_eq!(summary.quarter_counts.get(&Quarter::Q1), Some(&2));
        assert_eq!(summary.customers, vec!["Acme Fund".to_string()]);
        assert_eq!(summary.stakeholder_count, 1);
        assert_eq!(summary.completion, 33);
    }
}
