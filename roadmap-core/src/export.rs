//! Story export for external project-management tools.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::models::{Epic, Priority, UserStory};

/// Target tool of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Jira,
    AzureDevOps,
    Trello,
    Asana,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Jira,
        ExportFormat::AzureDevOps,
        ExportFormat::Trello,
        ExportFormat::Asana,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ExportFormat::Jira => "jira",
            ExportFormat::AzureDevOps => "azure-devops",
            ExportFormat::Trello => "trello",
            ExportFormat::Asana => "asana",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Jira => "Jira",
            ExportFormat::AzureDevOps => "Azure DevOps",
            ExportFormat::Trello => "Trello",
            ExportFormat::Asana => "Asana",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExportFormat::Jira => "CSV format with custom fields",
            ExportFormat::AzureDevOps => "Work Item format",
            ExportFormat::Trello => "JSON import format",
            ExportFormat::Asana => "CSV format",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Trello => "json",
            _ => "csv",
        }
    }

    /// Suggested output file name
    pub fn file_name(self) -> String {
        let suffix = match self {
            ExportFormat::AzureDevOps => "azure",
            other => other.id(),
        };
        format!("roadmap-stories-{}.{}", suffix, self.extension())
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.id() == id.trim().to_lowercase())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub include_acceptance_criteria: bool,
    pub include_definition_of_done: bool,
    /// Epics to export; empty means every epic that has stories
    pub epic_ids: Vec<Uuid>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_acceptance_criteria: true,
            include_definition_of_done: true,
            epic_ids: Vec::new(),
        }
    }
}

/// Epics an export covers, in collection order
pub fn target_epics<'a>(epics: &'a [Epic], options: &ExportOptions) -> Vec<&'a Epic> {
    if options.epic_ids.is_empty() {
        epics.iter().filter(|e| !e.stories.is_empty()).collect()
    } else {
        epics
            .iter()
            .filter(|e| options.epic_ids.contains(&e.id))
            .collect()
    }
}

/// Number of stories an export will contain
pub fn story_count(epics: &[Epic], options: &ExportOptions) -> usize {
    target_epics(epics, options)
        .iter()
        .map(|e| e.stories.len())
        .sum()
}

/// Renders the export document for `format`
pub fn export(epics: &[Epic], format: ExportFormat, options: &ExportOptions) -> Result<String> {
    let targets = target_epics(epics, options);
    let content = match format {
        ExportFormat::Jira => jira_csv(&targets, options),
        ExportFormat::AzureDevOps => azure_devops_csv(&targets, options),
        ExportFormat::Trello => trello_json(&targets, options)?,
        ExportFormat::Asana => asana_csv(&targets),
    };
    Ok(content)
}

/// Writes the export to `path` and returns the number of stories written
pub fn export_to_file(
    epics: &[Epic],
    format: ExportFormat,
    options: &ExportOptions,
    path: &Path,
) -> Result<usize> {
    let content = export(epics, format, options)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write export to {:?}", path))?;

    let count = story_count(epics, options);
    info!(format = format.id(), stories = count, path = %path.display(), "exported stories");
    Ok(count)
}

/// Double-quoted CSV cell with embedded quotes doubled
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn jira_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::Must => "Highest",
        Priority::Should => "High",
        Priority::Could => "Medium",
        Priority::Wont => "Low",
    }
}

fn azure_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::Must => "1",
        Priority::Should => "2",
        Priority::Could => "3",
        Priority::Wont => "4",
    }
}

fn jira_csv(epics: &[&Epic], options: &ExportOptions) -> String {
    let mut headers = vec![
        "Summary",
        "Description",
        "Issue Type",
        "Priority",
        "Story Points",
        "Epic Link",
        "Sprint",
        "Labels",
    ];
    if options.include_acceptance_criteria {
        headers.push("Acceptance Criteria");
    }
    if options.include_definition_of_done {
        headers.push("Definition of Done");
    }

    let mut lines = vec![headers.join(",")];
    for (epic, story) in stories_of(epics) {
        let mut row = vec![
            quote(&story.title),
            quote(&story.narrative()),
            "Story".to_string(),
            jira_priority(story.priority).to_string(),
            story.story_points.to_string(),
            quote(&epic.title),
            epic.sprint.clone(),
            quote(&story.tags.join(", ")),
        ];
        if options.include_acceptance_criteria {
            row.push(quote(&story.acceptance_criteria.join("\n")));
        }
        if options.include_definition_of_done {
            row.push(quote(&story.definition_of_done.join("\n")));
        }
        lines.push(row.join(","));
    }
    lines.join("\n")
}

fn azure_devops_csv(epics: &[&Epic], options: &ExportOptions) -> String {
    let mut headers = vec![
        "Work Item Type",
        "Title",
        "Description",
        "Priority",
        "Story Points",
        "Area Path",
        "Iteration Path",
        "Tags",
    ];
    if options.include_acceptance_criteria {
        headers.push("Acceptance Criteria");
    }

    let mut lines = vec![headers.join(",")];
    for (epic, story) in stories_of(epics) {
        let description = format!(
            "<p><strong>As a</strong> {}, <strong>I want</strong> {}, <strong>so that</strong> {}</p>",
            story.as_a, story.i_want, story.so_that
        );
        let mut row = vec![
            "User Story".to_string(),
            quote(&story.title),
            quote(&description),
            azure_priority(story.priority).to_string(),
            story.story_points.to_string(),
            quote(&epic.title),
            epic.sprint.clone(),
            quote(&story.tags.join("; ")),
        ];
        if options.include_acceptance_criteria {
            let criteria = story
                .acceptance_criteria
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}. {}", i + 1, c))
                .collect::<Vec<_>>()
                .join("<br/>");
            row.push(quote(&criteria));
        }
        lines.push(row.join(","));
    }
    lines.join("\n")
}

fn asana_csv(epics: &[&Epic]) -> String {
    let mut lines = vec!["Name,Description,Section,Priority,Tags".to_string()];
    for (epic, story) in stories_of(epics) {
        let row = [
            quote(&story.title),
            quote(&story.narrative()),
            quote(&epic.title),
            story.priority.to_string(),
            quote(&story.tags.join(", ")),
        ];
        lines.push(row.join(","));
    }
    lines.join("\n")
}

#[derive(Debug, Serialize)]
struct TrelloCard {
    name: String,
    desc: String,
    labels: Vec<String>,
    pos: &'static str,
}

#[derive(Debug, Serialize)]
struct TrelloBoard {
    cards: Vec<TrelloCard>,
}

fn trello_json(epics: &[&Epic], options: &ExportOptions) -> Result<String> {
    let cards = stories_of(epics)
        .map(|(epic, story)| {
            let mut desc = format!(
                "**As a** {}, **I want** {}, **so that** {}\n\n",
                story.as_a, story.i_want, story.so_that
            );
            if options.include_acceptance_criteria {
                desc.push_str("**Acceptance Criteria:**\n");
                desc.push_str(&bullets(&story.acceptance_criteria));
                desc.push_str("\n\n");
            }
            if options.include_definition_of_done {
                desc.push_str("**Definition of Done:**\n");
                desc.push_str(&bullets(&story.definition_of_done));
            }

            let mut labels = vec![story.priority.to_string(), epic.quarter.to_string()];
            labels.extend(story.tags.iter().cloned());

            TrelloCard {
                name: story.title.clone(),
                desc,
                labels,
                pos: "bottom",
            }
        })
        .collect();

    Ok(serde_json::to_string_pretty(&TrelloBoard { cards })?)
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn stories_of<'a>(epics: &'a [&'a Epic]) -> impl Iterator<Item = (&'a Epic, &'a UserStory)> {
    epics
        .iter()
        .flat_map(|epic| epic.stories.iter().map(move |story| (*epic, story)))
}
