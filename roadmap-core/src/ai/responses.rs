//! Parsing of model replies into drafted stories.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::ai::client::AiError;
use crate::models::{Priority, StoryStatus, UserStory};

/// Points given to a drafted story that came back without an estimate
pub const DEFAULT_STORY_POINTS: u32 = 3;

/// A story as drafted by the model, before it is attached to an epic
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedStory {
    pub title: String,
    #[serde(default)]
    pub as_a: String,
    #[serde(default)]
    pub i_want: String,
    #[serde(default)]
    pub so_that: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub story_points: Option<f64>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub definition_of_done: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GeneratedStory {
    /// Turns the draft into a Draft-status story owned by `epic_id`
    pub fn into_user_story(self, epic_id: Uuid) -> UserStory {
        let now = Utc::now();
        let story_points = match self.story_points {
            Some(p) if p.is_finite() && p >= 0.5 => p.round() as u32,
            _ => DEFAULT_STORY_POINTS,
        };
        UserStory {
            id: Uuid::new_v4(),
            epic_id,
            title: self.title,
            as_a: self.as_a,
            i_want: self.i_want,
            so_that: self.so_that,
            acceptance_criteria: self.acceptance_criteria,
            story_points,
            priority: self.priority.unwrap_or_default(),
            definition_of_done: self.definition_of_done,
            status: StoryStatus::Draft,
            tags: self.tags,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedStories {
    pub stories: Vec<GeneratedStory>,
}

/// Extract JSON from a response that may contain markdown code blocks
fn extract_json(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim();
        }
    }

    if let Some(start) = response.find("```") {
        let code_start = start + 3;
        // Skip language identifier if present
        let json_start = match response[code_start..].find('\n') {
            Some(newline) => code_start + newline + 1,
            None => code_start,
        };
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim();
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if end > start {
            return &response[start..=end];
        }
    }

    response.trim()
}

/// Parse a `{"stories": [...]}` document, tolerating surrounding prose
pub fn parse_stories(text: &str) -> Result<GeneratedStories, AiError> {
    let json_str = extract_json(text);
    serde_json::from_str(json_str).map_err(|e| {
        AiError::InvalidResponse(format!(
            "Failed to parse generated stories: {}. JSON: {}",
            e,
            json_str.chars().take(200).collect::<String>()
        ))
    })
}

/// Parse a chat-completions reply: the forced tool call's arguments, or the
/// message content when the model answered in plain text.
pub fn parse_completion(body: &Value) -> Result<GeneratedStories, AiError> {
    let message = &body["choices"][0]["message"];

    if let Some(arguments) = message["tool_calls"][0]["function"]["arguments"].as_str() {
        return parse_stories(arguments);
    }
    if let Some(content) = message["content"].as_str().filter(|c| !c.trim().is_empty()) {
        return parse_stories(content);
    }

    Err(AiError::InvalidResponse(
        "Response carried neither a tool call nor content".to_string(),
    ))
}

/// Best human-readable message from an error body
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let error = &value["error"];
        if let Some(msg) = error.as_str().or_else(|| error["message"].as_str()) {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Failed to get a response".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STORIES: &str = r#"{"stories": [{
        "title": "Nightly VaR",
        "asA": "risk analyst",
        "iWant": "VaR computed nightly",
        "soThat": "limits are checked",
        "acceptanceCriteria": ["Runs at 02:00"],
        "storyPoints": 5,
        "priority": "Must",
        "definitionOfDone": ["Reviewed"],
        "tags": ["risk"]
    }]}"#;

    #[test]
    fn test_parse_tool_call_arguments() {
        let body = json!({
            "choices": [{ "message": { "tool_calls": [{ "function": {
                "name": "generate_user_stories",
                "arguments": STORIES
            }}]}}]
        });
        let parsed = parse_completion(&body).unwrap();
        assert_eq!(parsed.stories.len(), 1);
        assert_eq!(parsed.stories[0].priority, Some(Priority::Must));
        assert_eq!(parsed.stories[0].story_points, Some(5.0));
    }

    #[test]
    fn test_parse_content_in_code_block() {
        let content = format!("Here you go:\n```json\n{}\n```\nEnjoy.", STORIES);
        let body = json!({ "choices": [{ "message": { "content": content } }] });
        let parsed = parse_completion(&body).unwrap();
        assert_eq!(parsed.stories[0].title, "Nightly VaR");
    }

    #[test]
    fn test_missing_payload_is_invalid() {
        let body = json!({ "choices": [{ "message": { "content": "" } }] });
        assert!(matches!(parse_completion(&body), Err(AiError::InvalidResponse(_))));
        assert!(matches!(parse_stories("not json"), Err(AiError::InvalidResponse(_))));
    }

    #[test]
    fn test_defaults_when_converting() {
        let draft: GeneratedStory = serde_json::from_str(
            r#"{"title": "Bare", "storyPoints": 0, "priority": "Someday"}"#,
        )
        .unwrap();
        let epic_id = Uuid::new_v4();
        let story = draft.into_user_story(epic_id);

        assert_eq!(story.epic_id, epic_id);
        assert_eq!(story.story_points, DEFAULT_STORY_POINTS);
        assert_eq!(story.priority, Priority::Should);
        assert_eq!(story.status, StoryStatus::Draft);
        assert!(story.acceptance_criteria.is_empty());
        assert!(story.tags.is_empty());
    }

    #[test]
    fn test_fractional_points_round() {
        let draft: GeneratedStory =
            serde_json::from_str(r#"{"title": "x", "storyPoints": 7.6}"#).unwrap();
        assert_eq!(draft.into_user_story(Uuid::new_v4()).story_points, 8);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"error": "AI gateway error"}"#), "AI gateway error");
        assert_eq!(error_message(r#"{"error": {"message": "bad model"}}"#), "bad model");
        assert_eq!(error_message("upstream down"), "upstream down");
        assert_eq!(error_message(""), "Failed to get a response");
    }
}
