//! Prompt text and request bodies for the chat-completions endpoint.

use serde::Serialize;
use serde_json::{json, Value};

use crate::catalog::product_by_id;
use crate::models::{Epic, StoryStatus};

use super::stream::ChatMessage;

/// Name of the forced tool call that returns generated stories
pub const GENERATE_TOOL: &str = "generate_user_stories";

/// Canned questions offered when a chat is empty
pub const SUGGESTION_CHIPS: [&str; 6] = [
    "Summarize roadmap status",
    "Identify at-risk epics",
    "Draft sprint goals",
    "Analyze story coverage",
    "Suggest epic priorities",
    "Write stakeholder update",
];

const STORY_WRITER_PROMPT: &str = r#"You are an expert agile product manager and user story writer specializing in financial technology and risk management software. Generate detailed, actionable user stories following best practices.

For each epic, generate 3-5 user stories with:
- Clear title
- User story format (As a [role], I want [feature], so that [benefit])
- 3-5 specific, testable acceptance criteria
- Story points estimation (1, 2, 3, 5, 8, or 13)
- Priority (Must, Should, Could, or Won't based on MoSCoW)
- Definition of Done items
- Relevant tags

Focus on financial risk, fund management, and quantitative analysis terminology where appropriate."#;

const ASSISTANT_PROMPT: &str = r#"You are an expert agile product manager and strategic advisor specializing in financial technology, quantitative risk management, and simulation software. You have deep expertise in:

- Agile methodologies (Scrum, SAFe, Kanban)
- Prioritization frameworks (MoSCoW, RICE, WSJF, ICE)
- User story writing and refinement
- Sprint planning and capacity management
- Risk analysis and dependency mapping
- Stakeholder communication and executive reporting
- Financial technology domain (fund management, risk analytics, market simulation)

You are embedded in a product roadmap tool and have full awareness of the current product's data. Use this context to provide specific, actionable advice grounded in the actual epics, stories, and timeline.

When responding:
- Be concise but thorough
- Use tables and lists for structured data
- Reference specific epic names and dates from the context
- Provide actionable recommendations, not generic advice
- Use markdown formatting for readability
- When analyzing risk, consider dependencies, timeline, and story completion"#;

/// The epic fields sent to the model when drafting its stories
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicBrief {
    pub title: String,
    pub description: String,
    pub quarter: String,
    pub sprint: String,
    pub customer: Option<String>,
    pub module: Option<String>,
}

impl From<&Epic> for EpicBrief {
    fn from(epic: &Epic) -> Self {
        Self {
            title: epic.title.clone(),
            description: epic.description.clone(),
            quarter: epic.quarter.to_string(),
            sprint: epic.sprint.clone(),
            customer: epic.customer.clone(),
            module: epic.module.as_ref().map(|m| m.to_string()),
        }
    }
}

/// A story-drafting request for one epic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub epic: EpicBrief,
    pub custom_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(epic: &Epic, custom_prompt: Option<&str>) -> Self {
        Self {
            epic: EpicBrief::from(epic),
            custom_prompt: custom_prompt
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from),
        }
    }
}

pub fn build_generation_prompt(request: &GenerationRequest) -> String {
    let epic = &request.epic;
    let description = if epic.description.is_empty() {
        "No description provided"
    } else {
        &epic.description
    };
    let extra = request
        .custom_prompt
        .as_ref()
        .map(|p| format!("Additional instructions: {}", p))
        .unwrap_or_default();

    format!(
        r#"Generate user stories for this epic:

Title: {}
Description: {}
Quarter: {}
Sprint: {}
Customer: {}
Module: {}

{}

Return a JSON object with a "stories" array containing the user stories."#,
        epic.title,
        description,
        epic.quarter,
        epic.sprint,
        epic.customer.as_deref().unwrap_or("General"),
        epic.module.as_deref().unwrap_or("General"),
        extra
    )
}

fn story_tool_schema() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": GENERATE_TOOL,
            "description": "Generate user stories for an epic",
            "parameters": {
                "type": "object",
                "properties": {
                    "stories": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": { "type": "string" },
                                "asA": { "type": "string" },
                                "iWant": { "type": "string" },
                                "soThat": { "type": "string" },
                                "acceptanceCriteria": { "type": "array", "items": { "type": "string" } },
                                "storyPoints": { "type": "number" },
                                "priority": { "type": "string", "enum": ["Must", "Should", "Could", "Won't"] },
                                "definitionOfDone": { "type": "array", "items": { "type": "string" } },
                                "tags": { "type": "array", "items": { "type": "string" } }
                            },
                            "required": ["title", "asA", "iWant", "soThat", "acceptanceCriteria", "storyPoints", "priority", "definitionOfDone"]
                        }
                    }
                },
                "required": ["stories"]
            }
        }
    })
}

/// Chat-completions body that forces the story tool call
pub fn generation_body(model: &str, request: &GenerationRequest) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": STORY_WRITER_PROMPT },
            { "role": "user", "content": build_generation_prompt(request) },
        ],
        "tools": [story_tool_schema()],
        "tool_choice": { "type": "function", "function": { "name": GENERATE_TOOL } },
    })
}

pub fn assistant_system_prompt(product_context: &str) -> String {
    let context = if product_context.trim().is_empty() {
        "No product context available."
    } else {
        product_context
    };
    format!("{}\n\nCURRENT PRODUCT CONTEXT:\n{}", ASSISTANT_PROMPT, context)
}

/// Streaming chat body: system prompt with product context, then the history
pub fn chat_body(model: &str, messages: &[ChatMessage], product_context: &str) -> Value {
    let mut all = vec![json!({ "role": "system", "content": assistant_system_prompt(product_context) })];
    all.extend(messages.iter().map(|m| json!(m)));
    json!({
        "model": model,
        "messages": all,
        "stream": true,
    })
}

/// Plain-text summary of a product's roadmap handed to the assistant
pub fn build_product_context(product_id: &str, epics: &[Epic]) -> String {
    let product = match product_by_id(product_id) {
        Some(p) if !epics.is_empty() => p,
        _ => return "No product data available.".to_string(),
    };

    let total_stories: usize = epics.iter().map(|e| e.stories.len()).sum();
    let mut lines = vec![
        format!("Product: {}", product.name),
        format!("Description: {}", product.description),
        format!("Total Epics: {}", epics.len()),
        format!("Total Stories: {}", total_stories),
        String::new(),
        "Epics Overview:".to_string(),
    ];

    for epic in epics {
        let stats = if epic.stories.is_empty() {
            "No stories".to_string()
        } else {
            format!(
                "{} stories ({} done, {} in progress)",
                epic.stories.len(),
                epic.count_with_status(StoryStatus::Done),
                epic.count_with_status(StoryStatus::InProgress)
            )
        };
        let dependencies = epic
            .dependencies
            .as_ref()
            .filter(|d| !d.is_empty())
            .map(|d| d.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", "))
            .unwrap_or_else(|| "none".to_string());

        lines.push(format!(
            "- {} | {} | Sprint: {} | Module: {} | Customer: {} | Dates: {} -> {} | {} | {} pts | Dependencies: {}",
            epic.title,
            epic.quarter,
            epic.sprint,
            epic.module.as_ref().map(|m| m.to_string()).unwrap_or_else(|| "N/A".into()),
            epic.customer.as_deref().unwrap_or("N/A"),
            epic.start_date.as_deref().unwrap_or("?"),
            epic.end_date.as_deref().unwrap_or("?"),
            stats,
            epic.story_points(),
            dependencies
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Module, Quarter, UserStory};

    fn epic() -> Epic {
        let mut epic = Epic::new("horizon", "Risk Engine".into(), Quarter::Q2);
        epic.sprint = "Sprint 4".into();
        epic.module = Some(Module::Model);
        epic
    }

    #[test]
    fn test_generation_prompt_defaults() {
        let request = GenerationRequest::new(&epic(), Some("   "));
        assert!(request.custom_prompt.is_none());

        let prompt = build_generation_prompt(&request);
        assert!(prompt.contains("Title: Risk Engine"));
        assert!(prompt.contains("Description: No description provided"));
        assert!(prompt.contains("Customer: General"));
        assert!(prompt.contains("Module: Model"));
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn test_generation_prompt_custom_instructions() {
        let request = GenerationRequest::new(&epic(), Some("Focus on auditability"));
        let prompt = build_generation_prompt(&request);
        assert!(prompt.contains("Additional instructions: Focus on auditability"));
    }

    #[test]
    fn test_generation_body_forces_tool() {
        let body = generation_body("m", &GenerationRequest::new(&epic(), None));
        assert_eq!(body["model"], "m");
        assert_eq!(body["tool_choice"]["function"]["name"], GENERATE_TOOL);
        assert_eq!(body["tools"][0]["function"]["name"], GENERATE_TOOL);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_chat_body() {
        let history = vec![ChatMessage::user("hi")];
        let body = chat_body("m", &history, "");
        assert_eq!(body["stream"], true);
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.ends_with("CURRENT PRODUCT CONTEXT:\nNo product context available."));
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_product_context() {
        assert_eq!(build_product_context("horizon", &[]), "No product data available.");
        assert_eq!(build_product_context("acme", &[epic()]), "No product data available.");

        let mut e = epic();
        let mut done = UserStory::new(e.id, "a".into());
        done.status = StoryStatus::Done;
        done.story_points = 5;
        e.stories.push(done);
        e.stories.push(UserStory::new(e.id, "b".into()));

        let context = build_product_context("horizon", &[e]);
        assert!(context.starts_with("Product: Horizon\nDescription: Financial Risk Modeling Suite"));
        assert!(context.contains("Total Stories: 2"));
        assert!(context.contains(
            "- Risk Engine | Q2 | Sprint: Sprint 4 | Module: Model | Customer: N/A | Dates: ? -> ? | 2 stories (1 done, 0 in progress) | 8 pts | Dependencies: none"
        ));
    }
}
