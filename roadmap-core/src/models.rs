use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One of the four fixed 3-month buckets of a calendar year
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "String")]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    /// Parses an exact quarter label ("Q1".."Q4", case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "Q1" => Some(Quarter::Q1),
            "Q2" => Some(Quarter::Q2),
            "Q3" => Some(Quarter::Q3),
            "Q4" => Some(Quarter::Q4),
            _ => None,
        }
    }

    /// 0-based calendar month the quarter starts in
    pub fn start_month(self) -> u32 {
        match self {
            Quarter::Q1 => 0,
            Quarter::Q2 => 3,
            Quarter::Q3 => 6,
            Quarter::Q4 => 9,
        }
    }

    /// 0-based calendar month the quarter ends in
    pub fn end_month(self) -> u32 {
        self.start_month() + 2
    }

    /// 0-based position of the quarter within the year
    pub fn index(self) -> usize {
        self.start_month() as usize / 3
    }
}

impl From<String> for Quarter {
    fn from(s: String) -> Self {
        Quarter::parse(&s).unwrap_or(Quarter::Q1)
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quarter::Q1 => write!(f, "Q1"),
            Quarter::Q2 => write!(f, "Q2"),
            Quarter::Q3 => write!(f, "Q3"),
            Quarter::Q4 => write!(f, "Q4"),
        }
    }
}

/// Workflow status of a user story. Transitions are free-form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "String")]
pub enum StoryStatus {
    Draft,
    Ready,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
}

impl StoryStatus {
    pub const ALL: [StoryStatus; 4] = [
        StoryStatus::Draft,
        StoryStatus::Ready,
        StoryStatus::InProgress,
        StoryStatus::Done,
    ];

    /// Parses a status label, tolerating the spellings used by spreadsheets and the CLI
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "draft" => Some(StoryStatus::Draft),
            "ready" => Some(StoryStatus::Ready),
            "in progress" | "inprogress" => Some(StoryStatus::InProgress),
            "done" => Some(StoryStatus::Done),
            _ => None,
        }
    }
}

impl From<String> for StoryStatus {
    fn from(s: String) -> Self {
        StoryStatus::parse(&s).unwrap_or(StoryStatus::Draft)
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoryStatus::Draft => write!(f, "Draft"),
            StoryStatus::Ready => write!(f, "Ready"),
            StoryStatus::InProgress => write!(f, "In Progress"),
            StoryStatus::Done => write!(f, "Done"),
        }
    }
}

/// MoSCoW priority of a user story
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String")]
pub enum Priority {
    Must,
    Should,
    Could,
    #[serde(rename = "Won't")]
    Wont,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Must, Priority::Should, Priority::Could, Priority::Wont];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "must" => Some(Priority::Must),
            "should" => Some(Priority::Should),
            "could" => Some(Priority::Could),
            "won't" | "wont" => Some(Priority::Wont),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Should
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Priority::parse(&s).unwrap_or_default()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Must => write!(f, "Must"),
            Priority::Should => write!(f, "Should"),
            Priority::Could => write!(f, "Could"),
            Priority::Wont => write!(f, "Won't"),
        }
    }
}

/// Delivery area an epic belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Module {
    Model,
    Pipeline,
    Containers,
    Release,
    Documentation,
    /// Any other label carried over from an imported spreadsheet
    Other(String),
}

impl Module {
    /// Parse a module label; unknown labels are kept verbatim
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "model" => Module::Model,
            "pipeline" => Module::Pipeline,
            "containers" => Module::Containers,
            "release" => Module::Release,
            "documentation" => Module::Documentation,
            _ => Module::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for Module {
    fn from(s: String) -> Self {
        Module::parse(&s)
    }
}

impl From<Module> for String {
    fn from(m: Module) -> Self {
        m.to_string()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Module::Model => write!(f, "Model"),
            Module::Pipeline => write!(f, "Pipeline"),
            Module::Containers => write!(f, "Containers"),
            Module::Release => write!(f, "Release"),
            Module::Documentation => write!(f, "Documentation"),
            Module::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A fine-grained unit of work owned by an epic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStory {
    pub id: Uuid,

    /// Owning epic
    pub epic_id: Uuid,

    pub title: String,

    /// "As a ..." persona
    pub as_a: String,

    /// "I want ..." capability
    pub i_want: String,

    /// "so that ..." benefit
    pub so_that: String,

    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    #[serde(default)]
    pub story_points: u32,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub definition_of_done: Vec<String>,

    pub status: StoryStatus,

    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserStory {
    /// Creates a draft story under the given epic
    pub fn new(epic_id: Uuid, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            epic_id,
            title,
            as_a: String::new(),
            i_want: String::new(),
            so_that: String::new(),
            acceptance_criteria: Vec::new(),
            story_points: 3,
            priority: Priority::Should,
            definition_of_done: Vec::new(),
            status: StoryStatus::Draft,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The "As a / I want / so that" sentence
    pub fn narrative(&self) -> String {
        format!(
            "As a {}, I want {}, so that {}",
            self.as_a, self.i_want, self.so_that
        )
    }
}

/// A coarse-grained roadmap item spanning a quarter or an explicit date range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Epic {
    pub id: Uuid,

    /// Catalog product this epic is stored under
    pub product_id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub quarter: Quarter,

    #[serde(default)]
    pub sprint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,

    /// ISO date overriding the quarter-derived start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    /// ISO date overriding the quarter-derived end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<Module>,

    /// Ids of epics this one depends on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Uuid>>,

    /// Stories in insertion order
    #[serde(default)]
    pub stories: Vec<UserStory>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Epic {
    /// Creates an empty epic for a product
    pub fn new(product_id: impl Into<String>, title: String, quarter: Quarter) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            product_id: product_id.into(),
            title,
            description: String::new(),
            quarter,
            sprint: String::new(),
            customer: None,
            start_date: None,
            end_date: None,
            module: None,
            dependencies: None,
            stories: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Parsed start date; malformed values are treated as absent
    pub fn start(&self) -> Option<NaiveDate> {
        self.start_date.as_deref().and_then(parse_calendar_date)
    }

    /// Parsed end date; malformed values are treated as absent
    pub fn end(&self) -> Option<NaiveDate> {
        self.end_date.as_deref().and_then(parse_calendar_date)
    }

    pub fn story_points(&self) -> u32 {
        self.stories.iter().map(|s| s.story_points).sum()
    }

    pub fn count_with_status(&self, status: StoryStatus) -> usize {
        self.stories.iter().filter(|s| s.status == status).count()
    }
}

/// One imported spreadsheet row. Rows sharing `epic` collapse into a single Epic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapItem {
    pub epic: String,
    pub sprint: String,
    pub quarter: Quarter,
    pub feature: String,
    pub description: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
}

/// Parse a calendar date from the formats found in stored data and spreadsheets.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and RFC 3339 timestamps (the calendar
/// date as written is kept, no timezone shift). Returns `None` for anything else.
pub fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(d);
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_months() {
        assert_eq!(Quarter::Q1.start_month(), 0);
        assert_eq!(Quarter::Q3.start_month(), 6);
        assert_eq!(Quarter::Q4.end_month(), 11);
        assert_eq!(Quarter::Q2.index(), 1);
    }

    #[test]
    fn test_status_serializes_with_space() {
        let json = serde_json::to_string(&StoryStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let back: StoryStatus = serde_json::from_str("\"In Progress\"").unwrap();
        assert_eq!(back, StoryStatus::InProgress);
    }

    #[test]
    fn test_unknown_enum_values_fall_back() {
        let status: StoryStatus = serde_json::from_str("\"Blocked\"").unwrap();
        assert_eq!(status, StoryStatus::Draft);

        let priority: Priority = serde_json::from_str("\"Critical\"").unwrap();
        assert_eq!(priority, Priority::Should);

        let quarter: Quarter = serde_json::from_str("\"H2\"").unwrap();
        assert_eq!(quarter, Quarter::Q1);
    }

    #[test]
    fn test_priority_wont_round_trip() {
        let json = serde_json::to_string(&Priority::Wont).unwrap();
        assert_eq!(json, "\"Won't\"");
        assert_eq!(Priority::parse("wont"), Some(Priority::Wont));
    }

    #[test]
    fn test_module_keeps_unknown_labels() {
        assert_eq!(Module::parse("pipeline"), Module::Pipeline);
        assert_eq!(Module::parse("Risk"), Module::Other("Risk".to_string()));
        let json = serde_json::to_string(&Module::Other("Risk".into())).unwrap();
        assert_eq!(json, "\"Risk\"");
    }

    #[test]
    fn test_epic_json_uses_camel_case() {
        let mut epic = Epic::new("horizon", "Risk Engine".into(), Quarter::Q2);
        epic.start_date = Some("2026-04-01".into());
        let json = serde_json::to_string(&epic).unwrap();
        assert!(json.contains("\"productId\":\"horizon\""));
        assert!(json.contains("\"startDate\":\"2026-04-01\""));
        assert!(!json.contains("endDate"));

        let back: Epic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, epic);
    }

    #[test]
    fn test_parse_calendar_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 31);
        assert_eq!(parse_calendar_date("2026-03-31"), expected);
        assert_eq!(parse_calendar_date("2026/03/31"), expected);
        assert_eq!(parse_calendar_date("2026-03-31T10:00:00Z"), expected);
        assert_eq!(parse_calendar_date("31st of March"), None);
        assert_eq!(parse_calendar_date("2026-02-30"), None);
        assert_eq!(parse_calendar_date(""), None);
    }

    #[test]
    fn test_malformed_epic_dates_are_absent() {
        let mut epic = Epic::new("horizon", "E".into(), Quarter::Q1);
        epic.start_date = Some("not a date".into());
        assert!(epic.start().is_none());
    }

    #[test]
    fn test_story_narrative() {
        let mut story = UserStory::new(Uuid::new_v4(), "Login".into());
        story.as_a = "trader".into();
        story.i_want = "to sign in".into();
        story.so_that = "I can trade".into();
        assert_eq!(
            story.narrative(),
            "As a trader, I want to sign in, so that I can trade"
        );
    }
}
