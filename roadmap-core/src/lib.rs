pub mod ai;
pub mod catalog;
pub mod config;
pub mod export;
pub mod import;
pub mod models;
pub mod palette;
pub mod progress;
pub mod storage;
pub mod store;
pub mod timeline;

// Re-export commonly used types
pub use ai::{AiClient, AiError, AiMode, ChatSession, StoryGenerator};
pub use catalog::{product_by_id, Product, ProductEpics, TemplateKind, PRODUCTS};
pub use config::{config_path, AiSettings, Config};
pub use export::{ExportFormat, ExportOptions};
pub use import::{ColumnMapping, ImportError, ImportField};
pub use models::{
    parse_calendar_date, Epic, Module, Priority, Quarter, RoadmapItem, StoryStatus, UserStory,
};
pub use palette::Tone;
pub use progress::{epic_progress, summarize, RoadmapSummary};
pub use storage::Storage;
pub use store::{EpicPatch, EpicStore, StoreError, StoryPatch};
pub use timeline::{BarGeometry, GanttChart, PortfolioChart, SprintBoard, TimelineHeader};
