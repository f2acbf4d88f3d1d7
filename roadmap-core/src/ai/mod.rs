//! AI integration: drafting user stories for epics and a streamed product
//! assistant, both over an OpenAI-compatible chat-completions endpoint.

pub mod client;
pub mod generator;
pub mod prompts;
pub mod responses;
pub mod stream;

pub use client::{AiClient, AiError, AiMode};
pub use generator::{
    epics_without_stories, generate_batch, select_epics, BatchOutcome, ChatAssistant, EpicDraft,
    StoryGenerator,
};
pub use prompts::{build_product_context, GenerationRequest, SUGGESTION_CHIPS};
pub use responses::{GeneratedStories, GeneratedStory};
pub use stream::{ChatMessage, ChatRole, ChatSession, SseDecoder};
