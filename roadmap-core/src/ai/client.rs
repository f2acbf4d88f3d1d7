//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use reqwest::blocking::{Client, Response};
use serde_json::Value;
use std::io::Read;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ai::generator::{ChatAssistant, StoryGenerator};
use crate::ai::prompts::{self, GenerationRequest};
use crate::ai::responses::{self, GeneratedStory};
use crate::ai::stream::{ChatMessage, SseDecoder};
use crate::config::{AiSettings, Config};

/// Errors that can occur during AI operations
#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI integration not configured (set ai.endpoint or ROADMAP_AI_ENDPOINT)")]
    NotConfigured,

    #[error("Rate limit exceeded. Please wait a moment and try again.")]
    RateLimited,

    #[error("AI credits exhausted. Please add funds to continue.")]
    PaymentRequired,

    #[error("AI request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid response from AI: {0}")]
    InvalidResponse(String),

    #[error("Failed to reach the AI endpoint: {0}")]
    Transport(String),
}

impl AiError {
    /// Maps a non-success HTTP status and its body to an error
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => AiError::RateLimited,
            402 => AiError::PaymentRequired,
            _ => AiError::RequestFailed {
                status,
                message: responses::error_message(body),
            },
        }
    }
}

/// AI operation mode
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AiMode {
    /// POST to a chat-completions URL
    Http {
        endpoint: String,
        model: String,
        api_key: Option<String>,
    },
    /// AI features disabled
    #[default]
    Disabled,
}

impl AiMode {
    pub fn from_settings(settings: &AiSettings) -> Self {
        match settings.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => AiMode::Http {
                endpoint: endpoint.to_string(),
                model: settings.model.clone(),
                api_key: settings.api_key.clone(),
            },
            _ => AiMode::Disabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiClient {
    mode: AiMode,
    http: Client,
}

impl AiClient {
    pub fn with_mode(mode: AiMode) -> Self {
        Self {
            mode,
            http: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_mode(AiMode::from_settings(&config.ai))
    }

    pub fn is_available(&self) -> bool {
        matches!(self.mode, AiMode::Http { .. })
    }

    pub fn mode(&self) -> &AiMode {
        &self.mode
    }

    pub fn mode_description(&self) -> String {
        match &self.mode {
            AiMode::Http { endpoint, model, .. } => format!("{} via {}", model, endpoint),
            AiMode::Disabled => "Disabled".to_string(),
        }
    }

    fn model(&self) -> &str {
        match &self.mode {
            AiMode::Http { model, .. } => model,
            AiMode::Disabled => "",
        }
    }

    /// POSTs `body`; any non-2xx status becomes an error
    fn post(&self, body: &Value) -> Result<Response, AiError> {
        let AiMode::Http { endpoint, api_key, .. } = &self.mode else {
            return Err(AiError::NotConfigured);
        };

        let mut request = self.http.post(endpoint).json(body);
        if let Some(key) = api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| AiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "AI endpoint returned an error");
            return Err(AiError::from_status(status.as_u16(), &text));
        }
        Ok(response)
    }
}

impl StoryGenerator for AiClient {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedStory>, AiError> {
        debug!(epic = %request.epic.title, "requesting story drafts");
        let body = prompts::generation_body(self.model(), request);
        let response = self.post(&body)?;
        let value: Value = response
            .json()
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        Ok(responses::parse_completion(&value)?.stories)
    }
}

impl ChatAssistant for AiClient {
    fn stream_reply(
        &self,
        messages: &[ChatMessage],
        product_context: &str,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<(), AiError> {
        debug!(
            messages = messages.len(),
            context_len = product_context.len(),
            "starting chat stream"
        );
        let body = prompts::chat_body(self.model(), messages, product_context);
        let mut response = self.post(&body)?;

        let mut decoder = SseDecoder::new();
        let mut chunk = [0u8; 4096];
        while !decoder.is_done() {
            let n = response
                .read(&mut chunk)
                .map_err(|e| AiError::Transport(e.to_string()))?;
            if n == 0 {
                break;
            }
            for delta in decoder.push(&chunk[..n]) {
                on_delta(&delta);
            }
        }
        for delta in decoder.finish() {
            on_delta(&delta);
        }
        Ok(())
    }
}
