//! Server-sent-event decoding for streamed chat replies, and the chat session
//! that accumulates them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::client::AiError;
use super::generator::ChatAssistant;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// Incremental decoder for an OpenAI-style `text/event-stream` body.
///
/// Bytes are fed in arbitrary chunks; complete `data:` lines yield the text
/// of `choices[0].delta.content`. A line whose JSON does not parse yet is put
/// back and retried once more bytes arrive. `data: [DONE]` ends the stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

enum LineOutcome {
    Skip,
    Delta(String),
    Done,
    Incomplete,
}

fn classify(line: &str) -> LineOutcome {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.starts_with(':') || line.trim().is_empty() {
        return LineOutcome::Skip;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();
    if payload == DONE_MARKER {
        return LineOutcome::Done;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => match value["choices"][0]["delta"]["content"].as_str() {
            Some(content) if !content.is_empty() => LineOutcome::Delta(content.to_string()),
            _ => LineOutcome::Skip,
        },
        Err(_) => LineOutcome::Incomplete,
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the end-of-stream marker has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feeds a chunk and returns the deltas completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut deltas = Vec::new();
        if self.done {
            return deltas;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line_bytes[..newline]).into_owned();

            match classify(&line) {
                LineOutcome::Skip => continue,
                LineOutcome::Delta(text) => deltas.push(text),
                LineOutcome::Done => {
                    self.done = true;
                    break;
                }
                LineOutcome::Incomplete => {
                    // Put the line back and wait for more input
                    let mut restored = line_bytes;
                    restored.extend_from_slice(&self.buffer);
                    self.buffer = restored;
                    break;
                }
            }
        }
        deltas
    }

    /// Drains whatever is left once the transport closes; unparsable leftovers
    /// are dropped.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned();
        if self.done {
            return Vec::new();
        }
        rest.split('\n')
            .filter_map(|line| match classify(line) {
                LineOutcome::Delta(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Conversation with the product assistant
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Latest assistant reply, if the conversation ends with one
    pub fn last_reply(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn push_user(&mut self, content: &str) {
        self.messages.push(ChatMessage::user(content.trim()));
    }

    /// Grows the trailing assistant message, starting one if needed
    pub fn append_assistant_delta(&mut self, delta: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == ChatRole::Assistant => last.content.push_str(delta),
            _ => self.messages.push(ChatMessage::assistant(delta)),
        }
    }

    /// Sends one user turn and streams the reply into the session.
    ///
    /// `on_delta` sees each fragment as it arrives. Blank input is ignored.
    /// On failure the user turn stays in the history with whatever part of the
    /// reply had already arrived.
    pub fn send<A, F>(
        &mut self,
        assistant: &A,
        content: &str,
        product_context: &str,
        mut on_delta: F,
    ) -> Result<(), AiError>
    where
        A: ChatAssistant + ?Sized,
        F: FnMut(&str),
    {
        if content.trim().is_empty() {
            return Ok(());
        }
        self.push_user(content);
        let history = self.messages.clone();
        debug!(messages = history.len(), "sending chat turn");

        assistant.stream_reply(&history, product_context, &mut |delta: &str| {
            self.append_assistant_delta(delta);
            on_delta(delta);
        })
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    #[test]
    fn test_decodes_events_across_chunk_boundaries() {
        let body = format!("{}{}data: [DONE]\n\n", event("Hel"), event("lo"));
        let bytes = body.as_bytes();
        let mut decoder = SseDecoder::new();

        let mut deltas = Vec::new();
        for chunk in bytes.chunks(7) {
            deltas.extend(decoder.push(chunk));
        }
        deltas.extend(decoder.finish());

        assert_eq!(deltas.concat(), "Hello");
        assert!(decoder.is_done());
    }

    #[test]
    fn test_skips_comments_and_other_fields() {
        let body = format!(": keep-alive\r\nevent: message\r\n{}", event("x"));
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(body.as_bytes()), vec!["x".to_string()]);
    }

    #[test]
    fn test_role_only_delta_yields_nothing() {
        let mut decoder = SseDecoder::new();
        let line = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n";
        assert!(decoder.push(line.as_bytes()).is_empty());
    }

    #[test]
    fn test_nothing_after_done() {
        let mut decoder = SseDecoder::new();
        let body = format!("data: [DONE]\n{}", event("late"));
        assert!(decoder.push(body.as_bytes()).is_empty());
        assert!(decoder.push(event("later").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_incomplete_json_is_retried_then_dropped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"choices\":\n").is_empty());
        // The broken line blocks until the transport closes
        assert!(decoder.push(event("ok").as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec!["ok".to_string()]);
    }

    #[test]
    fn test_final_flush_without_trailing_newline() {
        let mut decoder = SseDecoder::new();
        let body = event("tail");
        let without_newlines = body.trim_end();
        assert!(decoder.push(without_newlines.as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec!["tail".to_string()]);
    }

    #[test]
    fn test_session_accumulates_single_reply() {
        let mut session = ChatSession::new();
        session.push_user("  Summarize roadmap status ");
        session.append_assistant_delta("All ");
        session.append_assistant_delta("green.");

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].content, "Summarize roadmap status");
        assert_eq!(session.last_reply(), Some("All green."));

        session.push_user("More?");
        assert_eq!(session.last_reply(), None);
        session.append_assistant_delta("Yes");
        assert_eq!(session.messages().len(), 4);

        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::assistant("x")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
