//! Provider-agnostic chat completion types and the `LlmProvider` trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    #[serde(alias = "bot")]
    Assistant,
}

/// A single chat message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request: ordered messages plus sampling options.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Unknown,
}

/// Text returned by the model.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: FinishReason,
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier used for requests and logs.
    fn model_name(&self) -> &str;

    /// Run one completion. Implementations do not retry.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_role_is_read_as_assistant() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role": "bot", "content": "hi"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(serde_json::to_value(msg.role).unwrap(), "assistant");
    }

    #[test]
    fn request_builder_sets_options() {
        let request = CompletionRequest::new(vec![ChatMessage::user("hello")])
            .with_temperature(0.3)
            .with_max_tokens(1500);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(1500));
    }
}
