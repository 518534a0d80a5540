//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::OneOrMany;
use rig::completion::{AssistantContent, CompletionModel, Message};
use tracing::debug;

use crate::error::LlmError;

use super::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

const PROVIDER: &str = "openai-compatible";

/// `LlmProvider` backed by any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Messages reshaped the way rig wants them: one preamble, prior turns, and
/// the prompt that closes the conversation.
#[derive(Debug, PartialEq)]
struct Conversation {
    preamble: Option<String>,
    history: Vec<ChatMessage>,
    prompt: String,
}

fn split_conversation(messages: &[ChatMessage]) -> Result<Conversation, LlmError> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let mut turns: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();

    let prompt = match turns.pop() {
        Some(last) => last.content,
        None => {
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: "request has no user or assistant messages".to_string(),
            });
        }
    };

    Ok(Conversation {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history: turns,
        prompt,
    })
}

fn to_rig(message: &ChatMessage) -> Message {
    match message.role {
        Role::Assistant => Message::assistant(message.content.clone()),
        Role::User | Role::System => Message::user(message.content.clone()),
    }
}

fn collect_text(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let conversation = split_conversation(&request.messages)?;

        let mut builder = self
            .model
            .completion_request(Message::user(conversation.prompt))
            .messages(conversation.history.iter().map(to_rig).collect());
        if let Some(preamble) = conversation.preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        let content = collect_text(&response.choice);
        let input_tokens = u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX);
        let output_tokens = u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX);
        debug!(
            model = %self.model_name,
            input_tokens,
            output_tokens,
            "Chat completion received"
        );

        let finish_reason = if content.is_empty() {
            FinishReason::Unknown
        } else {
            FinishReason::Stop
        };
        Ok(CompletionResponse {
            content,
            input_tokens,
            output_tokens,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_one_preamble() {
        let conversation = split_conversation(&[
            ChatMessage::system("You are an advisor."),
            ChatMessage::system("Reply in JSON."),
            ChatMessage::user("We need funding"),
            ChatMessage::assistant("How much runway do you have?"),
            ChatMessage::user("Six months"),
        ])
        .unwrap();

        assert_eq!(
            conversation.preamble.as_deref(),
            Some("You are an advisor.\n\nReply in JSON.")
        );
        assert_eq!(
            conversation.history,
            vec![
                ChatMessage::user("We need funding"),
                ChatMessage::assistant("How much runway do you have?"),
            ]
        );
        assert_eq!(conversation.prompt, "Six months");
    }

    #[test]
    fn conversation_without_system_has_no_preamble() {
        let conversation = split_conversation(&[ChatMessage::user("hello")]).unwrap();
        assert_eq!(conversation.preamble, None);
        assert!(conversation.history.is_empty());
        assert_eq!(conversation.prompt, "hello");
    }

    #[test]
    fn system_only_request_is_rejected() {
        let err = split_conversation(&[ChatMessage::system("rules")]).unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed { .. }));
    }
}
