//! Session scribe: turns a mentoring-session transcript into an action plan.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

use super::decision::extract_json_object;
use super::prompts::SCRIBE_PROMPT;

const SCRIBE_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub action_plan: Vec<ActionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarity_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionPlan {
    /// Plan returned when the model cannot produce one.
    pub fn fallback() -> Self {
        let item = |task: &str, due: &str| ActionItem {
            task: task.to_string(),
            why: None,
            due: Some(due.to_string()),
            metric: None,
        };
        Self {
            action_plan: vec![
                item("Review pitch deck narrative", "2 days"),
                item("Identify 10 target VCs", "5 days"),
            ],
            clarity_score: None,
            reason: None,
        }
    }
}

pub struct SessionScribe {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl SessionScribe {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Extract action items from `transcript`. Never fails: model errors and
    /// unusable output give [`ActionPlan::fallback`].
    pub async fn analyze(&self, transcript: &str) -> ActionPlan {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SCRIBE_PROMPT),
            ChatMessage::user(transcript),
        ])
        .with_temperature(SCRIBE_TEMPERATURE);

        let content = match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(Ok(response)) => response.content,
            Ok(Err(e)) => {
                warn!(error = %e, "Scribe model call failed");
                return ActionPlan::fallback();
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Scribe model call timed out");
                return ActionPlan::fallback();
            }
        };

        let candidate = extract_json_object(&content).unwrap_or(&content);
        match serde_json::from_str::<ActionPlan>(candidate) {
            Ok(plan) if !plan.action_plan.is_empty() => plan,
            Ok(_) => {
                warn!("Scribe returned an empty action plan");
                ActionPlan::fallback()
            }
            Err(e) => {
                warn!(error = %e, "Scribe output is not an action plan");
                ActionPlan::fallback()
            }
        }
    }
}
