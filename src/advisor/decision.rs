//! Structured model output and the per-turn decision built from it.
//!
//! The model is asked for one JSON object per turn. Its shape is not trusted:
//! every field is optional with a documented default, unknown labels degrade
//! to defaults, and the object may be wrapped in prose or markdown.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::phase::ConversationPhase;

/// Reply used when the model gives no `reply` field.
pub const DEFAULT_REPLY: &str = "Tell me more about your challenge.";

/// Coarse topic label used for retrieval boosting and reason templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    Fundraising,
    Growth,
    #[serde(rename = "Product-Market Fit")]
    ProductMarketFit,
    #[default]
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fundraising => "Fundraising",
            Self::Growth => "Growth",
            Self::ProductMarketFit => "Product-Market Fit",
            Self::General => "General",
        }
    }

    /// Parse a label, case-insensitively. Unknown labels are `General`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "fundraising" => Self::Fundraising,
            "growth" => Self::Growth,
            "product-market fit" | "product market fit" | "pmf" => Self::ProductMarketFit,
            _ => Self::General,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model's JSON payload, parsed leniently. A field of the wrong type falls
/// back to its default instead of rejecting the whole payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDecision {
    #[serde(default, deserialize_with = "lenient_text")]
    pub reply: Option<String>,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Category,
    #[serde(default, deserialize_with = "lenient_phase")]
    pub conversation_state: Option<ConversationPhase>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub question_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub ready_for_document: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub document_finalized: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub problem_summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub insights: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_metrics")]
    pub metrics: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub questions_for_mentor: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_keywords")]
    pub keywords: Vec<String>,
}

impl RawDecision {
    /// Decision used when the model call itself failed.
    pub fn unavailable(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    /// Decision used when the model answered without a parseable payload:
    /// the raw text becomes the reply.
    pub fn from_raw_text(text: &str) -> Self {
        let trimmed = text.trim();
        Self {
            reply: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            ..Self::default()
        }
    }

    /// The phase the model is asking for, combining the explicit state with
    /// the two readiness flags.
    pub fn proposed_phase(&self) -> ConversationPhase {
        let mut proposed = self.conversation_state.unwrap_or_default();
        if self.ready_for_document {
            proposed = proposed.max(ConversationPhase::ReviewingDoc);
        }
        if self.document_finalized {
            proposed = ConversationPhase::Finalized;
        }
        proposed
    }
}

/// Parse the first JSON object embedded in `text` as a `RawDecision`.
pub fn parse_decision(text: &str) -> Result<RawDecision, serde_json::Error> {
    let candidate = extract_json_object(text).unwrap_or(text);
    serde_json::from_str(candidate)
}

/// Find the first balanced `{...}` block in LLM output that might contain
/// markdown or extra text. Braces inside JSON strings are ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The merged, deterministic decision for one user turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDecision {
    pub reply: String,
    pub category: Category,
    pub phase: ConversationPhase,
    /// Phase the conversation was in before this turn.
    pub previous_phase: ConversationPhase,
    pub question_count: u8,
    pub problem_summary: Option<String>,
    pub insights: Option<Vec<String>>,
    pub metrics: Option<BTreeMap<String, String>>,
    pub questions_for_mentor: Option<Vec<String>>,
    pub keywords: Vec<String>,
}

impl TurnDecision {
    /// A document exists (preview or final) from the review phase onward.
    pub fn ready_for_document(&self) -> bool {
        self.phase != ConversationPhase::GatheringInfo
    }

    /// True only on the turn that enters `Finalized`.
    pub fn document_finalized(&self) -> bool {
        self.phase == ConversationPhase::Finalized
            && self.previous_phase != ConversationPhase::Finalized
    }
}

fn lenient_category<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_str())
        .map(Category::from_label)
        .unwrap_or_default())
}

pub(crate) fn lenient_phase<'de, D>(deserializer: D) -> Result<Option<ConversationPhase>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(ConversationPhase::from_label))
}

/// Accepts `3`, `3.0` or `"3"`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Strings only; anything else reads as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Accepts `true`, `"true"`, `"yes"` and `1`. Everything else is `false`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes")
        }
        Some(serde_json::Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    })
}

/// A list of strings. A bare string is a one-item list; non-string items are
/// skipped; any other shape reads as absent.
fn lenient_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(string_list(value))
}

fn lenient_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(string_list(value).unwrap_or_default())
}

fn string_list(value: Option<serde_json::Value>) -> Option<Vec<String>> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(vec![s]),
        serde_json::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Metrics come back as `{"key": value}` where values may be numbers.
fn lenient_metrics<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Object(map)) = value else {
        return Ok(None);
    };
    Ok(Some(
        map.into_iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect(),
    ))
}
