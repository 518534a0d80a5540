//! Mentor Context Pack: the summary handed to a mentor before a session.
//!
//! The pack is rebuilt from the latest turn decision and the user's messages
//! whenever it is needed. It is never the source of truth.

pub mod html;
pub mod writer;

pub use writer::{DocumentWriter, FsDocumentWriter, SavedDocument};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::advisor::decision::{Category, TurnDecision};

/// Insights used when the model gave none.
pub const DEFAULT_INSIGHTS: &[&str] = &[
    "User is seeking expert guidance",
    "Problem requires specialized mentorship",
];

/// Mentor questions used when the model gave none.
pub const DEFAULT_QUESTIONS: &[&str] = &[
    "What specific challenges are you facing?",
    "What outcomes do you expect from this session?",
    "What constraints do you have (time, budget, resources)?",
];

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPack {
    pub user_summary: String,
    pub category: Category,
    pub insights: Vec<String>,
    pub metrics: BTreeMap<String, String>,
    pub questions_for_mentor: Vec<String>,
}

impl ContextPack {
    /// Build the pack from a decision, filling gaps from the transcript and
    /// the default lists.
    pub fn build<'a>(decision: &TurnDecision, user_messages: impl IntoIterator<Item = &'a str>) -> Self {
        let user_summary = match decision.problem_summary.as_deref().map(str::trim) {
            Some(summary) if !summary.is_empty() => summary.to_string(),
            _ => user_messages.into_iter().collect::<Vec<_>>().join(" "),
        };

        Self {
            user_summary,
            category: decision.category,
            insights: non_empty_or(decision.insights.as_ref(), DEFAULT_INSIGHTS),
            metrics: decision.metrics.clone().unwrap_or_default(),
            questions_for_mentor: non_empty_or(
                decision.questions_for_mentor.as_ref(),
                DEFAULT_QUESTIONS,
            ),
        }
    }

    /// Plain-text preview shown in the chat. Deterministic: the same pack
    /// always renders to the same text.
    pub fn render_preview(&self) -> String {
        let mut out = String::new();
        out.push_str("📋 MENTOR CONTEXT PACK\n");
        out.push_str(RULE);
        out.push('\n');
        out.push_str(&format!("Category: {}\n\n", self.category));

        out.push_str("📝 PROBLEM SUMMARY:\n");
        out.push_str(&self.user_summary);
        out.push_str("\n\n💡 KEY INSIGHTS:\n");
        for (i, insight) in self.insights.iter().enumerate() {
            out.push_str(&format!("  {}. {insight}\n", i + 1));
        }

        out.push_str("\n📊 METRICS:\n");
        if self.metrics.is_empty() {
            out.push_str("  (No metrics provided)\n");
        } else {
            for (key, value) in &self.metrics {
                out.push_str(&format!("  • {key}: {value}\n"));
            }
        }

        out.push_str("\n❓ QUESTIONS FOR MENTOR:\n");
        for question in &self.questions_for_mentor {
            out.push_str(&format!("  • {question}\n"));
        }
        out.push('\n');
        out.push_str(RULE);
        out
    }
}

fn non_empty_or(items: Option<&Vec<String>>, defaults: &[&str]) -> Vec<String> {
    match items {
        Some(items) if !items.is_empty() => items.clone(),
        _ => defaults.iter().map(|s| s.to_string()).collect(),
    }
}
