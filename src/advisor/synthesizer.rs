//! Response Synthesizer: turns a turn decision into the outward chat payload,
//! attaching the document preview, the saved document and mentor matches.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::document::{ContextPack, DocumentWriter};
use crate::error::ValidationError;
use crate::mentors::{explain, Mentor, MentorScorer};

use super::controller::{ChatRequest, PhaseController};
use super::decision::{Category, TurnDecision};
use super::phase::ConversationPhase;

/// Opening line of a preview reply.
pub const PREVIEW_HEADER: &str = "📄 Here's your **Mentor Context Pack** preview:";
const PREVIEW_FOOTER: &str = "✅ **Does this look good?** Or let me know what changes you'd like!";

/// Opening line of the reply on the finalizing turn.
pub const SAVED_HEADER: &str = "✅ **Document saved!**";
/// Opening line when finalization could not write the document.
pub const SAVE_FAILED_HEADER: &str = "⚠️ **Your Mentor Context Pack is final, but saving it failed.**";
const MENTOR_INTRO: &str = "🎯 Now let me recommend the perfect mentors for your situation...";

/// A recommended mentor with the reason it was picked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentorCard {
    #[serde(flatten)]
    pub mentor: Mentor,
    pub why_this_mentor: String,
}

/// Payload returned for every chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub cards: Vec<MentorCard>,
    pub conversation_state: ConversationPhase,
    pub message_count: usize,
    pub question_count: u8,
    pub category: Category,
    pub ready_for_document: bool,
    pub document_finalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_preview: Option<String>,
    pub show_review_buttons: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_saved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_error: Option<String>,
    pub show_mentors: bool,
}

impl ChatResponse {
    /// Reply-only payload for a decision.
    fn conversational(decision: &TurnDecision, message_count: usize) -> Self {
        Self {
            reply: decision.reply.clone(),
            cards: Vec::new(),
            conversation_state: decision.phase,
            message_count,
            question_count: decision.question_count,
            category: decision.category,
            ready_for_document: decision.ready_for_document(),
            document_finalized: decision.document_finalized(),
            document_preview: None,
            show_review_buttons: false,
            document_saved: None,
            document_path: None,
            document_error: None,
            show_mentors: false,
        }
    }
}

/// Orchestrates one chat turn end to end.
pub struct ResponseSynthesizer {
    controller: PhaseController,
    scorer: MentorScorer,
    writer: Arc<dyn DocumentWriter>,
}

impl ResponseSynthesizer {
    pub fn new(
        controller: PhaseController,
        scorer: MentorScorer,
        writer: Arc<dyn DocumentWriter>,
    ) -> Self {
        Self {
            controller,
            scorer,
            writer,
        }
    }

    pub fn controller(&self) -> &PhaseController {
        &self.controller
    }

    pub fn scorer(&self) -> &MentorScorer {
        &self.scorer
    }

    pub async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse, ValidationError> {
        let decision = self.controller.decide(request).await?;
        let mut response = ChatResponse::conversational(&decision, request.user_message_count());

        if decision.document_finalized() {
            self.finalize(request, &decision, &mut response).await?;
        } else if decision.phase == ConversationPhase::ReviewingDoc {
            let preview = ContextPack::build(&decision, request.user_messages()).render_preview();
            response.reply = format!("{PREVIEW_HEADER}\n\n{preview}\n\n{PREVIEW_FOOTER}");
            response.document_preview = Some(preview);
            response.show_review_buttons = true;
        }

        Ok(response)
    }

    /// Save the pack (best effort) and attach ranked mentors.
    async fn finalize(
        &self,
        request: &ChatRequest,
        decision: &TurnDecision,
        response: &mut ChatResponse,
    ) -> Result<(), ValidationError> {
        let pack = ContextPack::build(decision, request.user_messages());
        match self.writer.render_and_save(&pack, None).await {
            Ok(saved) => {
                let path = saved.path.display().to_string();
                response.reply = format!("{SAVED_HEADER} (`{path}`)\n\n{MENTOR_INTRO}");
                response.document_saved = Some(true);
                response.document_path = Some(path);
                response.document_preview = Some(saved.preview);
            }
            Err(e) => {
                warn!(error = %e, "Context pack could not be saved");
                response.reply = format!("{SAVE_FAILED_HEADER} ({e})\n\n{MENTOR_INTRO}");
                response.document_saved = Some(false);
                response.document_error = Some(e.to_string());
            }
        }

        let message = request.current_message()?;
        let query = format!("{} {}", message, decision.keywords.join(" "));
        let category = decision.category.as_str();
        let summary = decision.problem_summary.as_deref().unwrap_or_default();

        response.cards = self
            .scorer
            .rank(&query, category)
            .into_iter()
            .map(|mentor| MentorCard {
                why_this_mentor: explain(&mentor, category, summary),
                mentor,
            })
            .collect();
        response.show_mentors = true;

        info!(
            category,
            mentors = response.cards.len(),
            saved = response.document_saved.unwrap_or(false),
            "Context pack finalized"
        );
        Ok(())
    }
}
