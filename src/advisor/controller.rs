//! Phase Controller: one model call per user turn, merged with deterministic
//! overrides into a `TurnDecision`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AdvisorConfig;
use crate::error::{LlmError, ValidationError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, Role};

use super::decision::{
    lenient_phase, parse_decision, Category, RawDecision, TurnDecision, DEFAULT_REPLY,
};
use super::phase::ConversationPhase;
use super::prompts::{build_system_prompt, TurnContext};
use super::signals::{category_from_keywords, find_done_signal};
use super::synthesizer::{PREVIEW_HEADER, SAVED_HEADER, SAVE_FAILED_HEADER};

/// Reply sent when the model call fails or times out.
pub const FALLBACK_REPLY: &str =
    "I'm having trouble processing. Could you describe your main challenge in a few sentences?";

/// One inbound chat turn: the full history travels with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub file_context: Option<String>,
    /// Phase returned on the previous turn, echoed back by the client.
    #[serde(default, deserialize_with = "lenient_phase")]
    pub conversation_state: Option<ConversationPhase>,
}

impl ChatRequest {
    pub fn new(history: Vec<ChatMessage>) -> Self {
        Self {
            history,
            file_context: None,
            conversation_state: None,
        }
    }

    pub fn with_state(mut self, phase: ConversationPhase) -> Self {
        self.conversation_state = Some(phase);
        self
    }

    pub fn with_file_context(mut self, context: impl Into<String>) -> Self {
        self.file_context = Some(context.into());
        self
    }

    /// The message being answered. The history must end with a user turn.
    pub fn current_message(&self) -> Result<&str, ValidationError> {
        let last = self.history.last().ok_or(ValidationError::EmptyHistory)?;
        if last.role != Role::User {
            return Err(ValidationError::LastTurnNotFromUser);
        }
        Ok(&last.content)
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &str> {
        self.history
            .iter()
            .filter(|turn| turn.role == Role::User)
            .map(|turn| turn.content.as_str())
    }

    pub fn user_message_count(&self) -> usize {
        self.user_messages().count()
    }

    /// Phase the conversation is in before this turn.
    ///
    /// Uses the echoed `conversation_state` when present. Otherwise the phase
    /// is recovered from the assistant replies already in the history.
    pub fn previous_phase(&self) -> ConversationPhase {
        if let Some(phase) = self.conversation_state {
            return phase;
        }
        self.history
            .iter()
            .filter(|turn| turn.role == Role::Assistant)
            .map(|turn| {
                let content = turn.content.trim_start();
                if content.starts_with(SAVED_HEADER) || content.starts_with(SAVE_FAILED_HEADER) {
                    ConversationPhase::Finalized
                } else if content.starts_with(PREVIEW_HEADER) {
                    ConversationPhase::ReviewingDoc
                } else {
                    ConversationPhase::GatheringInfo
                }
            })
            .max()
            .unwrap_or_default()
    }
}

/// Why the model's answer could not be used as-is.
#[derive(Debug, thiserror::Error)]
pub enum ModelFailure {
    #[error("model unavailable: {0}")]
    Unavailable(#[from] LlmError),

    #[error("malformed model output: {reason}")]
    Malformed { raw: String, reason: String },
}

impl ModelFailure {
    /// The decision the conversation continues with.
    pub fn into_decision(self) -> RawDecision {
        match self {
            Self::Unavailable(_) => RawDecision::unavailable(FALLBACK_REPLY),
            Self::Malformed { raw, .. } => RawDecision::from_raw_text(&raw),
        }
    }
}

/// Facts about the current turn that do not come from the model.
#[derive(Debug, Clone, Copy)]
struct TurnFacts<'a> {
    message: &'a str,
    user_message_count: usize,
    previous_phase: ConversationPhase,
    done_signal: Option<&'static str>,
}

/// Decides the phase, flags and question count for each user turn.
pub struct PhaseController {
    llm: Arc<dyn LlmProvider>,
    config: AdvisorConfig,
}

impl PhaseController {
    pub fn new(llm: Arc<dyn LlmProvider>, config: AdvisorConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Produce the decision for the latest user turn.
    ///
    /// Only a malformed request is an error. Model failures are absorbed into
    /// a fallback decision so the user always gets a reply.
    pub async fn decide(&self, request: &ChatRequest) -> Result<TurnDecision, ValidationError> {
        let message = request.current_message()?;
        let facts = TurnFacts {
            message,
            user_message_count: request.user_message_count(),
            previous_phase: request.previous_phase(),
            done_signal: find_done_signal(message, self.config.signal_matching),
        };

        let system = build_system_prompt(&TurnContext {
            user_message_count: facts.user_message_count,
            force_document: facts.user_message_count >= self.config.max_questions,
            user_satisfied: facts.done_signal.is_some(),
            file_context: request.file_context.as_deref(),
            file_context_limit: self.config.file_context_limit,
        });

        let raw = match self.consult_model(system, &request.history).await {
            Ok(raw) => raw,
            Err(failure) => {
                warn!(error = %failure, "Falling back from model output");
                failure.into_decision()
            }
        };

        let decision = self.resolve(raw, &facts);
        info!(
            n = facts.user_message_count,
            previous = %facts.previous_phase,
            phase = %decision.phase,
            category = %decision.category,
            "Turn decided"
        );
        Ok(decision)
    }

    async fn consult_model(
        &self,
        system: String,
        history: &[ChatMessage],
    ) -> Result<RawDecision, ModelFailure> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(history.iter().filter(|t| t.role != Role::System).cloned());

        let request = CompletionRequest::new(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let response = tokio::time::timeout(self.config.llm_timeout, self.llm.complete(request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout: self.config.llm_timeout,
            })??;

        parse_decision(&response.content).map_err(|e| ModelFailure::Malformed {
            raw: response.content.clone(),
            reason: e.to_string(),
        })
    }

    /// Merge the model's raw decision with the deterministic rules.
    fn resolve(&self, raw: RawDecision, facts: &TurnFacts<'_>) -> TurnDecision {
        let proposed = raw.proposed_phase();
        if proposed < facts.previous_phase {
            debug!(
                proposed = %proposed,
                current = %facts.previous_phase,
                "Ignoring backward phase proposal"
            );
        }
        let mut phase = facts.previous_phase.step_toward(proposed);

        if facts.user_message_count >= self.config.max_questions
            && phase == ConversationPhase::GatheringInfo
        {
            info!(n = facts.user_message_count, "Question budget spent, forcing document review");
            phase = ConversationPhase::ReviewingDoc;
        }

        if let Some(signal) = facts.done_signal
            && phase == ConversationPhase::ReviewingDoc
        {
            info!(signal, "Done-signal during review, finalizing document");
            phase = ConversationPhase::Finalized;
        }

        let category = match raw.category {
            Category::General => category_from_keywords(facts.message),
            other => other,
        };

        let max = self.config.max_questions.clamp(1, u8::MAX as usize) as i64;
        let question_count = raw
            .question_count
            .map(|q| q.clamp(1, max))
            .unwrap_or_else(|| (facts.user_message_count as i64).clamp(1, max)) as u8;

        let reply = raw
            .reply
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REPLY.to_string());

        TurnDecision {
            reply,
            category,
            phase,
            previous_phase: facts.previous_phase,
            question_count,
            problem_summary: raw.problem_summary,
            insights: raw.insights,
            metrics: raw.metrics,
            questions_for_mentor: raw.questions_for_mentor,
            keywords: raw.keywords,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::advisor::signals::DONE_SIGNALS;
    use crate::llm::{CompletionResponse, FinishReason};

    /// Provider that replays a fixed answer and records requests.
    pub(crate) struct ScriptedLlm {
        answer: Result<String, String>,
        delay: Option<Duration>,
        pub(crate) requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub(crate) fn answering(text: &str) -> Self {
            Self {
                answer: Ok(text.to_string()),
                delay: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                answer: Err("connection refused".to_string()),
                delay: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn slow(text: &str, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::answering(text)
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.answer {
                Ok(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: FinishReason::Stop,
                }),
                Err(reason) => Err(LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    reason: reason.clone(),
                }),
            }
        }
    }

    fn scripted_controller(llm: ScriptedLlm) -> (PhaseController, Arc<ScriptedLlm>) {
        let llm = Arc::new(llm);
        (
            PhaseController::new(llm.clone(), AdvisorConfig::default()),
            llm,
        )
    }

    /// `count` user turns, each followed by an assistant turn except the last.
    fn history(count: usize, last: &str) -> Vec<ChatMessage> {
        let mut turns = Vec::new();
        for i in 1..count {
            turns.push(ChatMessage::user(format!("answer {i}")));
            turns.push(ChatMessage::assistant(format!("question {i}")));
        }
        turns.push(ChatMessage::user(last));
        turns
    }

    const GATHERING: &str = r#"{"reply": "What is your runway?", "category": "General",
        "conversation_state": "gathering_info", "ready_for_document": false}"#;

    #[tokio::test]
    async fn empty_history_is_rejected() {
        let (controller, llm) = scripted_controller(ScriptedLlm::answering(GATHERING));
        let err = controller.decide(&ChatRequest::new(vec![])).await.unwrap_err();
        assert_eq!(err, ValidationError::EmptyHistory);
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_turn_must_be_from_user() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(GATHERING));
        let request = ChatRequest::new(vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ]);
        assert_eq!(
            controller.decide(&request).await.unwrap_err(),
            ValidationError::LastTurnNotFromUser
        );
    }

    #[tokio::test]
    async fn pmf_message_gets_fallback_category() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(GATHERING));
        let request = ChatRequest::new(history(1, "We're pre-revenue, need help validating PMF"));
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.category, Category::ProductMarketFit);
        assert_eq!(decision.phase, ConversationPhase::GatheringInfo);
        assert!(!decision.ready_for_document());
        assert_eq!(decision.question_count, 1);
        assert_eq!(decision.reply, "What is your runway?");
    }

    #[tokio::test]
    async fn model_category_is_kept() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(
            r#"{"reply": "ok", "category": "Growth"}"#,
        ));
        let request = ChatRequest::new(history(1, "How do I pitch investors?"));
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.category, Category::Growth);
    }

    #[tokio::test]
    async fn seventh_turn_forces_review() {
        let (controller, llm) = scripted_controller(ScriptedLlm::answering(GATHERING));
        let request = ChatRequest::new(history(7, "Our burn is 40k a month"));
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.phase, ConversationPhase::ReviewingDoc);
        assert!(decision.ready_for_document());
        assert!(!decision.document_finalized());
        assert_eq!(decision.question_count, 7);

        let requests = llm.requests.lock().unwrap();
        let system = &requests[0].messages[0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("This is user message #7."));
        assert!(system.content.contains("You MUST now generate the document."));
    }

    #[tokio::test]
    async fn turn_count_forcing_holds_past_seven() {
        let (controller, _) = scripted_controller(ScriptedLlm::failing());
        for n in 7..=10 {
            let request = ChatRequest::new(history(n, "more detail"));
            let decision = controller.decide(&request).await.unwrap();
            assert_eq!(decision.phase, ConversationPhase::ReviewingDoc, "n = {n}");
        }
    }

    #[tokio::test]
    async fn done_signal_in_review_finalizes() {
        let (controller, llm) = scripted_controller(ScriptedLlm::answering(
            r#"{"reply": "Great", "conversation_state": "reviewing_doc", "ready_for_document": true}"#,
        ));
        let request = ChatRequest::new(history(4, "looks good, proceed"))
            .with_state(ConversationPhase::ReviewingDoc);
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.phase, ConversationPhase::Finalized);
        assert!(decision.document_finalized());

        let requests = llm.requests.lock().unwrap();
        assert!(requests[0].messages[0]
            .content
            .contains("User indicated they're satisfied. Set document_finalized=true."));
    }

    #[tokio::test]
    async fn every_done_signal_finalizes_from_review() {
        let (controller, _) = scripted_controller(ScriptedLlm::failing());
        for signal in DONE_SIGNALS {
            let request =
                ChatRequest::new(history(3, signal)).with_state(ConversationPhase::ReviewingDoc);
            let decision = controller.decide(&request).await.unwrap();
            assert_eq!(decision.phase, ConversationPhase::Finalized, "signal '{signal}'");
        }
    }

    #[tokio::test]
    async fn done_signal_with_ready_model_finalizes_same_turn() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(
            r#"{"reply": "Here it is", "conversation_state": "reviewing_doc", "ready_for_document": true}"#,
        ));
        let request = ChatRequest::new(history(3, "yes, that is our situation"));
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.previous_phase, ConversationPhase::GatheringInfo);
        assert_eq!(decision.phase, ConversationPhase::Finalized);
        assert!(decision.document_finalized());
    }

    #[tokio::test]
    async fn done_signal_on_forced_turn_finalizes() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(GATHERING));
        let request = ChatRequest::new(history(7, "looks good, proceed"));
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.phase, ConversationPhase::Finalized);
        assert!(decision.document_finalized());
    }

    #[tokio::test]
    async fn done_signal_while_gathering_is_ignored() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(GATHERING));
        let request = ChatRequest::new(history(2, "yes, we have paying customers"));
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.phase, ConversationPhase::GatheringInfo);
        assert!(!decision.document_finalized());
    }

    #[tokio::test]
    async fn edit_request_keeps_review() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(
            r#"{"reply": "Updated", "conversation_state": "gathering_info"}"#,
        ));
        let request = ChatRequest::new(history(5, "Please change the MRR to 12k"))
            .with_state(ConversationPhase::ReviewingDoc);
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.phase, ConversationPhase::ReviewingDoc);
        assert!(decision.ready_for_document());
    }

    #[tokio::test]
    async fn model_cannot_skip_review() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(
            r#"{"reply": "Saved", "document_finalized": true}"#,
        ));
        let decision = controller
            .decide(&ChatRequest::new(history(2, "we sell to SMBs")))
            .await
            .unwrap();
        assert_eq!(decision.phase, ConversationPhase::ReviewingDoc);
        assert!(!decision.document_finalized());
    }

    #[tokio::test]
    async fn turns_after_finalization_do_not_refinalize() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(
            r#"{"reply": "Anything else?", "document_finalized": true}"#,
        ));
        let request =
            ChatRequest::new(history(6, "great, thanks")).with_state(ConversationPhase::Finalized);
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.phase, ConversationPhase::Finalized);
        assert!(!decision.document_finalized());
    }

    #[tokio::test]
    async fn model_failure_falls_back() {
        let (controller, _) = scripted_controller(ScriptedLlm::failing());
        let decision = controller
            .decide(&ChatRequest::new(history(1, "I need to raise a seed round")))
            .await
            .unwrap();
        assert_eq!(decision.reply, FALLBACK_REPLY);
        assert_eq!(decision.phase, ConversationPhase::GatheringInfo);
        assert_eq!(decision.category, Category::Fundraising);
    }

    #[tokio::test]
    async fn model_failure_keeps_review_phase() {
        let (controller, _) = scripted_controller(ScriptedLlm::failing());
        let request = ChatRequest::new(history(4, "make the summary shorter"))
            .with_state(ConversationPhase::ReviewingDoc);
        let decision = controller.decide(&request).await.unwrap();
        assert_eq!(decision.phase, ConversationPhase::ReviewingDoc);
        assert_eq!(decision.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn slow_model_times_out_to_fallback() {
        let llm = Arc::new(ScriptedLlm::slow(GATHERING, Duration::from_secs(5)));
        let config = AdvisorConfig {
            llm_timeout: Duration::from_millis(50),
            ..AdvisorConfig::default()
        };
        let controller = PhaseController::new(llm, config);
        let decision = controller
            .decide(&ChatRequest::new(history(1, "hello")))
            .await
            .unwrap();
        assert_eq!(decision.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn malformed_output_becomes_reply() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(
            "Sure, tell me about your customers.",
        ));
        let decision = controller
            .decide(&ChatRequest::new(history(2, "we do B2B SaaS")))
            .await
            .unwrap();
        assert_eq!(decision.reply, "Sure, tell me about your customers.");
        assert_eq!(decision.phase, ConversationPhase::GatheringInfo);
        assert!(decision.keywords.is_empty());
    }

    #[tokio::test]
    async fn question_count_is_clamped() {
        let (controller, _) = scripted_controller(ScriptedLlm::answering(
            r#"{"reply": "ok", "question_count": 42}"#,
        ));
        let decision = controller
            .decide(&ChatRequest::new(history(2, "hi")))
            .await
            .unwrap();
        assert_eq!(decision.question_count, 7);

        let (controller, _) = scripted_controller(ScriptedLlm::answering(
            r#"{"reply": "ok", "question_count": -3}"#,
        ));
        let decision = controller
            .decide(&ChatRequest::new(history(2, "hi")))
            .await
            .unwrap();
        assert_eq!(decision.question_count, 1);
    }

    #[tokio::test]
    async fn history_is_forwarded_after_system_prompt() {
        let (controller, llm) = scripted_controller(ScriptedLlm::answering(GATHERING));
        let request = ChatRequest::new(history(2, "second answer"))
            .with_file_context("Revenue: 10k MRR");
        controller.decide(&request).await.unwrap();

        let requests = llm.requests.lock().unwrap();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 4);
        assert!(messages[0].content.contains("Revenue: 10k MRR"));
        assert_eq!(messages[3].content, "second answer");
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[0].max_tokens, Some(1500));
    }

    #[test]
    fn previous_phase_is_recovered_from_history() {
        let mut turns = history(3, "looks good");
        assert_eq!(
            ChatRequest::new(turns.clone()).previous_phase(),
            ConversationPhase::GatheringInfo
        );

        turns.insert(
            turns.len() - 1,
            ChatMessage::assistant(format!("{PREVIEW_HEADER}\n\nsummary")),
        );
        assert_eq!(
            ChatRequest::new(turns.clone()).previous_phase(),
            ConversationPhase::ReviewingDoc
        );

        turns.insert(
            turns.len() - 1,
            ChatMessage::assistant(format!("{SAVED_HEADER} (`doc.md`)")),
        );
        assert_eq!(
            ChatRequest::new(turns.clone()).previous_phase(),
            ConversationPhase::Finalized
        );

        // An explicit state wins.
        assert_eq!(
            ChatRequest::new(turns)
                .with_state(ConversationPhase::ReviewingDoc)
                .previous_phase(),
            ConversationPhase::ReviewingDoc
        );
    }

    #[test]
    fn request_accepts_widget_payload() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"history": [{"role": "user", "content": "hi"}, {"role": "bot", "content": "hello"},
                {"role": "user", "content": "we need growth"}],
                "file_context": null, "conversation_state": "show_mentors"}"#,
        )
        .unwrap();
        assert_eq!(request.user_message_count(), 2);
        assert_eq!(request.current_message().unwrap(), "we need growth");
        assert_eq!(request.previous_phase(), ConversationPhase::Finalized);
    }
}
