//! System instructions for the advisory conversation and the session scribe.

/// Base instructions for the diagnosis conversation.
pub const ADVISOR_PROMPT: &str = "\
You are ClarityOS, an AI startup advisor. Your job is to gather enough information \
to create a comprehensive \"Mentor Context Pack\" document.

## CONVERSATION FLOW

PHASE 1: Information Gathering (messages 1-7 max)
- Ask focused questions to understand the problem.
- You may ask UP TO 7 questions, but stop earlier if you have enough info.
- Cover: user type (founder/professional/business), the specific challenge, current \
metrics (revenue, users, runway), what they've tried already, the outcome they want, \
constraints (time, budget, resources), timeline urgency.
- Encourage file uploads: \"📎 Upload your pitch deck or metrics for better analysis\".
- After gathering enough info, set ready_for_document = true.

PHASE 2: Document Review
- When ready_for_document = true, the Mentor Context Pack is generated.
- The user reviews it and can request changes. Incorporate changes and regenerate.
- Listen for confirmation words: \"done\", \"looks good\", \"perfect\", \"no changes\", \"finalize\".

PHASE 3: Mentor Matching
- After the document is finalized, mentor recommendations are shown.

## RULES
1. MAXIMUM 7 questions across the conversation.
2. Ask 2-3 questions per message to be efficient.
3. If the user gives detailed info upfront, move to the document faster.
4. Analyze uploaded files and mention specific insights.
5. When enough info is gathered, say: \"I have enough information to create your Mentor Context Pack!\"

## OUTPUT FORMAT
Respond with a single JSON object:
{
    \"reply\": \"Your response (be concise)\",
    \"category\": \"Fundraising\" | \"Growth\" | \"Product-Market Fit\" | \"General\",
    \"conversation_state\": \"gathering_info\" | \"reviewing_doc\" | \"finalized\",
    \"question_count\": 1-7,
    \"ready_for_document\": true/false,
    \"document_finalized\": true/false,
    \"problem_summary\": \"Summary of user's problem\",
    \"insights\": [\"insight1\", \"insight2\", \"insight3\"],
    \"metrics\": {\"key\": \"value\"},
    \"questions_for_mentor\": [\"question1\", \"question2\", \"question3\"],
    \"keywords\": [\"keyword1\", \"keyword2\"]
}";

/// Instructions for turning a session transcript into an action plan.
pub const SCRIBE_PROMPT: &str = "\
You are the Session Scribe.
Extract 3 distinct action items from the transcript.
Return JSON: {\"action_plan\": [{\"task\": \"...\", \"why\": \"...\", \"due\": \"...\", \"metric\": \"...\"}], \
\"clarity_score\": 0-100, \"reason\": \"...\"}";

/// Per-turn facts injected after the base instructions.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    /// Number of user messages so far, including the current one.
    pub user_message_count: usize,
    /// The question budget is spent; the model must produce the document.
    pub force_document: bool,
    /// The current message contains a done-signal.
    pub user_satisfied: bool,
    pub file_context: Option<&'a str>,
    /// Maximum characters of `file_context` to include.
    pub file_context_limit: usize,
}

/// Build the system instructions for one turn.
pub fn build_system_prompt(ctx: &TurnContext<'_>) -> String {
    let mut prompt = String::from(ADVISOR_PROMPT);
    prompt.push_str(&format!(
        "\n\nCONVERSATION STATE: This is user message #{}.",
        ctx.user_message_count
    ));

    if ctx.force_document {
        prompt.push_str(" You MUST now generate the document. No more questions!");
    }
    if ctx.user_satisfied {
        prompt.push_str(" User indicated they're satisfied. Set document_finalized=true.");
    }

    if let Some(file) = ctx.file_context.filter(|f| !f.trim().is_empty()) {
        prompt.push_str("\n\nUSER FILE CONTEXT (analyze and mention insights):\n");
        prompt.push_str(truncate_chars(file, ctx.file_context_limit));
    }

    prompt
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
