//! Conversation phase state machine.

use serde::{Deserialize, Serialize};

/// The phases of an advisory conversation.
///
/// Progresses linearly: GatheringInfo → ReviewingDoc → Finalized. There is no
/// path backward; edit requests during review keep the phase at ReviewingDoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    GatheringInfo,
    ReviewingDoc,
    Finalized,
}

impl ConversationPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: ConversationPhase) -> bool {
        use ConversationPhase::*;
        matches!(
            (self, target),
            (GatheringInfo, ReviewingDoc) | (ReviewingDoc, Finalized)
        )
    }

    /// Get the next phase in the linear progression, if any.
    pub fn next(&self) -> Option<ConversationPhase> {
        use ConversationPhase::*;
        match self {
            GatheringInfo => Some(ReviewingDoc),
            ReviewingDoc => Some(Finalized),
            Finalized => None,
        }
    }

    /// Move at most one transition toward `target`. Targets at or behind the
    /// current phase leave it unchanged.
    pub fn step_toward(&self, target: ConversationPhase) -> ConversationPhase {
        if target <= *self {
            return *self;
        }
        match self.next() {
            Some(next) if self.can_transition_to(next) => next,
            _ => *self,
        }
    }

    /// Parse a phase label reported by the model. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "gathering_info" => Some(Self::GatheringInfo),
            "reviewing_doc" => Some(Self::ReviewingDoc),
            "finalized" | "show_mentors" => Some(Self::Finalized),
            _ => None,
        }
    }
}

impl Default for ConversationPhase {
    fn default() -> Self {
        Self::GatheringInfo
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GatheringInfo => "gathering_info",
            Self::ReviewingDoc => "reviewing_doc",
            Self::Finalized => "finalized",
        };
        write!(f, "{s}")
    }
}
