//! Advisory conversation: the diagnostic chat that moves a founder from a
//! vague problem to a reviewed Mentor Context Pack and matched mentors.
//!
//! Every turn carries the full history. The phase controller decides the
//! phase and reply, and the synthesizer attaches previews, the saved
//! document and mentor cards.

pub mod controller;
pub mod decision;
pub mod phase;
pub mod prompts;
pub mod routes;
pub mod scribe;
pub mod signals;
pub mod synthesizer;

pub use controller::{ChatRequest, ModelFailure, PhaseController};
pub use decision::{Category, RawDecision, TurnDecision};
pub use phase::ConversationPhase;
pub use routes::{AppState, router};
pub use scribe::{ActionItem, ActionPlan, SessionScribe};
pub use signals::SignalMatching;
pub use synthesizer::{ChatResponse, MentorCard, ResponseSynthesizer};
