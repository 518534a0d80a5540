//! Mentor retrieval: the catalog, the keyword scorer and match reasons.

pub mod catalog;
pub mod reason;
pub mod scorer;

pub use catalog::{Mentor, MentorCatalog};
pub use reason::explain;
pub use scorer::{MentorScorer, ScoredMentor};
