//! ClarityOS: an advisory chat that turns a founder's problem into a Mentor
//! Context Pack and recommends mentors for it.

pub mod advisor;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod llm;
pub mod mentors;
pub mod store;
