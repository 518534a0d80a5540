//! `KnowledgeStore` trait: durable storage for uploaded documents and a
//! mentor graph that can be queried by category and keywords.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DatabaseError;
use crate::mentors::Mentor;

/// Stored content is capped at this many characters.
pub const MAX_DOCUMENT_CHARS: usize = 50_000;

/// Maximum matches returned by [`KnowledgeStore::mentor_matches`].
pub const MAX_MENTOR_MATCHES: usize = 3;

/// Text extracted from an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub filename: String,
    pub content: String,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}

/// A mentor found through the graph, with its related nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMentorMatch {
    pub id: String,
    pub name: String,
    pub bio: String,
    pub link: String,
    pub outcomes: Vec<String>,
    pub expertise: Vec<String>,
    pub keyword_score: u32,
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Store extracted file text and return its short id.
    async fn save_file_content(
        &self,
        filename: &str,
        content: &str,
        file_type: &str,
    ) -> Result<String, DatabaseError>;

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, DatabaseError>;

    /// Insert or update a mentor and link it to `expertise` labels and its
    /// outcome.
    async fn add_mentor(&self, mentor: &Mentor, expertise: &[String]) -> Result<(), DatabaseError>;

    /// Mentors whose expertise or bio contains `category`, ranked by how many
    /// `keywords` appear in their bio or outcomes.
    async fn mentor_matches(
        &self,
        category: &str,
        keywords: &[String],
    ) -> Result<Vec<StoredMentorMatch>, DatabaseError>;

    /// Whether the store answers queries.
    async fn verify_connection(&self) -> bool;
}
