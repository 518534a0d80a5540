//! Persistence layer: libSQL-backed knowledge store for uploaded documents
//! and the mentor graph.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{KnowledgeStore, StoredDocument, StoredMentorMatch};

use tracing::{info, warn};

use crate::advisor::signals::category_from_keywords;
use crate::mentors::MentorCatalog;

/// Upsert every catalog mentor into the store, labelled with the category
/// their profile reads as. Returns how many were stored. Failures are logged
/// and skipped.
pub async fn ingest_catalog(store: &dyn KnowledgeStore, catalog: &MentorCatalog) -> usize {
    let mut stored = 0;
    for mentor in catalog.mentors() {
        let profile = format!("{} {}", mentor.bio, mentor.outcomes);
        let expertise = vec![category_from_keywords(&profile).to_string()];
        match store.add_mentor(mentor, &expertise).await {
            Ok(()) => stored += 1,
            Err(e) => warn!(mentor_id = %mentor.id, error = %e, "Skipping mentor during ingestion"),
        }
    }
    info!(stored, total = catalog.len(), "Mentor catalog ingested into store");
    stored
}
