//! libSQL backend for the `KnowledgeStore` trait.
//!
//! Supports local file and in-memory databases. The mentor graph is modelled
//! relationally: `mentors` nodes with `mentor_expertise` and
//! `mentor_outcomes` edges.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::mentors::Mentor;
use crate::store::migrations;
use crate::store::traits::{
    KnowledgeStore, MAX_DOCUMENT_CHARS, MAX_MENTOR_MATCHES, StoredDocument, StoredMentorMatch,
};

/// libSQL knowledge store.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Knowledge store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Single-column string query keyed by mentor id.
    async fn mentor_strings(&self, sql: &str, mentor_id: &str) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, params![mentor_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("mentor relations: {e}")))?;
        let mut values = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("mentor relations: {e}")))?
        {
            values.push(
                row.get::<String>(0)
                    .map_err(|e| DatabaseError::Query(format!("mentor relations row parse: {e}")))?,
            );
        }
        Ok(values)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_document(row: &libsql::Row) -> Result<StoredDocument, libsql::Error> {
    let created: String = row.get(4)?;
    Ok(StoredDocument {
        id: row.get(0)?,
        filename: row.get(1)?,
        content: row.get(2)?,
        file_type: row.get(3)?,
        created_at: parse_datetime(&created),
    })
}

/// `(id, name, bio, link)` of a mentor row.
fn row_to_candidate(row: &libsql::Row) -> Result<(String, String, String, String), libsql::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Number of keywords found in the bio or any outcome.
fn keyword_score(bio: &str, outcomes: &[String], keywords: &[String]) -> u32 {
    let bio = bio.to_lowercase();
    let outcomes: Vec<String> = outcomes.iter().map(|o| o.to_lowercase()).collect();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .filter(|k| bio.contains(k.as_str()) || outcomes.iter().any(|o| o.contains(k.as_str())))
        .count() as u32
}

// ── KnowledgeStore impl ─────────────────────────────────────────────

#[async_trait]
impl KnowledgeStore for LibSqlStore {
    async fn save_file_content(
        &self,
        filename: &str,
        content: &str,
        file_type: &str,
    ) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let content: String = content.chars().take(MAX_DOCUMENT_CHARS).collect();
        self.conn
            .execute(
                "INSERT INTO documents (id, filename, content, file_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), filename, content, file_type, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_file_content: {e}")))?;

        debug!(doc_id = %id, filename, "Document stored");
        Ok(id)
    }

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, filename, content, file_type, created_at FROM documents WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_document: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_document(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("get_document row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_document: {e}"))),
        }
    }

    async fn add_mentor(&self, mentor: &Mentor, expertise: &[String]) -> Result<(), DatabaseError> {
        if mentor.id.trim().is_empty() {
            return Err(DatabaseError::Query(format!(
                "add_mentor: mentor '{}' has no id",
                mentor.name
            )));
        }

        self.conn
            .execute(
                "INSERT INTO mentors (id, name, bio, link, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    bio = excluded.bio,
                    link = excluded.link,
                    updated_at = excluded.updated_at",
                params![
                    mentor.id.as_str(),
                    mentor.name.as_str(),
                    mentor.bio.as_str(),
                    mentor.link.as_str(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_mentor: {e}")))?;

        for label in expertise.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO mentor_expertise (mentor_id, name) VALUES (?1, ?2)",
                    params![mentor.id.as_str(), label],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("add_mentor expertise: {e}")))?;
        }

        let outcome = mentor.outcomes.trim();
        if !outcome.is_empty() {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO mentor_outcomes (mentor_id, description) VALUES (?1, ?2)",
                    params![mentor.id.as_str(), outcome],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("add_mentor outcome: {e}")))?;
        }

        debug!(mentor_id = %mentor.id, expertise = expertise.len(), "Mentor upserted");
        Ok(())
    }

    async fn mentor_matches(
        &self,
        category: &str,
        keywords: &[String],
    ) -> Result<Vec<StoredMentorMatch>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT m.id, m.name, m.bio, m.link FROM mentors m
                 WHERE instr(lower(m.bio), lower(?1)) > 0
                    OR EXISTS (
                        SELECT 1 FROM mentor_expertise e
                        WHERE e.mentor_id = m.id AND instr(lower(e.name), lower(?1)) > 0
                    )
                 ORDER BY m.rowid",
                params![category.trim()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mentor_matches: {e}")))?;

        let mut candidates = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("mentor_matches: {e}")))?
        {
            candidates.push(
                row_to_candidate(&row)
                    .map_err(|e| DatabaseError::Query(format!("mentor_matches row parse: {e}")))?,
            );
        }

        let mut matches = Vec::with_capacity(candidates.len());
        for (id, name, bio, link) in candidates {
            let outcomes = self
                .mentor_strings(
                    "SELECT description FROM mentor_outcomes WHERE mentor_id = ?1 ORDER BY rowid",
                    &id,
                )
                .await?;
            let expertise = self
                .mentor_strings(
                    "SELECT name FROM mentor_expertise WHERE mentor_id = ?1 ORDER BY rowid",
                    &id,
                )
                .await?;
            let keyword_score = keyword_score(&bio, &outcomes, keywords);
            matches.push(StoredMentorMatch {
                id,
                name,
                bio,
                link,
                outcomes,
                expertise,
                keyword_score,
            });
        }

        matches.sort_by(|a, b| b.keyword_score.cmp(&a.keyword_score));
        matches.truncate(MAX_MENTOR_MATCHES);
        Ok(matches)
    }

    async fn verify_connection(&self) -> bool {
        match self.conn.query("SELECT 1", ()).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Knowledge store connection check failed");
                false
            }
        }
    }
}
