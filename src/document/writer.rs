//! Durable context pack output.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::info;

use crate::error::DocumentError;

use super::ContextPack;

/// A written context pack.
#[derive(Debug, Clone)]
pub struct SavedDocument {
    pub path: PathBuf,
    /// The chat preview of the same pack.
    pub preview: String,
}

/// Persists finalized context packs.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    async fn render_and_save(
        &self,
        pack: &ContextPack,
        filename: Option<&str>,
    ) -> Result<SavedDocument, DocumentError>;
}

/// Writes packs as Markdown files into one directory.
pub struct FsDocumentWriter {
    dir: PathBuf,
}

impl FsDocumentWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DocumentWriter for FsDocumentWriter {
    async fn render_and_save(
        &self,
        pack: &ContextPack,
        filename: Option<&str>,
    ) -> Result<SavedDocument, DocumentError> {
        let now = Utc::now();
        let name = filename
            .and_then(sanitize_filename)
            .unwrap_or_else(|| default_filename(now));
        let path = self.dir.join(name);

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DocumentError::WriteFailed {
                path: self.dir.display().to_string(),
                reason: e.to_string(),
            })?;
        fs::write(&path, render_markdown(pack, now))
            .await
            .map_err(|e| DocumentError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        info!(path = %path.display(), category = %pack.category, "Context pack saved");
        Ok(SavedDocument {
            path,
            preview: pack.render_preview(),
        })
    }
}

/// `context_pack_<UTC timestamp>_<8 hex>.md`
fn default_filename(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("context_pack_{}_{}.md", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// Reduce a caller-supplied name to a single safe file name ending in `.md`.
/// Returns `None` when nothing usable is left.
fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let stem = cleaned.strip_suffix(".md").unwrap_or(cleaned);
    if stem.trim_matches(['_', '.']).is_empty() {
        return None;
    }
    Some(format!("{stem}.md"))
}

/// Markdown form of the pack, stamped with the generation time.
pub fn render_markdown(pack: &ContextPack, generated_at: DateTime<Utc>) -> String {
    let mut out = String::from("# 🎯 Mentor Context Pack\n\n");
    out.push_str(&format!(
        "Generated: {}\n\nCategory: {}\n\n---\n\n",
        generated_at.format("%B %d, %Y at %I:%M %p UTC"),
        pack.category
    ));

    out.push_str("## Problem Summary\n\n");
    out.push_str(&pack.user_summary);
    out.push_str("\n\n## Key Insights\n\n");
    for (i, insight) in pack.insights.iter().enumerate() {
        out.push_str(&format!("{}. {insight}\n", i + 1));
    }

    if !pack.metrics.is_empty() {
        out.push_str("\n## Key Metrics\n\n");
        for (key, value) in &pack.metrics {
            out.push_str(&format!("- **{key}**: {value}\n"));
        }
    }

    out.push_str("\n## Questions for Mentor to Address\n\n");
    for question in &pack.questions_for_mentor {
        out.push_str(&format!("- {question}\n"));
    }
    out.push_str("\n---\n\nPowered by ClarityOS | ExpertBells\n");
    out
}
