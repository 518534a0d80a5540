//! Read-only mentor catalog, loaded once at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A mentor profile. Missing fields read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mentor {
    pub id: String,
    pub name: String,
    pub bio: String,
    pub outcomes: String,
    pub link: String,
}

impl Mentor {
    /// Lowercased `name bio outcomes`, the text retrieval matches against.
    pub fn search_blob(&self) -> String {
        format!("{} {} {}", self.name, self.bio, self.outcomes).to_lowercase()
    }
}

/// Ordered, immutable list of mentors. Order is the ranking tie-break.
#[derive(Debug, Clone, Default)]
pub struct MentorCatalog {
    mentors: Vec<Mentor>,
}

impl MentorCatalog {
    pub fn from_mentors(mentors: Vec<Mentor>) -> Self {
        Self { mentors }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_mentors(serde_json::from_str(raw)?))
    }

    /// Load a JSON array of mentors. A missing or invalid file yields an
    /// empty catalog.
    pub async fn load(path: &Path) -> Self {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Mentor catalog unavailable, starting empty");
                return Self::default();
            }
        };
        match Self::from_json(&raw) {
            Ok(catalog) => {
                info!(path = %path.display(), mentors = catalog.len(), "Mentor catalog loaded");
                catalog
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Mentor catalog is not valid JSON, starting empty");
                Self::default()
            }
        }
    }

    pub fn mentors(&self) -> &[Mentor] {
        &self.mentors
    }

    pub fn len(&self) -> usize {
        self.mentors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mentors.is_empty()
    }
}
