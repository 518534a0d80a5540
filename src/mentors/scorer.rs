//! Keyword retrieval over the mentor catalog.
//!
//! Scoring is integer and exact-substring: a category hit is worth 5, each
//! distinct query term found in the mentor text is worth 1. Synonyms do not
//! match ("raising capital" will not find "fundraising").

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use super::catalog::{Mentor, MentorCatalog};

/// Maximum mentors returned by a ranking.
pub const MAX_RESULTS: usize = 3;

/// Points for a category match.
const CATEGORY_BOOST: u32 = 5;

/// A mentor together with the score it ranked with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredMentor {
    pub mentor: Mentor,
    pub score: u32,
}

/// Ranks catalog mentors against a query and category.
#[derive(Debug, Clone)]
pub struct MentorScorer {
    catalog: Arc<MentorCatalog>,
}

impl MentorScorer {
    pub fn new(catalog: Arc<MentorCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &MentorCatalog {
        &self.catalog
    }

    /// Top mentors for `query` and `category`, best first.
    pub fn rank(&self, query: &str, category: &str) -> Vec<Mentor> {
        self.rank_scored(query, category)
            .into_iter()
            .map(|scored| scored.mentor)
            .collect()
    }

    /// Like [`rank`](Self::rank) but keeps the scores. Mentors scoring zero
    /// are dropped; ties keep catalog order.
    pub fn rank_scored(&self, query: &str, category: &str) -> Vec<ScoredMentor> {
        let category = category.trim().to_lowercase();
        let query = query.to_lowercase();
        let terms: BTreeSet<&str> = query.split_whitespace().collect();

        let mut results: Vec<ScoredMentor> = self
            .catalog
            .mentors()
            .iter()
            .filter_map(|mentor| {
                let score = score_mentor(mentor, &category, &terms);
                (score > 0).then(|| ScoredMentor {
                    mentor: mentor.clone(),
                    score,
                })
            })
            .collect();

        // sort_by is stable, so equal scores stay in catalog order
        results.sort_by(|a, b| b.score.cmp(&a.score));
        results.truncate(MAX_RESULTS);
        results
    }
}

fn score_mentor(mentor: &Mentor, category: &str, terms: &BTreeSet<&str>) -> u32 {
    let blob = mentor.search_blob();
    let mut score = 0;
    if !category.is_empty() && blob.contains(category) {
        score += CATEGORY_BOOST;
    }
    score += terms.iter().filter(|term| blob.contains(*term)).count() as u32;
    score
}
