//! One-line "why this mentor" explanations.

use super::catalog::Mentor;

/// Characters of the bio quoted by the fundraising template.
const BIO_EXCERPT_CHARS: usize = 50;

/// Explain why `mentor` fits a user in `category`.
///
/// Template selection is a case-insensitive substring match on the category.
/// `problem_summary` is accepted for callers that have one; the templates do
/// not quote it.
pub fn explain(mentor: &Mentor, category: &str, _problem_summary: &str) -> String {
    let name = if mentor.name.trim().is_empty() {
        "This mentor"
    } else {
        mentor.name.as_str()
    };
    let outcomes = &mentor.outcomes;
    let category = category.to_lowercase();

    if category.contains("fundraising") {
        let excerpt: String = mentor.bio.chars().take(BIO_EXCERPT_CHARS).collect();
        format!(
            "{name} has deep experience in fundraising. {outcomes} Their background in {excerpt}... makes them ideal for your funding needs."
        )
    } else if category.contains("growth") {
        format!(
            "{name} specializes in scaling businesses. {outcomes} Perfect for tackling your growth challenges."
        )
    } else {
        format!(
            "{name} is a proven expert. {outcomes} Their experience aligns well with your situation."
        )
    }
}
