//! Deterministic text rules applied to the user's latest message.
//!
//! - Done-signals: a fixed vocabulary meaning "the document is fine, save it".
//! - Category buckets: keyword stems used when the model could not pick a
//!   category.
//!
//! Both run without the model so the controller can override model output.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use super::decision::Category;

/// Phrases treated as user confirmation of the current document.
pub const DONE_SIGNALS: &[&str] = &[
    "done",
    "looks good",
    "perfect",
    "no changes",
    "all good",
    "finalize",
    "save it",
    "confirmed",
    "approved",
    "that's fine",
    "great",
    "yes",
    "correct",
    "save",
    "proceed",
];

/// Category keyword stems, checked in order. First matching bucket wins.
const CATEGORY_BUCKETS: &[(Category, &[&str])] = &[
    (
        Category::Fundraising,
        &["fund", "investor", "raise", "pitch", "vc"],
    ),
    (
        Category::Growth,
        &["growth", "scale", "customer", "marketing"],
    ),
    (Category::ProductMarketFit, &["pmf", "product", "validate"]),
];

/// One compiled whole-token pattern per done-signal, in vocabulary order.
static DONE_SIGNAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DONE_SIGNALS
        .iter()
        .map(|signal| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(signal)))
                .expect("escaped done-signal is a valid pattern")
        })
        .collect()
});

/// How done-signals are matched against a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalMatching {
    /// The phrase must stand on word boundaries: "correct" does not fire
    /// inside "incorrect", "yes" does not fire inside "yesterday".
    #[default]
    Token,
    /// Plain case-insensitive substring match anywhere in the message.
    Substring,
}

impl FromStr for SignalMatching {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "substring" => Ok(Self::Substring),
            other => Err(format!("expected 'token' or 'substring', got '{other}'")),
        }
    }
}

impl std::fmt::Display for SignalMatching {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Substring => write!(f, "substring"),
        }
    }
}

/// Return the first done-signal found in `message`, if any.
pub fn find_done_signal(message: &str, mode: SignalMatching) -> Option<&'static str> {
    let normalized = normalize(message);
    match mode {
        SignalMatching::Token => DONE_SIGNALS
            .iter()
            .zip(DONE_SIGNAL_PATTERNS.iter())
            .find(|(_, pattern)| pattern.is_match(&normalized))
            .map(|(signal, _)| *signal),
        SignalMatching::Substring => DONE_SIGNALS
            .iter()
            .find(|signal| normalized.contains(*signal))
            .copied(),
    }
}

/// Whether `message` contains a done-signal.
pub fn is_done_signal(message: &str, mode: SignalMatching) -> bool {
    find_done_signal(message, mode).is_some()
}

/// Derive a category from keyword stems in `message`.
///
/// Returns `Category::General` when no bucket matches.
pub fn category_from_keywords(message: &str) -> Category {
    let lower = message.to_lowercase();
    CATEGORY_BUCKETS
        .iter()
        .find(|(_, stems)| stems.iter().any(|stem| lower.contains(stem)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::General)
}

/// Lowercase and fold typographic apostrophes so "that’s fine" matches.
fn normalize(message: &str) -> String {
    message.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_vocabulary_phrase_is_detected_in_both_modes() {
        for signal in DONE_SIGNALS {
            assert!(
                is_done_signal(signal, SignalMatching::Token),
                "token mode missed '{signal}'"
            );
            assert!(
                is_done_signal(signal, SignalMatching::Substring),
                "substring mode missed '{signal}'"
            );
        }
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert!(is_done_signal("Looks Good, PROCEED", SignalMatching::Token));
        assert_eq!(
            find_done_signal("Looks Good, PROCEED", SignalMatching::Token),
            Some("looks good")
        );
    }

    #[test]
    fn token_mode_ignores_words_containing_a_signal() {
        for message in [
            "That's incorrect, our revenue is 2x that",
            "We spoke to investors yesterday",
            "Our greatest problem is churn",
            "We saved three months of runway",
        ] {
            assert!(
                !is_done_signal(message, SignalMatching::Token),
                "token mode fired on '{message}'"
            );
        }
    }

    #[test]
    fn substring_mode_keeps_legacy_behaviour() {
        assert!(is_done_signal(
            "That's incorrect, our revenue is 2x that",
            SignalMatching::Substring
        ));
        assert!(is_done_signal(
            "We spoke to investors yesterday",
            SignalMatching::Substring
        ));
    }

    #[test]
    fn curly_apostrophe_matches() {
        assert!(is_done_signal("that\u{2019}s fine by me", SignalMatching::Token));
    }

    #[test]
    fn plain_answers_are_not_signals() {
        assert!(!is_done_signal(
            "We're pre-revenue, need help validating PMF",
            SignalMatching::Token
        ));
    }

    #[test]
    fn signal_matching_parses() {
        assert_eq!("token".parse::<SignalMatching>(), Ok(SignalMatching::Token));
        assert_eq!(
            " Substring ".parse::<SignalMatching>(),
            Ok(SignalMatching::Substring)
        );
        assert!("fuzzy".parse::<SignalMatching>().is_err());
    }

    #[test]
    fn category_buckets_in_order() {
        assert_eq!(
            category_from_keywords("How do I pitch to a VC?"),
            Category::Fundraising
        );
        assert_eq!(
            category_from_keywords("We need to scale marketing"),
            Category::Growth
        );
        assert_eq!(
            category_from_keywords("How do I validate my idea?"),
            Category::ProductMarketFit
        );
        assert_eq!(
            category_from_keywords("I feel stuck as a founder"),
            Category::General
        );
    }

    #[test]
    fn pre_revenue_pmf_message_is_product_market_fit() {
        assert_eq!(
            category_from_keywords("We're pre-revenue, need help validating PMF"),
            Category::ProductMarketFit
        );
    }

    #[test]
    fn first_bucket_wins_when_several_match() {
        // "customer" (Growth) and "product" (PMF) lose to "fund" (Fundraising)
        assert_eq!(
            category_from_keywords("Customers love the product, now we need funding"),
            Category::Fundraising
        );
    }
}
