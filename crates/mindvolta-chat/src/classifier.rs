//! Rule-based intent classifier.
//!
//! Maps raw message text to a [`Category`] by case-insensitive substring
//! search against an ordered rule table. The first rule with any matching
//! trigger wins; there is no scoring. Both delivery channels go through
//! [`classify`], so precedence is identical regardless of entry point.

use std::sync::LazyLock;

use regex::Regex;

use mindvolta_core::types::Category;

// =============================================================================
// Rule table (highest precedence first)
// =============================================================================

/// Trigger substrings per category, in precedence order.
///
/// Triggers are plain substrings, not tokens: `"hi"` also matches inside
/// `"this"`. Overlapping vocabulary is resolved by list order only.
pub const RULES: &[(Category, &[&str])] = &[
    (
        Category::ProfessionalReferral,
        &[
            "therapist",
            "doctor",
            "psychiatrist",
            "psychologist",
            "counsellor",
            "counselor",
        ],
    ),
    (
        Category::Sadness,
        &["sad", "depressed", "depression", "hopeless", "lonely", "unhappy"],
    ),
    (
        Category::Anxiety,
        &["anxious", "anxiety", "panic", "worried", "nervous"],
    ),
    (Category::Greeting, &["hello", "hi", "hey"]),
    (Category::Happiness, &["happy", "good", "great", "joy"]),
];

static COMPILED_RULES: LazyLock<Vec<(Category, Regex)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(category, triggers)| {
            let alts: Vec<String> = triggers.iter().map(|t| regex::escape(t)).collect();
            let re = Regex::new(&format!("(?i)(?:{})", alts.join("|")))
                .expect("Invalid classifier regex");
            (*category, re)
        })
        .collect()
});

/// Classify message text into exactly one category.
///
/// Pure and total: no I/O, never fails, same input always yields the same
/// category. Text matching no rule is [`Category::Default`].
pub fn classify(text: &str) -> Category {
    COMPILED_RULES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Default)
}
