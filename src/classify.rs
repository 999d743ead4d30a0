//! Narrative-domain detection for research prompt selection.
//!
//! Categorizes a life-decision narrative into one of a small closed set of
//! domains using keyword matching. The result selects which research prompt
//! template is used; it has no other effect on orchestration.

use serde::{Deserialize, Serialize};

/// Keywords that indicate a career decision (jobs, companies, vocations)
pub const CAREER_KEYWORDS: &[&str] = &[
    "job",
    "career",
    "company",
    "startup",
    "promotion",
    "offer",
    "salary",
    "profession",
    "business",
    "quit",
];

/// Keywords that indicate a relationship decision
pub const RELATIONSHIP_KEYWORDS: &[&str] = &[
    "marry",
    "married",
    "marriage",
    "relationship",
    "partner",
    "divorce",
    "broke up",
    "dating",
    "proposed",
    "wedding",
];

/// Keywords that indicate a historically-situated narrative
pub const HISTORICAL_KEYWORDS: &[&str] = &[
    "war",
    "century",
    "revolution",
    "emigrated",
    "immigrated",
    "ancestors",
    "generation",
    "historical",
    "era",
];

/// Keywords for general life decisions (moves, education, health)
pub const LIFE_DECISION_KEYWORDS: &[&str] = &[
    "move",
    "moved",
    "city",
    "country",
    "college",
    "university",
    "degree",
    "study",
    "health",
    "family",
];

/// Closed set of narrative domains the research stage knows how to ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NarrativeDomain {
    Career,
    Relationship,
    LifeDecision,
    Historical,
}

impl NarrativeDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeDomain::Career => "career",
            NarrativeDomain::Relationship => "relationship",
            NarrativeDomain::LifeDecision => "life-decision",
            NarrativeDomain::Historical => "historical",
        }
    }
}

/// Classify a decision text by keyword count; highest score wins.
/// Falls back to `LifeDecision` when nothing matches.
pub fn classify_domain(decision: &str) -> NarrativeDomain {
    let lower = decision.to_lowercase();

    let keyword_sets = [
        (NarrativeDomain::Career, CAREER_KEYWORDS),
        (NarrativeDomain::Relationship, RELATIONSHIP_KEYWORDS),
        (NarrativeDomain::Historical, HISTORICAL_KEYWORDS),
        (NarrativeDomain::LifeDecision, LIFE_DECISION_KEYWORDS),
    ];

    let mut best = NarrativeDomain::LifeDecision;
    let mut best_score = 0;

    for (domain, keywords) in keyword_sets.iter() {
        let score = keywords.iter().filter(|k| lower.contains(*k)).count();
        if score > best_score {
            best_score = score;
            best = *domain;
        }
    }

    best
}
