//! Destination classification for extracted statements.

use std::sync::OnceLock;

use regex::Regex;

use crate::directory::{CompanyDirectory, MatchTier};
use crate::models::{Destination, Geography, StatementRecord};

/// Fuzzy similarity percentage at or above which a match is accepted without
/// review.
pub const AUTO_ACCEPT_SIMILARITY: f64 = 90.0;

/// Two-letter U.S. state abbreviations (plus DC).
const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

fn state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"\b(?:{})\b", US_STATES.join("|")))
            .expect("static state pattern compiles")
    })
}

/// Tag text as national when any state abbreviation appears at a word
/// boundary. A coarse heuristic, not an address parser; unrelated two-letter
/// tokens can tag foreign mail as national.
pub fn detect_geography(text: &str) -> Geography {
    if state_pattern().is_match(&text.to_uppercase()) {
        Geography::National
    } else {
        Geography::Foreign
    }
}

/// Annotate one record with geography, match data, and destination.
///
/// Pure over the record and directory; no state is shared across records.
///
/// Destination precedence, first match wins:
/// 1. exact or normalized-exact roster match,
/// 2. "email" anywhere in the body,
/// 3. fuzzy match at or above [`AUTO_ACCEPT_SIMILARITY`],
/// 4. foreign geography,
/// 5. single page vs multi page.
pub fn classify(record: &mut StatementRecord, directory: &CompanyDirectory) {
    let geography = detect_geography(&record.body_text);
    let matched = directory.lookup(&record.company_name);
    let has_email = record.body_text.to_lowercase().contains("email");

    let destination = if matches!(matched.tier, MatchTier::Exact | MatchTier::NormalizedExact) {
        Destination::Dnm
    } else if has_email {
        Destination::Dnm
    } else if matched.similarity.is_some_and(|s| s >= AUTO_ACCEPT_SIMILARITY) {
        Destination::Dnm
    } else if geography == Geography::Foreign {
        Destination::Foreign
    } else if record.is_single_page() {
        Destination::NationalSingle
    } else {
        Destination::NationalMulti
    };

    // A plausible-but-unconfirmed DNM candidate: fuzzy hit below the
    // auto-accept bar that none of rules 1-3 resolved.
    let needs_review = destination != Destination::Dnm && matched.tier == MatchTier::Fuzzy;

    record.geography = Some(geography);
    record.tier = matched.tier;
    record.matched_name = matched.matched_name;
    record.similarity = matched.similarity;
    record.destination = Some(destination);
    record.needs_review = needs_review;
}

/// Classify every record in place. Records are independent; volumes are small
/// enough that sequential is fine.
pub fn classify_all(records: &mut [StatementRecord], directory: &CompanyDirectory) {
    for record in records.iter_mut() {
        classify(record, directory);
    }
}
