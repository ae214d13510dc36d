//! Controlled category vocabulary for Keyword matching.
//!
//! Terms are matched as lowercase substrings, the same way as every other
//! comparison in the engine, so "Swordfish" mentions "sword".

use std::collections::BTreeSet;

use tradematch_types::constants::KEYWORD_VOCABULARY;

/// Vocabulary terms mentioned anywhere in the given texts.
#[must_use]
pub fn terms_in(texts: &[&str]) -> BTreeSet<&'static str> {
    let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();
    KEYWORD_VOCABULARY
        .iter()
        .copied()
        .filter(|term| lowered.iter().any(|text| text.contains(term)))
        .collect()
}

/// Whether two term sets share at least one vocabulary term.
#[must_use]
pub fn overlaps(a: &BTreeSet<&'static str>, b: &BTreeSet<&'static str>) -> bool {
    !a.is_disjoint(b)
}
