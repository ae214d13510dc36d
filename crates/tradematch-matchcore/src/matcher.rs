//! Pure tiered offer matcher.
//!
//! ```text
//! classify(new, existing) -> MatchTier
//! find_offer_matches(owner, offering, wanting, candidates) -> Vec<Match>
//! ```
//!
//! ## Tiers (first match wins)
//!
//! | Tier     | Score | Condition                                                   |
//! |----------|-------|-------------------------------------------------------------|
//! | Perfect  | 100   | new wants ⊆ existing offering **and** existing wants ⊆ new offering |
//! | Interest | 75    | exactly one of the two containments holds                   |
//! | Keyword  | 50    | neither holds, but both sides mention a shared vocabulary term |
//! | None     | 0     | otherwise                                                   |
//!
//! Containment is case-insensitive substring containment of the trimmed
//! "wants" text, so surrounding whitespace in wants never affects a match.
//! The offering side is searched as stored. A blank "wants" text expresses
//! no interest and never satisfies a containment.
//!
//! ## Self-Match Prevention
//!
//! Candidates owned by the submitting participant are skipped.

use tradematch_types::{Match, MatchTier, Offer, ParticipantId};

use crate::vocabulary;

/// Borrowed view of one side of a potential trade.
#[derive(Debug, Clone, Copy)]
pub struct Proposal<'a> {
    pub offering: &'a str,
    pub wanting: &'a str,
}

impl<'a> Proposal<'a> {
    #[must_use]
    pub fn new(offering: &'a str, wanting: &'a str) -> Self {
        Self { offering, wanting }
    }
}

impl<'a> From<&'a Offer> for Proposal<'a> {
    fn from(offer: &'a Offer) -> Self {
        Self::new(&offer.offering, &offer.wanting)
    }
}

/// Trimmed `wanted` appears inside `offered`, ignoring case. Blank wants
/// never match.
fn wants_satisfied_by(wanted: &str, offered: &str) -> bool {
    let wanted = wanted.trim();
    !wanted.is_empty() && offered.to_lowercase().contains(&wanted.to_lowercase())
}

/// Classify a pair of proposals into exactly one tier.
///
/// The result does not depend on argument order.
#[must_use]
pub fn classify(new: Proposal<'_>, existing: Proposal<'_>) -> MatchTier {
    let existing_has_what_new_wants = wants_satisfied_by(new.wanting, existing.offering);
    let new_has_what_existing_wants = wants_satisfied_by(existing.wanting, new.offering);

    match (existing_has_what_new_wants, new_has_what_existing_wants) {
        (true, true) => MatchTier::Perfect,
        (true, false) | (false, true) => MatchTier::Interest,
        (false, false) => {
            let new_terms = vocabulary::terms_in(&[new.offering, new.wanting]);
            let existing_terms = vocabulary::terms_in(&[existing.offering, existing.wanting]);
            if vocabulary::overlaps(&new_terms, &existing_terms) {
                MatchTier::Keyword
            } else {
                MatchTier::None
            }
        }
    }
}

/// Score a new submission against every candidate offer.
///
/// Returns one [`Match`] per compatible candidate, in candidate order.
/// No ranking or cap is applied: every match is acted on independently.
#[must_use]
pub fn find_offer_matches(
    new_owner: ParticipantId,
    new_offering: &str,
    new_wanting: &str,
    candidates: &[Offer],
) -> Vec<Match> {
    let new = Proposal::new(new_offering, new_wanting);
    let mut matches = Vec::new();

    for candidate in candidates {
        if candidate.is_owned_by(new_owner) {
            continue;
        }

        let tier = classify(new, Proposal::from(candidate));
        if !tier.is_match() {
            continue;
        }

        tracing::debug!(
            candidate = %candidate.id,
            counterparty = %candidate.owner_id,
            tier = %tier,
            "Offer matched"
        );
        matches.push(Match::new(candidate.clone(), tier));
    }

    matches
}
