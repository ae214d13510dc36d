//! Offer listings: what a participant has and what they want in return.

use serde::{Deserialize, Serialize};

use crate::{OfferId, ParticipantId};

/// An active "offer X / want Y" listing.
///
/// The owner never changes after creation. Offers handed out by the store
/// are snapshots; holding one does not keep the listing alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub owner_id: ParticipantId,
    /// What the owner is offering. Never empty.
    pub offering: String,
    /// What the owner wants in return. May be empty.
    pub wanting: String,
}

impl Offer {
    #[must_use]
    pub fn is_owned_by(&self, participant: ParticipantId) -> bool {
        self.owner_id == participant
    }

    /// Case-insensitive substring search over the offering text.
    #[must_use]
    pub fn offering_contains(&self, needle: &str) -> bool {
        contains_ignore_case(&self.offering, needle)
    }

    /// Case-insensitive substring search over the wanting text.
    #[must_use]
    pub fn wanting_contains(&self, needle: &str) -> bool {
        contains_ignore_case(&self.wanting, needle)
    }
}

/// Case-insensitive substring containment. An empty needle is contained in
/// every haystack.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Offer {
    pub fn dummy(owner: u64, offering: &str, wanting: &str) -> Self {
        Self {
            id: OfferId::generate(),
            owner_id: ParticipantId(owner),
            offering: offering.to_string(),
            wanting: wanting.to_string(),
        }
    }
}
