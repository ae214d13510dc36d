//! Pending trade requests and their lifecycle.
//!
//! A request is created when a match or trade-request notification has been
//! delivered, and is keyed by the id of that notification. It is resolved
//! by exactly one of accept, decline or the expiry sweep:
//!
//! ```text
//! PENDING ─┬─► ACCEPTED
//!          ├─► DECLINED
//!          └─► EXPIRED
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageId, ParticipantId};

/// How the request came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// A participant asked for a trade against a posted offer.
    Standard,
    /// The engine proposed the trade after scoring a new offer.
    AutoMatch,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "STANDARD"),
            Self::AutoMatch => write!(f, "AUTO_MATCH"),
        }
    }
}

/// Lifecycle state of a request. Only `Pending` requests live in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl RequestState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Valid transitions: `Pending` to any terminal state, nothing else.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == Self::Pending && next.is_terminal()
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Declined => write!(f, "DECLINED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Everything needed to open a pending request, minus the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    /// Id of the delivered notification carrying accept/decline controls.
    pub id: MessageId,
    pub kind: RequestKind,
    /// The participant proposing the trade.
    pub requester_id: ParticipantId,
    /// The participant who must accept or decline.
    pub counterparty_id: ParticipantId,
    /// What the requester puts on the table.
    pub requester_offer: String,
    /// Snapshot of the counterparty's offering text.
    pub counterparty_offer: String,
    /// Snapshot of the counterparty's wanting text.
    pub counterparty_wants: String,
}

/// An unresolved proposed trade awaiting accept/decline.
///
/// Offer text is captured by value, so removing the source offer later
/// does not affect a request already in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: MessageId,
    pub kind: RequestKind,
    pub created_at: DateTime<Utc>,
    pub requester_id: ParticipantId,
    pub counterparty_id: ParticipantId,
    pub requester_offer: String,
    pub counterparty_offer: String,
    pub counterparty_wants: String,
}

impl PendingRequest {
    #[must_use]
    pub fn from_new(new: NewRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            kind: new.kind,
            created_at,
            requester_id: new.requester_id,
            counterparty_id: new.counterparty_id,
            requester_offer: new.requester_offer,
            counterparty_offer: new.counterparty_offer,
            counterparty_wants: new.counterparty_wants,
        }
    }

    /// Expired when strictly more than `ttl` has elapsed since creation.
    /// An age exactly equal to `ttl` is still live.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        chrono::Duration::from_std(ttl)
            .is_ok_and(|ttl| now.signed_duration_since(self.created_at) > ttl)
    }

    /// Only the counterparty may accept or decline.
    #[must_use]
    pub fn can_be_resolved_by(&self, actor: ParticipantId) -> bool {
        self.counterparty_id == actor
    }

    #[must_use]
    pub fn involves(&self, participant: ParticipantId) -> bool {
        self.requester_id == participant || self.counterparty_id == participant
    }

    #[must_use]
    pub fn is_auto_match(&self) -> bool {
        self.kind == RequestKind::AutoMatch
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl NewRequest {
    pub fn dummy(id: &str, requester: u64, counterparty: u64) -> Self {
        Self {
            id: MessageId::from(id),
            kind: RequestKind::Standard,
            requester_id: ParticipantId(requester),
            counterparty_id: ParticipantId(counterparty),
            requester_offer: "Rare Blue Sword".to_string(),
            counterparty_offer: "Golden Shield".to_string(),
            counterparty_wants: "Blue Sword".to_string(),
        }
    }
}
