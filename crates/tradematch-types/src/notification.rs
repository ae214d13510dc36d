//! Plain-data payloads exchanged with the messaging platform.
//!
//! Rendering (embeds, buttons, colours) belongs to the platform adapter;
//! the engine only decides *what* to say and *to whom*.

use serde::{Deserialize, Serialize};

use crate::{ChannelId, MatchTier, ParticipantId};

/// Display identity of a participant as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: ParticipantId,
    pub display_name: String,
}

impl Identity {
    /// Stand-in used when the platform cannot resolve a participant.
    #[must_use]
    pub fn placeholder(id: ParticipantId) -> Self {
        Self {
            id,
            display_name: format!("Participant {id}"),
        }
    }
}

/// A private channel opened for the participants of an accepted trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHandle {
    pub id: ChannelId,
    pub members: Vec<ParticipantId>,
}

/// A message the engine asks the platform to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// A new offer is compatible with one of the recipient's offers.
    AutoMatch {
        tier: MatchTier,
        score: u8,
        new_trader: Identity,
        their_offer: String,
        their_wants: String,
        your_offer: String,
        your_wants: String,
    },
    /// A new offer mentions keywords on the recipient's wishlist.
    WishlistAlert {
        keywords: Vec<String>,
        offered_by: Identity,
        offering: String,
        wanting: String,
    },
    /// Someone asked to trade against the recipient's offer.
    TradeRequest {
        requester: Identity,
        proposed_offer: String,
        your_offer: String,
        your_wants: String,
    },
    /// The counterparty accepted the recipient's auto-match.
    MatchAccepted {
        accepted_by: Identity,
        your_offer: String,
        their_offer: String,
        their_wants: String,
    },
}

impl Notification {
    /// Short kind label used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AutoMatch { .. } => "auto_match",
            Self::WishlistAlert { .. } => "wishlist_alert",
            Self::TradeRequest { .. } => "trade_request",
            Self::MatchAccepted { .. } => "match_accepted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_identity() {
        let id = Identity::placeholder(ParticipantId(42));
        assert_eq!(id.display_name, "Participant 42");
    }

    #[test]
    fn kind_labels() {
        let alert = Notification::WishlistAlert {
            keywords: vec!["sword".into()],
            offered_by: Identity::placeholder(ParticipantId(1)),
            offering: "Sword".into(),
            wanting: String::new(),
        };
        assert_eq!(alert.kind(), "wishlist_alert");

        let request = Notification::TradeRequest {
            requester: Identity::placeholder(ParticipantId(1)),
            proposed_offer: "Shield".into(),
            your_offer: "Sword".into(),
            your_wants: "Shield".into(),
        };
        assert_eq!(request.kind(), "trade_request");
    }
}
