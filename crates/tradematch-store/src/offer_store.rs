//! Durable map of active offers.
//!
//! Every operation takes the store lock exactly once, so each call is atomic
//! with respect to every other call on the same store. Persistence and
//! external checks run after the lock is released.

use std::{collections::BTreeMap, fmt::Display, future::Future, path::PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tradematch_types::{Offer, OfferId, ParticipantId, Result, TradematchError};

use crate::document::{JsonDocument, Snapshot};

/// Persisted form of one offer: `{"user_id": int, "offer": str, "wants": str}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
    pub user_id: u64,
    pub offer: String,
    pub wants: String,
}

/// Persisted document: offer id → record.
pub type OfferDocument = BTreeMap<String, OfferRecord>;

struct OfferState {
    offers: BTreeMap<OfferId, Offer>,
    version: u64,
}

impl OfferState {
    fn from_document(document: OfferDocument) -> Self {
        let offers = document
            .into_iter()
            .map(|(id, record)| {
                let id = OfferId(id);
                let offer = Offer {
                    id: id.clone(),
                    owner_id: ParticipantId(record.user_id),
                    offering: record.offer,
                    wanting: record.wants,
                };
                (id, offer)
            })
            .collect();
        Self { offers, version: 0 }
    }

    fn to_document(&self) -> OfferDocument {
        self.offers
            .values()
            .map(|offer| {
                let record = OfferRecord {
                    user_id: offer.owner_id.0,
                    offer: offer.offering.clone(),
                    wants: offer.wanting.clone(),
                };
                (offer.id.0.clone(), record)
            })
            .collect()
    }

    fn commit(&mut self) -> Snapshot<OfferDocument> {
        self.version += 1;
        Snapshot {
            version: self.version,
            document: self.to_document(),
        }
    }
}

/// Active offers keyed by offer id.
pub struct OfferStore {
    state: RwLock<OfferState>,
    document: JsonDocument,
}

impl OfferStore {
    /// Open the store, loading `path` if it holds a valid document.
    #[must_use]
    pub fn open(path: Option<PathBuf>) -> Self {
        let document = JsonDocument::new("offers", path);
        let state = OfferState::from_document(document.load());
        tracing::info!(offers = state.offers.len(), "Offer store loaded");
        Self {
            state: RwLock::new(state),
            document,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(None)
    }

    /// Create an offer under a freshly generated id.
    ///
    /// # Errors
    /// `InvalidOffer` if the offering text is blank.
    pub async fn create(
        &self,
        owner: ParticipantId,
        offering: &str,
        wanting: &str,
    ) -> Result<Offer> {
        self.create_with_id(OfferId::generate(), owner, offering, wanting)
            .await
    }

    /// Create an offer under a platform-assigned posting id.
    ///
    /// # Errors
    /// - `InvalidOffer` if the offering text is blank
    /// - `DuplicateOffer` if an offer with this id is already live
    pub async fn create_with_id(
        &self,
        id: OfferId,
        owner: ParticipantId,
        offering: &str,
        wanting: &str,
    ) -> Result<Offer> {
        let offering = offering.trim();
        if offering.is_empty() {
            return Err(TradematchError::InvalidOffer {
                reason: "offering text must not be empty".to_string(),
            });
        }

        let offer = Offer {
            id,
            owner_id: owner,
            offering: offering.to_string(),
            wanting: wanting.trim().to_string(),
        };

        let snapshot = {
            let mut state = self.state.write().await;
            if state.offers.contains_key(&offer.id) {
                return Err(TradematchError::DuplicateOffer(offer.id));
            }
            state.offers.insert(offer.id.clone(), offer.clone());
            state.commit()
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(offer = %offer.id, owner = %offer.owner_id, "Offer created");
        Ok(offer)
    }

    pub async fn get(&self, id: &OfferId) -> Option<Offer> {
        self.state.read().await.offers.get(id).cloned()
    }

    /// Remove an offer if `requester` owns it.
    ///
    /// Returns `false` when the offer does not exist or belongs to someone else.
    pub async fn remove(&self, id: &OfferId, requester: ParticipantId) -> bool {
        let snapshot = {
            let mut state = self.state.write().await;
            match state.offers.get(id) {
                Some(offer) if offer.is_owned_by(requester) => {}
                _ => return false,
            }
            state.offers.remove(id);
            state.commit()
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(offer = %id, owner = %requester, "Offer removed");
        true
    }

    /// Remove every offer of `requester` whose offering contains `needle`
    /// (case-insensitive). A blank needle removes nothing.
    pub async fn remove_by_substring(&self, requester: ParticipantId, needle: &str) -> Vec<Offer> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let (removed, snapshot) = {
            let mut state = self.state.write().await;
            let doomed: Vec<OfferId> = state
                .offers
                .values()
                .filter(|o| o.is_owned_by(requester) && o.offering_contains(&needle))
                .map(|o| o.id.clone())
                .collect();
            if doomed.is_empty() {
                return Vec::new();
            }
            let removed: Vec<Offer> = doomed
                .iter()
                .filter_map(|id| state.offers.remove(id))
                .collect();
            (removed, state.commit())
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(owner = %requester, removed = removed.len(), "Offers removed by fragment");
        removed
    }

    /// Offers whose offering text contains `needle`, ignoring case.
    pub async fn find_by_offer_substring(&self, needle: &str) -> Vec<Offer> {
        self.find(needle, Offer::offering_contains).await
    }

    /// Offers whose wanting text contains `needle`, ignoring case.
    pub async fn find_by_wants_substring(&self, needle: &str) -> Vec<Offer> {
        self.find(needle, Offer::wanting_contains).await
    }

    async fn find(&self, needle: &str, field_contains: fn(&Offer, &str) -> bool) -> Vec<Offer> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Vec::new();
        }
        self.state
            .read()
            .await
            .offers
            .values()
            .filter(|offer| field_contains(offer, needle))
            .cloned()
            .collect()
    }

    /// All offers owned by `owner`.
    pub async fn offers_of(&self, owner: ParticipantId) -> Vec<Offer> {
        self.state
            .read()
            .await
            .offers
            .values()
            .filter(|offer| offer.is_owned_by(owner))
            .cloned()
            .collect()
    }

    /// Snapshot of every active offer.
    pub async fn all(&self) -> Vec<Offer> {
        self.state.read().await.offers.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.offers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.offers.is_empty()
    }

    /// Drop every offer whose posting no longer exists.
    ///
    /// `is_still_posted` is called once per offer without the store lock
    /// held. `Ok(false)` removes the offer; an error keeps it, so a flaky
    /// platform never causes data loss. Returns the number removed.
    pub async fn reconcile<F, Fut, E>(&self, is_still_posted: F) -> usize
    where
        F: Fn(OfferId) -> Fut,
        Fut: Future<Output = std::result::Result<bool, E>>,
        E: Display,
    {
        let ids: Vec<OfferId> = self.state.read().await.offers.keys().cloned().collect();

        let mut gone = Vec::new();
        for id in ids {
            match is_still_posted(id.clone()).await {
                Ok(true) => {}
                Ok(false) => gone.push(id),
                Err(error) => {
                    tracing::warn!(
                        offer = %id,
                        error = %error,
                        "Posting check failed; keeping offer"
                    );
                }
            }
        }

        if gone.is_empty() {
            tracing::info!("All offers still posted");
            return 0;
        }

        let (removed, snapshot) = {
            let mut state = self.state.write().await;
            let removed = gone
                .iter()
                .filter(|id| state.offers.remove(id).is_some())
                .count();
            (removed, state.commit())
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(removed, "Reconciled orphaned offers");
        removed
    }

    /// Write the current state, surfacing any persistence error.
    pub async fn flush(&self) -> Result<()> {
        let snapshot = self.state.write().await.commit();
        self.document.write(&snapshot).await.map(|_| ())
    }
}
