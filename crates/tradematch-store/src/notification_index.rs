//! Wishlist subscriptions: participant → keywords they want alerts for.
//!
//! Keywords are deduplicated case-insensitively and keep the casing of their
//! first insertion. A participant whose last keyword is removed disappears
//! from the index, so no empty set is ever stored or persisted.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
};

use tokio::sync::RwLock;
use tradematch_types::{ParticipantId, Result, TradematchError, contains_ignore_case};

use crate::document::{JsonDocument, Snapshot};

/// Persisted document: participant id (as a string key) → keywords.
pub type NotificationDocument = BTreeMap<String, Vec<String>>;

/// Result of a [`NotificationIndex::subscribe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The keyword was added; `total` is the participant's new keyword count.
    Added { total: usize },
    /// The participant already had this keyword in some casing.
    AlreadySubscribed,
}

struct IndexState {
    subscriptions: HashMap<ParticipantId, Vec<String>>,
    version: u64,
}

impl IndexState {
    fn from_document(document: NotificationDocument) -> Self {
        let mut subscriptions = HashMap::new();
        for (key, keywords) in document {
            let Ok(participant) = key.parse::<ParticipantId>() else {
                tracing::warn!(key = %key, "Skipping subscription with unparsable participant id");
                continue;
            };
            let mut kept: Vec<String> = Vec::with_capacity(keywords.len());
            for keyword in keywords {
                let keyword = keyword.trim().to_string();
                if !keyword.is_empty() && !kept.iter().any(|k| same_keyword(k, &keyword)) {
                    kept.push(keyword);
                }
            }
            if !kept.is_empty() {
                subscriptions.insert(participant, kept);
            }
        }
        Self {
            subscriptions,
            version: 0,
        }
    }

    fn commit(&mut self) -> Snapshot<NotificationDocument> {
        self.version += 1;
        let document = self
            .subscriptions
            .iter()
            .map(|(participant, keywords)| (participant.to_string(), keywords.clone()))
            .collect();
        Snapshot {
            version: self.version,
            document,
        }
    }
}

fn same_keyword(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Durable keyword subscriptions.
pub struct NotificationIndex {
    state: RwLock<IndexState>,
    document: JsonDocument,
}

impl NotificationIndex {
    #[must_use]
    pub fn open(path: Option<PathBuf>) -> Self {
        let document = JsonDocument::new("notifications", path);
        let state = IndexState::from_document(document.load());
        tracing::info!(
            subscribers = state.subscriptions.len(),
            "Notification index loaded"
        );
        Self {
            state: RwLock::new(state),
            document,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(None)
    }

    /// Add `keyword` to the participant's wishlist.
    ///
    /// # Errors
    /// `InvalidKeyword` if the keyword is blank.
    pub async fn subscribe(
        &self,
        participant: ParticipantId,
        keyword: &str,
    ) -> Result<SubscribeOutcome> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(TradematchError::InvalidKeyword {
                reason: "keyword must not be empty".to_string(),
            });
        }

        let (total, snapshot) = {
            let mut state = self.state.write().await;
            let keywords = state.subscriptions.entry(participant).or_default();
            if keywords.iter().any(|k| same_keyword(k, keyword)) {
                return Ok(SubscribeOutcome::AlreadySubscribed);
            }
            keywords.push(keyword.to_string());
            let total = keywords.len();
            (total, state.commit())
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(participant = %participant, keyword, total, "Wishlist keyword added");
        Ok(SubscribeOutcome::Added { total })
    }

    /// Remove every keyword of `participant` containing `needle`, ignoring case.
    ///
    /// Returns the removed keywords. A blank needle removes nothing.
    pub async fn unsubscribe(&self, participant: ParticipantId, needle: &str) -> Vec<String> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Vec::new();
        }

        let (removed, snapshot) = {
            let mut state = self.state.write().await;
            let Some(keywords) = state.subscriptions.get_mut(&participant) else {
                return Vec::new();
            };
            let (removed, kept): (Vec<String>, Vec<String>) = keywords
                .drain(..)
                .partition(|k| contains_ignore_case(k, needle));
            if removed.is_empty() {
                *keywords = kept;
                return Vec::new();
            }
            if kept.is_empty() {
                state.subscriptions.remove(&participant);
            } else {
                *keywords = kept;
            }
            (removed, state.commit())
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(
            participant = %participant,
            removed = removed.len(),
            "Wishlist keywords removed"
        );
        removed
    }

    /// Every other participant whose keywords appear in `offering`.
    ///
    /// Each entry lists only the keywords that matched, in subscription order.
    pub async fn match_against(
        &self,
        offering: &str,
        exclude: ParticipantId,
    ) -> BTreeMap<ParticipantId, Vec<String>> {
        let state = self.state.read().await;
        state
            .subscriptions
            .iter()
            .filter(|(participant, _)| **participant != exclude)
            .filter_map(|(participant, keywords)| {
                let hits: Vec<String> = keywords
                    .iter()
                    .filter(|k| contains_ignore_case(offering, k))
                    .cloned()
                    .collect();
                (!hits.is_empty()).then_some((*participant, hits))
            })
            .collect()
    }

    /// The participant's keywords, sorted case-insensitively.
    pub async fn subscriptions_of(&self, participant: ParticipantId) -> Vec<String> {
        let mut keywords = self
            .state
            .read()
            .await
            .subscriptions
            .get(&participant)
            .cloned()
            .unwrap_or_default();
        keywords.sort_by_key(|k| k.to_lowercase());
        keywords
    }

    /// Number of participants with at least one keyword.
    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscriptions.len()
    }

    pub async fn flush(&self) -> Result<()> {
        let snapshot = self.state.write().await.commit();
        self.document.write(&snapshot).await.map(|_| ())
    }
}
