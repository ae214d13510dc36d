//! Durable ledger of pending trade requests.
//!
//! ```text
//! create_pending ──► PENDING ─┬─ accept(counterparty)  ─► removed, returned
//!                             ├─ decline(counterparty) ─► removed, returned
//!                             └─ sweep_expired         ─► removed, id returned
//! ```
//!
//! Each resolution is a single lookup-and-remove under the write lock, so
//! among racing accept/decline/sweep calls on one id exactly one wins.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tradematch_types::{
    MessageId, NewRequest, ParticipantId, PendingRequest, RequestKind, RequestState, Result,
};

use crate::{
    clock::Clock,
    document::{JsonDocument, Snapshot},
};

/// Persisted form of one pending request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Creation time in seconds since the Unix epoch.
    pub timestamp: f64,
    pub requester_id: u64,
    pub original_offerer_id: u64,
    pub requested_offer: String,
    pub original_offer: String,
    pub original_wants: String,
    pub is_auto_match: bool,
}

impl RequestRecord {
    #[allow(clippy::cast_precision_loss)]
    fn from_request(request: &PendingRequest) -> Self {
        Self {
            timestamp: request.created_at.timestamp_micros() as f64 / 1_000_000.0,
            requester_id: request.requester_id.0,
            original_offerer_id: request.counterparty_id.0,
            requested_offer: request.requester_offer.clone(),
            original_offer: request.counterparty_offer.clone(),
            original_wants: request.counterparty_wants.clone(),
            is_auto_match: request.is_auto_match(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn created_at(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        DateTime::from_timestamp_micros((self.timestamp * 1_000_000.0).round() as i64)
    }

    fn into_request(self, id: MessageId) -> Option<PendingRequest> {
        let created_at = self.created_at()?;
        Some(PendingRequest {
            id,
            kind: if self.is_auto_match {
                RequestKind::AutoMatch
            } else {
                RequestKind::Standard
            },
            created_at,
            requester_id: ParticipantId(self.requester_id),
            counterparty_id: ParticipantId(self.original_offerer_id),
            requester_offer: self.requested_offer,
            counterparty_offer: self.original_offer,
            counterparty_wants: self.original_wants,
        })
    }
}

/// Persisted document: message id → record.
pub type RequestDocument = BTreeMap<String, RequestRecord>;

struct LedgerState {
    requests: BTreeMap<MessageId, PendingRequest>,
    version: u64,
}

impl LedgerState {
    fn from_document(document: RequestDocument) -> Self {
        let mut requests = BTreeMap::new();
        for (key, record) in document {
            if key.trim().is_empty() {
                tracing::warn!("Skipping pending request with empty id");
                continue;
            }
            let id = MessageId(key);
            let timestamp = record.timestamp;
            match record.into_request(id.clone()) {
                Some(request) => {
                    requests.insert(id, request);
                }
                None => {
                    tracing::warn!(
                        request = %id,
                        timestamp,
                        "Skipping pending request with invalid timestamp"
                    );
                }
            }
        }
        Self {
            requests,
            version: 0,
        }
    }

    fn commit(&mut self) -> Snapshot<RequestDocument> {
        self.version += 1;
        let document = self
            .requests
            .iter()
            .map(|(id, request)| (id.0.clone(), RequestRecord::from_request(request)))
            .collect();
        Snapshot {
            version: self.version,
            document,
        }
    }
}

/// Pending trade requests keyed by the id of the notification that carries
/// their accept/decline controls.
pub struct RequestLedger {
    state: RwLock<LedgerState>,
    document: JsonDocument,
    clock: Arc<dyn Clock>,
}

impl RequestLedger {
    #[must_use]
    pub fn open(path: Option<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let document = JsonDocument::new("ledger", path);
        let state = LedgerState::from_document(document.load());
        tracing::info!(pending = state.requests.len(), "Request ledger loaded");
        Self {
            state: RwLock::new(state),
            document,
            clock,
        }
    }

    #[must_use]
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::open(None, clock)
    }

    /// Record a pending request stamped with the ledger clock.
    ///
    /// Only call this once the notification has been delivered: its id is
    /// the request id.
    pub async fn create_pending(&self, new: NewRequest) -> PendingRequest {
        let now = self.clock.now();
        self.create_pending_at(new, now).await
    }

    /// Record a pending request with an explicit creation time.
    ///
    /// The time is truncated to microseconds, the precision of the
    /// persisted timestamp. An existing entry under the same id is replaced.
    pub async fn create_pending_at(
        &self,
        new: NewRequest,
        created_at: DateTime<Utc>,
    ) -> PendingRequest {
        let request = PendingRequest::from_new(new, created_at.trunc_subsecs(6));

        let (replaced, snapshot) = {
            let mut state = self.state.write().await;
            let replaced = state
                .requests
                .insert(request.id.clone(), request.clone())
                .is_some();
            (replaced, state.commit())
        };
        self.document.write_logged(&snapshot).await;

        if replaced {
            tracing::warn!(
                request = %request.id,
                "Pending request id reused; previous entry replaced"
            );
        }
        tracing::info!(
            request = %request.id,
            kind = %request.kind,
            requester = %request.requester_id,
            counterparty = %request.counterparty_id,
            "Pending request recorded"
        );
        request
    }

    /// Accept a pending request. `None` if unknown or `actor` is not the
    /// counterparty; in the latter case the request stays pending.
    pub async fn accept(&self, id: &MessageId, actor: ParticipantId) -> Option<PendingRequest> {
        self.resolve(id, actor, RequestState::Accepted).await
    }

    /// Decline a pending request. Same rules as [`Self::accept`].
    pub async fn decline(&self, id: &MessageId, actor: ParticipantId) -> Option<PendingRequest> {
        self.resolve(id, actor, RequestState::Declined).await
    }

    async fn resolve(
        &self,
        id: &MessageId,
        actor: ParticipantId,
        outcome: RequestState,
    ) -> Option<PendingRequest> {
        debug_assert!(RequestState::Pending.can_transition_to(outcome));
        let (request, snapshot) = {
            let mut state = self.state.write().await;
            match state.requests.get(id) {
                Some(request) if request.can_be_resolved_by(actor) => {}
                Some(_) => {
                    tracing::debug!(
                        request = %id,
                        actor = %actor,
                        "Request not resolvable by actor"
                    );
                    return None;
                }
                None => return None,
            }
            let request = state.requests.remove(id)?;
            (request, state.commit())
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(
            request = %id,
            kind = %request.kind,
            outcome = %outcome,
            "Pending request resolved"
        );
        Some(request)
    }

    /// Remove every request strictly older than `ttl` at `now`.
    pub async fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<MessageId> {
        let (expired, snapshot) = {
            let mut state = self.state.write().await;
            let expired: Vec<MessageId> = state
                .requests
                .values()
                .filter(|request| request.is_expired(now, ttl))
                .map(|request| request.id.clone())
                .collect();
            if expired.is_empty() {
                return expired;
            }
            for id in &expired {
                state.requests.remove(id);
            }
            (expired, state.commit())
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(
            expired = expired.len(),
            outcome = %RequestState::Expired,
            "Swept expired requests"
        );
        expired
    }

    /// Drop a request without resolving it. Returns whether it existed.
    pub async fn discard(&self, id: &MessageId) -> bool {
        let snapshot = {
            let mut state = self.state.write().await;
            if state.requests.remove(id).is_none() {
                return false;
            }
            state.commit()
        };
        self.document.write_logged(&snapshot).await;

        tracing::info!(request = %id, "Pending request discarded");
        true
    }

    pub async fn get(&self, id: &MessageId) -> Option<PendingRequest> {
        self.state.read().await.requests.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.requests.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.requests.is_empty()
    }

    /// Requests where `participant` is either side, oldest first.
    pub async fn pending_for(&self, participant: ParticipantId) -> Vec<PendingRequest> {
        let mut requests: Vec<PendingRequest> = self
            .state
            .read()
            .await
            .requests
            .values()
            .filter(|request| request.involves(participant))
            .cloned()
            .collect();
        requests.sort_by_key(|request| request.created_at);
        requests
    }

    pub async fn flush(&self) -> Result<()> {
        let snapshot = self.state.write().await.commit();
        self.document.write(&snapshot).await.map(|_| ())
    }
}
