//! The coordinator between the stores, the matcher, and the platform.
//!
//! ```text
//! submit_offer ─► OfferStore::create
//!              ─► find_offer_matches ─► deliver AutoMatch
//!                                    ─► RequestLedger::create_pending
//!              ─► NotificationIndex::match_against ─► deliver WishlistAlert
//!
//! request_trade ─► deliver TradeRequest ─► RequestLedger::create_pending
//!
//! accept ─► RequestLedger::accept ─► create_private_channel
//!                                 └► deliver MatchAccepted (auto-matches only)
//! ```
//!
//! No store lock is held across a platform call: every store operation
//! completes before the broker awaits the platform. A pending request is
//! recorded only after its notification was delivered, so a failed delivery
//! never leaves a half-created entry.

use std::sync::Arc;

use tradematch_matchcore::find_offer_matches;
use tradematch_store::{Clock, NotificationIndex, OfferStore, RequestLedger, SubscribeOutcome};
use tradematch_types::{
    ChannelHandle, Identity, MessageId, NewRequest, Notification, Offer, OfferId, ParticipantId,
    PendingRequest, ReaperConfig, RequestKind, Result, StoreConfig, TradematchError, constants,
};

use crate::{platform::Platform, reaper::ExpiryReaper};

/// What happened when an offer was submitted.
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub offer: Offer,
    /// Compatible existing offers found by the matcher.
    pub matches_found: usize,
    /// Auto-match requests recorded, one per delivered notification.
    pub auto_match_requests: Vec<MessageId>,
    /// Wishlist alerts delivered.
    pub alerts_sent: usize,
    /// Notifications that could not be delivered.
    pub failed_deliveries: usize,
}

/// A successfully accepted request.
#[derive(Debug, Clone)]
pub struct Acceptance {
    pub request: PendingRequest,
    /// `None` if the platform refused to open the channel.
    pub channel: Option<ChannelHandle>,
}

/// A search hit joined with its owner's display identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub offer: Offer,
    pub owner: Identity,
}

/// Counts shown on the status panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub active_offers: usize,
    pub notification_users: usize,
    pub pending_requests: usize,
}

pub struct Broker {
    platform: Arc<dyn Platform>,
    offers: OfferStore,
    notifications: NotificationIndex,
    ledger: Arc<RequestLedger>,
    clock: Arc<dyn Clock>,
}

impl Broker {
    #[must_use]
    pub fn new(
        platform: Arc<dyn Platform>,
        offers: OfferStore,
        notifications: NotificationIndex,
        ledger: Arc<RequestLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            platform,
            offers,
            notifications,
            ledger,
            clock,
        }
    }

    /// Open all three stores from `config`.
    #[must_use]
    pub fn open(
        config: &StoreConfig,
        platform: Arc<dyn Platform>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            data_dir = ?config.data_dir,
            "Opening stores"
        );
        let offers = OfferStore::open(config.offers_path());
        let notifications = NotificationIndex::open(config.notifications_path());
        let ledger = Arc::new(RequestLedger::open(
            config.requests_path(),
            Arc::clone(&clock),
        ));
        Self::new(platform, offers, notifications, ledger, clock)
    }

    /// A reaper sweeping this broker's ledger with this broker's clock.
    ///
    /// # Errors
    /// `Configuration` if the sweep interval is zero.
    pub fn reaper(&self, config: ReaperConfig) -> Result<ExpiryReaper> {
        ExpiryReaper::new(Arc::clone(&self.ledger), Arc::clone(&self.clock), config)
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<RequestLedger> {
        &self.ledger
    }

    // =====================================================================
    // Offers
    // =====================================================================

    /// Post a new offer, then notify every compatible trader and every
    /// wishlist subscriber whose keywords it mentions.
    ///
    /// Only the offer creation can fail; delivery failures are counted in
    /// the report and skipped.
    pub async fn submit_offer(
        &self,
        owner: ParticipantId,
        offering: &str,
        wanting: &str,
    ) -> Result<SubmissionReport> {
        let offer = self.offers.create(owner, offering, wanting).await?;
        self.notify_about(offer).await
    }

    /// Same as [`Self::submit_offer`] for an offer whose id was assigned by
    /// the platform's public posting.
    pub async fn submit_posted_offer(
        &self,
        id: OfferId,
        owner: ParticipantId,
        offering: &str,
        wanting: &str,
    ) -> Result<SubmissionReport> {
        let offer = self.offers.create_with_id(id, owner, offering, wanting).await?;
        self.notify_about(offer).await
    }

    async fn notify_about(&self, offer: Offer) -> Result<SubmissionReport> {
        let trader = self.identity_or_placeholder(offer.owner_id).await;

        let candidates = self.offers.all().await;
        let matches =
            find_offer_matches(offer.owner_id, &offer.offering, &offer.wanting, &candidates);

        let mut report = SubmissionReport {
            offer: offer.clone(),
            matches_found: matches.len(),
            auto_match_requests: Vec::new(),
            alerts_sent: 0,
            failed_deliveries: 0,
        };

        for found in matches {
            let counterparty = found.offer.owner_id;
            let notification = Notification::AutoMatch {
                tier: found.tier,
                score: found.score,
                new_trader: trader.clone(),
                their_offer: offer.offering.clone(),
                their_wants: offer.wanting.clone(),
                your_offer: found.offer.offering.clone(),
                your_wants: found.offer.wanting.clone(),
            };

            let Some(message_id) = self.deliver(counterparty, &notification).await else {
                report.failed_deliveries += 1;
                continue;
            };

            let request = self
                .ledger
                .create_pending(NewRequest {
                    id: message_id,
                    kind: RequestKind::AutoMatch,
                    requester_id: offer.owner_id,
                    counterparty_id: counterparty,
                    requester_offer: offer.offering.clone(),
                    counterparty_offer: found.offer.offering,
                    counterparty_wants: found.offer.wanting,
                })
                .await;
            report.auto_match_requests.push(request.id);
        }

        let subscribers = self
            .notifications
            .match_against(&offer.offering, offer.owner_id)
            .await;
        for (subscriber, keywords) in subscribers {
            let notification = Notification::WishlistAlert {
                keywords,
                offered_by: trader.clone(),
                offering: offer.offering.clone(),
                wanting: offer.wanting.clone(),
            };
            if self.deliver(subscriber, &notification).await.is_some() {
                report.alerts_sent += 1;
            } else {
                report.failed_deliveries += 1;
            }
        }

        tracing::info!(
            offer = %offer.id,
            owner = %offer.owner_id,
            matches = report.matches_found,
            requests = report.auto_match_requests.len(),
            alerts = report.alerts_sent,
            failed = report.failed_deliveries,
            "Offer submitted"
        );
        Ok(report)
    }

    /// Remove one of the participant's offers. `false` if missing or not theirs.
    pub async fn remove_offer(&self, id: &OfferId, requester: ParticipantId) -> bool {
        self.offers.remove(id, requester).await
    }

    /// Remove every offer of `requester` whose text contains `needle`.
    pub async fn remove_offers_matching(
        &self,
        requester: ParticipantId,
        needle: &str,
    ) -> Vec<Offer> {
        self.offers.remove_by_substring(requester, needle).await
    }

    pub async fn offers_of(&self, owner: ParticipantId) -> Vec<Offer> {
        self.offers.offers_of(owner).await
    }

    /// Drop offers whose public posting has been deleted on the platform.
    ///
    /// A failed check keeps the offer.
    pub async fn reconcile_offers(&self) -> usize {
        let platform = &self.platform;
        self.offers
            .reconcile(|id| async move { platform.check_posting_exists(&id).await })
            .await
    }

    /// Offers whose offering text contains `needle`.
    pub async fn search_offering(&self, needle: &str) -> Vec<Listing> {
        let offers = self.offers.find_by_offer_substring(needle).await;
        self.listings(offers).await
    }

    /// Offers whose wanting text contains `needle`.
    pub async fn search_wanting(&self, needle: &str) -> Vec<Listing> {
        let offers = self.offers.find_by_wants_substring(needle).await;
        self.listings(offers).await
    }

    async fn listings(&self, offers: Vec<Offer>) -> Vec<Listing> {
        let mut listings = Vec::with_capacity(offers.len());
        for offer in offers {
            match self.platform.lookup_identity(offer.owner_id).await {
                Ok(owner) => listings.push(Listing { offer, owner }),
                Err(error) => {
                    tracing::debug!(
                        offer = %offer.id,
                        owner = %offer.owner_id,
                        error = %error,
                        "Skipping listing with unresolvable owner"
                    );
                }
            }
        }
        listings
    }

    // =====================================================================
    // Trade requests
    // =====================================================================

    /// Ask the owner of `offer_id` to trade for `proposed`.
    ///
    /// Returns `Ok(None)` if the offer no longer exists.
    ///
    /// # Errors
    /// - `InvalidRequest` if `proposed` is blank or the requester owns the offer
    /// - `DeliveryFailed` (or another mapped platform error) if the owner
    ///   could not be notified; nothing is recorded in that case
    pub async fn request_trade(
        &self,
        requester: ParticipantId,
        offer_id: &OfferId,
        proposed: &str,
    ) -> Result<Option<PendingRequest>> {
        let proposed = proposed.trim();
        if proposed.is_empty() {
            return Err(TradematchError::InvalidRequest {
                reason: "proposed offer must not be empty".to_string(),
            });
        }

        let Some(offer) = self.offers.get(offer_id).await else {
            return Ok(None);
        };
        if offer.is_owned_by(requester) {
            return Err(TradematchError::InvalidRequest {
                reason: "cannot request a trade on your own offer".to_string(),
            });
        }

        let notification = Notification::TradeRequest {
            requester: self.identity_or_placeholder(requester).await,
            proposed_offer: proposed.to_string(),
            your_offer: offer.offering.clone(),
            your_wants: offer.wanting.clone(),
        };
        let message_id = self
            .platform
            .deliver_direct_message(offer.owner_id, &notification)
            .await?;

        let request = self
            .ledger
            .create_pending(NewRequest {
                id: message_id,
                kind: RequestKind::Standard,
                requester_id: requester,
                counterparty_id: offer.owner_id,
                requester_offer: proposed.to_string(),
                counterparty_offer: offer.offering,
                counterparty_wants: offer.wanting,
            })
            .await;
        Ok(Some(request))
    }

    /// Accept a pending request on behalf of `actor`.
    ///
    /// `None` if the request is unknown, already resolved, or `actor` is not
    /// the counterparty. Channel and follow-up delivery failures are logged;
    /// the acceptance itself stands.
    pub async fn accept(&self, id: &MessageId, actor: ParticipantId) -> Option<Acceptance> {
        let request = self.ledger.accept(id, actor).await?;

        let members = [request.requester_id, request.counterparty_id];
        let channel = match self.platform.create_private_channel(&members).await {
            Ok(channel) => Some(channel),
            Err(error) => {
                tracing::warn!(request = %id, error = %error, "Private channel creation failed");
                None
            }
        };

        if request.is_auto_match() {
            let notification = Notification::MatchAccepted {
                accepted_by: self.identity_or_placeholder(actor).await,
                your_offer: request.requester_offer.clone(),
                their_offer: request.counterparty_offer.clone(),
                their_wants: request.counterparty_wants.clone(),
            };
            self.deliver(request.requester_id, &notification).await;
        }

        Some(Acceptance { request, channel })
    }

    /// Decline a pending request on behalf of `actor`.
    pub async fn decline(&self, id: &MessageId, actor: ParticipantId) -> Option<PendingRequest> {
        self.ledger.decline(id, actor).await
    }

    pub async fn pending_for(&self, participant: ParticipantId) -> Vec<PendingRequest> {
        self.ledger.pending_for(participant).await
    }

    // =====================================================================
    // Wishlist
    // =====================================================================

    pub async fn subscribe(
        &self,
        participant: ParticipantId,
        keyword: &str,
    ) -> Result<SubscribeOutcome> {
        self.notifications.subscribe(participant, keyword).await
    }

    pub async fn unsubscribe(&self, participant: ParticipantId, needle: &str) -> Vec<String> {
        self.notifications.unsubscribe(participant, needle).await
    }

    pub async fn subscriptions_of(&self, participant: ParticipantId) -> Vec<String> {
        self.notifications.subscriptions_of(participant).await
    }

    pub async fn stats(&self) -> Stats {
        Stats {
            active_offers: self.offers.len().await,
            notification_users: self.notifications.subscriber_count().await,
            pending_requests: self.ledger.len().await,
        }
    }

    /// Flush all three stores to disk.
    pub async fn flush(&self) -> Result<()> {
        self.offers.flush().await?;
        self.notifications.flush().await?;
        self.ledger.flush().await
    }

    // =====================================================================
    // Platform helpers
    // =====================================================================

    async fn identity_or_placeholder(&self, participant: ParticipantId) -> Identity {
        match self.platform.lookup_identity(participant).await {
            Ok(identity) => identity,
            Err(error) => {
                tracing::warn!(
                    participant = %participant,
                    error = %error,
                    "Identity lookup failed; using placeholder"
                );
                Identity::placeholder(participant)
            }
        }
    }

    /// Deliver a notification, logging and swallowing failures.
    async fn deliver(
        &self,
        recipient: ParticipantId,
        notification: &Notification,
    ) -> Option<MessageId> {
        match self
            .platform
            .deliver_direct_message(recipient, notification)
            .await
        {
            Ok(message_id) => {
                tracing::debug!(
                    recipient = %recipient,
                    kind = notification.kind(),
                    message_id = %message_id,
                    "Notification delivered"
                );
                Some(message_id)
            }
            Err(error) => {
                tracing::warn!(
                    recipient = %recipient,
                    kind = notification.kind(),
                    error = %error,
                    "Notification delivery failed"
                );
                None
            }
        }
    }
}
