//! End-to-end tests of the broker against an in-memory platform.
//!
//! The recording platform stores every delivered notification and every
//! opened channel, and can be told to fail deliveries, identity lookups,
//! channel creation, or posting checks for chosen participants and offers.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use rand::{Rng, seq::SliceRandom};
use tradematch_broker::{Broker, Platform, PlatformError};
use tradematch_store::{
    ManualClock, NotificationIndex, OfferStore, RequestLedger, SubscribeOutcome, SystemClock,
};
use tradematch_types::{
    ChannelHandle, ChannelId, Identity, MatchTier, MessageId, Notification, OfferId, ParticipantId,
    ReaperConfig, RequestKind, StoreConfig, TradematchError,
};

const X: ParticipantId = ParticipantId(1001);
const Y: ParticipantId = ParticipantId(1002);
const Z: ParticipantId = ParticipantId(1003);
const W: ParticipantId = ParticipantId(1004);

#[derive(Debug, Clone)]
struct Delivery {
    recipient: ParticipantId,
    message: MessageId,
    notification: Notification,
}

#[derive(Default)]
struct RecordingPlatform {
    next_message: AtomicU64,
    deliveries: Mutex<Vec<Delivery>>,
    channels: Mutex<Vec<ChannelHandle>>,
    unreachable: Mutex<HashSet<ParticipantId>>,
    anonymous: Mutex<HashSet<ParticipantId>>,
    deleted_postings: Mutex<HashSet<OfferId>>,
    flaky_postings: Mutex<HashSet<OfferId>>,
    refuse_channels: AtomicBool,
}

impl RecordingPlatform {
    fn deliveries_to(&self, recipient: ParticipantId) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.recipient == recipient)
            .cloned()
            .collect()
    }

    fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    fn make_unreachable(&self, participant: ParticipantId) {
        self.unreachable.lock().unwrap().insert(participant);
    }

    fn make_anonymous(&self, participant: ParticipantId) {
        self.anonymous.lock().unwrap().insert(participant);
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn deliver_direct_message(
        &self,
        participant: ParticipantId,
        notification: &Notification,
    ) -> Result<MessageId, PlatformError> {
        if self.unreachable.lock().unwrap().contains(&participant) {
            return Err(PlatformError::Unreachable {
                participant,
                reason: "direct messages closed".to_string(),
            });
        }
        let n = self.next_message.fetch_add(1, Ordering::SeqCst);
        let message = MessageId(format!("13900000000000{n:05}"));
        self.deliveries.lock().unwrap().push(Delivery {
            recipient: participant,
            message: message.clone(),
            notification: notification.clone(),
        });
        Ok(message)
    }

    async fn lookup_identity(&self, participant: ParticipantId) -> Result<Identity, PlatformError> {
        if self.anonymous.lock().unwrap().contains(&participant) {
            return Err(PlatformError::UnknownParticipant(participant));
        }
        Ok(Identity {
            id: participant,
            display_name: format!("trader-{participant}"),
        })
    }

    async fn create_private_channel(
        &self,
        members: &[ParticipantId],
    ) -> Result<ChannelHandle, PlatformError> {
        if self.refuse_channels.load(Ordering::SeqCst) {
            return Err(PlatformError::ChannelRefused("missing permission".to_string()));
        }
        let mut channels = self.channels.lock().unwrap();
        let handle = ChannelHandle {
            id: ChannelId(format!("trade-{}", channels.len() + 1)),
            members: members.to_vec(),
        };
        channels.push(handle.clone());
        Ok(handle)
    }

    async fn check_posting_exists(&self, offer: &OfferId) -> Result<bool, PlatformError> {
        if self.flaky_postings.lock().unwrap().contains(offer) {
            return Err(PlatformError::Unavailable("gateway timeout".to_string()));
        }
        Ok(!self.deleted_postings.lock().unwrap().contains(offer))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (Arc<RecordingPlatform>, Broker) {
    init_tracing();
    let platform = Arc::new(RecordingPlatform::default());
    let clock = Arc::new(SystemClock);
    let broker = Broker::new(
        platform.clone(),
        OfferStore::in_memory(),
        NotificationIndex::in_memory(),
        Arc::new(RequestLedger::in_memory(clock.clone())),
        clock,
    );
    (platform, broker)
}

// =========================================================================
// Auto-match
// =========================================================================

#[tokio::test]
async fn perfect_match_notifies_and_opens_channel_on_accept() {
    let (platform, broker) = setup();

    let first = broker.submit_offer(X, "Rare Blue Sword", "Golden Shield").await.unwrap();
    assert_eq!(first.matches_found, 0);
    assert_eq!(platform.delivery_count(), 0);

    let second = broker
        .submit_offer(Y, "Golden Shield +2", "Rare Blue Sword")
        .await
        .unwrap();
    assert_eq!(second.matches_found, 1);
    assert_eq!(second.auto_match_requests.len(), 1);
    assert_eq!(second.failed_deliveries, 0);

    // X (the existing offer's owner) is told about Y's new offer.
    let to_x = platform.deliveries_to(X);
    assert_eq!(to_x.len(), 1);
    let Notification::AutoMatch { tier, score, new_trader, their_offer, your_offer, .. } =
        &to_x[0].notification
    else {
        panic!("expected an auto-match, got {:?}", to_x[0].notification);
    };
    assert_eq!(*tier, MatchTier::Perfect);
    assert_eq!(*score, 100);
    assert_eq!(new_trader.id, Y);
    assert_eq!(their_offer, "Golden Shield +2");
    assert_eq!(your_offer, "Rare Blue Sword");

    // The request is keyed by the delivered message.
    let request_id = second.auto_match_requests[0].clone();
    assert_eq!(request_id, to_x[0].message);
    let pending = broker.ledger().get(&request_id).await.unwrap();
    assert_eq!(pending.kind, RequestKind::AutoMatch);
    assert_eq!(pending.requester_id, Y);
    assert_eq!(pending.counterparty_id, X);

    // Only X may answer.
    assert!(broker.accept(&request_id, Y).await.is_none());

    let acceptance = broker.accept(&request_id, X).await.unwrap();
    let channel = acceptance.channel.unwrap();
    assert_eq!(channel.members, vec![Y, X]);
    assert_eq!(acceptance.request.id, request_id);

    // Y hears that X accepted.
    let to_y = platform.deliveries_to(Y);
    assert_eq!(to_y.len(), 1);
    assert!(matches!(
        &to_y[0].notification,
        Notification::MatchAccepted { accepted_by, .. } if accepted_by.id == X
    ));

    assert_eq!(broker.stats().await.pending_requests, 0);
    assert!(broker.accept(&request_id, X).await.is_none());
}

#[tokio::test]
async fn suffixed_wants_downgrade_the_sword_for_shield_trade_to_interest() {
    let (platform, broker) = setup();

    broker
        .submit_offer(Y, "Golden Shield +2", "Rare Blue Sword +1")
        .await
        .unwrap();
    let report = broker.submit_offer(X, "Rare Blue Sword", "Golden Shield").await.unwrap();
    assert_eq!(report.matches_found, 1);
    assert_eq!(report.auto_match_requests.len(), 1);

    // X's wants fit inside Y's offering; "rare blue sword +1" does not fit
    // inside "Rare Blue Sword", so only one direction holds.
    let to_y = platform.deliveries_to(Y);
    assert_eq!(to_y.len(), 1);
    let Notification::AutoMatch { tier, score, new_trader, .. } = &to_y[0].notification else {
        panic!("expected an auto-match, got {:?}", to_y[0].notification);
    };
    assert_eq!(*tier, MatchTier::Interest);
    assert_eq!(*score, 75);
    assert_eq!(new_trader.id, X);

    let request_id = report.auto_match_requests[0].clone();
    assert_eq!(request_id, to_y[0].message);
    let pending = broker.ledger().get(&request_id).await.unwrap();
    assert_eq!(pending.requester_id, X);
    assert_eq!(pending.counterparty_id, Y);

    let acceptance = broker.accept(&request_id, Y).await.unwrap();
    assert_eq!(acceptance.channel.unwrap().members, vec![X, Y]);
    assert!(broker.ledger().get(&request_id).await.is_none());

    let to_x = platform.deliveries_to(X);
    assert_eq!(to_x.len(), 1);
    assert!(matches!(
        &to_x[0].notification,
        Notification::MatchAccepted { accepted_by, .. } if accepted_by.id == Y
    ));
}

#[tokio::test]
async fn every_compatible_offer_gets_its_own_request() {
    let (platform, broker) = setup();
    broker.submit_offer(X, "Golden Crown", "Coins").await.unwrap();
    broker.submit_offer(Z, "Golden Crown +1", "Gems").await.unwrap();
    broker.submit_offer(W, "Kitty Purse", "Gems").await.unwrap();
    assert_eq!(platform.delivery_count(), 0);

    let report = broker.submit_offer(Y, "Gold", "golden crown").await.unwrap();
    assert_eq!(report.matches_found, 2);
    assert_eq!(report.auto_match_requests.len(), 2);
    assert_eq!(platform.deliveries_to(W).len(), 0);

    for delivery in platform.deliveries_to(X).into_iter().chain(platform.deliveries_to(Z)) {
        assert!(matches!(
            delivery.notification,
            Notification::AutoMatch { tier: MatchTier::Interest, score: 75, .. }
        ));
    }
}

#[tokio::test]
async fn own_offers_never_match() {
    let (platform, broker) = setup();
    broker.submit_offer(X, "Rare Blue Sword", "Golden Shield").await.unwrap();
    let report = broker
        .submit_offer(X, "Golden Shield", "Rare Blue Sword")
        .await
        .unwrap();
    assert_eq!(report.matches_found, 0);
    assert_eq!(platform.delivery_count(), 0);
}

#[tokio::test]
async fn failed_delivery_is_skipped_without_a_request() {
    let (platform, broker) = setup();
    broker.submit_offer(X, "Golden Shield", "Rare Blue Sword").await.unwrap();
    platform.make_unreachable(X);
    // Z's own submission keyword-matches X, but X cannot be reached.
    broker.submit_offer(Z, "Golden Shield", "Rare Blue Sword").await.unwrap();
    assert_eq!(broker.stats().await.pending_requests, 0);

    let report = broker
        .submit_offer(Y, "Rare Blue Sword", "Golden Shield")
        .await
        .unwrap();
    assert_eq!(report.matches_found, 2);
    assert_eq!(report.failed_deliveries, 1);
    assert_eq!(report.auto_match_requests.len(), 1);
    assert_eq!(broker.stats().await.pending_requests, 1);
    assert_eq!(broker.pending_for(X).await.len(), 0);
    assert_eq!(broker.pending_for(Z).await.len(), 1);
}

#[tokio::test]
async fn unresolvable_submitter_gets_placeholder_identity() {
    let (platform, broker) = setup();
    broker.submit_offer(X, "Golden Shield", "Epic Mount").await.unwrap();
    platform.make_anonymous(Y);

    broker.submit_offer(Y, "Epic Mount", "Golden Shield").await.unwrap();
    let to_x = platform.deliveries_to(X);
    assert!(matches!(
        &to_x[0].notification,
        Notification::AutoMatch { new_trader, .. } if new_trader.display_name == "Participant 1002"
    ));
}

#[tokio::test]
async fn blank_offering_is_rejected_before_any_delivery() {
    let (platform, broker) = setup();
    let err = broker.submit_offer(X, "  ", "Sword").await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(broker.stats().await.active_offers, 0);
    assert_eq!(platform.delivery_count(), 0);
}

// =========================================================================
// Wishlist
// =========================================================================

#[tokio::test]
async fn wishlist_subscribers_are_alerted_with_matched_keywords() {
    let (platform, broker) = setup();
    assert_eq!(
        broker.subscribe(W, "blue sword").await.unwrap(),
        SubscribeOutcome::Added { total: 1 }
    );
    broker.subscribe(W, "pet").await.unwrap();
    broker.subscribe(X, "sword").await.unwrap();

    let report = broker.submit_offer(X, "Rare Blue Sword", "Gold").await.unwrap();
    assert_eq!(report.alerts_sent, 1);
    assert!(platform.deliveries_to(X).is_empty());

    let to_w = platform.deliveries_to(W);
    assert_eq!(to_w.len(), 1);
    let Notification::WishlistAlert { keywords, offered_by, offering, .. } = &to_w[0].notification
    else {
        panic!("expected a wishlist alert");
    };
    assert_eq!(keywords, &vec!["blue sword".to_string()]);
    assert_eq!(offered_by.id, X);
    assert_eq!(offering, "Rare Blue Sword");

    // Alerts never create pending requests.
    assert_eq!(broker.stats().await.pending_requests, 0);
}

#[tokio::test]
async fn unsubscribe_by_fragment() {
    let (_platform, broker) = setup();
    broker.subscribe(W, "Blue Sword").await.unwrap();
    broker.subscribe(W, "blue shield").await.unwrap();
    broker.subscribe(W, "Epic Mount").await.unwrap();
    assert_eq!(
        broker.subscribe(W, "BLUE SWORD").await.unwrap(),
        SubscribeOutcome::AlreadySubscribed
    );

    let removed = broker.unsubscribe(W, "blue").await;
    assert_eq!(removed.len(), 2);
    assert_eq!(broker.subscriptions_of(W).await, vec!["Epic Mount"]);
    assert_eq!(broker.stats().await.notification_users, 1);
}

// =========================================================================
// Standard trade requests
// =========================================================================

#[tokio::test]
async fn standard_request_lifecycle() {
    let (platform, broker) = setup();
    let offer = broker.submit_offer(X, "Golden Shield", "Rare Blue Sword").await.unwrap().offer;

    let request = broker
        .request_trade(Y, &offer.id, "Rare Blue Sword")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.kind, RequestKind::Standard);
    assert_eq!(request.counterparty_id, X);
    assert_eq!(request.counterparty_offer, "Golden Shield");

    let to_x = platform.deliveries_to(X);
    assert_eq!(to_x.len(), 1);
    assert_eq!(to_x[0].message, request.id);
    assert!(matches!(
        &to_x[0].notification,
        Notification::TradeRequest { requester, .. } if requester.id == Y
    ));

    // The requester cannot decline on the owner's behalf.
    assert!(broker.decline(&request.id, Y).await.is_none());
    let declined = broker.decline(&request.id, X).await.unwrap();
    assert_eq!(declined.requester_offer, "Rare Blue Sword");
    assert!(broker.accept(&request.id, X).await.is_none());
}

#[tokio::test]
async fn accepting_a_standard_request_does_not_send_match_accepted() {
    let (platform, broker) = setup();
    let offer = broker.submit_offer(X, "Golden Shield", "").await.unwrap().offer;
    let request = broker.request_trade(Y, &offer.id, "Gold").await.unwrap().unwrap();

    let acceptance = broker.accept(&request.id, X).await.unwrap();
    assert!(acceptance.channel.is_some());
    assert!(platform.deliveries_to(Y).is_empty());
}

#[tokio::test]
async fn request_validation() {
    let (_platform, broker) = setup();
    let offer = broker.submit_offer(X, "Golden Shield", "").await.unwrap().offer;

    let err = broker.request_trade(Y, &offer.id, "   ").await.unwrap_err();
    assert!(matches!(err, TradematchError::InvalidRequest { .. }));

    let err = broker.request_trade(X, &offer.id, "Gold").await.unwrap_err();
    assert!(matches!(err, TradematchError::InvalidRequest { .. }));

    let missing = broker
        .request_trade(Y, &OfferId::from("gone"), "Gold")
        .await
        .unwrap();
    assert!(missing.is_none());
    assert_eq!(broker.stats().await.pending_requests, 0);
}

#[tokio::test]
async fn failed_request_delivery_records_nothing() {
    let (platform, broker) = setup();
    let offer = broker.submit_offer(X, "Golden Shield", "").await.unwrap().offer;
    platform.make_unreachable(X);

    let err = broker.request_trade(Y, &offer.id, "Gold").await.unwrap_err();
    assert!(matches!(err, TradematchError::DeliveryFailed { participant, .. } if participant == X));
    assert_eq!(broker.stats().await.pending_requests, 0);
}

#[tokio::test]
async fn request_survives_removal_of_its_offer() {
    let (_platform, broker) = setup();
    let offer = broker.submit_offer(X, "Golden Shield", "").await.unwrap().offer;
    let request = broker.request_trade(Y, &offer.id, "Gold").await.unwrap().unwrap();

    assert!(broker.remove_offer(&offer.id, X).await);
    let acceptance = broker.accept(&request.id, X).await.unwrap();
    assert_eq!(acceptance.request.counterparty_offer, "Golden Shield");
}

#[tokio::test]
async fn refused_channel_still_resolves_the_request() {
    let (platform, broker) = setup();
    let offer = broker.submit_offer(X, "Golden Shield", "").await.unwrap().offer;
    let request = broker.request_trade(Y, &offer.id, "Gold").await.unwrap().unwrap();
    platform.refuse_channels.store(true, Ordering::SeqCst);

    let acceptance = broker.accept(&request.id, X).await.unwrap();
    assert!(acceptance.channel.is_none());
    assert!(broker.ledger().get(&request.id).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_answers_resolve_each_request_once() {
    let (_platform, broker) = setup();
    let broker = Arc::new(broker);
    let offer = broker.submit_offer(X, "Golden Shield", "").await.unwrap().offer;

    let mut ids = Vec::new();
    for n in 0..20u64 {
        let request = broker
            .request_trade(ParticipantId(2000 + n), &offer.id, "Gold")
            .await
            .unwrap()
            .unwrap();
        ids.push(request.id);
    }

    // Three answers per request, shuffled, from a mix of accept and decline.
    let mut answers: Vec<(MessageId, bool)> = ids
        .iter()
        .flat_map(|id| (0..3).map(move |_| (id.clone(), rand::thread_rng().gen_bool(0.5))))
        .collect();
    answers.shuffle(&mut rand::thread_rng());

    let mut handles = Vec::new();
    for (id, accept) in answers {
        let broker = Arc::clone(&broker);
        handles.push(tokio::spawn(async move {
            let won = if accept {
                broker.accept(&id, X).await.is_some()
            } else {
                broker.decline(&id, X).await.is_some()
            };
            (id, won)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (id, won) = handle.await.unwrap();
        if won {
            winners.push(id);
        }
    }
    winners.sort();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(winners, expected);
    assert_eq!(broker.stats().await.pending_requests, 0);
}

#[tokio::test]
async fn expired_request_is_swept_and_can_no_longer_be_accepted() {
    init_tracing();
    let platform = Arc::new(RecordingPlatform::default());
    let clock = Arc::new(ManualClock::new(
        chrono::DateTime::from_timestamp(1_753_704_000, 0).unwrap(),
    ));
    let broker = Broker::new(
        platform.clone(),
        OfferStore::in_memory(),
        NotificationIndex::in_memory(),
        Arc::new(RequestLedger::in_memory(clock.clone())),
        clock.clone(),
    );
    let offer = broker.submit_offer(X, "Golden Shield", "").await.unwrap().offer;
    let request = broker.request_trade(Y, &offer.id, "Gold").await.unwrap().unwrap();
    let reaper = broker.reaper(ReaperConfig::default()).unwrap();

    clock.advance(chrono::Duration::hours(5));
    assert!(reaper.run_once().await.is_empty());

    clock.advance(chrono::Duration::minutes(1));
    assert_eq!(reaper.run_once().await, vec![request.id.clone()]);
    assert!(broker.accept(&request.id, X).await.is_none());
    assert!(platform.channels.lock().unwrap().is_empty());
}

// =========================================================================
// Offer management
// =========================================================================

#[tokio::test]
async fn remove_by_fragment_keeps_other_owners_offers() {
    let (_platform, broker) = setup();
    broker.submit_offer(X, "Rare Blue Sword", "").await.unwrap();
    broker.submit_offer(X, "Blue Shield", "").await.unwrap();
    broker.submit_offer(Y, "Blue Sword", "").await.unwrap();

    let removed = broker.remove_offers_matching(X, "blue").await;
    assert_eq!(removed.len(), 2);
    assert!(broker.offers_of(X).await.is_empty());
    assert_eq!(broker.offers_of(Y).await.len(), 1);
}

#[tokio::test]
async fn reconcile_drops_deleted_postings_only() {
    let (platform, broker) = setup();
    let live = broker.submit_offer(X, "a", "").await.unwrap().offer;
    let deleted = broker.submit_offer(X, "b", "").await.unwrap().offer;
    let flaky = broker.submit_offer(Y, "c", "").await.unwrap().offer;
    platform.deleted_postings.lock().unwrap().insert(deleted.id.clone());
    platform.flaky_postings.lock().unwrap().insert(flaky.id.clone());

    assert_eq!(broker.reconcile_offers().await, 1);
    let remaining: HashSet<OfferId> = broker
        .offers_of(X)
        .await
        .into_iter()
        .chain(broker.offers_of(Y).await)
        .map(|o| o.id)
        .collect();
    assert_eq!(remaining, HashSet::from([live.id, flaky.id]));
}

#[tokio::test]
async fn posted_offer_ids_are_unique() {
    let (_platform, broker) = setup();
    let id = OfferId::from("1391947187281330206");
    broker.submit_posted_offer(id.clone(), X, "Sword", "").await.unwrap();
    let err = broker.submit_posted_offer(id, Y, "Axe", "").await.unwrap_err();
    assert!(matches!(err, TradematchError::DuplicateOffer(_)));
}

#[tokio::test]
async fn search_joins_identity_and_skips_unknown_owners() {
    let (platform, broker) = setup();
    broker.submit_offer(X, "Golden Shield", "Rare Blue Sword").await.unwrap();
    broker.submit_offer(Y, "Golden Shield +2", "Gems").await.unwrap();
    broker.submit_offer(Z, "Loverboard", "golden shield").await.unwrap();
    platform.make_anonymous(Y);

    let hits = broker.search_offering("GOLDEN SHIELD").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].owner.display_name, "trader-1001");

    let wanting = broker.search_wanting("golden").await;
    assert_eq!(wanting.len(), 1);
    assert_eq!(wanting[0].offer.owner_id, Z);
}

// =========================================================================
// Persistence
// =========================================================================

#[tokio::test]
async fn state_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..StoreConfig::default()
    };
    let platform = Arc::new(RecordingPlatform::default());

    let request_id = {
        let broker = Broker::open(&config, platform.clone(), Arc::new(SystemClock));
        broker.submit_offer(X, "Rare Blue Sword", "Golden Shield").await.unwrap();
        broker.subscribe(W, "sword").await.unwrap();
        let report = broker
            .submit_offer(Y, "Golden Shield", "Rare Blue Sword")
            .await
            .unwrap();
        broker.flush().await.unwrap();
        report.auto_match_requests[0].clone()
    };

    let broker = Broker::open(&config, platform, Arc::new(SystemClock));
    let stats = broker.stats().await;
    assert_eq!(stats.active_offers, 2);
    assert_eq!(stats.notification_users, 1);
    assert_eq!(stats.pending_requests, 1);
    assert!(broker.accept(&request_id, X).await.is_some());
}
