//! # tradematch-store
//!
//! **The three durable stores behind TradeMatch.**
//!
//! ```text
//! OfferStore         offer id    → Offer               trade_offers.json
//! NotificationIndex  participant → wishlist keywords   notifications.json
//! RequestLedger      message id  → PendingRequest      pending_requests.json
//! ```
//!
//! Each store guards its map with one `tokio::sync::RwLock` and exposes
//! only whole operations. Mutations produce a versioned snapshot under the
//! lock and write it after the lock is released.

pub mod clock;
pub mod document;
pub mod notification_index;
pub mod offer_store;
pub mod request_ledger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use document::{JsonDocument, Snapshot};
pub use notification_index::{NotificationIndex, SubscribeOutcome};
pub use offer_store::OfferStore;
pub use request_ledger::RequestLedger;
