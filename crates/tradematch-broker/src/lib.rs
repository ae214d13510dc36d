//! # tradematch-broker
//!
//! **Connects the TradeMatch stores to a messaging platform.**
//!
//! - [`Platform`]: the four capabilities the engine needs from the outside
//!   world (direct messages, identities, private channels, posting checks)
//! - [`Broker`]: offer submission with auto-match and wishlist alerts,
//!   trade requests, accept/decline, search, and offer reconciliation
//! - [`ExpiryReaper`]: background sweep of pending requests past their TTL

pub mod broker;
pub mod platform;
pub mod reaper;

pub use broker::{Acceptance, Broker, Listing, Stats, SubmissionReport};
pub use platform::{Platform, PlatformError};
pub use reaper::{ExpiryReaper, ReaperHandle};
