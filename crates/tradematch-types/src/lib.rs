//! # tradematch-types
//!
//! Shared types, errors, and configuration for the **TradeMatch** engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`ParticipantId`], [`OfferId`], [`MessageId`], [`ChannelId`]
//! - **Offer model**: [`Offer`]
//! - **Match model**: [`MatchTier`], [`Match`]
//! - **Request model**: [`NewRequest`], [`PendingRequest`], [`RequestKind`], [`RequestState`]
//! - **Platform payloads**: [`Identity`], [`Notification`], [`ChannelHandle`]
//! - **Configuration**: [`TradematchConfig`], [`StoreConfig`], [`ReaperConfig`]
//! - **Errors**: [`TradematchError`] with `TM_ERR_` prefix codes
//! - **Constants**: scores, keyword vocabulary, and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod notification;
pub mod offer;
pub mod request;
pub mod tier;

// Re-export all primary types at crate root for ergonomic imports:
//   use tradematch_types::{Offer, PendingRequest, MatchTier, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use notification::*;
pub use offer::*;
pub use request::*;
pub use tier::*;

// Constants are accessed via `tradematch_types::constants::FOO`
// (not re-exported to avoid name collisions).
