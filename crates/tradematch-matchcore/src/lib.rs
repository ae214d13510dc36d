//! # tradematch-matchcore
//!
//! **Pure offer compatibility scorer for TradeMatch.**
//!
//! MatchCore takes plain offer text and produces tier classifications. It has:
//!
//! - **Zero side effects**: no store access, no notifications, no clocks
//! - **Hand-verifiable output**: literal substring containment, no fuzzy scoring
//! - **Self-match prevention**: a participant's own offers are never candidates

pub mod matcher;
pub mod vocabulary;

pub use matcher::{Proposal, classify, find_offer_matches};
