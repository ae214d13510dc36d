//! Error types for the TradeMatch engine.
//!
//! All errors use the `TM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors
//! - 2xx: Not-found errors
//! - 3xx: Delivery errors (platform notifications, channels)
//! - 4xx: Persistence errors
//! - 5xx: Corrupt state errors
//! - 9xx: General errors
//!
//! Unknown offers and requests on accept, decline and remove are reported as
//! `Option`/`bool` results rather than errors.

use thiserror::Error;

use crate::{OfferId, ParticipantId};

/// Central error enum for all TradeMatch operations.
#[derive(Debug, Error)]
pub enum TradematchError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The offer failed validation (empty offering text, etc.).
    #[error("TM_ERR_100: Invalid offer: {reason}")]
    InvalidOffer { reason: String },

    /// A wishlist keyword failed validation.
    #[error("TM_ERR_101: Invalid keyword: {reason}")]
    InvalidKeyword { reason: String },

    /// A trade request failed validation.
    #[error("TM_ERR_102: Invalid trade request: {reason}")]
    InvalidRequest { reason: String },

    /// An offer with this id is already live.
    #[error("TM_ERR_103: Offer already exists: {0}")]
    DuplicateOffer(OfferId),

    // =================================================================
    // Not Found (2xx)
    // =================================================================
    #[error("TM_ERR_202: Identity not found for participant {0}")]
    IdentityNotFound(ParticipantId),

    // =================================================================
    // Delivery Errors (3xx)
    // =================================================================
    /// A direct message could not be delivered.
    #[error("TM_ERR_300: Delivery to participant {participant} failed: {reason}")]
    DeliveryFailed {
        participant: ParticipantId,
        reason: String,
    },

    /// The platform refused to create a private channel.
    #[error("TM_ERR_301: Channel creation failed: {reason}")]
    ChannelCreationFailed { reason: String },

    // =================================================================
    // Persistence Errors (4xx)
    // =================================================================
    #[error("TM_ERR_400: Persistence failed for {document}: {reason}")]
    Persistence { document: String, reason: String },

    // =================================================================
    // Corrupt State (5xx)
    // =================================================================
    #[error("TM_ERR_500: Corrupt state in {document}: {reason}")]
    CorruptState { document: String, reason: String },

    // =================================================================
    // General (9xx)
    // =================================================================
    #[error("TM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    #[error("TM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    #[error("TM_ERR_903: I/O error: {0}")]
    Io(String),
}

impl TradematchError {
    /// Whether this error is a synchronous input rejection (1xx).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOffer { .. }
                | Self::InvalidKeyword { .. }
                | Self::InvalidRequest { .. }
                | Self::DuplicateOffer(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TradematchError>;

impl From<std::io::Error> for TradematchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TradematchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
