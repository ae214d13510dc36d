//! The messaging platform the engine talks to.
//!
//! Rendering, buttons, and channel permissions live behind this trait. The
//! engine only hands over plain [`Notification`] data and receives ids back.

use async_trait::async_trait;
use thiserror::Error;
use tradematch_types::{
    ChannelHandle, Identity, MessageId, Notification, OfferId, ParticipantId, TradematchError,
};

/// Failures reported by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The participant cannot receive direct messages (blocked, DMs closed, left).
    #[error("participant {participant} is unreachable: {reason}")]
    Unreachable {
        participant: ParticipantId,
        reason: String,
    },

    #[error("participant {0} is unknown to the platform")]
    UnknownParticipant(ParticipantId),

    #[error("channel creation refused: {0}")]
    ChannelRefused(String),

    /// Transport-level failure (timeouts, rate limits, outages).
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

impl From<PlatformError> for TradematchError {
    fn from(error: PlatformError) -> Self {
        match error {
            PlatformError::Unreachable {
                participant,
                reason,
            } => Self::DeliveryFailed {
                participant,
                reason,
            },
            PlatformError::UnknownParticipant(participant) => Self::IdentityNotFound(participant),
            PlatformError::ChannelRefused(reason) => Self::ChannelCreationFailed { reason },
            PlatformError::Unavailable(reason) => Self::Io(reason),
        }
    }
}

/// Capabilities the engine needs from the messaging platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Deliver a notification to one participant. Returns the id of the
    /// delivered message, which keys any pending request it carries.
    async fn deliver_direct_message(
        &self,
        participant: ParticipantId,
        notification: &Notification,
    ) -> Result<MessageId, PlatformError>;

    /// Fetch a participant's display identity.
    async fn lookup_identity(&self, participant: ParticipantId) -> Result<Identity, PlatformError>;

    /// Open a private channel visible only to `members`.
    async fn create_private_channel(
        &self,
        members: &[ParticipantId],
    ) -> Result<ChannelHandle, PlatformError>;

    /// Whether the public posting behind an offer still exists.
    async fn check_posting_exists(&self, offer: &OfferId) -> Result<bool, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_errors_map_into_engine_errors() {
        let err: TradematchError = PlatformError::Unreachable {
            participant: ParticipantId(7),
            reason: "dms closed".into(),
        }
        .into();
        assert!(matches!(
            err,
            TradematchError::DeliveryFailed { participant, .. } if participant == ParticipantId(7)
        ));

        let err: TradematchError = PlatformError::UnknownParticipant(ParticipantId(3)).into();
        assert!(err.to_string().starts_with("TM_ERR_202"));

        let err: TradematchError =
            PlatformError::ChannelRefused("missing permission".into()).into();
        assert!(matches!(err, TradematchError::ChannelCreationFailed { .. }));
    }

    #[test]
    fn platform_is_object_safe() {
        fn assert_dyn(_: Option<&dyn Platform>) {}
        assert_dyn(None);
    }
}
