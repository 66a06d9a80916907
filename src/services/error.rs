use crate::services::platform::{ChannelId, PlatformError};
use crate::services::store::StoreError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure modes shared by every workflow.
///
/// Validation, authorization and consistency failures are raised before any
/// state is mutated. `External` is only surfaced where the operation cannot
/// succeed without the call; decoration calls are logged and swallowed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("you need to be {0} to do that")]
    Unauthorized(String),

    #[error("the bot is suspended in this server")]
    Suspended,

    #[error("{0} not found")]
    NotFound(String),

    #[error("you already have an open ticket: <#{channel_id}>")]
    TicketAlreadyOpen { channel_id: ChannelId },

    #[error("this giveaway has already ended")]
    GiveawayEnded,

    #[error("you need at least {need} invites (you have {have})")]
    NotEligible { have: i64, need: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("external call failed: {0}")]
    External(#[from] PlatformError),

    #[error("failed to persist state: {0}")]
    Persistence(#[from] StoreError),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        let err = EngineError::NotEligible { have: 2, need: 5 };
        assert_eq!(err.to_string(), "you need at least 5 invites (you have 2)");

        let err = EngineError::TicketAlreadyOpen { channel_id: 42 };
        assert!(err.to_string().contains("<#42>"));
    }
}
