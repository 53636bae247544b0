use crate::types::{JournalId, OwnerId};
use thiserror::Error;

/// Errors surfaced by the engine to whoever submitted a request.
///
/// Budget exhaustion and world mismatches are not errors; see
/// [`ApplyOutcome`](crate::operation::ApplyOutcome).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no cached journal with id {0}")]
    JournalNotFound(JournalId),

    #[error("{journal} belongs to {owner}")]
    NotOwner { journal: JournalId, owner: OwnerId },

    #[error("{0} is being replayed by a queued operation")]
    JournalBusy(JournalId),

    #[error("{0} is already undone")]
    AlreadyUndone(JournalId),

    #[error("{0} has not been undone")]
    NotUndone(JournalId),

    #[error("unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
