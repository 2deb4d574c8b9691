use puzzle::{Puzzle, PuzzleId, ValidationError};
use tokio::sync::oneshot;

use super::handle::Subscription;
use crate::persistence::PersistenceError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregatorError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PersistenceError> for AggregatorError {
    fn from(err: PersistenceError) -> Self {
        AggregatorError::Storage(err.to_string())
    }
}

/// A single-row write against the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Insert(Puzzle),
    Update(Puzzle),
    Delete(Puzzle),
}

impl WriteOp {
    pub fn kind(&self) -> WriteKind {
        match self {
            WriteOp::Insert(_) => WriteKind::Insert,
            WriteOp::Update(_) => WriteKind::Update,
            WriteOp::Delete(_) => WriteKind::Delete,
        }
    }

    pub fn puzzle(&self) -> &Puzzle {
        match self {
            WriteOp::Insert(p) | WriteOp::Update(p) | WriteOp::Delete(p) => p,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// What a completed write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted(PuzzleId),
    Updated,
    Deleted,
}

pub(crate) type WriteReply = oneshot::Sender<Result<WriteOutcome, AggregatorError>>;

/// Commands sent to the aggregator actor. Each embeds a oneshot for the reply.
pub(crate) enum AggregatorCommand {
    Write {
        op: WriteOp,
        reply: WriteReply,
    },
    Find {
        id: PuzzleId,
        reply: oneshot::Sender<Result<Option<Puzzle>, AggregatorError>>,
    },
    Subscribe {
        reply: oneshot::Sender<Subscription>,
    },
    /// Answered once every queued write has reached storage.
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Work queued for the writer task, applied strictly in arrival order.
pub(crate) enum WriterJob {
    Apply {
        op: WriteOp,
        reply: WriteReply,
    },
    Find {
        id: PuzzleId,
        reply: oneshot::Sender<Result<Option<Puzzle>, AggregatorError>>,
    },
}

impl WriterJob {
    /// Resolve the job's reply without running it.
    pub(crate) fn fail(self, error: AggregatorError) {
        match self {
            WriterJob::Apply { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            WriterJob::Find { reply, .. } => {
                let _ = reply.send(Err(error));
            }
        }
    }
}
