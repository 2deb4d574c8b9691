use puzzle::{Puzzle, PuzzleId};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::commands::*;
use super::events::StateEvent;
use super::snapshot::PuzzleState;

/// Cheap, cloneable handle to the aggregator actor.
#[derive(Clone)]
pub struct AggregatorHandle {
    cmd_tx: mpsc::Sender<AggregatorCommand>,
}

impl AggregatorHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<AggregatorCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Subscribe to the aggregated state. Starts the live queries if they are
    /// not running, or keeps them alive if they are inside their grace period.
    pub async fn subscribe(&self) -> Result<Subscription, AggregatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(AggregatorCommand::Subscribe { reply: tx }).await?;
        rx.await
            .map_err(|_| AggregatorError::Internal("Reply dropped".into()))
    }

    /// Queue an insert. Blank titles are rejected before anything is queued.
    pub async fn add_puzzle(&self, puzzle: Puzzle) -> Result<WriteTicket, AggregatorError> {
        let puzzle = prepare(puzzle)?;
        self.write(WriteOp::Insert(puzzle)).await
    }

    /// Queue a replacement of the stored row with the same id.
    pub async fn update_puzzle(&self, puzzle: Puzzle) -> Result<WriteTicket, AggregatorError> {
        let puzzle = prepare(puzzle)?;
        self.write(WriteOp::Update(puzzle)).await
    }

    /// Queue a permanent delete.
    pub async fn delete_puzzle(&self, puzzle: Puzzle) -> Result<WriteTicket, AggregatorError> {
        self.write(WriteOp::Delete(puzzle)).await
    }

    /// Record a solve. Issues exactly the update `update_puzzle` would for
    /// `puzzle.solved_with(attempts)`.
    pub async fn mark_solved(
        &self,
        puzzle: &Puzzle,
        attempts: u32,
    ) -> Result<WriteTicket, AggregatorError> {
        self.update_puzzle(puzzle.solved_with(attempts)).await
    }

    /// Look a puzzle up in storage. Runs after every write queued before it.
    pub async fn find_puzzle(&self, id: PuzzleId) -> Result<Option<Puzzle>, AggregatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(AggregatorCommand::Find { id, reply: tx }).await?;
        rx.await
            .map_err(|_| AggregatorError::Internal("Reply dropped".into()))?
    }

    /// Stop the aggregator. Returns after every write queued before the call
    /// has been applied, so storage can be closed right afterwards.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(AggregatorCommand::Shutdown { reply: tx })
            .await
            .is_ok()
        {
            // An error means another handle shut the actor down first.
            let _ = rx.await;
        }
    }

    async fn write(&self, op: WriteOp) -> Result<WriteTicket, AggregatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(AggregatorCommand::Write { op, reply: tx }).await?;
        Ok(WriteTicket { rx })
    }

    async fn send(&self, cmd: AggregatorCommand) -> Result<(), AggregatorError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| AggregatorError::Internal("Aggregator actor closed".into()))
    }
}

fn prepare(puzzle: Puzzle) -> Result<Puzzle, AggregatorError> {
    let puzzle = puzzle.normalized();
    puzzle.validate()?;
    Ok(puzzle)
}

/// Completion notice for a queued write.
///
/// Dropping it does not cancel the write. The resulting state still arrives
/// only through a [`Subscription`].
pub struct WriteTicket {
    rx: oneshot::Receiver<Result<WriteOutcome, AggregatorError>>,
}

impl WriteTicket {
    /// Wait until storage has applied (or rejected) the write.
    pub async fn wait(self) -> Result<WriteOutcome, AggregatorError> {
        self.rx
            .await
            .map_err(|_| AggregatorError::Internal("Write dropped".into()))?
    }
}

/// A live view of the aggregated state.
///
/// The current state is available immediately; [`Subscription::changed`]
/// resolves with each newer one. Intermediate states are skipped if the
/// subscriber falls behind, the latest one is never lost.
pub struct Subscription {
    state: watch::Receiver<PuzzleState>,
    events: broadcast::Receiver<StateEvent>,
}

impl Subscription {
    pub(crate) fn new(
        state: watch::Receiver<PuzzleState>,
        events: broadcast::Receiver<StateEvent>,
    ) -> Self {
        Self { state, events }
    }

    pub fn current(&self) -> PuzzleState {
        self.state.borrow().clone()
    }

    /// Next published state. `None` once the aggregator has shut down.
    pub async fn changed(&mut self) -> Option<PuzzleState> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// First state (current included) satisfying `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&PuzzleState) -> bool,
    ) -> Option<PuzzleState> {
        self.state
            .wait_for(predicate)
            .await
            .ok()
            .map(|state| state.clone())
    }

    /// Next side-channel event. `None` once the aggregator has shut down.
    pub async fn next_event(&mut self) -> Option<StateEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Subscriber lagged behind state events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
