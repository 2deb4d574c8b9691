use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use super::commands::*;
use super::events::StateEvent;
use crate::persistence::PuzzleRepository;

/// The write loop. Applies queued jobs one at a time, in order, so a
/// caller's sequential writes reach storage in the order they were issued.
/// Exits once the queue is closed and drained.
pub(crate) async fn run_writer<R: PuzzleRepository>(
    repo: Arc<R>,
    jobs: mpsc::UnboundedReceiver<WriterJob>,
    event_tx: broadcast::Sender<StateEvent>,
) {
    run_writer_inner(repo, jobs, event_tx)
        .instrument(tracing::info_span!("aggregator_writer"))
        .await;
}

async fn run_writer_inner<R: PuzzleRepository>(
    repo: Arc<R>,
    mut jobs: mpsc::UnboundedReceiver<WriterJob>,
    event_tx: broadcast::Sender<StateEvent>,
) {
    tracing::debug!("Writer started");

    while let Some(job) = jobs.recv().await {
        match job {
            WriterJob::Apply { op, reply } => {
                let kind = op.kind();
                let id = op.puzzle().id;
                let result = apply(repo.as_ref(), op).await;
                match result {
                    Ok(outcome) => {
                        tracing::debug!(?kind, id, ?outcome, "Write applied");
                    }
                    Err(ref e) => {
                        tracing::error!(?kind, id, "Write failed: {}", e);
                        let _ = event_tx.send(StateEvent::WriteFailed {
                            kind,
                            error: e.clone(),
                        });
                    }
                }
                let _ = reply.send(result);
            }
            WriterJob::Find { id, reply } => {
                let result = repo.find(id).await.map_err(AggregatorError::from);
                let _ = reply.send(result);
            }
        }
    }

    tracing::debug!("Writer exited");
}

async fn apply<R: PuzzleRepository>(
    repo: &R,
    op: WriteOp,
) -> Result<WriteOutcome, AggregatorError> {
    match op {
        WriteOp::Insert(puzzle) => Ok(WriteOutcome::Inserted(repo.insert(&puzzle).await?)),
        WriteOp::Update(puzzle) => {
            repo.update(&puzzle).await?;
            Ok(WriteOutcome::Updated)
        }
        WriteOp::Delete(puzzle) => {
            repo.delete(&puzzle).await?;
            Ok(WriteOutcome::Deleted)
        }
    }
}
