//! The state aggregator.
//!
//! One actor task owns the published [`PuzzleState`]. It merges the two live
//! queries of a [`PuzzleRepository`] with latest-value semantics and hands
//! every write to a dedicated writer task, so writes are applied in the order
//! they were issued without ever blocking the merge loop.
//!
//! ```text
//! AggregatorHandle ──cmd──▶ actor ──job──▶ writer ──▶ repository
//!        ▲                    ▲                           │
//!        └── Subscription ◀───┴──── live queries ◀────────┘
//! ```

mod actor;
mod commands;
mod events;
mod handle;
mod snapshot;
mod writer;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Duration;

use crate::persistence::PuzzleRepository;
use actor::{run_aggregator, WriterLink};
use writer::run_writer;

pub use commands::{AggregatorError, WriteKind, WriteOp, WriteOutcome};
pub use events::{Feed, StateEvent};
pub use handle::{AggregatorHandle, Subscription, WriteTicket};
pub use snapshot::PuzzleState;

/// How long live queries outlive their last subscriber.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Tunables for [`spawn_aggregator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub grace_period: Duration,
    pub command_capacity: usize,
    pub event_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            command_capacity: 32,
            event_capacity: 100,
        }
    }
}

/// Spawn the aggregator actor and its writer over `repo`.
///
/// Live queries start on the first subscribe, not here. Must be called from
/// within a tokio runtime.
pub fn spawn_aggregator<R>(repo: Arc<R>, config: AggregatorConfig) -> AggregatorHandle
where
    R: PuzzleRepository + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity);
    let (state_tx, _) = watch::channel(PuzzleState::default());
    let (event_tx, _) = broadcast::channel(config.event_capacity);
    let (write_tx, write_rx) = mpsc::unbounded_channel();

    let writer = WriterLink {
        jobs: write_tx,
        task: tokio::spawn(run_writer(repo.clone(), write_rx, event_tx.clone())),
    };
    tokio::spawn(run_aggregator(
        repo,
        config.grace_period,
        cmd_rx,
        state_tx,
        event_tx,
        writer,
    ));

    AggregatorHandle::new(cmd_tx)
}
