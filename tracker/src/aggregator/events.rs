use super::commands::{AggregatorError, WriteKind};

/// Side-channel notifications delivered to every subscriber.
///
/// State itself travels on the subscription's state channel; events only
/// report things that did not produce a new state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// A write reached storage and failed. No state change follows.
    WriteFailed {
        kind: WriteKind,
        error: AggregatorError,
    },
    /// A live query could not be evaluated. The previous state stays current.
    FeedFailed { feed: Feed, error: AggregatorError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    All,
    Ranking,
}

impl Feed {
    pub fn as_str(self) -> &'static str {
        match self {
            Feed::All => "all",
            Feed::Ranking => "ranking",
        }
    }
}
