//! The puzzle record and the rules applied to it before persistence.

use serde::{Deserialize, Serialize};

/// Storage-assigned identifier of a puzzle.
pub type PuzzleId = i64;

/// Sentinel id for a record that has not been persisted yet.
pub const NEW_PUZZLE_ID: PuzzleId = 0;

/// Reasons a puzzle cannot be saved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Puzzle title must not be empty")]
    EmptyTitle,
}

/// A single tracked puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: PuzzleId,
    pub title: String,
    pub hint1: Option<String>,
    pub hint2: Option<String>,
    pub hint3: Option<String>,
    pub time_limit_seconds: Option<u32>,
    pub solved: bool,
    pub attempts: u32,
}

impl Puzzle {
    /// A new, unsaved, unsolved puzzle with no hints and no time limit.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: NEW_PUZZLE_ID,
            title: title.into(),
            hint1: None,
            hint2: None,
            hint3: None,
            time_limit_seconds: None,
            solved: false,
            attempts: 0,
        }
    }

    pub fn with_id(mut self, id: PuzzleId) -> Self {
        self.id = id;
        self
    }

    /// Set the three hint slots in order. Blank hints are kept as given until
    /// [`Puzzle::normalized`] runs.
    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut hints = hints.into_iter().map(Into::into);
        self.hint1 = hints.next();
        self.hint2 = hints.next();
        self.hint3 = hints.next();
        self
    }

    pub fn with_time_limit(mut self, seconds: u32) -> Self {
        self.time_limit_seconds = Some(seconds);
        self
    }

    /// True while the record carries the sentinel id.
    pub fn is_new(&self) -> bool {
        self.id == NEW_PUZZLE_ID
    }

    /// Present hints, in slot order.
    pub fn hints(&self) -> impl Iterator<Item = &str> {
        [&self.hint1, &self.hint2, &self.hint3]
            .into_iter()
            .filter_map(|h| h.as_deref())
    }

    /// Copy of this record marked as solved after `attempts` tries.
    pub fn solved_with(&self, attempts: u32) -> Self {
        Self {
            solved: true,
            attempts,
            ..self.clone()
        }
    }

    /// Check the save preconditions.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Copy of this record with blank hints replaced by `None`.
    ///
    /// Idempotent. Every storage backend stores the normalized form.
    pub fn normalized(&self) -> Self {
        Self {
            hint1: normalize_hint(&self.hint1),
            hint2: normalize_hint(&self.hint2),
            hint3: normalize_hint(&self.hint3),
            ..self.clone()
        }
    }

    /// Time limit used for ordering; an absent limit counts as zero.
    pub fn ranking_time_limit(&self) -> u32 {
        self.time_limit_seconds.unwrap_or(0)
    }
}

fn normalize_hint(hint: &Option<String>) -> Option<String> {
    hint.as_ref()
        .filter(|h| !h.trim().is_empty())
        .cloned()
}
