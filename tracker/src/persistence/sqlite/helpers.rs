//! Row encode/decode helpers for the `puzzle` table.

use puzzle::Puzzle;

use crate::persistence::PersistenceError;

/// Column list shared by every `SELECT`, in [`PuzzleRow`] order.
pub const PUZZLE_COLUMNS: &str =
    "id, title, hint1, hint2, hint3, time_limit_sec, solved, attempts";

/// Raw `puzzle` row as returned by `sqlx::query_as`.
pub type PuzzleRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    bool,
    i64,
);

/// Decode a row, rejecting values the domain type cannot hold.
pub fn decode_row(row: PuzzleRow) -> Result<Puzzle, PersistenceError> {
    let (id, title, hint1, hint2, hint3, time_limit_sec, solved, attempts) = row;

    let time_limit_seconds = time_limit_sec
        .map(|t| {
            u32::try_from(t).map_err(|_| {
                PersistenceError::InvalidRow(format!("puzzle {id}: time limit {t} out of range"))
            })
        })
        .transpose()?;
    let attempts = u32::try_from(attempts).map_err(|_| {
        PersistenceError::InvalidRow(format!("puzzle {id}: attempts {attempts} out of range"))
    })?;

    Ok(Puzzle {
        id,
        title,
        hint1,
        hint2,
        hint3,
        time_limit_seconds,
        solved,
        attempts,
    })
}

/// Integer column value for an optional time limit.
pub fn encode_time_limit(puzzle: &Puzzle) -> Option<i64> {
    puzzle.time_limit_seconds.map(i64::from)
}
