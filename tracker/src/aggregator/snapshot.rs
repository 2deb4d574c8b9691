use puzzle::{Puzzle, PuzzleId};
use serde::Serialize;

/// Complete, immutable view handed to presentation.
/// Published on every feed emission and on subscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PuzzleState {
    /// Every puzzle, newest id first.
    pub all_puzzles: Vec<Puzzle>,
    /// Solved puzzles in leaderboard order.
    pub ranking: Vec<Puzzle>,
}

impl PuzzleState {
    /// Pair the latest value of each feed. No filtering or reordering happens
    /// here; both orders come from storage.
    pub fn combine(all_puzzles: Vec<Puzzle>, ranking: Vec<Puzzle>) -> Self {
        Self {
            all_puzzles,
            ranking,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all_puzzles.is_empty() && self.ranking.is_empty()
    }

    pub fn find(&self, id: PuzzleId) -> Option<&Puzzle> {
        self.all_puzzles.iter().find(|p| p.id == id)
    }

    /// 1-based leaderboard position of a puzzle, if it is ranked.
    pub fn rank_of(&self, id: PuzzleId) -> Option<usize> {
        self.ranking.iter().position(|p| p.id == id).map(|i| i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_empty() {
        assert!(PuzzleState::default().is_empty());
    }

    #[test]
    fn combine_keeps_inputs_verbatim() {
        let all = vec![
            Puzzle::new("b").with_id(2),
            Puzzle::new("a").with_id(1).solved_with(1),
        ];
        let ranking = vec![Puzzle::new("a").with_id(1).solved_with(1)];
        let state = PuzzleState::combine(all.clone(), ranking.clone());
        assert_eq!(state.all_puzzles, all);
        assert_eq!(state.ranking, ranking);
        assert_eq!(state.find(2).map(|p| p.title.as_str()), Some("b"));
        assert_eq!(state.rank_of(1), Some(1));
        assert_eq!(state.rank_of(2), None);
    }

    #[test]
    fn serializes_both_feeds() {
        let state = PuzzleState::combine(vec![Puzzle::new("a").with_id(1)], vec![]);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["all_puzzles"][0]["title"], "a");
        assert!(json["ranking"].as_array().unwrap().is_empty());
    }
}
