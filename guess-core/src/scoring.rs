/// Flat points for a correct guess, by rank within the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorePolicy {
    pub first_correct_points: i32,
    pub other_correct_points: i32,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            first_correct_points: 100,
            other_correct_points: 50,
        }
    }
}

impl ScorePolicy {
    pub fn new(first_correct_points: i32, other_correct_points: i32) -> Self {
        Self {
            first_correct_points,
            other_correct_points,
        }
    }

    pub fn points(&self, is_first_correct: bool) -> i32 {
        if is_first_correct {
            self.first_correct_points
        } else {
            self.other_correct_points
        }
    }

    /// Points for a 1-based rank in the round's correct-guesser order.
    pub fn points_for_rank(&self, rank: u32) -> i32 {
        self.points(rank == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let policy = ScorePolicy::default();
        assert_eq!(policy.points(true), 100);
        assert_eq!(policy.points(false), 50);
    }

    #[test]
    fn test_only_rank_one_gets_bonus() {
        let policy = ScorePolicy::new(30, 10);
        assert_eq!(policy.points_for_rank(1), 30);
        for rank in 2..20 {
            assert_eq!(policy.points_for_rank(rank), 10);
        }
    }
}
