/// Score rules and leaderboard standing.
///
/// Scores start at 100 and never drop below zero. There is no upper bound.

pub const STARTING_SCORE: u32 = 100;

pub const QUIZ_CORRECT_BONUS: u32 = 10;
pub const QUIZ_WRONG_PENALTY: u32 = 5;
pub const DARE_DONE_BONUS: u32 = 20;
pub const DARE_SKIP_PENALTY: u32 = 10;

/// Player A's score after one quiz answer.
pub fn apply_quiz(score: u32, correct: bool) -> u32 {
    if correct {
        score.saturating_add(QUIZ_CORRECT_BONUS)
    } else {
        score.saturating_sub(QUIZ_WRONG_PENALTY)
    }
}

/// Player B's score after one dare.
pub fn apply_dare(score: u32, completed: bool) -> u32 {
    if completed {
        score.saturating_add(DARE_DONE_BONUS)
    } else {
        score.saturating_sub(DARE_SKIP_PENALTY)
    }
}

/// Who wears the crown on the leaderboard.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Standing {
    /// A is ahead or tied (A keeps the crown on a tie).
    ALeads,
    BLeads,
}

impl Standing {
    pub fn of(a: u32, b: u32) -> Self {
        if b > a { Standing::BLeads } else { Standing::ALeads }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_rule_floors_at_zero() {
        assert_eq!(apply_quiz(100, true), 110);
        assert_eq!(apply_quiz(100, false), 95);
        assert_eq!(apply_quiz(3, false), 0);
        assert_eq!(apply_quiz(0, false), 0);
    }

    #[test]
    fn dare_rule_floors_at_zero() {
        assert_eq!(apply_dare(100, true), 120);
        assert_eq!(apply_dare(100, false), 90);
        assert_eq!(apply_dare(7, false), 0);
    }

    #[test]
    fn wrong_answers_never_underflow() {
        let mut s = STARTING_SCORE;
        for _ in 0..50 {
            let before = s;
            s = apply_quiz(s, false);
            assert!(before - s <= QUIZ_WRONG_PENALTY);
        }
        assert_eq!(s, 0);
    }

    #[test]
    fn tie_keeps_crown_on_a() {
        assert_eq!(Standing::of(100, 100), Standing::ALeads);
        assert_eq!(Standing::of(120, 100), Standing::ALeads);
        assert_eq!(Standing::of(100, 101), Standing::BLeads);
    }
}
