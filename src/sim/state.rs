/// GameState: everything the renderer needs to draw one frame.
///
/// Owned by the flow controller and only mutated through its operations.
/// The renderer gets a shared reference and never writes.
///
/// ## Scores
///
/// `score_a` / `score_b` are authoritative and change only through the
/// quiz and dare rules. The chaos glitch writes random numbers into
/// `display_scores`, an overlay that the leaderboard shows instead of the
/// real values while it is `Some`.

use std::collections::BTreeSet;

use crate::domain::score::STARTING_SCORE;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Phase {
    Intro,
    Start,
    Round1,
    Round2,
    Chaos,
    Final,
}

impl Phase {
    /// The only phase this one may advance to.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Intro => Some(Phase::Start),
            Phase::Start => Some(Phase::Round1),
            Phase::Round1 => Some(Phase::Round2),
            Phase::Round2 => Some(Phase::Chaos),
            Phase::Chaos => Some(Phase::Final),
            Phase::Final => None,
        }
    }
}

/// Scripted sub-sequence of the chaos round.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum ChaosStage {
    Asking,
    Glitching,
    MessageError,
    MessageCannot,
    MessageDisabled,
    Done,
}

impl ChaosStage {
    /// Index into the content's chaos messages, when one is on screen.
    pub fn message_index(self) -> Option<usize> {
        match self {
            ChaosStage::MessageError => Some(0),
            ChaosStage::MessageCannot => Some(1),
            ChaosStage::MessageDisabled => Some(2),
            _ => None,
        }
    }
}

/// Loading screen typewriter.
#[derive(Clone, Debug, Default)]
pub struct LoadingState {
    /// Index of the line being typed; equals the line count once all are done.
    pub line: usize,
    /// Characters of `line` revealed so far.
    pub chars: usize,
    pub start_ready: bool,
}

#[derive(Clone, Debug)]
pub struct LockedAnswer {
    pub option: usize,
    pub correct: bool,
    pub feedback: String,
}

/// Round 1 question card. Input is ignored while an answer is locked in.
#[derive(Clone, Debug, Default)]
pub struct QuizCard {
    pub locked: Option<LockedAnswer>,
}

/// Round 2 dare wheel.
#[derive(Clone, Debug, Default)]
pub struct DareWheel {
    pub spinning: bool,
    /// Cosmetic rotation in degrees, only ever grows.
    pub angle: f32,
    pub current: Option<usize>,
    /// Response text shown while the answer to `current` is being committed.
    pub response: Option<String>,
    pub used: BTreeSet<usize>,
}

impl DareWheel {
    /// Card shows a dare that still waits for completed / skip.
    pub fn awaiting_answer(&self) -> bool {
        self.current.is_some() && self.response.is_none() && !self.spinning
    }
}

#[derive(Clone, Debug, Default)]
pub struct Leaderboard {
    pub pokes: u32,
    pub easter_egg: bool,
}

#[derive(Clone, Debug, Default)]
pub struct FinalState {
    pub accepted: bool,
    /// Where the dodging "No" button currently sits, inside the area the
    /// shell passed to `dodge_no`. `None` = at home.
    pub no_offset: Option<(u16, u16)>,
    pub dodges: u32,
}

#[derive(Clone, Debug)]
pub struct GameState {
    pub phase: Phase,

    // ── Scores ──
    pub score_a: u32,
    pub score_b: u32,
    pub display_scores: Option<(u32, u32)>,

    // ── Round progress ──
    pub question_index: usize,
    /// Last question answered; Round2 is on its way.
    pub quiz_done: bool,
    pub dares_completed: u32,
    pub chaos: ChaosStage,

    // ── Screens ──
    pub loading: LoadingState,
    pub card: QuizCard,
    pub wheel: DareWheel,
    pub board: Leaderboard,
    pub finale: FinalState,

    // ── UI ──
    pub music_playing: bool,
    pub cursor: usize,
}

pub const DARES_PER_ROUND: u32 = 3;

impl GameState {
    pub fn new() -> Self {
        GameState {
            phase: Phase::Intro,
            score_a: STARTING_SCORE,
            score_b: STARTING_SCORE,
            display_scores: None,
            question_index: 0,
            quiz_done: false,
            dares_completed: 0,
            chaos: ChaosStage::Asking,
            loading: LoadingState::default(),
            card: QuizCard::default(),
            wheel: DareWheel::default(),
            board: Leaderboard::default(),
            finale: FinalState::default(),
            music_playing: false,
            cursor: 0,
        }
    }

    /// Scores as the leaderboard should show them.
    pub fn shown_scores(&self) -> (u32, u32) {
        self.display_scores.unwrap_or((self.score_a, self.score_b))
    }

    pub fn leaderboard_visible(&self) -> bool {
        match self.phase {
            Phase::Round1 | Phase::Round2 => true,
            Phase::Chaos => matches!(self.chaos, ChaosStage::Asking | ChaosStage::Glitching),
            _ => false,
        }
    }

    pub fn glitching(&self) -> bool {
        self.phase == Phase::Chaos && self.chaos == ChaosStage::Glitching
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_form_a_single_chain() {
        let mut p = Phase::Intro;
        let mut seen = vec![p];
        while let Some(n) = p.next() {
            assert!(n > p);
            seen.push(n);
            p = n;
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(p, Phase::Final);
    }

    #[test]
    fn overlay_wins_over_real_scores() {
        let mut s = GameState::new();
        assert_eq!(s.shown_scores(), (100, 100));
        s.display_scores = Some((7, 499));
        assert_eq!(s.shown_scores(), (7, 499));
        assert_eq!((s.score_a, s.score_b), (100, 100));
    }

    #[test]
    fn leaderboard_hides_once_chaos_messages_start() {
        let mut s = GameState::new();
        assert!(!s.leaderboard_visible());
        s.phase = Phase::Chaos;
        assert!(s.leaderboard_visible());
        s.chaos = ChaosStage::MessageError;
        assert!(!s.leaderboard_visible());
        assert_eq!(s.chaos.message_index(), Some(0));
    }
}
