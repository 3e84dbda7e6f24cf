/// The flow controller: owns GameState and every timer that mutates it.
///
/// Phase chain:
///   Intro → Start → Round1 → Round2 → Chaos → Final
///
/// Rules the controller enforces:
///   - `phase` only moves one step forward, and only through `change_phase`
///   - every operation is a no-op outside its phase or while its screen is
///     locked (answer pending, wheel spinning, transition pending)
///   - every timer is scoped to the phase that scheduled it; leaving a phase
///     cancels all of them, so nothing stale can touch the next screen
///   - sound is never played directly; cues queue up for the shell
///
/// Time only moves when the shell calls `tick(now)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TimingConfig;
use crate::domain::content::Content;
use crate::domain::score;
use super::event::SoundCue;
use super::scheduler::{Millis, Scheduler, TimerId};
use super::state::{ChaosStage, GameState, LockedAnswer, Phase, DARES_PER_ROUND};

/// Pokes on player B's name before the easter egg pops.
const POKES_FOR_EASTER_EGG: u32 = 5;
/// Chaos flicker shows values in `[0, FLICKER_MAX)`.
const FLICKER_MAX: u32 = 500;

#[derive(Clone, Copy, PartialEq, Debug)]
enum Command {
    TypeChar,
    NextLine,
    CommitAnswer,
    CommitDare(bool),
    StopSpin,
    Advance(Phase),
    Flicker,
    EndGlitch,
    Chaos(ChaosStage),
    HideEasterEgg,
}

pub struct Controller {
    state: GameState,
    content: Content,
    timing: TimingConfig,
    timers: Scheduler<Phase, Command>,
    typing_timer: Option<TimerId>,
    flicker_timer: Option<TimerId>,
    cues: Vec<SoundCue>,
    rng: StdRng,
    shut_down: bool,
}

// ══════════════════════════════════════════════════════════════
// Construction / shell API
// ══════════════════════════════════════════════════════════════

impl Controller {
    pub fn new(content: Content, timing: TimingConfig) -> Self {
        Self::with_rng(content, timing, StdRng::from_os_rng())
    }

    pub fn with_rng(content: Content, timing: TimingConfig, rng: StdRng) -> Self {
        Controller {
            state: GameState::new(),
            content,
            timing,
            timers: Scheduler::new(),
            typing_timer: None,
            flicker_timer: None,
            cues: Vec::new(),
            rng,
            shut_down: false,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Run every timer command due at or before `now`, in due order.
    pub fn tick(&mut self, now: Millis) {
        if self.shut_down {
            return;
        }
        while let Some(cmd) = self.timers.pop_due(now) {
            self.apply(cmd);
        }
    }

    /// Sound cues queued since the last drain, oldest first.
    pub fn drain_cues(&mut self) -> Vec<SoundCue> {
        std::mem::take(&mut self.cues)
    }

    /// Cancel every pending timer. The controller ignores time afterwards.
    pub fn shutdown(&mut self) {
        let dropped = self.timers.pending();
        self.timers.clear();
        self.typing_timer = None;
        self.flicker_timer = None;
        self.shut_down = true;
        tracing::debug!(dropped, "flow controller shut down");
    }

    pub fn set_music_playing(&mut self, playing: bool) {
        self.state.music_playing = playing;
    }
}

// ══════════════════════════════════════════════════════════════
// Intro / loading / start
// ══════════════════════════════════════════════════════════════

impl Controller {
    /// Intro → Start. The click that gets here also unlocks audio.
    pub fn enter(&mut self) {
        if self.state.phase != Phase::Intro {
            return;
        }
        self.change_phase(Phase::Start);
        self.cues.push(SoundCue::UnlockAudio);
        self.begin_loading_line();
    }

    /// Reveal one more character of the current loading line. Fired by the
    /// typing timer; when the line is complete the timer stops and the next
    /// line is queued after a pause.
    pub fn advance_loading_line(&mut self) {
        if self.state.phase != Phase::Start || self.state.loading.start_ready {
            return;
        }
        let Some(line) = self.content.loading_lines.get(self.state.loading.line) else {
            return;
        };
        let len = line.chars().count();
        let loading = &mut self.state.loading;
        if loading.chars >= len {
            return;
        }
        loading.chars += 1;

        if loading.chars >= len {
            if let Some(id) = self.typing_timer.take() {
                self.timers.cancel(id);
            }
            self.timers.after(self.timing.line_pause_ms, Phase::Start, Command::NextLine);
        }
    }

    /// Start → Round1, once the loading text has finished.
    pub fn start(&mut self) {
        if self.state.phase != Phase::Start || !self.state.loading.start_ready {
            return;
        }
        self.change_phase(Phase::Round1);
        self.cues.push(SoundCue::StartMusic);
        self.state.music_playing = true;
    }

    fn begin_loading_line(&mut self) {
        if self.state.loading.line == 0 {
            self.cues.push(SoundCue::StartTyping);
        }
        self.state.loading.chars = 0;
        self.typing_timer = Some(self.timers.every(
            self.timing.type_char_ms,
            Phase::Start,
            Command::TypeChar,
        ));
    }

    fn next_loading_line(&mut self) {
        let loading = &mut self.state.loading;
        loading.line += 1;
        loading.chars = 0;
        if loading.line >= self.content.loading_lines.len() {
            loading.start_ready = true;
            self.cues.push(SoundCue::StopTyping);
            tracing::debug!("loading finished, start button ready");
        } else {
            self.begin_loading_line();
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Round 1: quiz
// ══════════════════════════════════════════════════════════════

impl Controller {
    /// Lock in option `option` of the current question. Feedback shows for
    /// a while before the answer counts.
    pub fn choose_option(&mut self, option: usize) {
        if !self.quiz_open() || self.state.card.locked.is_some() {
            return;
        }
        let Some(question) = self.content.questions.get(self.state.question_index) else {
            return;
        };
        if option >= question.options.len() {
            return;
        }
        let correct = question.is_correct(option);
        let feedback = if correct {
            question.right_response.clone()
        } else {
            question.wrong_response.clone()
        };
        self.state.card.locked = Some(LockedAnswer { option, correct, feedback });
        self.cues.push(if correct { SoundCue::Correct } else { SoundCue::Wrong });
        self.timers.after(self.timing.feedback_ms, Phase::Round1, Command::CommitAnswer);
        tracing::debug!(question = self.state.question_index, option, correct, "answer locked");
    }

    /// Count an answer right away: +10 when correct, -5 (floored) otherwise.
    pub fn answer_question(&mut self, correct: bool) {
        if !self.quiz_open() || self.state.card.locked.is_some() {
            return;
        }
        self.cues.push(if correct { SoundCue::Correct } else { SoundCue::Wrong });
        self.record_answer(correct);
    }

    fn quiz_open(&self) -> bool {
        self.state.phase == Phase::Round1 && !self.state.quiz_done
    }

    fn record_answer(&mut self, correct: bool) {
        let s = &mut self.state;
        s.score_a = score::apply_quiz(s.score_a, correct);
        s.card.locked = None;
        s.cursor = 0;

        let next = s.question_index + 1;
        if next >= self.content.questions.len() {
            s.quiz_done = true;
            self.timers.after(
                self.timing.transition_ms,
                Phase::Round1,
                Command::Advance(Phase::Round2),
            );
        } else {
            s.question_index = next;
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Round 2: dare wheel
// ══════════════════════════════════════════════════════════════

impl Controller {
    pub fn spin(&mut self) {
        if !self.dares_open() {
            return;
        }
        let wheel = &mut self.state.wheel;
        if wheel.spinning || wheel.current.is_some() {
            return;
        }
        wheel.spinning = true;
        wheel.response = None;
        wheel.angle += 720.0 + self.rng.random::<f32>() * 360.0;
        self.cues.push(SoundCue::StartWheel);
        self.timers.after(self.timing.spin_ms, Phase::Round2, Command::StopSpin);
    }

    /// Answer the dare on the card. The response message shows for a while
    /// before the dare counts.
    pub fn choose_dare(&mut self, completed: bool) {
        if !self.dares_open() || !self.state.wheel.awaiting_answer() {
            return;
        }
        let pool = if completed {
            &self.content.dare_done_responses
        } else {
            &self.content.dare_skip_responses
        };
        let response = if pool.is_empty() {
            String::new()
        } else {
            pool[self.rng.random_range(0..pool.len())].clone()
        };
        self.state.wheel.response = Some(response);
        self.cues.push(if completed { SoundCue::Correct } else { SoundCue::Wrong });
        self.timers.after(
            self.timing.dare_response_ms,
            Phase::Round2,
            Command::CommitDare(completed),
        );
    }

    /// Count a dare right away: +20 when completed, -10 (floored) otherwise.
    pub fn resolve_dare(&mut self, completed: bool) {
        if !self.dares_open() {
            return;
        }
        let wheel = &self.state.wheel;
        if wheel.spinning || wheel.response.is_some() {
            return;
        }
        self.cues.push(if completed { SoundCue::Correct } else { SoundCue::Wrong });
        self.record_dare(completed);
    }

    fn dares_open(&self) -> bool {
        self.state.phase == Phase::Round2 && self.state.dares_completed < DARES_PER_ROUND
    }

    fn stop_spin(&mut self) {
        let count = self.content.dares.len();
        let wheel = &mut self.state.wheel;
        wheel.spinning = false;
        self.cues.push(SoundCue::StopWheel);
        if count == 0 {
            return;
        }

        let mut available: Vec<usize> = (0..count).filter(|i| !wheel.used.contains(i)).collect();
        if available.is_empty() {
            wheel.used.clear();
            available = (0..count).collect();
        }
        let pick = available[self.rng.random_range(0..available.len())];
        wheel.used.insert(pick);
        wheel.current = Some(pick);
        self.state.cursor = 0;
        tracing::debug!(dare = pick, "wheel stopped");
    }

    fn record_dare(&mut self, completed: bool) {
        let s = &mut self.state;
        s.score_b = score::apply_dare(s.score_b, completed);
        s.wheel.current = None;
        s.wheel.response = None;
        s.dares_completed += 1;
        s.cursor = 0;
        if s.dares_completed >= DARES_PER_ROUND {
            self.timers.after(
                self.timing.transition_ms,
                Phase::Round2,
                Command::Advance(Phase::Chaos),
            );
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Chaos round / final reveal
// ══════════════════════════════════════════════════════════════

impl Controller {
    /// Any option runs the same script. Offsets are from this call:
    /// glitch with flickering scores, then the three messages, then Final.
    pub fn answer_chaos(&mut self, option: usize) {
        if self.state.phase != Phase::Chaos || self.state.chaos != ChaosStage::Asking {
            return;
        }
        if option >= self.content.chaos_options.len() {
            return;
        }
        tracing::info!(option, "chaos answer, running glitch script");
        self.state.chaos = ChaosStage::Glitching;
        self.cues.push(SoundCue::Glitch);
        self.flicker_timer = Some(self.timers.every(
            self.timing.flicker_ms,
            Phase::Chaos,
            Command::Flicker,
        ));
        let t = &self.timing;
        self.timers.script(
            Phase::Chaos,
            &[
                (t.glitch_ms, Command::EndGlitch),
                (t.cannot_ms, Command::Chaos(ChaosStage::MessageCannot)),
                (t.disabled_ms, Command::Chaos(ChaosStage::MessageDisabled)),
                (t.final_ms, Command::Advance(Phase::Final)),
            ],
        );
    }

    pub fn accept_final(&mut self) {
        if self.state.phase != Phase::Final || self.state.finale.accepted {
            return;
        }
        self.state.finale.accepted = true;
        self.state.finale.no_offset = None;
        self.cues.push(SoundCue::FinalMusic);
        self.cues.push(SoundCue::Yay);
        tracing::info!(dodges = self.state.finale.dodges, "proposal accepted");
    }

    /// The "No" button runs away to a random spot inside `w` x `h`.
    pub fn dodge_no(&mut self, w: u16, h: u16) {
        if self.state.phase != Phase::Final || self.state.finale.accepted {
            return;
        }
        let x = self.rng.random_range(0..w.max(1));
        let y = self.rng.random_range(0..h.max(1));
        self.state.finale.no_offset = Some((x, y));
        self.state.finale.dodges += 1;
    }

    pub fn reset_no(&mut self) {
        if self.state.phase == Phase::Final {
            self.state.finale.no_offset = None;
        }
    }

    fn flicker(&mut self) {
        if !self.state.glitching() {
            return;
        }
        let a = self.rng.random_range(0..FLICKER_MAX);
        let b = self.rng.random_range(0..FLICKER_MAX);
        self.state.display_scores = Some((a, b));
    }

    fn end_glitch(&mut self) {
        if let Some(id) = self.flicker_timer.take() {
            self.timers.cancel(id);
        }
        self.state.display_scores = None;
        // The popup belongs to the leaderboard, which goes away here.
        self.state.board.easter_egg = false;
        if self.state.phase == Phase::Chaos {
            self.state.chaos = ChaosStage::MessageError;
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Leaderboard / cursor
// ══════════════════════════════════════════════════════════════

impl Controller {
    pub fn poke_player_b(&mut self) {
        if !self.state.leaderboard_visible() || self.state.board.easter_egg {
            return;
        }
        self.state.board.pokes += 1;
        if self.state.board.pokes >= POKES_FOR_EASTER_EGG {
            self.state.board.pokes = 0;
            self.state.board.easter_egg = true;
            self.timers.after(self.timing.easter_egg_ms, self.state.phase, Command::HideEasterEgg);
        }
    }

    /// Number of selectable choices on the current screen.
    pub fn option_count(&self) -> usize {
        let s = &self.state;
        match s.phase {
            Phase::Round1 if s.card.locked.is_none() && !s.quiz_done => self
                .content
                .questions
                .get(s.question_index)
                .map_or(0, |q| q.options.len()),
            Phase::Round2 if s.wheel.awaiting_answer() => 2,
            Phase::Chaos if s.chaos == ChaosStage::Asking => self.content.chaos_options.len(),
            Phase::Final if !s.finale.accepted => 2,
            _ => 0,
        }
    }

    /// Move the selection cursor, wrapping around.
    pub fn move_cursor(&mut self, delta: i32) {
        let n = self.option_count();
        if n == 0 {
            return;
        }
        let n = n as i32;
        let cur = self.state.cursor as i32;
        self.state.cursor = (cur + delta).rem_euclid(n) as usize;
    }
}

// ══════════════════════════════════════════════════════════════
// Internal: timers and phase changes
// ══════════════════════════════════════════════════════════════

impl Controller {
    fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::TypeChar => self.advance_loading_line(),
            Command::NextLine => self.next_loading_line(),
            Command::CommitAnswer => {
                if self.state.phase == Phase::Round1 {
                    if let Some(locked) = self.state.card.locked.take() {
                        self.record_answer(locked.correct);
                    }
                }
            }
            Command::CommitDare(completed) => {
                if self.dares_open() && self.state.wheel.response.is_some() {
                    self.record_dare(completed);
                }
            }
            Command::StopSpin => self.stop_spin(),
            Command::Advance(target) => {
                if self.state.phase.next() == Some(target) {
                    self.change_phase(target);
                } else {
                    tracing::debug!(?target, phase = ?self.state.phase, "ignored out-of-order advance");
                }
            }
            Command::Flicker => self.flicker(),
            Command::EndGlitch => self.end_glitch(),
            Command::Chaos(stage) => {
                if self.state.phase == Phase::Chaos {
                    self.state.chaos = stage;
                }
            }
            Command::HideEasterEgg => self.state.board.easter_egg = false,
        }
    }

    /// The single place `phase` is written.
    fn change_phase(&mut self, target: Phase) {
        let from = self.state.phase;
        if from.next() != Some(target) {
            return;
        }
        let cancelled = self.timers.cancel_scope(from);
        self.typing_timer = None;
        self.flicker_timer = None;

        let s = &mut self.state;
        if from == Phase::Chaos {
            s.chaos = ChaosStage::Done;
            s.display_scores = None;
        }
        s.phase = target;
        s.cursor = 0;
        s.board = Default::default();
        tracing::info!(?from, to = ?target, cancelled, "phase change");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Run {
        c: Controller,
        t: Millis,
    }

    impl Run {
        fn new() -> Self {
            Self::with_content(Content::builtin())
        }

        fn with_content(content: Content) -> Self {
            let rng = StdRng::seed_from_u64(7);
            Run { c: Controller::with_rng(content, TimingConfig::default(), rng), t: 0 }
        }

        fn wait(&mut self, ms: Millis) {
            self.t += ms;
            self.c.tick(self.t);
        }

        /// Advance in 1 ms steps until `done` holds; returns elapsed ms.
        fn wait_until(&mut self, limit: Millis, done: impl Fn(&Controller) -> bool) -> Millis {
            let start = self.t;
            while !done(&self.c) {
                assert!(self.t - start < limit, "condition not reached within {limit} ms");
                self.wait(1);
            }
            self.t - start
        }

        fn phase(&self) -> Phase {
            self.c.state().phase
        }

        fn to_round1(&mut self) {
            self.c.enter();
            self.wait_until(20_000, |c| c.state().loading.start_ready);
            self.c.start();
            assert_eq!(self.phase(), Phase::Round1);
            self.c.drain_cues();
        }

        fn to_round2(&mut self) {
            self.to_round1();
            for _ in 0..self.c.content().questions.len() {
                self.c.answer_question(true);
            }
            self.wait(600);
            assert_eq!(self.phase(), Phase::Round2);
            self.c.drain_cues();
        }

        fn to_chaos(&mut self) {
            self.to_round2();
            for _ in 0..3 {
                self.c.resolve_dare(true);
            }
            self.wait(600);
            assert_eq!(self.phase(), Phase::Chaos);
            self.c.drain_cues();
        }

        fn to_final(&mut self) {
            self.to_chaos();
            self.c.answer_chaos(0);
            self.wait(7000);
            assert_eq!(self.phase(), Phase::Final);
            self.c.drain_cues();
        }
    }

    // ── Intro / loading ──

    #[test]
    fn enter_unlocks_audio_and_starts_typing() {
        let mut r = Run::new();
        assert_eq!(r.phase(), Phase::Intro);
        r.c.enter();
        assert_eq!(r.phase(), Phase::Start);
        assert_eq!(r.c.drain_cues(), vec![SoundCue::UnlockAudio, SoundCue::StartTyping]);

        r.c.enter(); // second click does nothing
        assert!(r.c.drain_cues().is_empty());
    }

    #[test]
    fn loading_types_at_fixed_cadence() {
        let mut r = Run::new();
        r.c.enter();
        r.wait(44);
        assert_eq!(r.c.state().loading.chars, 0);
        r.wait(1);
        assert_eq!(r.c.state().loading.chars, 1);
        r.wait(45 * 4);
        assert_eq!(r.c.state().loading.chars, 5);
    }

    #[test]
    fn extra_advance_at_line_end_is_ignored() {
        let mut r = Run::new();
        r.c.enter();
        let len = r.c.content().loading_lines[0].chars().count();
        r.wait_until(20_000, |c| c.state().loading.chars == len);
        r.c.advance_loading_line();
        r.c.advance_loading_line();
        assert_eq!(r.c.state().loading.chars, len);

        r.wait(600);
        assert_eq!(r.c.state().loading.line, 1);
        assert_eq!(r.c.state().loading.chars, 0);
        r.wait(45 * 3);
        assert_eq!(r.c.state().loading.chars, 3, "one typing timer only");
    }

    #[test]
    fn loading_takes_typing_plus_pauses() {
        let mut r = Run::new();
        let expected: Millis = r
            .c
            .content()
            .loading_lines
            .iter()
            .map(|l| l.chars().count() as Millis * 45 + 600)
            .sum();
        r.c.enter();
        r.c.drain_cues();

        r.wait(expected - 1);
        assert!(!r.c.state().loading.start_ready);
        r.c.start();
        assert_eq!(r.phase(), Phase::Start, "start is ignored until loading is done");

        r.wait(1);
        assert!(r.c.state().loading.start_ready);
        assert_eq!(r.c.state().loading.line, 4);
        assert_eq!(r.c.drain_cues(), vec![SoundCue::StopTyping]);
    }

    #[test]
    fn start_begins_music() {
        let mut r = Run::new();
        r.c.enter();
        r.wait_until(20_000, |c| c.state().loading.start_ready);
        r.c.drain_cues();
        r.c.start();
        assert_eq!(r.phase(), Phase::Round1);
        assert!(r.c.state().music_playing);
        assert_eq!(r.c.drain_cues(), vec![SoundCue::StartMusic]);
    }

    // ── Round 1 ──

    #[test]
    fn all_correct_reaches_round2_after_delay() {
        let mut r = Run::new();
        r.to_round1();
        let n = r.c.content().questions.len();
        for i in 0..n {
            assert_eq!(r.c.state().question_index, i);
            r.c.answer_question(true);
        }
        assert_eq!(r.c.state().score_a, 100 + 10 * n as u32);
        assert_eq!(r.c.state().question_index, n - 1);
        assert_eq!(r.phase(), Phase::Round1);

        r.wait(599);
        assert_eq!(r.phase(), Phase::Round1);
        r.wait(1);
        assert_eq!(r.phase(), Phase::Round2);
    }

    #[test]
    fn answers_while_transition_pending_are_ignored() {
        let mut r = Run::new();
        r.to_round1();
        let n = r.c.content().questions.len();
        for _ in 0..n {
            r.c.answer_question(false);
        }
        let score = r.c.state().score_a;
        r.c.drain_cues();
        r.c.answer_question(true);
        r.c.choose_option(0);
        assert_eq!(r.c.state().score_a, score);
        assert!(r.c.drain_cues().is_empty());
        r.wait(600);
        assert_eq!(r.phase(), Phase::Round2);
    }

    #[test]
    fn wrong_answers_floor_at_zero() {
        let mut content = Content::builtin();
        let q = content.questions[0].clone();
        content.questions = vec![q; 30];
        let mut r = Run::with_content(content);
        r.to_round1();
        let mut prev = r.c.state().score_a;
        for _ in 0..30 {
            r.c.answer_question(false);
            let now = r.c.state().score_a;
            assert!(prev - now <= 5);
            prev = now;
        }
        assert_eq!(r.c.state().score_a, 0);
    }

    #[test]
    fn chosen_option_locks_card_until_feedback_ends() {
        let mut r = Run::new();
        r.to_round1();
        let right = r.c.content().questions[0].correct_index().unwrap();
        let wrong = (right + 1) % 4;

        r.c.choose_option(wrong);
        assert_eq!(r.c.drain_cues(), vec![SoundCue::Wrong]);
        let locked = r.c.state().card.locked.clone().unwrap();
        assert!(!locked.correct);
        assert_eq!(locked.feedback, r.c.content().questions[0].wrong_response);
        assert_eq!(r.c.option_count(), 0);

        // Locked: more clicks do nothing.
        r.c.choose_option(right);
        r.c.answer_question(true);
        assert!(r.c.drain_cues().is_empty());
        assert_eq!(r.c.state().score_a, 100);

        r.wait(2499);
        assert_eq!(r.c.state().question_index, 0);
        r.wait(1);
        assert_eq!(r.c.state().question_index, 1);
        assert_eq!(r.c.state().score_a, 95);
        assert!(r.c.state().card.locked.is_none());
        assert!(r.c.drain_cues().is_empty(), "commit does not replay the cue");
    }

    #[test]
    fn out_of_range_option_is_ignored() {
        let mut r = Run::new();
        r.to_round1();
        r.c.choose_option(17);
        assert!(r.c.state().card.locked.is_none());
        assert!(r.c.drain_cues().is_empty());
    }

    #[test]
    fn quiz_operations_ignored_outside_round1() {
        let mut r = Run::new();
        r.c.answer_question(true);
        r.c.choose_option(0);
        assert_eq!(r.c.state().score_a, 100);
        assert_eq!(r.phase(), Phase::Intro);
    }

    // ── Round 2 ──

    #[test]
    fn three_skipped_dares_reach_chaos() {
        let mut r = Run::new();
        r.to_round2();
        for i in 0..3 {
            assert_eq!(r.phase(), Phase::Round2, "no early chaos after {i} dares");
            r.c.resolve_dare(false);
        }
        assert_eq!(r.c.state().score_b, 70);
        assert_eq!(r.c.state().dares_completed, 3);
        assert_eq!(r.c.drain_cues(), vec![SoundCue::Wrong; 3]);

        r.c.resolve_dare(true); // round is over
        assert_eq!(r.c.state().dares_completed, 3);
        assert_eq!(r.c.state().score_b, 70);

        r.wait(599);
        assert_eq!(r.phase(), Phase::Round2);
        r.wait(1);
        assert_eq!(r.phase(), Phase::Chaos);
    }

    #[test]
    fn completed_dares_add_twenty() {
        let mut r = Run::new();
        r.to_round2();
        r.c.resolve_dare(true);
        r.c.resolve_dare(false);
        assert_eq!(r.c.state().score_b, 110);
    }

    #[test]
    fn wheel_spin_draws_unused_dares() {
        let mut r = Run::new();
        r.to_round2();
        let mut drawn = vec![];
        for _ in 0..3 {
            r.c.spin();
            r.c.spin(); // ignored while spinning
            assert_eq!(r.c.drain_cues(), vec![SoundCue::StartWheel]);
            assert!(r.c.state().wheel.spinning);
            r.wait(2000);
            assert!(!r.c.state().wheel.spinning);
            assert_eq!(r.c.drain_cues(), vec![SoundCue::StopWheel]);

            let dare = r.c.state().wheel.current.unwrap();
            assert!(!drawn.contains(&dare));
            drawn.push(dare);

            r.c.spin(); // ignored while a dare is on the card
            assert!(r.c.drain_cues().is_empty());

            r.c.choose_dare(true);
            r.c.choose_dare(false); // already answered
            assert_eq!(r.c.drain_cues(), vec![SoundCue::Correct]);
            assert!(r.c.state().wheel.response.is_some());
            r.wait(1800);
            assert!(r.c.state().wheel.current.is_none());
        }
        assert_eq!(r.c.state().score_b, 160);
        r.wait(600);
        assert_eq!(r.phase(), Phase::Chaos);
    }

    #[test]
    fn wheel_reuses_dares_once_all_are_drawn() {
        let mut content = Content::builtin();
        content.dares.truncate(1);
        let mut r = Run::with_content(content);
        r.to_round2();
        for _ in 0..2 {
            r.c.spin();
            r.wait(2000);
            assert_eq!(r.c.state().wheel.current, Some(0));
            r.c.choose_dare(false);
            r.wait(1800);
        }
        assert_eq!(r.c.state().score_b, 80);
    }

    #[test]
    fn wheel_angle_grows_by_at_least_two_turns() {
        let mut r = Run::new();
        r.to_round2();
        r.c.spin();
        let a = r.c.state().wheel.angle;
        assert!((720.0..1080.0).contains(&a));
    }

    // ── Chaos ──

    fn chaos_trace(option: usize) -> (Vec<(Millis, ChaosStage, Phase)>, Vec<SoundCue>, (u32, u32)) {
        let mut r = Run::new();
        r.to_chaos();
        let start = r.t;
        let real = (r.c.state().score_a, r.c.state().score_b);
        r.c.answer_chaos(option);
        let mut trace = vec![(0, r.c.state().chaos, r.phase())];
        while r.phase() != Phase::Final {
            r.wait(50);
            let s = r.c.state();
            if s.glitching() {
                if let Some((a, b)) = s.display_scores {
                    assert!(a < 500 && b < 500);
                }
            } else {
                assert!(s.display_scores.is_none());
            }
            assert_eq!((s.score_a, s.score_b), real, "flicker never touches real scores");
            let entry = (r.t - start, s.chaos, s.phase);
            if trace.last().map(|e| (e.1, e.2)) != Some((entry.1, entry.2)) {
                trace.push(entry);
            }
            assert!(r.t - start <= 7000);
        }
        (trace, r.c.drain_cues(), real)
    }

    #[test]
    fn chaos_script_runs_on_schedule() {
        let (trace, cues, _) = chaos_trace(2);
        assert_eq!(
            trace,
            vec![
                (0, ChaosStage::Glitching, Phase::Chaos),
                (2000, ChaosStage::MessageError, Phase::Chaos),
                (3500, ChaosStage::MessageCannot, Phase::Chaos),
                (5000, ChaosStage::MessageDisabled, Phase::Chaos),
                (7000, ChaosStage::Done, Phase::Final),
            ]
        );
        assert_eq!(cues, vec![SoundCue::Glitch]);
    }

    #[test]
    fn chaos_outcome_ignores_the_choice() {
        let first = chaos_trace(0);
        for option in 1..4 {
            let other = chaos_trace(option);
            assert_eq!(first.0, other.0);
            assert_eq!(first.1, other.1);
            assert_eq!(first.2, other.2);
        }
    }

    #[test]
    fn flicker_overlays_scores_during_glitch() {
        let mut r = Run::new();
        r.to_chaos();
        r.c.answer_chaos(1);
        r.wait(100);
        assert!(r.c.state().display_scores.is_some());
        r.c.answer_chaos(3); // already answered
        assert_eq!(r.c.drain_cues(), vec![SoundCue::Glitch]);
        r.wait(1900);
        assert!(r.c.state().display_scores.is_none());
        assert_eq!(r.c.state().shown_scores(), (160, 160));
    }

    // ── Final ──

    #[test]
    fn accept_final_is_terminal() {
        let mut r = Run::new();
        r.to_final();
        assert_eq!(r.c.option_count(), 2);
        r.c.accept_final();
        assert!(r.c.state().finale.accepted);
        assert_eq!(r.c.drain_cues(), vec![SoundCue::FinalMusic, SoundCue::Yay]);
        r.c.accept_final();
        assert!(r.c.drain_cues().is_empty());
        assert_eq!(r.c.option_count(), 0);
        r.wait(60_000);
        assert_eq!(r.phase(), Phase::Final);
    }

    #[test]
    fn no_button_dodges_until_accepted() {
        let mut r = Run::new();
        r.to_final();
        r.c.dodge_no(40, 10);
        let (x, y) = r.c.state().finale.no_offset.unwrap();
        assert!(x < 40 && y < 10);
        r.c.reset_no();
        assert!(r.c.state().finale.no_offset.is_none());
        r.c.accept_final();
        r.c.dodge_no(40, 10);
        assert!(r.c.state().finale.no_offset.is_none());
        assert_eq!(r.c.state().finale.dodges, 1);
    }

    // ── Timers / teardown ──

    #[test]
    fn leaving_a_phase_cancels_its_timers() {
        let mut r = Run::new();
        r.to_round1();
        for _ in 0..r.c.content().questions.len() {
            r.c.choose_option(0);
            r.wait(2500);
        }
        assert!(r.c.state().quiz_done);
        for _ in 0..5 {
            r.c.poke_player_b();
        }
        assert!(r.c.state().board.easter_egg);
        assert_eq!(r.c.timers.pending_in(Phase::Round1), 2);
        r.wait(600);
        assert_eq!(r.phase(), Phase::Round2);
        assert_eq!(r.c.timers.pending_in(Phase::Round1), 0);
        assert!(!r.c.state().board.easter_egg);
    }

    #[test]
    fn easter_egg_hides_after_timeout() {
        let mut r = Run::new();
        r.to_round1();
        for _ in 0..4 {
            r.c.poke_player_b();
        }
        assert!(!r.c.state().board.easter_egg);
        r.c.poke_player_b();
        assert!(r.c.state().board.easter_egg);
        r.wait(2999);
        assert!(r.c.state().board.easter_egg);
        r.wait(1);
        assert!(!r.c.state().board.easter_egg);
    }

    #[test]
    fn easter_egg_closes_when_glitch_ends() {
        let mut r = Run::new();
        r.to_chaos();
        r.c.answer_chaos(0);
        r.wait(1500);
        for _ in 0..5 {
            r.c.poke_player_b();
        }
        assert!(r.c.state().board.easter_egg);
        r.wait(500);
        assert_eq!(r.c.state().chaos, ChaosStage::MessageError);
        assert!(!r.c.state().board.easter_egg);
    }

    #[test]
    fn shutdown_stops_pending_transitions() {
        let mut r = Run::new();
        r.to_round1();
        for _ in 0..r.c.content().questions.len() {
            r.c.answer_question(true);
        }
        r.c.shutdown();
        r.wait(10_000);
        assert_eq!(r.phase(), Phase::Round1);
        assert_eq!(r.c.timers.pending(), 0);
    }

    #[test]
    fn stale_advance_cannot_skip_or_regress() {
        let mut r = Run::new();
        r.to_round2();
        r.c.apply(Command::Advance(Phase::Round2));
        r.c.apply(Command::Advance(Phase::Final));
        r.c.apply(Command::Advance(Phase::Start));
        assert_eq!(r.phase(), Phase::Round2);
    }

    #[test]
    fn cursor_wraps_over_current_options() {
        let mut r = Run::new();
        r.c.move_cursor(1);
        assert_eq!(r.c.state().cursor, 0, "no options on the intro");
        r.to_round1();
        r.c.move_cursor(-1);
        assert_eq!(r.c.state().cursor, 3);
        r.c.move_cursor(2);
        assert_eq!(r.c.state().cursor, 1);
    }
}
