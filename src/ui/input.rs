/// Keyboard input.
///
/// Everything in this game is a one-shot choice, so only key presses count.
/// Each frame `drain_events()` reads every pending terminal event without
/// blocking and turns presses into `Action`s. Repeats from a held key are
/// dropped so a long press cannot answer two questions.
///
/// Key map:
///   Arrows / WASD      →  move the selection
///   Enter / Space      →  confirm
///   1-4                →  pick that option directly
///   Y / N              →  dare completed / skipped
///   P                  →  poke the second player on the leaderboard
///   M                  →  toggle music
///   Q / Esc / Ctrl+C   →  quit

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Confirm,
    Pick(usize),
    Yes,
    No,
    Poke,
    Mute,
    Quit,
}

pub fn action_for_key(key: &KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C')).then_some(Action::Quit);
    }
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Action::Up,
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Action::Down,
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Action::Left,
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Action::Right,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Confirm,
        KeyCode::Char(c @ '1'..='4') => Action::Pick(c as usize - '1' as usize),
        KeyCode::Char('y') | KeyCode::Char('Y') => Action::Yes,
        KeyCode::Char('n') | KeyCode::Char('N') => Action::No,
        KeyCode::Char('p') | KeyCode::Char('P') => Action::Poke,
        KeyCode::Char('m') | KeyCode::Char('M') => Action::Mute,
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Action::Quit,
        _ => return None,
    };
    Some(action)
}

pub struct InputState {
    /// Actions pressed since the last drain, in arrival order.
    actions: Vec<Action>,
    /// The terminal was resized during the last drain.
    pub resized: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            actions: Vec::with_capacity(8),
            resized: false,
        }
    }

    /// Read all pending terminal events. Call once per frame.
    pub fn drain_events(&mut self) {
        self.actions.clear();
        self.resized = false;

        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key)) => {
                    if let Some(action) = action_for_key(&key) {
                        self.actions.push(action);
                    }
                }
                Ok(Event::Resize(..)) => self.resized = true,
                _ => {}
            }
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn quit_pressed(&self) -> bool {
        self.actions.contains(&Action::Quit)
    }
}
