/// Gamepad input using gilrs.
///
/// Button mapping comes from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Move selection
///   A / Start             →  Confirm (dare: completed)
///   B                     →  Dare skipped
///   Y                     →  Poke
///   Select                →  Toggle music
///
/// Presses are turned into the same `Action`s the keyboard produces.

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;
use crate::ui::input::Action;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.5;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,
    R1,
    Start,
    Select,
}

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH" => Some(Btn::A),
            "B" | "EAST" => Some(Btn::B),
            "X" | "WEST" => Some(Btn::X),
            "Y" | "NORTH" => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER" => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East => Some(Btn::B),
            Button::West => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::Start => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            _ => None,
        }
    }
}

/// Action-to-button mapping (loaded from config).
#[derive(Debug)]
struct ActionMap {
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
    mute: Vec<Btn>,
    poke: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            confirm: vec![Btn::A, Btn::Start],
            cancel: vec![Btn::B],
            mute: vec![Btn::Select],
            poke: vec![Btn::Y],
        }
    }
}

impl ActionMap {
    fn action_for(&self, btn: Btn) -> Option<Action> {
        if self.confirm.contains(&btn) {
            Some(Action::Confirm)
        } else if self.cancel.contains(&btn) {
            Some(Action::No)
        } else if self.poke.contains(&btn) {
            Some(Action::Poke)
        } else if self.mute.contains(&btn) {
            Some(Action::Mute)
        } else {
            None
        }
    }
}

/// Stick direction after the deadzone, used for edge detection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
enum StickDir {
    #[default]
    Center,
    Up,
    Down,
    Left,
    Right,
}

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
fn stick_dir(x: f32, y: f32) -> StickDir {
    if x.abs() < STICK_DEADZONE && y.abs() < STICK_DEADZONE {
        StickDir::Center
    } else if y.abs() >= x.abs() {
        if y > 0.0 { StickDir::Up } else { StickDir::Down }
    } else if x > 0.0 {
        StickDir::Right
    } else {
        StickDir::Left
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,
    action_map: ActionMap,
    actions: Vec<Action>,
    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    stick_x: f32,
    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    stick_y: f32,
    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    stick: StickDir,
    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(e) => {
                tracing::debug!("gamepad support unavailable: {e}");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            action_map: ActionMap::default(),
            actions: Vec::with_capacity(4),
            stick_x: 0.0,
            stick_y: 0.0,
            stick: StickDir::Center,
            connected,
        }
    }

    /// Load button mapping from config. Empty or unknown lists keep the default.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        fn parse_list(names: &[String]) -> Vec<Btn> {
            names.iter().filter_map(|s| Btn::from_name(s)).collect()
        }
        let map = &mut self.action_map;
        let cf = parse_list(&cfg.confirm);
        if !cf.is_empty() { map.confirm = cf; }
        let ca = parse_list(&cfg.cancel);
        if !ca.is_empty() { map.cancel = ca; }
        let mu = parse_list(&cfg.mute);
        if !mu.is_empty() { map.mute = mu; }
        let po = parse_list(&cfg.poke);
        if !po.is_empty() { map.poke = po; }
    }

    /// Poll the pad. Call once per frame.
    pub fn update(&mut self) {
        self.actions.clear();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return,
        };

        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.press(btn);
                }
                EventType::AxisChanged(axis, value, _) => {
                    self.connected = true;
                    match axis {
                        Axis::LeftStickX => self.stick_x = value,
                        Axis::LeftStickY => self.stick_y = value,
                        _ => {}
                    }
                }
                EventType::Connected => {
                    tracing::info!("gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    tracing::info!("gamepad disconnected");
                    self.connected = false;
                    self.stick_x = 0.0;
                    self.stick_y = 0.0;
                }
                _ => {}
            }
        }

        // Stick moves the selection once per push away from center.
        let dir = stick_dir(self.stick_x, self.stick_y);
        if dir != self.stick {
            let action = match dir {
                StickDir::Up => Some(Action::Up),
                StickDir::Down => Some(Action::Down),
                StickDir::Left => Some(Action::Left),
                StickDir::Right => Some(Action::Right),
                StickDir::Center => None,
            };
            self.actions.extend(action);
            self.stick = dir;
        }
    }

    #[cfg(feature = "gamepad")]
    fn press(&mut self, btn: Button) {
        let action = match btn {
            Button::DPadUp => Some(Action::Up),
            Button::DPadDown => Some(Action::Down),
            Button::DPadLeft => Some(Action::Left),
            Button::DPadRight => Some(Action::Right),
            other => Btn::from_gilrs(other).and_then(|b| self.action_map.action_for(b)),
        };
        self.actions.extend(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_covers_every_action() {
        let map = ActionMap::default();
        assert_eq!(map.action_for(Btn::A), Some(Action::Confirm));
        assert_eq!(map.action_for(Btn::Start), Some(Action::Confirm));
        assert_eq!(map.action_for(Btn::B), Some(Action::No));
        assert_eq!(map.action_for(Btn::Y), Some(Action::Poke));
        assert_eq!(map.action_for(Btn::Select), Some(Action::Mute));
        assert_eq!(map.action_for(Btn::L1), None);
    }

    #[test]
    fn config_overrides_only_valid_lists() {
        let mut pad = GamepadState::new();
        let cfg = GamepadConfig {
            confirm: vec!["x".into()],
            cancel: vec!["bogus".into()],
            mute: vec![],
            poke: vec!["RB".into(), "north".into()],
        };
        pad.load_button_config(&cfg);
        assert_eq!(pad.action_map.confirm, vec![Btn::X]);
        assert_eq!(pad.action_map.cancel, vec![Btn::B]);
        assert_eq!(pad.action_map.mute, vec![Btn::Select]);
        assert_eq!(pad.action_map.poke, vec![Btn::R1, Btn::Y]);
    }

    #[test]
    fn stick_needs_to_leave_the_deadzone() {
        assert_eq!(stick_dir(0.2, -0.3), StickDir::Center);
        assert_eq!(stick_dir(0.1, 0.9), StickDir::Up);
        assert_eq!(stick_dir(-0.8, 0.6), StickDir::Left);
        assert_eq!(stick_dir(0.0, -0.7), StickDir::Down);
    }
}
