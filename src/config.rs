/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// Every timing is in milliseconds of session time.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub audio: AudioConfig,
    pub gamepad: GamepadConfig,
    pub frame_ms: u64,
    pub content_path: PathBuf,
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimingConfig {
    pub type_char_ms: u64,      // loading screen typing cadence
    pub line_pause_ms: u64,     // pause after each finished loading line
    pub transition_ms: u64,     // round end → next phase
    pub feedback_ms: u64,       // quiz answer feedback before it counts
    pub spin_ms: u64,
    pub dare_response_ms: u64,  // dare response message before it counts
    pub flicker_ms: u64,        // chaos score flicker interval
    pub glitch_ms: u64,         // chaos: glitch ends, "Error." shows
    pub cannot_ms: u64,         // chaos: "Love cannot be calculated."
    pub disabled_ms: u64,       // chaos: "Competition mode disabled."
    pub final_ms: u64,          // chaos: final reveal
    pub easter_egg_ms: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub synth_fallback: bool,
    pub music_volume: f32,      // fade-in target and initial restore level
    pub final_music_volume: f32,
    pub duck_floor: f32,
    pub fade_ms: u64,
    pub fade_steps: u32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub mute: Vec<String>,
    pub poke: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    audio: TomlAudio,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_type_char")]
    type_char_ms: u64,
    #[serde(default = "default_line_pause")]
    line_pause_ms: u64,
    #[serde(default = "default_transition")]
    transition_ms: u64,
    #[serde(default = "default_feedback")]
    feedback_ms: u64,
    #[serde(default = "default_spin")]
    spin_ms: u64,
    #[serde(default = "default_dare_response")]
    dare_response_ms: u64,
    #[serde(default = "default_flicker")]
    flicker_ms: u64,
    #[serde(default = "default_glitch")]
    glitch_ms: u64,
    #[serde(default = "default_cannot")]
    cannot_ms: u64,
    #[serde(default = "default_disabled")]
    disabled_ms: u64,
    #[serde(default = "default_final")]
    final_ms: u64,
    #[serde(default = "default_easter_egg")]
    easter_egg_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlAudio {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_audio_dir")]
    dir: String,
    #[serde(default = "default_true")]
    synth_fallback: bool,
    #[serde(default = "default_music_volume")]
    music_volume: f32,
    #[serde(default = "default_final_music_volume")]
    final_music_volume: f32,
    #[serde(default = "default_duck_floor")]
    duck_floor: f32,
    #[serde(default = "default_fade")]
    fade_ms: u64,
    #[serde(default = "default_fade_steps")]
    fade_steps: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
    #[serde(default = "default_mute")]
    mute: Vec<String>,
    #[serde(default = "default_poke")]
    poke: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_frame")]
    frame_ms: u64,
    #[serde(default = "default_content_file")]
    content_file: String,
    #[serde(default = "default_log_file")]
    log_file: String,
}

// ── Defaults ──

fn default_type_char() -> u64 { 45 }
fn default_line_pause() -> u64 { 600 }
fn default_transition() -> u64 { 600 }
fn default_feedback() -> u64 { 2500 }
fn default_spin() -> u64 { 2000 }
fn default_dare_response() -> u64 { 1800 }
fn default_flicker() -> u64 { 100 }
fn default_glitch() -> u64 { 2000 }
fn default_cannot() -> u64 { 3500 }
fn default_disabled() -> u64 { 5000 }
fn default_final() -> u64 { 7000 }
fn default_easter_egg() -> u64 { 3000 }

fn default_true() -> bool { true }
fn default_audio_dir() -> String { "sounds".into() }
fn default_music_volume() -> f32 { 0.25 }
fn default_final_music_volume() -> f32 { 0.35 }
fn default_duck_floor() -> f32 { 0.08 }
fn default_fade() -> u64 { 2000 }
fn default_fade_steps() -> u32 { 40 }

fn default_confirm() -> Vec<String> { vec!["A".into(), "Start".into()] }
fn default_cancel() -> Vec<String> { vec!["B".into()] }
fn default_mute() -> Vec<String> { vec!["Select".into()] }
fn default_poke() -> Vec<String> { vec!["Y".into()] }

fn default_frame() -> u64 { 16 }
fn default_content_file() -> String { "content.toml".into() }
fn default_log_file() -> String { "love-battle.log".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            type_char_ms: default_type_char(),
            line_pause_ms: default_line_pause(),
            transition_ms: default_transition(),
            feedback_ms: default_feedback(),
            spin_ms: default_spin(),
            dare_response_ms: default_dare_response(),
            flicker_ms: default_flicker(),
            glitch_ms: default_glitch(),
            cannot_ms: default_cannot(),
            disabled_ms: default_disabled(),
            final_ms: default_final(),
            easter_egg_ms: default_easter_egg(),
        }
    }
}

impl Default for TomlAudio {
    fn default() -> Self {
        TomlAudio {
            enabled: true,
            dir: default_audio_dir(),
            synth_fallback: true,
            music_volume: default_music_volume(),
            final_music_volume: default_final_music_volume(),
            duck_floor: default_duck_floor(),
            fade_ms: default_fade(),
            fade_steps: default_fade_steps(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            confirm: default_confirm(),
            cancel: default_cancel(),
            mute: default_mute(),
            poke: default_poke(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            frame_ms: default_frame(),
            content_file: default_content_file(),
            log_file: default_log_file(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig::from(TomlTiming::default())
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig::from(TomlAudio::default())
    }
}

impl From<TomlTiming> for TimingConfig {
    fn from(t: TomlTiming) -> Self {
        TimingConfig {
            type_char_ms: t.type_char_ms,
            line_pause_ms: t.line_pause_ms,
            transition_ms: t.transition_ms,
            feedback_ms: t.feedback_ms,
            spin_ms: t.spin_ms,
            dare_response_ms: t.dare_response_ms,
            flicker_ms: t.flicker_ms,
            glitch_ms: t.glitch_ms,
            cannot_ms: t.cannot_ms,
            disabled_ms: t.disabled_ms,
            final_ms: t.final_ms,
            easter_egg_ms: t.easter_egg_ms,
        }
    }
}

impl From<TomlAudio> for AudioConfig {
    fn from(a: TomlAudio) -> Self {
        AudioConfig {
            enabled: a.enabled,
            dir: PathBuf::from(a.dir),
            synth_fallback: a.synth_fallback,
            music_volume: a.music_volume.clamp(0.0, 1.0),
            final_music_volume: a.final_music_volume.clamp(0.0, 1.0),
            duck_floor: a.duck_floor.clamp(0.0, 1.0),
            fade_ms: a.fade_ms,
            fade_steps: a.fade_steps.max(1),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::resolve(toml_cfg, &search_dirs)
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let mut audio = AudioConfig::from(toml_cfg.audio);
        audio.dir = locate(&audio.dir, search_dirs, |p| p.is_dir());

        let content_path = locate(
            &PathBuf::from(&toml_cfg.general.content_file),
            search_dirs,
            |p| p.is_file(),
        );

        let log_file = if toml_cfg.general.log_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(toml_cfg.general.log_file))
        };

        GameConfig {
            timing: TimingConfig::from(toml_cfg.timing),
            audio,
            gamepad: GamepadConfig {
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
                mute: toml_cfg.gamepad.mute,
                poke: toml_cfg.gamepad.poke,
            },
            frame_ms: toml_cfg.general.frame_ms.max(1),
            content_path,
            log_file,
        }
    }
}

/// Resolve a relative path against the candidate dirs; first match wins,
/// otherwise the path is left relative to the CWD.
fn locate(path: &PathBuf, search_dirs: &[PathBuf], exists: impl Fn(&PathBuf) -> bool) -> PathBuf {
    if path.is_absolute() {
        return path.clone();
    }
    search_dirs
        .iter()
        .map(|d| d.join(path))
        .find(|p| exists(p))
        .unwrap_or_else(|| path.clone())
}

/// Candidate directories to search: exe dir + CWD + XDG data dir (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/love-battle");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
///
/// Logging is not up yet when this runs (the log file path lives in the
/// config), so problems go to stderr like any other pre-terminal message.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => return parse_toml(&text),
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

fn parse_toml(text: &str) -> TomlConfig {
    match toml::from_str::<TomlConfig>(text) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Warning: config.toml parse error: {e}");
            eprintln!("Using default settings.");
            TomlConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_text(text: &str) -> GameConfig {
        GameConfig::resolve(parse_toml(text), &[PathBuf::from("/nonexistent")])
    }

    #[test]
    fn empty_file_gives_stock_timings() {
        let cfg = from_text("");
        assert_eq!(cfg.timing, TimingConfig::default());
        assert_eq!(cfg.timing.type_char_ms, 45);
        assert_eq!(cfg.timing.final_ms, 7000);
        assert_eq!(cfg.audio.fade_steps, 40);
        assert!((cfg.audio.music_volume - 0.25).abs() < f32::EPSILON);
        assert_eq!(cfg.log_file, Some(PathBuf::from("love-battle.log")));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = from_text("[timing]\nspin_ms = 500\n");
        assert_eq!(cfg.timing.spin_ms, 500);
        assert_eq!(cfg.timing.feedback_ms, 2500);
    }

    #[test]
    fn volumes_are_clamped() {
        let cfg = from_text("[audio]\nmusic_volume = 3.0\nduck_floor = -1.0\nfade_steps = 0\n");
        assert_eq!(cfg.audio.music_volume, 1.0);
        assert_eq!(cfg.audio.duck_floor, 0.0);
        assert_eq!(cfg.audio.fade_steps, 1);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let cfg = from_text("[timing\nspin_ms = ");
        assert_eq!(cfg.timing, TimingConfig::default());
    }

    #[test]
    fn empty_log_file_disables_logging() {
        let cfg = from_text("[general]\nlog_file = \"\"\n");
        assert_eq!(cfg.log_file, None);
    }
}
