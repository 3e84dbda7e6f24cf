/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

use config::{AudioConfig, GameConfig};
use domain::content::Content;
use sim::event::SoundCue;
use sim::flow::Controller;
use sim::scheduler::Millis;
use sim::state::Phase;
use ui::audio::open_backend;
use ui::gamepad::GamepadState;
use ui::input::{Action, InputState};
use ui::renderer::{no_button_area, Renderer};
use ui::sound::{AudioBackend, SoundId, SoundManager};

fn main() {
    let config = GameConfig::load();
    if let Some(path) = &config.log_file {
        init_logging(path);
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "love-battle starting");

    let content = Content::load_or_builtin(&config.content_path);
    let mut flow = Controller::new(content, config.timing.clone());
    let mut sound = SoundManager::new(open_backend(&config.audio), config.audio.clone());

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(&mut flow, &mut sound, &mut renderer, &config);

    flow.shutdown();
    sound.dispose();

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        tracing::error!("game loop failed: {e}");
        eprintln!("Game error: {e}");
    }

    let s = flow.state();
    println!();
    if s.finale.accepted {
        println!("{}  {}", flow.content().forever_title, flow.content().forever_subtitle);
    } else {
        println!("Thanks for playing Love Battle!");
    }
    tracing::info!(phase = ?s.phase, score_a = s.score_a, score_b = s.score_b, "love-battle exiting");
}

/// Log to a file; the terminal belongs to the renderer. `RUST_LOG`
/// overrides the default `info` filter.
fn init_logging(path: &Path) {
    let file = match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}", path.display());
            return;
        }
    };
    let result = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    if let Err(e) = result {
        eprintln!("Warning: logging disabled: {e}");
    }
}

fn game_loop<B: AudioBackend>(
    flow: &mut Controller,
    sound: &mut SoundManager<B>,
    renderer: &mut Renderer,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        tracing::info!("gamepad detected");
    }

    let started = Instant::now();
    let frame = Duration::from_millis(config.frame_ms.max(1));

    loop {
        kb.drain_events();
        gp.update();
        if kb.quit_pressed() {
            tracing::info!("quit requested");
            break;
        }

        let now = started.elapsed().as_millis() as Millis;
        flow.tick(now);

        for &action in kb.actions().iter().chain(gp.actions()) {
            if action == Action::Mute {
                if flow.state().phase != Phase::Intro {
                    let playing = sound.toggle_music();
                    flow.set_music_playing(playing);
                }
                continue;
            }
            dispatch(flow, action, renderer.size());
        }

        pump_sound(sound, flow, now, &config.audio);
        if flow.state().phase != Phase::Intro {
            flow.set_music_playing(!sound.is_muted());
        }

        renderer.render(flow.state(), flow.content(), now)?;
        std::thread::sleep(frame);
    }

    Ok(())
}

/// Route one input action to the operation it means on the current screen.
fn dispatch(flow: &mut Controller, action: Action, term: (u16, u16)) {
    let phase = flow.state().phase;
    let cursor = flow.state().cursor;

    match (phase, action) {
        (Phase::Intro, Action::Confirm) => flow.enter(),
        (Phase::Start, Action::Confirm) => flow.start(),

        (_, Action::Poke) => flow.poke_player_b(),

        (Phase::Round1, Action::Confirm) => flow.choose_option(cursor),
        (Phase::Round1, Action::Pick(i)) => flow.choose_option(i),

        (Phase::Round2, Action::Confirm) => {
            if flow.state().wheel.awaiting_answer() {
                flow.choose_dare(cursor == 0);
            } else {
                flow.spin();
            }
        }
        (Phase::Round2, Action::Yes) => flow.choose_dare(true),
        (Phase::Round2, Action::No) => flow.choose_dare(false),

        (Phase::Chaos, Action::Confirm) => flow.answer_chaos(cursor),
        (Phase::Chaos, Action::Pick(i)) => flow.answer_chaos(i),

        (Phase::Final, Action::Confirm) if cursor == 0 => flow.accept_final(),
        (Phase::Final, Action::Confirm) | (Phase::Final, Action::No) => {
            let (w, h) = no_button_area(term.0, term.1);
            flow.dodge_no(w, h);
        }
        (Phase::Final, Action::Yes) => flow.accept_final(),

        (_, Action::Up | Action::Left) => move_selection(flow, -1, term),
        (_, Action::Down | Action::Right) => move_selection(flow, 1, term),

        _ => {}
    }
}

/// On the final screen the "No" button runs from the cursor.
fn move_selection(flow: &mut Controller, delta: i32, term: (u16, u16)) {
    flow.move_cursor(delta);
    if flow.state().phase != Phase::Final {
        return;
    }
    if flow.state().cursor == 1 {
        let (w, h) = no_button_area(term.0, term.1);
        flow.dodge_no(w, h);
    } else {
        flow.reset_no();
    }
}

/// Bring the sound clock up to `now` before handing over this frame's cues,
/// so timers they start count from the current frame.
fn pump_sound<B: AudioBackend>(sound: &mut SoundManager<B>, flow: &mut Controller, now: Millis, audio: &AudioConfig) {
    sound.tick(now);
    process_sound_cues(sound, flow.drain_cues(), audio);
}

fn process_sound_cues<B: AudioBackend>(sound: &mut SoundManager<B>, cues: Vec<SoundCue>, audio: &AudioConfig) {
    for cue in cues {
        tracing::trace!(?cue, "sound cue");
        match cue {
            SoundCue::UnlockAudio => sound.unlock(),
            SoundCue::StartTyping => sound.play_typing(),
            SoundCue::StopTyping => sound.stop_typing(),
            SoundCue::StartMusic => sound.start_music(),
            SoundCue::Correct => sound.play_effect(SoundId::Correct),
            SoundCue::Wrong => {
                sound.play_random_wrong_effect();
            }
            SoundCue::StartWheel => sound.play_wheel(),
            SoundCue::StopWheel => sound.stop_wheel(),
            SoundCue::Glitch => sound.play_effect(SoundId::Glitch),
            SoundCue::FinalMusic => sound.set_music_volume(audio.final_music_volume),
            SoundCue::Yay => sound.play_effect(SoundId::Yay),
        }
    }
}
