/// Sound manager: every sound in the game goes through here.
///
/// One policy: two sounds never fight. While a foreground effect plays the
/// background music is ducked to a low floor, and it comes back to its
/// normal level once no effect holds the duck any more. An effect lets go
/// when it finishes playing (polled on `tick`) or when its fallback timer
/// fires, whichever is first.
///
/// Handles are created lazily on first use and live until `dispose()`.
/// Playback failures are logged at debug level and otherwise ignored; a
/// failed effect leaves the music alone.
///
/// The actual audio device sits behind `AudioBackend` (see `ui::audio`).

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::AudioConfig;
use crate::sim::scheduler::{Millis, Scheduler, TimerId};

pub const WRONG_VARIANTS: u8 = 3;

// ══════════════════════════════════════════════════════════════
// Sound identifiers
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SoundId {
    Music,
    Typing,
    Wheel,
    Glitch,
    Correct,
    Wrong(u8),
    Yay,
}

impl SoundId {
    pub fn file_name(self) -> &'static str {
        match self {
            SoundId::Music => "piano.mp3",
            SoundId::Typing => "keyboard-typing.mp3",
            SoundId::Wheel => "spinning-wheel.mp3",
            SoundId::Glitch => "glitch.mp3",
            SoundId::Correct => "correct.mp3",
            SoundId::Wrong(0) => "aww-man.mp3",
            SoundId::Wrong(1) => "noooo-ans.mp3",
            SoundId::Wrong(_) => "wrong-ans.mp3",
            SoundId::Yay => "yayyy.mp3",
        }
    }

    /// Playback volume of an effect. Music is managed separately.
    pub fn base_volume(self) -> f32 {
        match self {
            SoundId::Music => 0.0,
            SoundId::Typing => 0.2,
            SoundId::Wheel => 1.0,
            SoundId::Glitch | SoundId::Yay => 0.5,
            SoundId::Correct | SoundId::Wrong(_) => 0.4,
        }
    }

    pub fn looping(self) -> bool {
        self == SoundId::Music
    }

    /// Fallback: the duck is released after this long even if the effect
    /// never reports that it finished.
    pub fn restore_after_ms(self) -> Millis {
        match self {
            SoundId::Correct | SoundId::Wrong(_) => 2000,
            SoundId::Glitch => 3000,
            SoundId::Yay => 4000,
            SoundId::Wheel => 5000,
            SoundId::Music | SoundId::Typing => 0,
        }
    }

    /// Held effects keep the duck until stopped explicitly (or the fallback);
    /// they are not released just because the clip ran out.
    fn held(self) -> bool {
        self == SoundId::Wheel
    }
}

// ══════════════════════════════════════════════════════════════
// Backend seam
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device: {0}")]
    NoDevice(String),
    #[error("sound file {path} unavailable: {source}")]
    Missing {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode {id:?}: {reason}")]
    Decode { id: SoundId, reason: String },
    #[error("{0:?} was never created")]
    NotCreated(SoundId),
}

/// A device that can play the game's sounds. One voice per `SoundId`;
/// playing a voice again restarts it.
pub trait AudioBackend {
    /// Load whatever `id` needs. Called once, on first use.
    fn create(&mut self, id: SoundId) -> Result<(), AudioError>;
    /// Play from the start at `volume`.
    fn play(&mut self, id: SoundId, volume: f32) -> Result<(), AudioError>;
    /// Pause, keeping the position.
    fn pause(&mut self, id: SoundId);
    fn resume(&mut self, id: SoundId) -> Result<(), AudioError>;
    fn stop(&mut self, id: SoundId);
    fn set_volume(&mut self, id: SoundId, volume: f32);
    /// Nothing left to play (never started, stopped, or ran out).
    fn is_finished(&self, id: SoundId) -> bool;
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn create(&mut self, id: SoundId) -> Result<(), AudioError> { (**self).create(id) }
    fn play(&mut self, id: SoundId, volume: f32) -> Result<(), AudioError> { (**self).play(id, volume) }
    fn pause(&mut self, id: SoundId) { (**self).pause(id) }
    fn resume(&mut self, id: SoundId) -> Result<(), AudioError> { (**self).resume(id) }
    fn stop(&mut self, id: SoundId) { (**self).stop(id) }
    fn set_volume(&mut self, id: SoundId, volume: f32) { (**self).set_volume(id, volume) }
    fn is_finished(&self, id: SoundId) -> bool { (**self).is_finished(id) }
}

// ══════════════════════════════════════════════════════════════
// Manager
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Scope {
    Fade,
    Duck,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum Command {
    FadeStep,
    Release(SoundId),
}

#[derive(Clone, Copy, Debug, Default)]
struct Handle {
    /// Started and not stopped since. The clip may still have run out.
    active: bool,
}

#[derive(Clone, Copy, Debug)]
struct Fade {
    step: u32,
    timer: TimerId,
}

pub struct SoundManager<B: AudioBackend> {
    backend: B,
    cfg: AudioConfig,
    handles: HashMap<SoundId, Handle>,
    unlocked: bool,
    muted: bool,
    music_started: bool,
    normal_volume: f32,
    music_volume: f32,
    fade: Option<Fade>,
    /// Effects currently holding the music ducked, with their fallback timer.
    ducks: HashMap<SoundId, TimerId>,
    last_wrong: Option<usize>,
    timers: Scheduler<Scope, Command>,
    rng: StdRng,
    disposed: bool,
}

impl<B: AudioBackend> SoundManager<B> {
    pub fn new(backend: B, cfg: AudioConfig) -> Self {
        Self::with_rng(backend, cfg, StdRng::from_os_rng())
    }

    pub fn with_rng(backend: B, cfg: AudioConfig, rng: StdRng) -> Self {
        let normal_volume = cfg.music_volume;
        SoundManager {
            backend,
            cfg,
            handles: HashMap::new(),
            unlocked: false,
            muted: true,
            music_started: false,
            normal_volume,
            music_volume: 0.0,
            fade: None,
            ducks: HashMap::new(),
            last_wrong: None,
            timers: Scheduler::new(),
            rng,
            disposed: false,
        }
    }

    // ── Queries ──

    pub fn music_volume(&self) -> f32 { self.music_volume }
    pub fn normal_volume(&self) -> f32 { self.normal_volume }
    pub fn is_muted(&self) -> bool { self.muted }
    pub fn is_ducked(&self) -> bool { !self.ducks.is_empty() }
    pub fn is_unlocked(&self) -> bool { self.unlocked }
    pub fn has_handle(&self, id: SoundId) -> bool { self.handles.contains_key(&id) }

    #[cfg(test)]
    pub fn backend(&self) -> &B { &self.backend }

    // ── Lifecycle ──

    /// Allow playback. Until then every play request is dropped.
    pub fn unlock(&mut self) {
        if !self.unlocked {
            self.unlocked = true;
            tracing::debug!("audio unlocked");
        }
    }

    /// Run due fade steps and fallback releases, then release every
    /// non-held effect that has finished playing.
    pub fn tick(&mut self, now: Millis) {
        if self.disposed {
            return;
        }
        while let Some(cmd) = self.timers.pop_due(now) {
            match cmd {
                Command::FadeStep => self.fade_step(),
                Command::Release(id) => {
                    tracing::trace!(?id, "duck fallback fired");
                    self.release(id);
                }
            }
        }

        let finished: Vec<SoundId> = self
            .ducks
            .keys()
            .copied()
            .filter(|id| !id.held() && self.backend.is_finished(*id))
            .collect();
        for id in finished {
            self.release(id);
        }
    }

    /// Stop everything and drop all timers. Further calls are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for id in self.handles.keys().copied().collect::<Vec<_>>() {
            self.backend.stop(id);
        }
        self.handles.clear();
        self.ducks.clear();
        self.timers.clear();
        self.fade = None;
        self.disposed = true;
        tracing::debug!("sound manager disposed");
    }

    // ── Effects ──

    /// Play `id` from the start with the music ducked underneath it.
    pub fn play_effect(&mut self, id: SoundId) {
        if !self.can_play() || !self.ensure(id) {
            return;
        }
        match self.backend.play(id, id.base_volume()) {
            Ok(()) => {
                self.mark_active(id, true);
                self.duck(id);
            }
            Err(e) => tracing::debug!(?id, "effect playback failed: {e}"),
        }
    }

    /// Play one of the wrong-answer variants, never the same one twice in a
    /// row. Returns the variant index.
    pub fn play_random_wrong_effect(&mut self) -> usize {
        let n = WRONG_VARIANTS as usize;
        let idx = match self.last_wrong {
            Some(last) if n > 1 => {
                let r = self.rng.random_range(0..n - 1);
                if r >= last { r + 1 } else { r }
            }
            _ => self.rng.random_range(0..n),
        };
        self.last_wrong = Some(idx);
        self.play_effect(SoundId::Wrong(idx as u8));
        idx
    }

    /// Typing clicks under the loading screen. Not ducked; no-op while it is
    /// already playing.
    pub fn play_typing(&mut self) {
        if !self.can_play() || !self.ensure(SoundId::Typing) {
            return;
        }
        let active = self.handles.get(&SoundId::Typing).is_some_and(|h| h.active);
        if active && !self.backend.is_finished(SoundId::Typing) {
            return;
        }
        match self.backend.play(SoundId::Typing, SoundId::Typing.base_volume()) {
            Ok(()) => self.mark_active(SoundId::Typing, true),
            Err(e) => tracing::debug!("typing playback failed: {e}"),
        }
    }

    pub fn stop_typing(&mut self) {
        if self.handles.contains_key(&SoundId::Typing) {
            self.backend.stop(SoundId::Typing);
            self.mark_active(SoundId::Typing, false);
        }
    }

    /// Wheel whirr. Holds the duck until `stop_wheel` (or its fallback).
    pub fn play_wheel(&mut self) {
        self.play_effect(SoundId::Wheel);
    }

    pub fn stop_wheel(&mut self) {
        if self.handles.contains_key(&SoundId::Wheel) {
            self.backend.stop(SoundId::Wheel);
            self.mark_active(SoundId::Wheel, false);
        }
        self.release(SoundId::Wheel);
    }

    // ── Music ──

    /// Start the background loop at volume 0 and fade it in. Only the first
    /// call does anything.
    pub fn start_music(&mut self) {
        if self.music_started || !self.can_play() {
            return;
        }
        self.music_started = true;
        self.muted = false;
        if !self.ensure(SoundId::Music) {
            return;
        }
        self.apply_music_volume(0.0);
        match self.backend.play(SoundId::Music, 0.0) {
            Ok(()) => self.mark_active(SoundId::Music, true),
            Err(e) => tracing::debug!("music playback failed: {e}"),
        }

        self.cancel_fade();
        let steps = self.cfg.fade_steps.max(1);
        let interval = self.cfg.fade_ms / steps as Millis;
        let timer = self.timers.every(interval, Scope::Fade, Command::FadeStep);
        self.fade = Some(Fade { step: 0, timer });
        tracing::info!(target_volume = self.cfg.music_volume, "music started");
    }

    /// Flip mute. Returns whether music is now playing.
    pub fn toggle_music(&mut self) -> bool {
        if self.disposed || !self.ensure(SoundId::Music) {
            return !self.muted;
        }
        if self.muted {
            let active = self.handles.get(&SoundId::Music).is_some_and(|h| h.active);
            let result = if active {
                self.backend.resume(SoundId::Music)
            } else {
                self.backend.play(SoundId::Music, self.audible_level())
            };
            match result {
                Ok(()) => self.mark_active(SoundId::Music, true),
                Err(e) => tracing::debug!("music resume failed: {e}"),
            }
            self.muted = false;
            self.apply_music_volume(self.audible_level());
        } else {
            self.backend.pause(SoundId::Music);
            self.muted = true;
        }
        tracing::debug!(playing = !self.muted, "music toggled");
        !self.muted
    }

    /// New normal music level, clamped to `[0, 1]`. Stops a running fade.
    pub fn set_music_volume(&mut self, volume: f32) {
        if self.disposed {
            return;
        }
        self.cancel_fade();
        self.normal_volume = volume.clamp(0.0, 1.0);
        if !self.muted && self.ensure(SoundId::Music) {
            self.apply_music_volume(self.audible_level());
        }
    }

    // ── Internal ──

    fn can_play(&self) -> bool {
        if self.disposed {
            return false;
        }
        if !self.unlocked {
            tracing::trace!("playback requested before unlock, ignored");
        }
        self.unlocked
    }

    /// Lazily create the handle for `id`.
    fn ensure(&mut self, id: SoundId) -> bool {
        if self.handles.contains_key(&id) {
            return true;
        }
        match self.backend.create(id) {
            Ok(()) => {
                self.handles.insert(id, Handle::default());
                true
            }
            Err(e) => {
                tracing::debug!(?id, "could not create sound: {e}");
                false
            }
        }
    }

    fn mark_active(&mut self, id: SoundId, active: bool) {
        if let Some(h) = self.handles.get_mut(&id) {
            h.active = active;
        }
    }

    /// Level the music should sit at right now, ignoring mute.
    fn audible_level(&self) -> f32 {
        if self.ducks.is_empty() {
            self.normal_volume
        } else {
            self.normal_volume.min(self.cfg.duck_floor)
        }
    }

    fn apply_music_volume(&mut self, volume: f32) {
        self.music_volume = volume;
        if self.handles.contains_key(&SoundId::Music) {
            self.backend.set_volume(SoundId::Music, volume);
        }
    }

    fn duck(&mut self, id: SoundId) {
        if let Some(old) = self.ducks.remove(&id) {
            self.timers.cancel(old);
        }
        let timer = self.timers.after(id.restore_after_ms(), Scope::Duck, Command::Release(id));
        self.ducks.insert(id, timer);
        if !self.muted && self.handles.contains_key(&SoundId::Music) {
            let ducked = self.music_volume.min(self.cfg.duck_floor);
            self.apply_music_volume(ducked);
        }
    }

    fn release(&mut self, id: SoundId) {
        let Some(timer) = self.ducks.remove(&id) else {
            return;
        };
        self.timers.cancel(timer);
        if self.ducks.is_empty() && !self.muted && self.handles.contains_key(&SoundId::Music) {
            self.apply_music_volume(self.normal_volume);
        }
    }

    fn fade_step(&mut self) {
        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        let steps = self.cfg.fade_steps.max(1);
        fade.step += 1;
        let done = fade.step >= steps;
        let level = self.cfg.music_volume * fade.step.min(steps) as f32 / steps as f32;
        if done {
            self.cancel_fade();
        }
        self.normal_volume = level;
        if !self.muted && self.ducks.is_empty() {
            self.apply_music_volume(level);
        }
    }

    fn cancel_fade(&mut self) {
        if let Some(fade) = self.fade.take() {
            self.timers.cancel(fade.timer);
        }
    }
}

impl<B: AudioBackend> Drop for SoundManager<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
