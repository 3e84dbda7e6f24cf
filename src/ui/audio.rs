/// Audio backends for the sound manager.
///
/// `RodioBackend` loads each sound from `<audio dir>/<file name>` on first
/// use. A file that is missing can be replaced by a procedurally generated
/// clip (in-memory WAV) so the game still has a voice without assets.
/// Every play gets a fresh Sink; a Sink that has run dry counts as finished.
///
/// Compile without the "sound" feature, or run without an output device,
/// and `SilentBackend` stands in: it accepts everything and plays nothing.

use crate::config::AudioConfig;
use crate::ui::sound::{AudioBackend, AudioError, SoundId};

#[cfg(feature = "sound")]
mod inner {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::Arc;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

    use crate::config::AudioConfig;
    use crate::ui::sound::{AudioBackend, AudioError, SoundId};

    const SAMPLE_RATE: u32 = 22050;

    struct Voice {
        data: Arc<Vec<u8>>,
        sink: Option<Sink>,
        volume: f32,
    }

    pub struct RodioBackend {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        dir: PathBuf,
        synth_fallback: bool,
        voices: HashMap<SoundId, Voice>,
    }

    impl RodioBackend {
        pub fn open(cfg: &AudioConfig) -> Result<Self, AudioError> {
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| AudioError::NoDevice(e.to_string()))?;
            Ok(RodioBackend {
                _stream: stream,
                handle,
                dir: cfg.dir.clone(),
                synth_fallback: cfg.synth_fallback,
                voices: HashMap::new(),
            })
        }

        fn load(&self, id: SoundId) -> Result<Vec<u8>, AudioError> {
            let path = self.dir.join(id.file_name());
            match std::fs::read(&path) {
                Ok(bytes) => {
                    tracing::debug!(?id, path = %path.display(), "sound loaded");
                    Ok(bytes)
                }
                Err(source) if self.synth_fallback => {
                    tracing::debug!(?id, path = %path.display(), "sound file unavailable ({source}), using generated clip");
                    Ok(make_wav(&synthesize(id)))
                }
                Err(source) => Err(AudioError::Missing { path, source }),
            }
        }
    }

    impl AudioBackend for RodioBackend {
        fn create(&mut self, id: SoundId) -> Result<(), AudioError> {
            if self.voices.contains_key(&id) {
                return Ok(());
            }
            let data = Arc::new(self.load(id)?);
            self.voices.insert(id, Voice { data, sink: None, volume: id.base_volume() });
            Ok(())
        }

        fn play(&mut self, id: SoundId, volume: f32) -> Result<(), AudioError> {
            let voice = self.voices.get_mut(&id).ok_or(AudioError::NotCreated(id))?;
            if let Some(old) = voice.sink.take() {
                old.stop();
            }
            let sink = Sink::try_new(&self.handle).map_err(|e| AudioError::NoDevice(e.to_string()))?;
            let src = Decoder::new(Cursor::new(voice.data.as_ref().clone()))
                .map_err(|e| AudioError::Decode { id, reason: e.to_string() })?;
            sink.set_volume(volume);
            if id.looping() {
                sink.append(src.repeat_infinite());
            } else {
                sink.append(src);
            }
            voice.volume = volume;
            voice.sink = Some(sink);
            Ok(())
        }

        fn pause(&mut self, id: SoundId) {
            if let Some(sink) = self.voices.get(&id).and_then(|v| v.sink.as_ref()) {
                sink.pause();
            }
        }

        fn resume(&mut self, id: SoundId) -> Result<(), AudioError> {
            let voice = self.voices.get(&id).ok_or(AudioError::NotCreated(id))?;
            if let Some(sink) = voice.sink.as_ref() {
                sink.play();
                return Ok(());
            }
            let volume = voice.volume;
            self.play(id, volume)
        }

        fn stop(&mut self, id: SoundId) {
            if let Some(sink) = self.voices.get_mut(&id).and_then(|v| v.sink.take()) {
                sink.stop();
            }
        }

        fn set_volume(&mut self, id: SoundId, volume: f32) {
            if let Some(voice) = self.voices.get_mut(&id) {
                voice.volume = volume;
                if let Some(sink) = voice.sink.as_ref() {
                    sink.set_volume(volume);
                }
            }
        }

        fn is_finished(&self, id: SoundId) -> bool {
            self.voices
                .get(&id)
                .and_then(|v| v.sink.as_ref())
                .map_or(true, |s| s.empty())
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Generated stand-ins, all mono f32 samples
    // ════════════════════════════════════════════════════════════

    fn synthesize(id: SoundId) -> Vec<f32> {
        match id {
            SoundId::Music => gen_music(),
            SoundId::Typing => gen_typing(),
            SoundId::Wheel => gen_wheel(),
            SoundId::Glitch => gen_glitch(),
            SoundId::Correct => gen_correct(),
            SoundId::Wrong(v) => gen_wrong(v),
            SoundId::Yay => gen_yay(),
        }
    }

    fn tone(freq: f32, t: f32) -> f32 {
        (t * freq * 2.0 * std::f32::consts::PI).sin()
    }

    /// Sequence of (freq, seconds) notes, soft attack and linear release.
    fn notes(seq: &[(f32, f32)], volume: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &(freq, dur) in seq {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let pos = i as f32 / n as f32;
                let env = (pos * 20.0).min(1.0) * (1.0 - pos);
                let wave = tone(freq, t) * 0.7 + tone(freq * 2.0, t) * 0.3;
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    /// Slow piano-ish arpeggio, C major then A minor. Loops cleanly.
    fn gen_music() -> Vec<f32> {
        let bars = [
            [262.0_f32, 330.0, 392.0, 523.0],
            [220.0, 262.0, 330.0, 440.0],
            [175.0, 220.0, 262.0, 349.0],
            [196.0, 247.0, 294.0, 392.0],
        ];
        let seq: Vec<(f32, f32)> = bars.iter().flatten().map(|&f| (f, 0.4)).collect();
        notes(&seq, 0.6)
    }

    /// Irregular key clicks, about six seconds.
    fn gen_typing() -> Vec<f32> {
        let n = SAMPLE_RATE as usize * 6;
        let mut rng: u32 = 777;
        let mut samples = vec![0.0_f32; n];
        let mut at = 0usize;
        while at < n {
            let click = (SAMPLE_RATE as f32 * 0.012) as usize;
            for i in 0..click.min(n - at) {
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let env = 1.0 - i as f32 / click as f32;
                samples[at + i] = noise * env * 0.5;
            }
            rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
            let gap = 0.06 + (rng >> 16) as f32 / 65535.0 * 0.1;
            at += (SAMPLE_RATE as f32 * gap) as usize;
        }
        samples
    }

    /// Ratchet ticks slowing down over two seconds.
    fn gen_wheel() -> Vec<f32> {
        let n = SAMPLE_RATE as usize * 2;
        let mut samples = vec![0.0_f32; n];
        let mut t = 0.0_f32;
        while t < 2.0 {
            let start = (t * SAMPLE_RATE as f32) as usize;
            let tick = (SAMPLE_RATE as f32 * 0.008) as usize;
            for i in 0..tick.min(n.saturating_sub(start)) {
                let env = 1.0 - i as f32 / tick as f32;
                samples[start + i] = tone(1800.0, i as f32 / SAMPLE_RATE as f32) * env * 0.5;
            }
            t += 0.03 + t * t * 0.05;
        }
        samples
    }

    /// Bit-crushed noise bursts with a wobbling carrier.
    fn gen_glitch() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 1.5) as usize;
        let mut rng: u32 = 4242;
        let mut held = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                if i % 64 == 0 {
                    held = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                }
                let gate = if (i / 1500) % 3 == 2 { 0.1 } else { 1.0 };
                let carrier = tone(110.0 + (t * 13.0).sin() * 60.0, t);
                ((held * 0.6 + carrier * 0.4) * 8.0).round() / 8.0 * gate * 0.4
            })
            .collect()
    }

    fn gen_correct() -> Vec<f32> {
        notes(&[(784.0, 0.09), (1047.0, 0.09), (1319.0, 0.25)], 0.35)
    }

    fn gen_wrong(variant: u8) -> Vec<f32> {
        match variant {
            0 => notes(&[(392.0, 0.2), (370.0, 0.2), (349.0, 0.2), (330.0, 0.45)], 0.35),
            1 => {
                // long falling "nooo"
                let n = (SAMPLE_RATE as f32 * 0.9) as usize;
                (0..n)
                    .map(|i| {
                        let pos = i as f32 / n as f32;
                        let freq = 520.0 - pos * 280.0;
                        let t = i as f32 / SAMPLE_RATE as f32;
                        tone(freq, t) * (1.0 - pos).powf(0.5) * 0.35
                    })
                    .collect()
            }
            _ => notes(&[(220.0, 0.18), (185.0, 0.4)], 0.4),
        }
    }

    fn gen_yay() -> Vec<f32> {
        let mut samples = notes(&[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.1)], 0.3);
        samples.extend(notes(&[(1047.0, 0.6)], 0.3));
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let bits_per_sample: u16 = 16;
        let block_align: u16 = bits_per_sample / 8;
        let byte_rate = SAMPLE_RATE * block_align as u32;
        let data_size = samples.len() as u32 * block_align as u32;

        let mut buf = Vec::with_capacity(44 + data_size as usize);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // mono
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }
        buf
    }

}

#[cfg(feature = "sound")]
pub use inner::RodioBackend;

/// Plays nothing. Every clip is "finished" as soon as it starts.
#[derive(Debug, Default)]
pub struct SilentBackend;

impl AudioBackend for SilentBackend {
    fn create(&mut self, _id: SoundId) -> Result<(), AudioError> { Ok(()) }
    fn play(&mut self, _id: SoundId, _volume: f32) -> Result<(), AudioError> { Ok(()) }
    fn pause(&mut self, _id: SoundId) {}
    fn resume(&mut self, _id: SoundId) -> Result<(), AudioError> { Ok(()) }
    fn stop(&mut self, _id: SoundId) {}
    fn set_volume(&mut self, _id: SoundId, _volume: f32) {}
    fn is_finished(&self, _id: SoundId) -> bool { true }
}

/// Best backend available: rodio when compiled in, enabled and a device
/// opens; silence otherwise.
pub fn open_backend(cfg: &AudioConfig) -> Box<dyn AudioBackend> {
    if !cfg.enabled {
        tracing::info!("audio disabled by config");
        return Box::new(SilentBackend);
    }
    #[cfg(feature = "sound")]
    {
        match RodioBackend::open(cfg) {
            Ok(backend) => {
                tracing::info!(dir = %cfg.dir.display(), "audio output opened");
                return Box::new(backend);
            }
            Err(e) => tracing::warn!("audio unavailable, continuing silently: {e}"),
        }
    }
    #[cfg(not(feature = "sound"))]
    tracing::info!("built without sound support");
    Box::new(SilentBackend)
}
