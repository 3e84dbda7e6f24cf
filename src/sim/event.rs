/// Sound requests queued by the flow controller.
/// The shell drains them each frame and hands them to the sound manager.

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SoundCue {
    UnlockAudio,
    StartTyping,
    StopTyping,
    StartMusic,
    Correct,
    Wrong,
    StartWheel,
    StopWheel,
    Glitch,
    /// Raise the music to its final-reveal level.
    FinalMusic,
    Yay,
}
