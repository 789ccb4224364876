//! Boundary to the native playback engine.
//!
//! Commands are fire-and-forget: the engine acts asynchronously and reports
//! the outcome through [`EngineEvent`] notifications delivered on its own
//! threads. Queries return the latest engine-reported value.

#[cfg(unix)]
pub mod mpv;

#[cfg(test)]
pub mod fake;

use crossbeam_channel::Receiver;

/// Play state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// No media attached yet.
    #[default]
    Idle,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl PlayerState {
    pub fn label(self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Opening => "opening",
            PlayerState::Buffering => "buffering",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Stopped => "stopped",
            PlayerState::Ended => "ended",
            PlayerState::Error => "error",
        }
    }
}

/// One selectable audio or subtitle track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: i64,
    pub name: String,
}

/// One chapter marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterInfo {
    pub title: String,
    pub start_ms: i64,
}

/// Notifications raised by the engine, delivered from its internal threads.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Opening,
    /// Cache fill on the engine's 0..=100 scale.
    Buffering(f32),
    Playing,
    Paused,
    Stopped,
    EndReached,
    /// Playback failed. The message is advisory (log only).
    Error(String),
    Muted(bool),
    LengthChanged(i64),
    TimeChanged(i64),
    SeekableChanged(bool),
    VolumeChanged(i32),
    TracksChanged,
    ChaptersChanged,
}

/// A handle to one native engine instance.
///
/// Command methods never block and never fail synchronously; failures come
/// back as [`EngineEvent::Error`] or are logged by the backend. Query
/// methods return the most recent value the engine reported.
pub trait MediaEngine {
    /// Attach the notification stream. Called once per session.
    fn subscribe(&mut self) -> Receiver<EngineEvent>;
    /// Detach the notification stream. Called once at teardown.
    fn unsubscribe(&mut self);
    /// Release the engine and any attached media. Idempotent.
    fn shutdown(&mut self);

    /// Replace the current media with `source` and start loading it.
    /// The previous media is released by the engine after the handover.
    fn open(&mut self, source: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn set_time(&mut self, time_ms: i64);
    fn set_rate(&mut self, rate: f32);
    fn set_volume(&mut self, volume: i32);
    fn set_mute(&mut self, mute: bool);
    /// Select an audio track by native id; -1 clears the selection.
    fn set_audio_track(&mut self, id: i64);
    /// Select a subtitle track by native id; -1 clears the selection.
    fn set_subtitle_track(&mut self, id: i64);
    /// Step one frame forward while paused.
    fn next_frame(&mut self);

    fn state(&self) -> PlayerState;
    fn is_playing(&self) -> bool;
    /// Whether a `play` command would start playback (media is attached).
    fn will_play(&self) -> bool;
    fn can_pause(&self) -> bool;
    fn time(&self) -> i64;
    fn length(&self) -> i64;
    fn is_seekable(&self) -> bool;
    fn volume(&self) -> i32;
    fn is_muted(&self) -> bool;
    /// Frames per second of the current video stream, 0.0 when unknown.
    fn fps(&self) -> f64;
    fn audio_tracks(&self) -> Vec<TrackInfo>;
    fn subtitle_tracks(&self) -> Vec<TrackInfo>;
    fn chapters(&self) -> Vec<ChapterInfo>;
}
