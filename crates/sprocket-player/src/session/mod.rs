//! Playback session: the stateful bridge between commands and the engine.
//!
//! The session caches the last engine-reported value of every
//! user-visible property and republishes changes on its own event
//! stream. Engine notifications arrive on a channel and are only
//! applied inside [`PlaybackSession::pump`], so all cached state is
//! owned by the thread driving the session.

mod commands;
mod debounce;

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::engine::{ChapterInfo, EngineEvent, MediaEngine, PlayerState, TrackInfo};
use crate::transport::TransportControls;

use debounce::DebounceSlot;

/// Change notifications for whoever renders the session. Each variant
/// fires only when the underlying value actually changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(PlayerState),
    PlayingChanged(bool),
    TimeChanged(i64),
    LengthChanged(i64),
    SeekableChanged(bool),
    VolumeChanged(i32),
    MuteChanged(bool),
    RateChanged(f32),
    BufferingChanged(f32),
    TitleChanged(String),
    AudioTracksChanged(Vec<TrackInfo>),
    SubtitleTracksChanged(Vec<TrackInfo>),
    AudioTrackChanged(i32),
    SubtitleTrackChanged(i32),
    ChaptersChanged(Vec<ChapterInfo>),
    LoopChanged(bool),
    ControlsVisibleChanged(bool),
    ErrorReported(String),
}

pub struct PlaybackSession {
    engine: Box<dyn MediaEngine>,
    transport: Box<dyn TransportControls>,
    engine_events: Receiver<EngineEvent>,
    events_tx: Sender<SessionEvent>,
    events_rx: Option<Receiver<SessionEvent>>,

    state: PlayerState,
    playing: bool,
    time_ms: i64,
    length_ms: i64,
    seekable: bool,
    volume: i32,
    muted: bool,
    rate: f32,
    buffering: f32,
    title: String,
    audio_tracks: Vec<TrackInfo>,
    subtitle_tracks: Vec<TrackInfo>,
    audio_track: i32,
    subtitle_track: i32,
    chapters: Vec<ChapterInfo>,

    loop_playback: bool,
    /// False while the user is scrubbing; engine time updates are
    /// ignored so the slider does not fight the drag.
    follow_engine_time: bool,
    controls_visible: bool,
    hidden_by_user: bool,
    pending_seek: DebounceSlot<i64>,
    pending_hide: DebounceSlot<()>,
    closed: bool,
}

impl PlaybackSession {
    pub fn new(mut engine: Box<dyn MediaEngine>, transport: Box<dyn TransportControls>) -> Self {
        let engine_events = engine.subscribe();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            engine,
            transport,
            engine_events,
            events_tx,
            events_rx: Some(events_rx),
            state: PlayerState::Idle,
            playing: false,
            time_ms: 0,
            length_ms: 0,
            seekable: false,
            volume: 100,
            muted: false,
            rate: 1.0,
            buffering: 0.0,
            title: String::new(),
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
            audio_track: -1,
            subtitle_track: -1,
            chapters: Vec::new(),
            loop_playback: false,
            follow_engine_time: true,
            controls_visible: true,
            hidden_by_user: false,
            pending_seek: DebounceSlot::new(),
            pending_hide: DebounceSlot::new(),
            closed: false,
        }
    }

    /// Take the session's change stream. Valid once.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        self.events_rx.take().unwrap_or_else(|| {
            log::warn!("session: change stream already taken");
            let (tx, rx) = crossbeam_channel::bounded(0);
            drop(tx);
            rx
        })
    }

    /// Drain pending engine notifications and fire due delayed actions.
    /// Call regularly from the owning thread.
    pub fn pump(&mut self) {
        self.pump_at(Instant::now());
    }

    pub(crate) fn pump_at(&mut self, now: Instant) {
        while let Ok(event) = self.engine_events.try_recv() {
            self.handle_engine_event(event);
        }
        if let Some(time_ms) = self.pending_seek.fire_due(now) {
            self.apply_time(time_ms);
        }
        if self.pending_hide.fire_due(now).is_some() && self.engine.is_playing() {
            self.publish_controls_visible(false);
        }
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Opening
            | EngineEvent::Playing
            | EngineEvent::Paused
            | EngineEvent::Stopped
            | EngineEvent::Muted(_) => self.refresh_aggregate(),
            EngineEvent::Error(detail) => {
                log::error!("engine: {detail}");
                self.emit(SessionEvent::ErrorReported(detail));
                self.refresh_aggregate();
            }
            EngineEvent::EndReached => self.handle_end_reached(),
            EngineEvent::TimeChanged(time_ms) => {
                if self.follow_engine_time {
                    self.snap_time(time_ms);
                }
            }
            EngineEvent::LengthChanged(length_ms) => {
                self.publish_length(length_ms);
                let chapters = self.engine.chapters();
                self.publish_chapters(chapters);
            }
            EngineEvent::SeekableChanged(seekable) => {
                self.publish_seekable(seekable);
            }
            EngineEvent::VolumeChanged(volume) => {
                self.apply_volume(volume);
                let muted = self.engine.is_muted();
                self.apply_mute(muted);
            }
            EngineEvent::Buffering(progress) => {
                self.publish_buffering(progress);
            }
            EngineEvent::TracksChanged => self.refresh_tracks(),
            EngineEvent::ChaptersChanged => {
                let chapters = self.engine.chapters();
                self.publish_chapters(chapters);
            }
        }
    }

    /// Re-read the aggregate trio from the engine. Event identity is
    /// never trusted for these; the engine is the source of truth.
    fn refresh_aggregate(&mut self) {
        let state = self.engine.state();
        self.publish_state(state);
        let playing = self.engine.is_playing();
        self.publish_playing(playing);
        let muted = self.engine.is_muted();
        self.apply_mute(muted);
    }

    fn handle_end_reached(&mut self) {
        if self.loop_playback {
            self.replay();
            return;
        }
        if self.follow_engine_time {
            let length = self.engine.length();
            self.snap_time(length);
        }
        self.refresh_aggregate();
    }

    fn refresh_tracks(&mut self) {
        let audio = self.engine.audio_tracks();
        self.publish_audio_tracks(audio);
        let subtitles = self.engine.subtitle_tracks();
        self.publish_subtitle_tracks(subtitles);
        // A selection that no longer points at a real entry falls back
        // to disabled.
        if self.audio_track >= self.audio_tracks.len() as i32 {
            self.publish_audio_track(-1);
        }
        if self.subtitle_track >= self.subtitle_tracks.len() as i32 {
            self.publish_subtitle_track(-1);
        }
    }

    /// Clamp into the valid range and publish. Engine notifications land
    /// here; they must never be echoed back as a seek.
    fn snap_time(&mut self, value: i64) {
        let clamped = value.clamp(0, self.length_ms);
        self.publish_time(clamped);
    }

    /// Clamp into the valid range, publish, and push to the engine when
    /// it disagrees.
    pub(crate) fn apply_time(&mut self, value: i64) {
        let clamped = value.clamp(0, self.length_ms);
        if self.publish_time(clamped) && self.engine.time() != clamped {
            self.engine.set_time(clamped);
        }
    }

    pub(crate) fn apply_volume(&mut self, value: i32) {
        let clamped = value.clamp(0, 100);
        if !self.publish_volume(clamped) || self.engine.volume() == clamped {
            return;
        }
        self.engine.set_volume(clamped);
        self.apply_mute(clamped == 0);
    }

    pub(crate) fn apply_mute(&mut self, value: bool) {
        if self.publish_muted(value) && self.engine.is_muted() != value {
            self.engine.set_mute(value);
        }
    }

    /// Detach from the engine and release it. Safe to call twice.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending_seek.cancel();
        self.pending_hide.cancel();
        self.engine.unsubscribe();
        self.engine.shutdown();
        self.transport.closed();
        log::info!("session: closed");
    }

    // ---- Cached state accessors ----

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn time(&self) -> i64 {
        self.time_ms
    }

    pub fn length(&self) -> i64 {
        self.length_ms
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn buffering_progress(&self) -> f32 {
        self.buffering
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn audio_tracks(&self) -> &[TrackInfo] {
        &self.audio_tracks
    }

    pub fn subtitle_tracks(&self) -> &[TrackInfo] {
        &self.subtitle_tracks
    }

    pub fn audio_track(&self) -> i32 {
        self.audio_track
    }

    pub fn subtitle_track(&self) -> i32 {
        self.subtitle_track
    }

    pub fn chapters(&self) -> &[ChapterInfo] {
        &self.chapters
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_playback
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    /// Milliseconds per frame at the current frame rate, rounded up.
    /// Zero when the engine reports no frame rate.
    pub fn frame_duration_ms(&self) -> i64 {
        let fps = self.engine.fps();
        if fps != 0.0 {
            (1000.0 / fps).ceil() as i64
        } else {
            0
        }
    }

    // ---- Equality-gated publication ----

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }

    fn publish_state(&mut self, value: PlayerState) -> bool {
        if self.state == value {
            return false;
        }
        self.state = value;
        self.emit(SessionEvent::StateChanged(value));
        self.transport.set_status(value);
        true
    }

    fn publish_playing(&mut self, value: bool) -> bool {
        if self.playing == value {
            return false;
        }
        self.playing = value;
        self.emit(SessionEvent::PlayingChanged(value));
        true
    }

    fn publish_time(&mut self, value: i64) -> bool {
        if self.time_ms == value {
            return false;
        }
        self.time_ms = value;
        self.emit(SessionEvent::TimeChanged(value));
        true
    }

    fn publish_length(&mut self, value: i64) -> bool {
        let value = value.max(0);
        if self.length_ms == value {
            return false;
        }
        self.length_ms = value;
        self.emit(SessionEvent::LengthChanged(value));
        true
    }

    fn publish_seekable(&mut self, value: bool) -> bool {
        if self.seekable == value {
            return false;
        }
        self.seekable = value;
        self.emit(SessionEvent::SeekableChanged(value));
        true
    }

    fn publish_volume(&mut self, value: i32) -> bool {
        if self.volume == value {
            return false;
        }
        self.volume = value;
        self.emit(SessionEvent::VolumeChanged(value));
        true
    }

    fn publish_muted(&mut self, value: bool) -> bool {
        if self.muted == value {
            return false;
        }
        self.muted = value;
        self.emit(SessionEvent::MuteChanged(value));
        true
    }

    pub(crate) fn publish_rate(&mut self, value: f32) -> bool {
        if self.rate == value {
            return false;
        }
        self.rate = value;
        self.emit(SessionEvent::RateChanged(value));
        true
    }

    fn publish_buffering(&mut self, value: f32) -> bool {
        if self.buffering == value {
            return false;
        }
        self.buffering = value;
        self.emit(SessionEvent::BufferingChanged(value));
        true
    }

    pub(crate) fn publish_title(&mut self, value: String) -> bool {
        if self.title == value {
            return false;
        }
        self.title = value.clone();
        self.emit(SessionEvent::TitleChanged(value));
        true
    }

    fn publish_audio_tracks(&mut self, value: Vec<TrackInfo>) -> bool {
        if self.audio_tracks == value {
            return false;
        }
        self.audio_tracks = value.clone();
        self.emit(SessionEvent::AudioTracksChanged(value));
        true
    }

    fn publish_subtitle_tracks(&mut self, value: Vec<TrackInfo>) -> bool {
        if self.subtitle_tracks == value {
            return false;
        }
        self.subtitle_tracks = value.clone();
        self.emit(SessionEvent::SubtitleTracksChanged(value));
        true
    }

    pub(crate) fn publish_audio_track(&mut self, value: i32) -> bool {
        if self.audio_track == value {
            return false;
        }
        self.audio_track = value;
        self.emit(SessionEvent::AudioTrackChanged(value));
        true
    }

    pub(crate) fn publish_subtitle_track(&mut self, value: i32) -> bool {
        if self.subtitle_track == value {
            return false;
        }
        self.subtitle_track = value;
        self.emit(SessionEvent::SubtitleTrackChanged(value));
        true
    }

    fn publish_chapters(&mut self, value: Vec<ChapterInfo>) -> bool {
        if self.chapters == value {
            return false;
        }
        self.chapters = value.clone();
        self.emit(SessionEvent::ChaptersChanged(value));
        true
    }

    pub(crate) fn publish_loop(&mut self, value: bool) -> bool {
        if self.loop_playback == value {
            return false;
        }
        self.loop_playback = value;
        self.emit(SessionEvent::LoopChanged(value));
        true
    }

    pub(crate) fn publish_controls_visible(&mut self, value: bool) -> bool {
        if self.controls_visible == value {
            return false;
        }
        self.controls_visible = value;
        self.emit(SessionEvent::ControlsVisibleChanged(value));
        true
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.close();
    }
}
