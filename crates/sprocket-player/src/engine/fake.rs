//! Scripted engine for session tests. Records every command it receives
//! and lets the test inject events and engine-reported values directly.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use crossbeam_channel::{Receiver, Sender};

use super::{ChapterInfo, EngineEvent, MediaEngine, PlayerState, TrackInfo};

#[derive(Debug, Clone, PartialEq)]
pub enum FakeCommand {
    Open(String),
    Play,
    Pause,
    Stop,
    SetTime(i64),
    SetRate(f32),
    SetVolume(i32),
    SetMute(bool),
    SetAudioTrack(i64),
    SetSubtitleTrack(i64),
    NextFrame,
    Unsubscribe,
    Shutdown,
}

/// Values the fake reports back from its query methods. Commands never
/// touch these; tests set them to model what the engine would report.
#[derive(Debug, Default)]
pub struct FakeStatus {
    pub state: PlayerState,
    pub playing: bool,
    pub will_play: bool,
    pub can_pause: bool,
    pub time_ms: i64,
    pub length_ms: i64,
    pub seekable: bool,
    pub volume: i32,
    pub muted: bool,
    pub fps: f64,
    pub audio_tracks: Vec<TrackInfo>,
    pub subtitle_tracks: Vec<TrackInfo>,
    pub chapters: Vec<ChapterInfo>,
}

#[derive(Debug, Default)]
struct FakeShared {
    status: FakeStatus,
    commands: Vec<FakeCommand>,
}

pub struct FakeEngine {
    shared: Rc<RefCell<FakeShared>>,
    events_rx: Option<Receiver<EngineEvent>>,
}

/// Test-side handle onto the same shared cell as the engine.
pub struct FakeHandle {
    shared: Rc<RefCell<FakeShared>>,
    events_tx: Sender<EngineEvent>,
}

pub fn fake_engine() -> (FakeEngine, FakeHandle) {
    let shared = Rc::new(RefCell::new(FakeShared::default()));
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    (
        FakeEngine {
            shared: shared.clone(),
            events_rx: Some(events_rx),
        },
        FakeHandle { shared, events_tx },
    )
}

impl FakeHandle {
    pub fn emit(&self, event: EngineEvent) {
        self.events_tx.send(event).expect("event channel closed");
    }

    pub fn status(&self) -> RefMut<'_, FakeStatus> {
        RefMut::map(self.shared.borrow_mut(), |shared| &mut shared.status)
    }

    pub fn commands(&self) -> Vec<FakeCommand> {
        self.shared.borrow().commands.clone()
    }

    /// Drain the recorded commands, leaving the log empty.
    pub fn take_commands(&self) -> Vec<FakeCommand> {
        std::mem::take(&mut self.shared.borrow_mut().commands)
    }
}

impl FakeEngine {
    fn record(&mut self, command: FakeCommand) {
        self.shared.borrow_mut().commands.push(command);
    }
}

impl MediaEngine for FakeEngine {
    fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.events_rx.take().expect("subscribed twice")
    }

    fn unsubscribe(&mut self) {
        self.record(FakeCommand::Unsubscribe);
    }

    fn shutdown(&mut self) {
        self.record(FakeCommand::Shutdown);
    }

    fn open(&mut self, source: &str) {
        self.record(FakeCommand::Open(source.to_string()));
    }

    fn play(&mut self) {
        self.record(FakeCommand::Play);
    }

    fn pause(&mut self) {
        self.record(FakeCommand::Pause);
    }

    fn stop(&mut self) {
        self.record(FakeCommand::Stop);
    }

    fn set_time(&mut self, time_ms: i64) {
        self.record(FakeCommand::SetTime(time_ms));
    }

    fn set_rate(&mut self, rate: f32) {
        self.record(FakeCommand::SetRate(rate));
    }

    fn set_volume(&mut self, volume: i32) {
        self.record(FakeCommand::SetVolume(volume));
    }

    fn set_mute(&mut self, mute: bool) {
        self.record(FakeCommand::SetMute(mute));
    }

    fn set_audio_track(&mut self, id: i64) {
        self.record(FakeCommand::SetAudioTrack(id));
    }

    fn set_subtitle_track(&mut self, id: i64) {
        self.record(FakeCommand::SetSubtitleTrack(id));
    }

    fn next_frame(&mut self) {
        self.record(FakeCommand::NextFrame);
    }

    fn state(&self) -> PlayerState {
        self.shared.borrow().status.state
    }

    fn is_playing(&self) -> bool {
        self.shared.borrow().status.playing
    }

    fn will_play(&self) -> bool {
        self.shared.borrow().status.will_play
    }

    fn can_pause(&self) -> bool {
        self.shared.borrow().status.can_pause
    }

    fn time(&self) -> i64 {
        self.shared.borrow().status.time_ms
    }

    fn length(&self) -> i64 {
        self.shared.borrow().status.length_ms
    }

    fn is_seekable(&self) -> bool {
        self.shared.borrow().status.seekable
    }

    fn volume(&self) -> i32 {
        self.shared.borrow().status.volume
    }

    fn is_muted(&self) -> bool {
        self.shared.borrow().status.muted
    }

    fn fps(&self) -> f64 {
        self.shared.borrow().status.fps
    }

    fn audio_tracks(&self) -> Vec<TrackInfo> {
        self.shared.borrow().status.audio_tracks.clone()
    }

    fn subtitle_tracks(&self) -> Vec<TrackInfo> {
        self.shared.borrow().status.subtitle_tracks.clone()
    }

    fn chapters(&self) -> Vec<ChapterInfo> {
        self.shared.borrow().status.chapters.clone()
    }
}
