//! mpv backend: drives a spawned `mpv` process over its JSON IPC socket.
//!
//! A reader thread owns the socket's read half and applies every incoming
//! IPC message to a shared property cache, emitting [`EngineEvent`]s for
//! the session to drain. Commands are single JSON lines on the write half,
//! fire-and-forget.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use serde_json::{Value, json};
use thiserror::Error;

use super::{ChapterInfo, EngineEvent, MediaEngine, PlayerState, TrackInfo};

/// Properties observed on startup. mpv echoes the current value of each
/// right after registration, which seeds the cache.
const OBSERVED_PROPERTIES: &[&str] = &[
    "pause",
    "paused-for-cache",
    "cache-buffering-state",
    "time-pos",
    "duration",
    "seekable",
    "volume",
    "mute",
    "container-fps",
    "track-list",
    "chapter-list",
];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum MpvError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },
    #[error("mpv IPC socket never appeared at {path}")]
    Connect { path: PathBuf },
    #[error("mpv IPC I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Latest engine-reported values, written by the reader thread.
#[derive(Debug)]
struct MpvStatus {
    state: PlayerState,
    loaded: bool,
    pause: bool,
    eof: bool,
    buffering: bool,
    cache_pct: f32,
    time_ms: i64,
    length_ms: i64,
    seekable: bool,
    volume: i32,
    muted: bool,
    fps: f64,
    audio_tracks: Vec<TrackInfo>,
    subtitle_tracks: Vec<TrackInfo>,
    chapters: Vec<ChapterInfo>,
}

impl Default for MpvStatus {
    fn default() -> Self {
        Self {
            state: PlayerState::Idle,
            loaded: false,
            pause: false,
            eof: false,
            buffering: false,
            cache_pct: 0.0,
            time_ms: 0,
            length_ms: 0,
            seekable: false,
            volume: 100,
            muted: false,
            fps: 0.0,
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
            chapters: Vec::new(),
        }
    }
}

pub struct MpvEngine {
    child: Child,
    writer: UnixStream,
    socket_path: PathBuf,
    status: Arc<Mutex<MpvStatus>>,
    events_on: Arc<AtomicBool>,
    events_rx: Option<Receiver<EngineEvent>>,
    reader: Option<JoinHandle<()>>,
    current_source: Option<String>,
    request_id: u64,
    closed: bool,
}

impl MpvEngine {
    /// Spawn `binary` in idle mode and connect to its IPC socket.
    pub fn spawn(binary: &str) -> Result<Self, MpvError> {
        let socket_path =
            std::env::temp_dir().join(format!("sprocket-mpv-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);
        Self::spawn_at(binary, socket_path)
    }

    fn spawn_at(binary: &str, socket_path: PathBuf) -> Result<Self, MpvError> {
        let child = Command::new(binary)
            .arg("--idle=yes")
            .arg("--no-terminal")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| MpvError::Spawn {
                binary: binary.into(),
                source,
            })?;

        let stream = connect_with_retry(&socket_path, CONNECT_TIMEOUT)?;
        let writer = stream.try_clone()?;

        let status = Arc::new(Mutex::new(MpvStatus::default()));
        let events_on = Arc::new(AtomicBool::new(true));
        let (tx, rx) = crossbeam_channel::unbounded();

        let reader = {
            let status = status.clone();
            let events_on = events_on.clone();
            std::thread::Builder::new()
                .name("sprocket-mpv-rx".into())
                .spawn(move || reader_loop(stream, &status, &tx, &events_on))?
        };

        log::info!("mpv: spawned {binary} (ipc {})", socket_path.display());

        let mut engine = Self {
            child,
            writer,
            socket_path,
            status,
            events_on,
            events_rx: Some(rx),
            reader: Some(reader),
            current_source: None,
            request_id: 0,
            closed: false,
        };
        for (i, name) in OBSERVED_PROPERTIES.iter().enumerate() {
            engine.send_command(json!(["observe_property", i as u64 + 1, name]));
        }
        Ok(engine)
    }

    fn status(&self) -> MutexGuard<'_, MpvStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_command(&mut self, args: Value) {
        self.request_id += 1;
        let msg = json!({ "command": args, "request_id": self.request_id });
        let mut line = msg.to_string();
        line.push('\n');
        if let Err(e) = self.writer.write_all(line.as_bytes()) {
            log::warn!("mpv: failed to send command: {e}");
        }
    }
}

impl MediaEngine for MpvEngine {
    fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.events_on.store(true, Ordering::Relaxed);
        self.events_rx.take().unwrap_or_else(|| {
            log::warn!("mpv: event stream already taken");
            let (tx, rx) = crossbeam_channel::bounded(0);
            drop(tx);
            rx
        })
    }

    fn unsubscribe(&mut self) {
        self.events_on.store(false, Ordering::Relaxed);
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.send_command(json!(["quit"]));

        let deadline = Instant::now() + QUIT_TIMEOUT;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                _ => {
                    log::warn!("mpv: did not exit in time, killing");
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
            }
        }

        let _ = self.writer.shutdown(std::net::Shutdown::Both);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        let _ = std::fs::remove_file(&self.socket_path);
        log::info!("mpv: engine released");
    }

    fn open(&mut self, source: &str) {
        self.current_source = Some(source.to_string());
        self.send_command(json!(["loadfile", source, "replace"]));
        // A pause left over from the previous file would freeze the new
        // one on its first frame.
        self.send_command(json!(["set_property", "pause", false]));
    }

    fn play(&mut self) {
        let loaded = self.status().loaded;
        if loaded {
            self.send_command(json!(["set_property", "pause", false]));
        } else if let Some(source) = self.current_source.clone() {
            // Media ran out or was stopped; start it over from the top.
            self.send_command(json!(["loadfile", source, "replace"]));
            self.send_command(json!(["set_property", "pause", false]));
        }
    }

    fn pause(&mut self) {
        self.send_command(json!(["set_property", "pause", true]));
    }

    fn stop(&mut self) {
        // mpv confirms the unload with a later end-file; mark it now so
        // a play issued in the same breath reloads instead of unpausing.
        self.status().loaded = false;
        self.send_command(json!(["stop"]));
    }

    fn set_time(&mut self, time_ms: i64) {
        self.send_command(json!(["set_property", "time-pos", time_ms as f64 / 1000.0]));
    }

    fn set_rate(&mut self, rate: f32) {
        self.send_command(json!(["set_property", "speed", rate]));
    }

    fn set_volume(&mut self, volume: i32) {
        self.send_command(json!(["set_property", "volume", volume]));
    }

    fn set_mute(&mut self, mute: bool) {
        self.send_command(json!(["set_property", "mute", mute]));
    }

    fn set_audio_track(&mut self, id: i64) {
        if id < 0 {
            self.send_command(json!(["set_property", "aid", "no"]));
        } else {
            self.send_command(json!(["set_property", "aid", id]));
        }
    }

    fn set_subtitle_track(&mut self, id: i64) {
        if id < 0 {
            self.send_command(json!(["set_property", "sid", "no"]));
        } else {
            self.send_command(json!(["set_property", "sid", id]));
        }
    }

    fn next_frame(&mut self) {
        self.send_command(json!(["frame-step"]));
    }

    fn state(&self) -> PlayerState {
        self.status().state
    }

    fn is_playing(&self) -> bool {
        let st = self.status();
        st.loaded && !st.pause
    }

    fn will_play(&self) -> bool {
        self.status().loaded || self.current_source.is_some()
    }

    fn can_pause(&self) -> bool {
        self.status().loaded
    }

    fn time(&self) -> i64 {
        self.status().time_ms
    }

    fn length(&self) -> i64 {
        self.status().length_ms
    }

    fn is_seekable(&self) -> bool {
        self.status().seekable
    }

    fn volume(&self) -> i32 {
        self.status().volume
    }

    fn is_muted(&self) -> bool {
        self.status().muted
    }

    fn fps(&self) -> f64 {
        self.status().fps
    }

    fn audio_tracks(&self) -> Vec<TrackInfo> {
        self.status().audio_tracks.clone()
    }

    fn subtitle_tracks(&self) -> Vec<TrackInfo> {
        self.status().subtitle_tracks.clone()
    }

    fn chapters(&self) -> Vec<ChapterInfo> {
        self.status().chapters.clone()
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn connect_with_retry(path: &Path, timeout: Duration) -> Result<UnixStream, MpvError> {
    let deadline = Instant::now() + timeout;
    loop {
        match UnixStream::connect(path) {
            Ok(stream) => return Ok(stream),
            Err(_) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(_) => {
                return Err(MpvError::Connect {
                    path: path.to_path_buf(),
                });
            }
        }
    }
}

fn reader_loop(
    stream: UnixStream,
    status: &Mutex<MpvStatus>,
    tx: &Sender<EngineEvent>,
    events_on: &AtomicBool,
) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break, // socket closed
            Ok(_) => {
                let Ok(msg) = serde_json::from_str::<Value>(&line) else {
                    log::debug!("mpv: unparseable IPC line: {}", line.trim_end());
                    continue;
                };
                for event in apply_message(&msg, status) {
                    if events_on.load(Ordering::Relaxed) {
                        let _ = tx.send(event);
                    }
                }
            }
            Err(e) => {
                log::error!("mpv: IPC read error: {e}");
                break;
            }
        }
    }
    log::debug!("mpv: reader thread exiting");
}

/// Apply one IPC message to the cache, returning the notifications it
/// produces. Command replies produce none.
fn apply_message(msg: &Value, status: &Mutex<MpvStatus>) -> Vec<EngineEvent> {
    let Some(event) = msg.get("event").and_then(Value::as_str) else {
        return Vec::new();
    };
    let mut st = status.lock().unwrap_or_else(PoisonError::into_inner);
    match event {
        "start-file" => {
            st.loaded = false;
            st.eof = false;
            st.state = PlayerState::Opening;
            vec![EngineEvent::Opening]
        }
        "file-loaded" => {
            st.loaded = true;
            let state = if st.pause {
                PlayerState::Paused
            } else {
                PlayerState::Playing
            };
            st.state = state;
            vec![state_event(state)]
        }
        "end-file" => {
            st.loaded = false;
            match msg.get("reason").and_then(Value::as_str).unwrap_or("") {
                "eof" => {
                    st.eof = true;
                    st.state = PlayerState::Ended;
                    vec![EngineEvent::EndReached]
                }
                "error" => {
                    st.state = PlayerState::Error;
                    let detail = msg
                        .get("file_error")
                        .and_then(Value::as_str)
                        .unwrap_or("playback failed");
                    vec![EngineEvent::Error(detail.to_string())]
                }
                "stop" => {
                    st.state = PlayerState::Stopped;
                    vec![EngineEvent::Stopped]
                }
                _ => Vec::new(), // quit, redirect
            }
        }
        // mpv idles after every unload; only a stop that did not come
        // through end-file is worth reporting. An error is settled state
        // too and must not collapse into Stopped.
        "idle" => {
            if st.eof
                || matches!(
                    st.state,
                    PlayerState::Idle | PlayerState::Stopped | PlayerState::Error
                )
            {
                Vec::new()
            } else {
                st.state = PlayerState::Stopped;
                vec![EngineEvent::Stopped]
            }
        }
        "property-change" => {
            let name = msg.get("name").and_then(Value::as_str).unwrap_or("");
            apply_property(&mut st, name, msg.get("data"))
        }
        _ => Vec::new(),
    }
}

fn apply_property(st: &mut MpvStatus, name: &str, data: Option<&Value>) -> Vec<EngineEvent> {
    match name {
        "pause" => {
            let Some(pause) = data.and_then(Value::as_bool) else {
                return Vec::new();
            };
            st.pause = pause;
            if !st.loaded || st.buffering {
                return Vec::new();
            }
            let state = if pause {
                PlayerState::Paused
            } else {
                PlayerState::Playing
            };
            if st.state == state {
                return Vec::new();
            }
            st.state = state;
            vec![state_event(state)]
        }
        "paused-for-cache" => {
            let Some(stalled) = data.and_then(Value::as_bool) else {
                return Vec::new();
            };
            st.buffering = stalled;
            if !st.loaded {
                return Vec::new();
            }
            if stalled {
                st.state = PlayerState::Buffering;
                vec![EngineEvent::Buffering(st.cache_pct)]
            } else {
                let state = if st.pause {
                    PlayerState::Paused
                } else {
                    PlayerState::Playing
                };
                st.state = state;
                vec![state_event(state)]
            }
        }
        "cache-buffering-state" => {
            let Some(pct) = data.and_then(Value::as_f64) else {
                return Vec::new();
            };
            st.cache_pct = pct as f32;
            if st.buffering {
                vec![EngineEvent::Buffering(st.cache_pct)]
            } else {
                Vec::new()
            }
        }
        "time-pos" => {
            let Some(secs) = data.and_then(Value::as_f64) else {
                return Vec::new();
            };
            st.time_ms = (secs * 1000.0) as i64;
            vec![EngineEvent::TimeChanged(st.time_ms)]
        }
        "duration" => {
            let Some(secs) = data.and_then(Value::as_f64) else {
                return Vec::new();
            };
            st.length_ms = (secs * 1000.0) as i64;
            vec![EngineEvent::LengthChanged(st.length_ms)]
        }
        "seekable" => {
            let Some(seekable) = data.and_then(Value::as_bool) else {
                return Vec::new();
            };
            st.seekable = seekable;
            vec![EngineEvent::SeekableChanged(seekable)]
        }
        "volume" => {
            let Some(volume) = data.and_then(Value::as_f64) else {
                return Vec::new();
            };
            st.volume = volume.round() as i32;
            vec![EngineEvent::VolumeChanged(st.volume)]
        }
        "mute" => {
            let Some(muted) = data.and_then(Value::as_bool) else {
                return Vec::new();
            };
            st.muted = muted;
            vec![EngineEvent::Muted(muted)]
        }
        "container-fps" => {
            st.fps = data.and_then(Value::as_f64).unwrap_or(0.0);
            Vec::new()
        }
        "track-list" => {
            let Some(tracks) = data.and_then(Value::as_array) else {
                return Vec::new();
            };
            let (audio, subs) = parse_tracks(tracks);
            st.audio_tracks = audio;
            st.subtitle_tracks = subs;
            vec![EngineEvent::TracksChanged]
        }
        "chapter-list" => {
            let Some(chapters) = data.and_then(Value::as_array) else {
                return Vec::new();
            };
            st.chapters = parse_chapters(chapters);
            vec![EngineEvent::ChaptersChanged]
        }
        _ => Vec::new(),
    }
}

fn state_event(state: PlayerState) -> EngineEvent {
    if state == PlayerState::Paused {
        EngineEvent::Paused
    } else {
        EngineEvent::Playing
    }
}

fn parse_tracks(tracks: &[Value]) -> (Vec<TrackInfo>, Vec<TrackInfo>) {
    let mut audio = Vec::new();
    let mut subs = Vec::new();
    for track in tracks {
        let Some(id) = track.get("id").and_then(Value::as_i64) else {
            continue;
        };
        let title = track.get("title").and_then(Value::as_str);
        let lang = track.get("lang").and_then(Value::as_str);
        let name = match (title, lang) {
            (Some(t), Some(l)) => format!("{t} [{l}]"),
            (Some(t), None) => t.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => format!("Track {id}"),
        };
        let info = TrackInfo { id, name };
        match track.get("type").and_then(Value::as_str) {
            Some("audio") => audio.push(info),
            Some("sub") => subs.push(info),
            _ => {}
        }
    }
    (audio, subs)
}

fn parse_chapters(chapters: &[Value]) -> Vec<ChapterInfo> {
    chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| {
            let title = chapter
                .get("title")
                .and_then(Value::as_str)
                .map_or_else(|| format!("Chapter {}", i + 1), ToString::to_string);
            let start_ms = chapter
                .get("time")
                .and_then(Value::as_f64)
                .map_or(0, |secs| (secs * 1000.0) as i64);
            ChapterInfo { title, start_ms }
        })
        .collect()
}
