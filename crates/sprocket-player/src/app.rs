//! Interactive shell around a playback session. A reader thread feeds
//! stdin lines into a channel; the main loop multiplexes those with the
//! session's change stream and a pump tick.

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, select, tick};

use crate::engine::MediaEngine;
use crate::session::{PlaybackSession, SessionEvent};
use crate::settings::PlayerSettings;
use crate::transport::LogTransport;

const PUMP_INTERVAL: Duration = Duration::from_millis(50);
const CONTROLS_HIDE_DELAY: Duration = Duration::from_secs(3);

pub struct App {
    session: PlaybackSession,
    session_events: Receiver<SessionEvent>,
    lines: Receiver<String>,
    settings: PlayerSettings,
}

impl App {
    pub fn new(engine: Box<dyn MediaEngine>, settings: PlayerSettings) -> Result<Self> {
        let mut session = PlaybackSession::new(engine, Box::new(LogTransport::new()));
        let session_events = session.subscribe();

        // Apply persisted preferences.
        session.set_volume(settings.volume);
        session.set_loop(settings.loop_playback);
        session.set_rate(settings.rate);

        let lines = spawn_input_reader()?;
        Ok(Self {
            session,
            session_events,
            lines,
            settings,
        })
    }

    pub fn open(&mut self, source: &str) {
        self.session.open(source);
    }

    pub fn run(&mut self) -> Result<()> {
        println!("sprocket: type `help` for commands");
        let ticker = tick(PUMP_INTERVAL);
        loop {
            select! {
                recv(self.lines) -> line => {
                    match line {
                        Ok(line) => {
                            if !dispatch(&mut self.session, &line) {
                                break;
                            }
                        }
                        Err(_) => break, // stdin closed
                    }
                }
                recv(self.session_events) -> event => {
                    if let Ok(event) = event {
                        print_event(&event);
                    }
                }
                recv(ticker) -> _ => {
                    self.session.pump();
                }
            }
        }

        self.settings.volume = self.session.volume();
        self.settings.loop_playback = self.session.loop_enabled();
        self.settings.rate = self.session.rate();
        self.settings.save();
        self.session.close();
        Ok(())
    }
}

fn spawn_input_reader() -> Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::bounded(64);
    std::thread::Builder::new()
        .name("sprocket-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            log::debug!("stdin: reader exiting");
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

/// Apply one command line to the session. Returns false to quit.
fn dispatch(session: &mut PlaybackSession, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return true;
    };
    match command {
        "open" => {
            let source = parts.collect::<Vec<_>>().join(" ");
            if source.is_empty() {
                println!("usage: open <url-or-path>");
            } else {
                session.open(&source);
            }
        }
        "play" | "pause" | "p" => session.play_pause(),
        "replay" => session.replay(),
        "seek" => match parts.next().map(str::parse::<i64>) {
            Some(Ok(amount_ms)) => session.seek(amount_ms),
            _ => println!("usage: seek <milliseconds, signed>"),
        },
        "time" => match parts.next().map(str::parse::<i64>) {
            Some(Ok(value)) => {
                let previous = session.time();
                session.set_time(value, previous);
            }
            _ => println!("usage: time <milliseconds>"),
        },
        "rate" => match parts.next().map(str::parse::<f32>) {
            Some(Ok(rate)) => session.set_rate(rate),
            _ => println!("usage: rate <multiplier>"),
        },
        "vol" => match parts.next().map(str::parse::<i32>) {
            Some(Ok(volume)) => session.set_volume(volume),
            _ => println!("usage: vol <0-100>"),
        },
        "mute" => {
            let muted = session.is_muted();
            session.set_muted(!muted);
        }
        "loop" => {
            let looped = session.loop_enabled();
            session.set_loop(!looped);
        }
        "audio" => match parts.next().map(str::parse::<i32>) {
            Some(Ok(index)) => session.set_audio_track(index),
            _ => println!("usage: audio <index, -1 to disable>"),
        },
        "sub" => match parts.next().map(str::parse::<i32>) {
            Some(Ok(index)) => session.set_subtitle_track(index),
            _ => println!("usage: sub <index, -1 to disable>"),
        },
        "frame" => {
            let previous = parts.next() == Some("back");
            if !session.jump_frame(previous) {
                println!("frame stepping needs paused, seekable media");
            }
        }
        "controls" => session.toggle_controls(),
        "poke" => session.poke_controls(CONTROLS_HIDE_DELAY),
        "status" => print_status(session),
        "tracks" => print_tracks(session),
        "chapters" => print_chapters(session),
        "help" => print_help(),
        "quit" | "exit" | "q" => return false,
        other => println!("unknown command: {other} (try `help`)"),
    }
    true
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => println!("-> state: {}", state.label()),
        SessionEvent::LengthChanged(length_ms) => {
            println!("-> length: {}", format_clock(*length_ms));
        }
        SessionEvent::SeekableChanged(seekable) => println!("-> seekable: {seekable}"),
        SessionEvent::VolumeChanged(volume) => println!("-> volume: {volume}"),
        SessionEvent::MuteChanged(muted) => println!("-> muted: {muted}"),
        SessionEvent::RateChanged(rate) => println!("-> rate: {rate:.2}"),
        SessionEvent::BufferingChanged(progress) => println!("-> buffering: {progress:.0}%"),
        SessionEvent::TitleChanged(title) => println!("-> title: {title}"),
        SessionEvent::AudioTracksChanged(tracks) => {
            println!("-> {} audio track(s)", tracks.len());
        }
        SessionEvent::SubtitleTracksChanged(tracks) => {
            println!("-> {} subtitle track(s)", tracks.len());
        }
        SessionEvent::AudioTrackChanged(index) => println!("-> audio track: {index}"),
        SessionEvent::SubtitleTrackChanged(index) => println!("-> subtitle track: {index}"),
        SessionEvent::ChaptersChanged(chapters) => println!("-> {} chapter(s)", chapters.len()),
        SessionEvent::LoopChanged(looped) => println!("-> loop: {looped}"),
        SessionEvent::ControlsVisibleChanged(visible) => println!("-> controls: {visible}"),
        SessionEvent::ErrorReported(detail) => println!("!! {detail}"),
        // Position moves every tick; poll it with `status` instead.
        SessionEvent::TimeChanged(_) | SessionEvent::PlayingChanged(_) => {}
    }
}

fn print_status(session: &PlaybackSession) {
    println!(
        "{} | {} / {} | vol {}{} | rate {:.2}{}{}",
        session.state().label(),
        format_clock(session.time()),
        format_clock(session.length()),
        session.volume(),
        if session.is_muted() { " (muted)" } else { "" },
        session.rate(),
        if session.loop_enabled() { " | loop" } else { "" },
        if session.is_seekable() { "" } else { " | not seekable" },
    );
}

fn print_tracks(session: &PlaybackSession) {
    println!("audio tracks (selected {}):", session.audio_track());
    for (i, track) in session.audio_tracks().iter().enumerate() {
        println!("  {i}: {}", track.name);
    }
    println!("subtitle tracks (selected {}):", session.subtitle_track());
    for (i, track) in session.subtitle_tracks().iter().enumerate() {
        println!("  {i}: {}", track.name);
    }
}

fn print_chapters(session: &PlaybackSession) {
    for chapter in session.chapters() {
        println!("  {} {}", format_clock(chapter.start_ms), chapter.title);
    }
}

fn print_help() {
    println!("  open <url-or-path>  load media");
    println!("  play | p            toggle play/pause (restarts ended media)");
    println!("  replay              start over from the top");
    println!("  seek <ms>           relative seek, signed");
    println!("  time <ms>           absolute seek");
    println!("  rate <multiplier>   playback speed");
    println!("  vol <0-100> | mute  audio level");
    println!("  audio | sub <idx>   select a track, -1 disables");
    println!("  frame [back]        step one frame while paused");
    println!("  loop                toggle looping");
    println!("  controls | poke     hide/show controls, activity ping");
    println!("  status | tracks | chapters");
    println!("  quit");
}

fn format_clock(ms: i64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
