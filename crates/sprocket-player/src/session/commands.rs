//! User-facing command surface of the session. Every method here is a
//! silent no-op when its preconditions do not hold.

use std::time::Duration;

use crate::engine::PlayerState;

use super::PlaybackSession;

/// Seeks issued mid-drag are collapsed and sent after this pause.
const SEEK_DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

impl PlaybackSession {
    /// Load a media source: a URL, or a path to an existing file.
    /// Anything else is ignored.
    pub fn open(&mut self, source: &str) {
        let Some(resolved) = resolve_source(source) else {
            log::warn!("open: not a playable source: {source}");
            return;
        };
        log::info!("open: {resolved}");
        let title = title_from_source(&resolved);
        self.publish_title(title);
        self.transport.set_title(&self.title);
        self.engine.open(&resolved);
    }

    /// Pause when playing, start when startable, restart when ended.
    pub fn play_pause(&mut self) {
        if self.engine.is_playing() && self.engine.can_pause() {
            self.engine.pause();
        }
        if !self.engine.is_playing() && self.engine.will_play() {
            self.engine.play();
        }
        if self.engine.state() == PlayerState::Ended {
            self.replay();
        }
    }

    /// Start the current media over from the top.
    pub fn replay(&mut self) {
        self.engine.stop();
        self.engine.play();
    }

    /// Move the playback position by a signed amount of milliseconds.
    pub fn seek(&mut self, amount_ms: i64) {
        if self.engine.is_seekable() {
            let target = self.engine.time().saturating_add(amount_ms);
            self.apply_time(target);
        }
    }

    /// Slider-style absolute seek. `previous_value` is the slider value
    /// before the change; when it matches the engine position (or
    /// nothing is playing) the change came from the user and applies
    /// immediately, otherwise it is debounced so a drag collapses into
    /// one seek.
    pub fn set_time(&mut self, new_value: i64, previous_value: i64) {
        if !self.engine.is_seekable() {
            return;
        }
        let engine_time = self.engine.time();
        let engine_length = self.engine.length();
        if (previous_value == engine_time || !self.engine.is_playing())
            && new_value != engine_length
        {
            if self.engine.state() == PlayerState::Ended {
                self.replay();
            }
            self.apply_time(new_value);
            return;
        }
        if !self.follow_engine_time && new_value != engine_length {
            self.pending_seek.schedule(new_value, SEEK_DEBOUNCE_DELAY);
        }
    }

    pub fn set_rate(&mut self, rate: f32) {
        if self.publish_rate(rate) {
            self.engine.set_rate(rate);
        }
    }

    pub fn set_volume(&mut self, volume: i32) {
        self.apply_volume(volume);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.apply_mute(muted);
    }

    /// Select an audio track by list index, `-1` to disable audio.
    /// Out-of-range indices are ignored.
    pub fn set_audio_track(&mut self, index: i32) {
        if index < -1 || index >= self.audio_tracks.len() as i32 {
            return;
        }
        if !self.publish_audio_track(index) {
            return;
        }
        if index >= 0 {
            let id = self.audio_tracks[index as usize].id;
            self.engine.set_audio_track(id);
        } else {
            self.engine.set_audio_track(-1);
        }
    }

    /// Select a subtitle track by list index, `-1` to disable subtitles.
    pub fn set_subtitle_track(&mut self, index: i32) {
        if index < -1 || index >= self.subtitle_tracks.len() as i32 {
            return;
        }
        if !self.publish_subtitle_track(index) {
            return;
        }
        if index >= 0 {
            let id = self.subtitle_tracks[index as usize].id;
            self.engine.set_subtitle_track(id);
        } else {
            self.engine.set_subtitle_track(-1);
        }
    }

    /// Step one frame while paused. Returns whether the jump happened.
    pub fn jump_frame(&mut self, previous: bool) -> bool {
        if self.engine.state() == PlayerState::Paused && self.engine.is_seekable() {
            if previous {
                let target = self.engine.time() - self.frame_duration_ms();
                self.apply_time(target);
            } else {
                self.engine.next_frame();
            }
            return true;
        }
        false
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.publish_loop(enabled);
    }

    /// While interacting (scrubbing), engine time updates and the
    /// auto-hide timer are suspended.
    pub fn set_interacting(&mut self, interacting: bool) {
        self.follow_engine_time = !interacting;
    }

    /// Explicitly show hidden controls, or hide them while playing.
    pub fn toggle_controls(&mut self) {
        if !self.controls_visible {
            self.publish_controls_visible(true);
            self.hidden_by_user = false;
        } else if self.engine.is_playing() {
            self.publish_controls_visible(false);
            self.hidden_by_user = true;
        }
    }

    /// Activity ping: reveal the controls and schedule them to hide
    /// again after `hide_delay` if playback is still running. Does not
    /// override an explicit hide.
    pub fn poke_controls(&mut self, hide_delay: Duration) {
        if self.hidden_by_user {
            return;
        }
        if !self.controls_visible {
            self.publish_controls_visible(true);
        }
        if !self.follow_engine_time {
            return;
        }
        self.pending_hide.schedule((), hide_delay);
    }

    /// Forget an explicit hide so activity pings work again.
    pub fn clear_manual_hide(&mut self) {
        self.hidden_by_user = false;
    }
}

fn resolve_source(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        return Some(trimmed.to_string());
    }
    std::path::Path::new(trimmed)
        .exists()
        .then(|| trimmed.to_string())
}

fn title_from_source(source: &str) -> String {
    source
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(source)
        .to_string()
}
