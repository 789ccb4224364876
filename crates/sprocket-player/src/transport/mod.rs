//! Host-facing playback surface. The session pushes its title and
//! status here so whatever embeds the player can mirror them.

use crate::engine::PlayerState;

pub trait TransportControls {
    fn set_status(&mut self, state: PlayerState);
    fn set_title(&mut self, title: &str);
    fn closed(&mut self);
}

/// Transport that drops everything.
pub struct NullTransport;

impl TransportControls for NullTransport {
    fn set_status(&mut self, _state: PlayerState) {}
    fn set_title(&mut self, _title: &str) {}
    fn closed(&mut self) {}
}

/// Logs transitions. Stands in for OS media controls in the CLI shell.
#[derive(Default)]
pub struct LogTransport {
    title: String,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportControls for LogTransport {
    fn set_status(&mut self, state: PlayerState) {
        if self.title.is_empty() {
            log::info!("transport: {}", state.label());
        } else {
            log::info!("transport: {} ({})", state.label(), self.title);
        }
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn closed(&mut self) {
        log::info!("transport: closed");
    }
}
