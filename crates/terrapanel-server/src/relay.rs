//! Routes each game console line to the log, presence tracking, and the hub.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use tracing::info;

use crate::error::{PanelError, Result};
use crate::hub::ConsoleHub;
use crate::notify::{Notifier, announce};
use crate::presence::PresenceTracker;

/// Consumers of the game's console output.
#[derive(Clone)]
pub struct Relay {
    pub hub: Arc<ConsoleHub>,
    pub presence: Arc<Mutex<PresenceTracker>>,
    pub notifier: Arc<dyn Notifier>,
}

impl Relay {
    /// Handle one line. Console clients get it before any announcement
    /// is attempted.
    pub fn dispatch(&self, line: &str) {
        info!(target: "game", "{line}");
        self.hub.publish(line);
        let event = self
            .presence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(line, Instant::now());
        if let Some(event) = event {
            announce(self.notifier.as_ref(), &event.announcement());
        }
    }

    /// Dispatch lines until every sender is gone. Returns the line count.
    pub fn run(&self, lines: Receiver<String>) -> u64 {
        let mut count = 0_u64;
        for line in lines {
            self.dispatch(&line);
            count = count.saturating_add(1);
        }
        count
    }

    pub fn spawn(self, lines: Receiver<String>) -> Result<thread::JoinHandle<u64>> {
        thread::Builder::new()
            .name("terrapanel-relay".to_string())
            .spawn(move || self.run(lines))
            .map_err(|error| PanelError::pty(format!("failed to spawn relay thread: {error}")))
    }
}
