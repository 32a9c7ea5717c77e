//! Fan-out of game console lines to websocket clients.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// A new client's view of the console: recent history, then live lines.
#[derive(Debug)]
pub struct Subscription {
    pub backlog: Vec<String>,
    pub lines: Receiver<String>,
}

#[derive(Debug)]
struct HubState {
    subscribers: Vec<Sender<String>>,
    backlog: VecDeque<String>,
    backlog_limit: usize,
}

/// Broadcasts each published line to every live subscriber.
///
/// Subscribers whose receiver has been dropped are pruned on the next
/// publish.
#[derive(Debug)]
pub struct ConsoleHub {
    state: Mutex<HubState>,
}

impl ConsoleHub {
    #[must_use]
    pub fn new(backlog_limit: usize) -> Self {
        Self {
            state: Mutex::new(HubState {
                subscribers: Vec::new(),
                backlog: VecDeque::new(),
                backlog_limit,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber. The backlog snapshot and the registration
    /// happen under one lock, so no line is both replayed and delivered.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut state = self.lock();
        state.subscribers.push(tx);
        Subscription {
            backlog: state.backlog.iter().cloned().collect(),
            lines: rx,
        }
    }

    /// Deliver `line` to all subscribers. Returns how many received it.
    pub fn publish(&self, line: &str) -> usize {
        let mut state = self.lock();
        if state.backlog_limit > 0 {
            if state.backlog.len() == state.backlog_limit {
                state.backlog.pop_front();
            }
            state.backlog.push_back(line.to_string());
        }
        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|subscriber| subscriber.send(line.to_string()).is_ok());
        let delivered = state.subscribers.len();
        if delivered < before {
            debug!(pruned = before - delivered, "dropped closed console subscribers");
        }
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    #[must_use]
    pub fn backlog(&self) -> Vec<String> {
        self.lock().backlog.iter().cloned().collect()
    }
}
