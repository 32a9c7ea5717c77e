//! Who is playing, inferred from the game console.

use std::collections::HashMap;
use std::time::{Duration, Instant};

const CONNECTING_MARKER: &str = " is connecting";
const JOINED_MARKER: &str = " has joined.";
const LEFT_MARKER: &str = " has left.";

/// IP recorded before any client has connected.
pub const UNKNOWN_IP: &str = "NA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub joined_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Joined {
        name: String,
    },
    /// `played` is `None` when the join was never seen.
    Left {
        name: String,
        played: Option<Duration>,
    },
}

impl PresenceEvent {
    /// Channel message for this event.
    #[must_use]
    pub fn announcement(&self) -> String {
        match self {
            Self::Joined { name } => format!("{name} has joined!"),
            Self::Left {
                name,
                played: Some(played),
            } => format!(
                "{name} has left. They played for {}",
                humanized_duration(*played)
            ),
            Self::Left { name, played: None } => format!("{name} has left."),
        }
    }
}

/// Maps client IPs to the players that joined from them.
///
/// Terraria prints `<ip>:<port> is connecting...` before
/// `<name> has joined.`, so a join is attributed to the most recent
/// connecting IP.
#[derive(Debug)]
pub struct PresenceTracker {
    last_ip: String,
    players: HashMap<String, Player>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_ip: UNKNOWN_IP.to_string(),
            players: HashMap::new(),
        }
    }

    /// Update from one console line.
    pub fn observe(&mut self, line: &str, now: Instant) -> Option<PresenceEvent> {
        if let Some(index) = line.find(CONNECTING_MARKER) {
            let address = &line[..index];
            let ip = address.split(':').next().unwrap_or(address);
            self.last_ip = ip.trim().to_string();
            return None;
        }
        if let Some(index) = line.find(JOINED_MARKER) {
            let name = line[..index].to_string();
            self.players.insert(
                self.last_ip.clone(),
                Player {
                    name: name.clone(),
                    joined_at: now,
                },
            );
            return Some(PresenceEvent::Joined { name });
        }
        if let Some(index) = line.find(LEFT_MARKER) {
            let name = line[..index].to_string();
            let mut joined_at = None;
            self.players.retain(|_, player| {
                if player.name == name {
                    joined_at = Some(player.joined_at);
                    false
                } else {
                    true
                }
            });
            let played = joined_at.map(|joined| now.saturating_duration_since(joined));
            return Some(PresenceEvent::Left { name, played });
        }
        None
    }

    /// Player who joined from `ip`, if any.
    #[must_use]
    pub fn player_for_ip(&self, ip: &str) -> Option<&Player> {
        self.players.get(ip)
    }

    #[must_use]
    pub fn last_ip(&self) -> &str {
        &self.last_ip
    }

    #[must_use]
    pub fn online(&self) -> usize {
        self.players.len()
    }
}

/// `N seconds`, `M minutes N seconds`, `H hours M minutes N seconds`, or
/// `D days H hours M minutes N seconds`, truncating sub-second parts.
#[must_use]
pub fn humanized_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let seconds = total % 60;
    let minutes = (total / 60) % 60;
    let hours = (total / 3_600) % 24;
    let days = total / 86_400;

    if total < 60 {
        format!("{seconds} seconds")
    } else if total < 3_600 {
        format!("{minutes} minutes {seconds} seconds")
    } else if total < 86_400 {
        format!("{hours} hours {minutes} minutes {seconds} seconds")
    } else {
        format!("{days} days {hours} hours {minutes} minutes {seconds} seconds")
    }
}
