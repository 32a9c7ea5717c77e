//! `POST /cmd`: allowlisted game commands.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Value, json};
use terrapanel_console::HARD_RESET_COMMAND;
use terrapanel_console::reply::ERROR_DISCRIMINATOR;
use tracing::{info, info_span, warn};

use crate::error::{PanelError, Result};
use crate::game_pty::GameConsole;
use crate::notify::{Notifier, announce};
use crate::presence::PresenceTracker;

pub const PASSED_MSG: &str = "passed";
pub const HARD_RESET_DONE_MSG: &str = "Executed hard reset successfully.";

/// A request body the allowlist accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRequest {
    HardReset,
    Console(String),
}

/// Exact-match allowlist of request bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    allowed: BTreeSet<String>,
}

impl CommandPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Accept `body` only if it is on the list, byte for byte.
    pub fn classify(&self, body: &str) -> Result<CommandRequest> {
        if !self.allowed.contains(body) {
            return Err(PanelError::CommandNotAllowed {
                command: body.to_string(),
            });
        }
        if body == HARD_RESET_COMMAND {
            Ok(CommandRequest::HardReset)
        } else {
            Ok(CommandRequest::Console(body.to_string()))
        }
    }

    #[must_use]
    pub fn is_allowed(&self, body: &str) -> bool {
        self.allowed.contains(body)
    }
}

/// Status code and JSON body for a command request.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub status: u16,
    pub body: Value,
}

impl CommandReply {
    fn ok(msg: &str) -> Self {
        Self {
            status: 200,
            body: json!({ "msg": msg }),
        }
    }

    fn error(error: &PanelError) -> Self {
        Self {
            status: 400,
            body: json!({ "msg": ERROR_DISCRIMINATOR, "error": error.to_string() }),
        }
    }
}

/// Everything a command needs: the game, who is playing, and where to
/// announce.
pub struct CommandService {
    pub policy: CommandPolicy,
    pub game: Mutex<Box<dyn GameConsole>>,
    pub presence: Arc<Mutex<PresenceTracker>>,
    pub notifier: Arc<dyn Notifier>,
}

impl CommandService {
    /// Run `body` on behalf of the client at `client_ip`.
    pub fn execute(&self, body: &str, client_ip: &str) -> CommandReply {
        let span = info_span!("panel.cmd", command = body, client = client_ip);
        let _guard = span.enter();

        let request = match self.policy.classify(body) {
            Ok(request) => request,
            Err(error) => {
                warn!("rejected command");
                return CommandReply::error(&error);
            }
        };

        let mut game = self.game.lock().unwrap_or_else(PoisonError::into_inner);
        match request {
            CommandRequest::HardReset => match game.hard_reboot() {
                Ok(()) => {
                    info!("hard reset complete");
                    CommandReply::ok(HARD_RESET_DONE_MSG)
                }
                Err(error) => {
                    warn!(%error, "hard reset failed");
                    CommandReply::error(&error)
                }
            },
            CommandRequest::Console(command) => {
                if let Err(error) = game.write_console(&command) {
                    warn!(%error, "console write failed");
                    return CommandReply::error(&error);
                }
                drop(game);
                announce(self.notifier.as_ref(), &self.attribution(&command, client_ip));
                CommandReply::ok(PASSED_MSG)
            }
        }
    }

    fn attribution(&self, command: &str, client_ip: &str) -> String {
        let presence = self.presence.lock().unwrap_or_else(PoisonError::into_inner);
        match presence.player_for_ip(client_ip) {
            Some(player) => format!("{} issued command: {command}", player.name),
            None => format!("Someone not playing in the server issued command: {command}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandsConfig;
    use crate::notify::testing::RecordingNotifier;
    use pretty_assertions::assert_eq;
    use std::time::Instant;

    #[derive(Debug, Default)]
    struct FakeGame {
        written: Arc<Mutex<Vec<String>>>,
        reboots: Arc<Mutex<u32>>,
        fail: bool,
    }

    impl GameConsole for FakeGame {
        fn write_console(&mut self, command: &str) -> Result<()> {
            if self.fail {
                return Err(PanelError::pty("write: broken pipe"));
            }
            self.written.lock().expect("written").push(command.to_string());
            Ok(())
        }

        fn hard_reboot(&mut self) -> Result<()> {
            if self.fail {
                return Err(PanelError::pty("game refused to restart"));
            }
            *self.reboots.lock().expect("reboots") += 1;
            Ok(())
        }
    }

    struct Fixture {
        service: CommandService,
        written: Arc<Mutex<Vec<String>>>,
        reboots: Arc<Mutex<u32>>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture(fail: bool) -> Fixture {
        let game = FakeGame {
            fail,
            ..FakeGame::default()
        };
        let written = Arc::clone(&game.written);
        let reboots = Arc::clone(&game.reboots);
        let notifier = Arc::new(RecordingNotifier::default());
        let service = CommandService {
            policy: CommandPolicy::new(CommandsConfig::default().allowed),
            game: Mutex::new(Box::new(game)),
            presence: Arc::new(Mutex::new(PresenceTracker::new())),
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
        };
        Fixture {
            service,
            written,
            reboots,
            notifier,
        }
    }

    #[test]
    fn allowlist_is_exact() {
        let policy = CommandPolicy::new(["dusk", "hardReset"]);
        assert_eq!(
            policy.classify("dusk").expect("dusk"),
            CommandRequest::Console("dusk".to_string())
        );
        assert_eq!(policy.classify("hardReset").expect("reset"), CommandRequest::HardReset);
        assert!(policy.classify("dusk ").is_err());
        assert!(policy.classify("DUSK").is_err());
        assert!(!policy.is_allowed("op alice"));
    }

    #[test]
    fn unlisted_command_is_rejected_with_wire_error() {
        let f = fixture(false);
        let reply = f.service.execute("ban alice", "10.0.0.1");
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body, json!({ "msg": "error", "error": "command not allowed" }));
        assert!(f.written.lock().expect("written").is_empty());
        assert!(f.notifier.messages().is_empty());
    }

    #[test]
    fn allowed_command_is_written_and_announced_anonymously() {
        let f = fixture(false);
        let reply = f.service.execute("dusk", "10.0.0.1");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, json!({ "msg": "passed" }));
        assert_eq!(*f.written.lock().expect("written"), vec!["dusk"]);
        assert_eq!(
            f.notifier.messages(),
            vec!["Someone not playing in the server issued command: dusk"]
        );
    }

    #[test]
    fn known_player_is_credited() {
        let f = fixture(false);
        {
            let mut presence = f.service.presence.lock().expect("presence");
            presence.observe("10.0.0.9:4444 is connecting...", Instant::now());
            presence.observe("Alice has joined.", Instant::now());
        }
        f.service.execute("noon", "10.0.0.9");
        assert_eq!(f.notifier.messages(), vec!["Alice issued command: noon"]);
    }

    #[test]
    fn hard_reset_reboots_without_announcing() {
        let f = fixture(false);
        let reply = f.service.execute("hardReset", "10.0.0.1");
        assert_eq!(reply.status, 200);
        assert_eq!(
            reply.body,
            json!({ "msg": "Executed hard reset successfully." })
        );
        assert_eq!(*f.reboots.lock().expect("reboots"), 1);
        assert!(f.written.lock().expect("written").is_empty());
        assert!(f.notifier.messages().is_empty());
    }

    #[test]
    fn game_failures_surface_as_errors() {
        let f = fixture(true);
        let reply = f.service.execute("dawn", "10.0.0.1");
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["msg"], "error");
        assert_eq!(reply.body["error"], "pty error: write: broken pipe");

        let reply = f.service.execute("hardReset", "10.0.0.1");
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["error"], "pty error: game refused to restart");
    }
}
