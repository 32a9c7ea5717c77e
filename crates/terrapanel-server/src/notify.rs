//! Player and command announcements.

use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::config::DiscordConfig;
use crate::error::{PanelError, Result};

/// Destination for announcements.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> Result<()>;
}

/// Deliver `message`, logging instead of failing.
pub fn announce(notifier: &dyn Notifier, message: &str) {
    if let Err(error) = notifier.notify(message) {
        warn!(%error, message, "announcement failed");
    }
}

/// Writes announcements to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        info!(target: "announce", "{message}");
        Ok(())
    }
}

/// Posts announcements to a Discord channel as the configured bot.
pub struct DiscordNotifier {
    client: Client,
    endpoint: String,
    token: String,
}

impl std::fmt::Debug for DiscordNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordNotifier")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: messages_endpoint(&config.api_base, &config.channel_id),
            token: config.bot_token.clone(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Notifier for DiscordNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "content": message }))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PanelError::Notify {
                message: format!("discord rejected message ({status}): {body}"),
            });
        }
        info!(target: "announce", "{message}");
        Ok(())
    }
}

/// `<api_base>/channels/<channel_id>/messages`
#[must_use]
pub fn messages_endpoint(api_base: &str, channel_id: &str) -> String {
    format!(
        "{}/channels/{}/messages",
        api_base.trim_end_matches('/'),
        channel_id.trim()
    )
}

/// Hands announcements to a background thread that delivers them in order,
/// so callers never wait on the network.
pub struct QueuedNotifier {
    queue: Sender<String>,
}

impl std::fmt::Debug for QueuedNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedNotifier").finish_non_exhaustive()
    }
}

impl QueuedNotifier {
    /// Start the delivery thread. It exits once the notifier is dropped and
    /// the queue has drained.
    pub fn spawn(inner: Box<dyn Notifier>) -> Result<Self> {
        let (queue, messages) = mpsc::channel::<String>();
        thread::Builder::new()
            .name("terrapanel-announce".to_string())
            .spawn(move || {
                for message in messages {
                    announce(inner.as_ref(), &message);
                }
            })
            .map_err(|error| PanelError::Notify {
                message: format!("failed to spawn announcement thread: {error}"),
            })?;
        Ok(Self { queue })
    }
}

impl Notifier for QueuedNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        self.queue
            .send(message.to_string())
            .map_err(|_| PanelError::Notify {
                message: "announcement thread has stopped".to_string(),
            })
    }
}

/// Discord when enabled, otherwise the log.
pub fn from_config(config: &DiscordConfig) -> Result<Box<dyn Notifier>> {
    if config.enabled {
        Ok(Box::new(DiscordNotifier::new(config)?))
    } else {
        Ok(Box::new(LogNotifier))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::Notifier;
    use crate::error::{PanelError, Result};

    /// Records every message; optionally fails each call.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub messages: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().expect("messages lock").clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str) -> Result<()> {
            self.messages
                .lock()
                .expect("messages lock")
                .push(message.to_string());
            if self.fail {
                return Err(PanelError::Notify {
                    message: "notifier down".to_string(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[test]
    fn endpoint_joins_base_and_channel() {
        assert_eq!(
            messages_endpoint("https://discord.com/api/v10/", " 123 "),
            "https://discord.com/api/v10/channels/123/messages"
        );
    }

    #[test]
    fn disabled_discord_uses_log_notifier() {
        let notifier = from_config(&DiscordConfig::default()).expect("notifier");
        assert!(notifier.notify("hello").is_ok());
    }

    #[test]
    fn announce_swallows_failures() {
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };
        announce(&notifier, "Alice has joined!");
        assert_eq!(notifier.messages(), vec!["Alice has joined!"]);
    }

    /// Blocks each delivery until the test opens the gate once.
    struct GatedNotifier {
        gate: Mutex<mpsc::Receiver<()>>,
        delivered: Mutex<Sender<String>>,
    }

    impl Notifier for GatedNotifier {
        fn notify(&self, message: &str) -> Result<()> {
            let _ = self.gate.lock().expect("gate").recv();
            let _ = self.delivered.lock().expect("delivered").send(message.to_string());
            Ok(())
        }
    }

    #[test]
    fn queued_notifier_does_not_wait_for_delivery() {
        let (open, gate) = mpsc::channel();
        let (delivered_tx, delivered) = mpsc::channel();
        let queued = QueuedNotifier::spawn(Box::new(GatedNotifier {
            gate: Mutex::new(gate),
            delivered: Mutex::new(delivered_tx),
        }))
        .expect("spawn");

        queued.notify("Alice has joined!").expect("queue first");
        queued.notify("Bob has joined!").expect("queue second");
        assert!(delivered.try_recv().is_err());

        open.send(()).expect("open");
        open.send(()).expect("open");
        let timeout = Duration::from_secs(5);
        assert_eq!(delivered.recv_timeout(timeout).expect("first"), "Alice has joined!");
        assert_eq!(delivered.recv_timeout(timeout).expect("second"), "Bob has joined!");
    }

    #[test]
    fn debug_hides_token() {
        let notifier = DiscordNotifier::new(&DiscordConfig {
            enabled: true,
            channel_id: "42".to_string(),
            bot_token: "hunter2".to_string(),
            ..DiscordConfig::default()
        })
        .expect("client");
        let rendered = format!("{notifier:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("/channels/42/messages"));
    }
}
