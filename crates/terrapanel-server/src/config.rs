//! Panel configuration loaded from TOML.
//!
//! ```toml
//! # terrapanel.toml
//! control_panel_header = "Terraria Control Panel"
//!
//! [game]
//! binary_path = "./server/TerrariaServer.bin.x86_64"
//! world_path = "./server/world.wld"
//! port = 7777
//!
//! [web]
//! bind = "0.0.0.0:8080"
//! static_dir = "./static"
//!
//! [discord]
//! enabled = false
//!
//! [commands]
//! allowed = ["dusk", "dawn", "noon", "midnight", "save", "hardReset"]
//! ```
//!
//! Every section and field is optional; missing values take their
//! defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use terrapanel_console::{FIXED_COMMANDS, HARD_RESET_COMMAND};

use crate::error::{PanelError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "terrapanel.toml";
pub const DEFAULT_HEADER: &str = "Terraria Control Panel";
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
/// Upper bound for `web.backlog_lines`.
pub const MAX_BACKLOG_LINES: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Heading shown on the control page.
    pub control_panel_header: String,
    pub game: GameConfig,
    pub web: WebConfig,
    pub discord: DiscordConfig,
    pub commands: CommandsConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            control_panel_header: DEFAULT_HEADER.to_string(),
            game: GameConfig::default(),
            web: WebConfig::default(),
            discord: DiscordConfig::default(),
            commands: CommandsConfig::default(),
        }
    }
}

/// How to launch the game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub binary_path: PathBuf,
    pub world_path: PathBuf,
    pub port: u16,
    /// Appended after `-world` and `-port`.
    pub extra_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// How long a hard reboot waits for the interrupted server to exit
    /// before killing it.
    pub shutdown_grace_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("./server/TerrariaServer.bin.x86_64"),
            world_path: PathBuf::from("./server/world.wld"),
            port: 7777,
            extra_args: Vec::new(),
            working_dir: None,
            shutdown_grace_ms: 10_000,
        }
    }
}

impl GameConfig {
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Arguments passed to the game binary.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-world".to_string(),
            self.world_path.display().to_string(),
            "-port".to_string(),
            self.port.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: SocketAddr,
    pub static_dir: PathBuf,
    /// Allowlist for the console socket's `Origin` header. Empty allows all.
    pub allowed_origins: Vec<String>,
    /// Recent console lines replayed to a newly connected client.
    pub backlog_lines: usize,
    pub max_body_bytes: usize,
    pub max_message_bytes: usize,
    pub idle_sleep_ms: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_dir: PathBuf::from("./static"),
            allowed_origins: Vec::new(),
            backlog_lines: 200,
            max_body_bytes: 64 * 1024,
            max_message_bytes: 64 * 1024,
            idle_sleep_ms: 10,
        }
    }
}

impl WebConfig {
    #[must_use]
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

/// Player and command announcements to a Discord channel.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub channel_id: String,
    pub bot_token: String,
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_id: String::new(),
            bot_token: String::new(),
            api_base: DISCORD_API_BASE.to_string(),
        }
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("enabled", &self.enabled)
            .field("channel_id", &self.channel_id)
            .field("bot_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Request bodies accepted by `POST /cmd`, matched exactly.
    pub allowed: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        let mut allowed: Vec<String> = FIXED_COMMANDS.iter().map(ToString::to_string).collect();
        allowed.push(HARD_RESET_COMMAND.to_string());
        Self { allowed }
    }
}

impl PanelConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read, parse, and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PanelError::MissingPath {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(PanelError::invalid_config(problems.join("; ")));
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the default config to `path`. Refuses to overwrite unless
    /// `force` is set.
    pub fn write_default(path: impl AsRef<Path>, force: bool) -> Result<()> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(PanelError::exit(
                1,
                format!("{} already exists (use --force to overwrite)", path.display()),
            ));
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::default().to_toml_string()?)?;
        Ok(())
    }

    /// Every problem found, empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.game.binary_path.as_os_str().is_empty() {
            problems.push("game.binary_path must not be empty".to_string());
        }
        if self.game.world_path.as_os_str().is_empty() {
            problems.push("game.world_path must not be empty".to_string());
        }
        if self.game.port == 0 {
            problems.push("game.port must be > 0".to_string());
        }
        if self.web.backlog_lines == 0 || self.web.backlog_lines > MAX_BACKLOG_LINES {
            problems.push(format!(
                "web.backlog_lines must be between 1 and {MAX_BACKLOG_LINES}"
            ));
        }
        if self.web.max_body_bytes == 0 {
            problems.push("web.max_body_bytes must be > 0".to_string());
        }
        if self.web.max_message_bytes == 0 {
            problems.push("web.max_message_bytes must be > 0".to_string());
        }
        if self.discord.enabled {
            if self.discord.channel_id.trim().is_empty() {
                problems.push("discord.channel_id is required when discord is enabled".to_string());
            }
            if self.discord.bot_token.trim().is_empty() {
                problems.push("discord.bot_token is required when discord is enabled".to_string());
            }
            if !self.discord.api_base.starts_with("http://")
                && !self.discord.api_base.starts_with("https://")
            {
                problems.push("discord.api_base must be an http(s) URL".to_string());
            }
        }
        if let Some(blank) = self.commands.allowed.iter().find(|c| c.trim().is_empty()) {
            problems.push(format!("commands.allowed contains a blank entry {blank:?}"));
        }
        problems
    }
}
