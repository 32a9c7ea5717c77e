#![forbid(unsafe_code)]

//! Control panel for a Terraria dedicated server.
//!
//! The game runs inside a pseudo-terminal ([`game_pty`]). Its console
//! output is split into lines and [`relay`]ed to the log, to
//! [`presence`] tracking (join and leave announcements through a
//! [`notify::Notifier`]), and to the [`hub`] that feeds every connected
//! `/console` websocket. `POST /cmd` runs allowlisted commands
//! ([`commands`]). The page itself is served from a static directory
//! ([`assets`]) and driven by the `terrapanel-web` widget.

pub mod assets;
pub mod cli;
pub mod commands;
pub mod config;
pub mod console_ws;
pub mod error;
pub mod game_pty;
pub mod http;
pub mod hub;
pub mod lines;
pub mod logging;
pub mod notify;
pub mod presence;
pub mod relay;
pub mod server;

pub use cli::{run, run_from_env};
pub use config::PanelConfig;
pub use error::{PanelError, Result};
pub use game_pty::{GameConsole, GamePty};
pub use hub::ConsoleHub;
pub use server::{AppState, PanelServer};
