#![forbid(unsafe_code)]

//! `terrapanel-console` is the platform-independent core of the terrapanel
//! browser console widget.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedding environment (the `terrapanel-web`
//!   shell, or a test) pushes UI events, socket frames, request completions
//!   and timer firings into [`ConsoleCore`].
//! - **Effects out, not callbacks in**: every DOM mutation, HTTP post, timer
//!   and prompt the widget needs is queued as an [`Effect`] for the host to
//!   perform.
//! - **No JS types, no threads**: the core builds and tests natively.

pub mod config;
pub mod control;
pub mod endpoint;
pub mod error;
pub mod log;
pub mod reply;
pub mod status;
pub mod widget;

pub use crate::config::{HardResetMode, WidgetConfig};
pub use crate::control::{CLEAR_COMMAND, Control, ElementId, FIXED_COMMANDS, HARD_RESET_COMMAND};
pub use crate::endpoint::Endpoints;
pub use crate::error::ConsoleError;
pub use crate::log::ConsoleLog;
pub use crate::reply::{SubmissionFailure, SubmissionOutcome, parse_reply};
pub use crate::status::StatusIndicator;
pub use crate::widget::{
    Completion, CompletionStatus, ConsoleCore, Effect, RequestId, SocketState, TimerId,
};
