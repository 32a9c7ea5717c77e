#![forbid(unsafe_code)]

//! Browser shell for the terrapanel console widget.
//!
//! [`host::pump`] applies the effects queued by
//! [`terrapanel_console::ConsoleCore`] to a [`host::DomHost`]. On `wasm32`
//! the [`ConsoleWidget`] export implements that host with `web-sys` (DOM
//! lookups by id, `fetch`, `WebSocket`, `setTimeout`, `confirm`) and wires
//! the page's listeners.

pub mod host;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::ConsoleWidget;

/// Class toggled on `command-status` to restart its flash animation.
pub const STATUS_FLASH_CLASS: &str = "anim";
