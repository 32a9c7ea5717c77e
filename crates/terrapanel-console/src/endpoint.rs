//! Derivation of the command and console-socket URLs from the page URL.

use crate::error::{ConsoleError, Result};

/// Path segment appended to the page URL for command submission.
pub const COMMAND_PATH: &str = "cmd";
/// Path segment appended to the page host for the push socket.
pub const CONSOLE_PATH: &str = "console";

/// Network endpoints the widget talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `POST` target for commands.
    pub command_url: String,
    /// WebSocket URL for pushed console lines.
    pub console_url: String,
}

impl Endpoints {
    /// Derive both endpoints from `window.location.href`.
    ///
    /// The query string and fragment are dropped before appending, so
    /// `http://host/panel/?x#y` posts to `http://host/panel/cmd`. The socket
    /// keeps the page's security level: `http` maps to `ws`, `https` to `wss`.
    pub fn from_page_url(href: &str) -> Result<Self> {
        let base = strip_query_and_fragment(href);
        let (socket_scheme, rest) = if let Some(rest) = base.strip_prefix("http://") {
            ("ws://", rest)
        } else if let Some(rest) = base.strip_prefix("https://") {
            ("wss://", rest)
        } else {
            return Err(ConsoleError::UnsupportedScheme {
                url: href.to_string(),
            });
        };

        Ok(Self {
            command_url: format!("{base}{COMMAND_PATH}"),
            console_url: format!("{socket_scheme}{rest}{CONSOLE_PATH}"),
        })
    }
}

fn strip_query_and_fragment(href: &str) -> &str {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    &href[..end]
}
