use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PanelError>;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {message}")]
    WebSocket { message: String },

    #[error("pty error: {message}")]
    Pty { message: String },

    #[error("notification failed: {message}")]
    Notify { message: String },

    #[error("invalid config: {message}")]
    InvalidConfig { message: String },

    #[error("command not allowed")]
    CommandNotAllowed { command: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("required path does not exist: {path}")]
    MissingPath { path: PathBuf },

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl PanelError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code, .. } => *code,
            Self::InvalidConfig { .. } | Self::TomlDe(_) | Self::MissingPath { .. } => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn exit(code: i32, message: impl Into<String>) -> Self {
        Self::Exit {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn pty<E: std::fmt::Display>(error: E) -> Self {
        Self::Pty {
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn websocket<E: std::fmt::Display>(error: E) -> Self {
        Self::WebSocket {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PanelError;

    #[test]
    fn exit_constructor_preserves_code_and_message() {
        let error = PanelError::exit(42, "boom");
        assert_eq!(error.exit_code(), 42);
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn config_errors_exit_with_two() {
        assert_eq!(PanelError::invalid_config("x").exit_code(), 2);
        assert_eq!(PanelError::pty("x").exit_code(), 1);
    }

    #[test]
    fn command_not_allowed_matches_wire_text() {
        let error = PanelError::CommandNotAllowed {
            command: "op me".to_string(),
        };
        assert_eq!(error.to_string(), "command not allowed");
    }
}
