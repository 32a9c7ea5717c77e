use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("unsupported page scheme in {url:?}: expected http:// or https://")]
    UnsupportedScheme { url: String },

    #[error("invalid widget config: {message}")]
    InvalidConfig { message: String },
}

impl ConsoleError {
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConsoleError;

    #[test]
    fn unsupported_scheme_names_the_url() {
        let error = ConsoleError::UnsupportedScheme {
            url: "file:///index.html".to_string(),
        };
        assert!(error.to_string().contains("file:///index.html"));
    }

    #[test]
    fn invalid_config_constructor_preserves_message() {
        let error = ConsoleError::invalid_config("boom");
        assert_eq!(error.to_string(), "invalid widget config: boom");
    }
}
