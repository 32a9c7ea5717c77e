use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};

/// How the hard-reset button follows up on its submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardResetMode {
    /// Submit and let the generic status report the outcome.
    Blind,
    /// Wait for the outcome; on success count down and reload the page.
    #[default]
    AwaitReload,
}

/// Widget behaviour knobs.
///
/// The JS host passes these as a JSON object; every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Append a notice line when the console socket closes.
    pub announce_close: bool,
    pub hard_reset_mode: HardResetMode,
    /// Delay before a typed `clear` wipes the log.
    pub clear_delay_ms: u64,
    /// Delay between a successful hard reset and the page reload.
    pub reload_delay_ms: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            announce_close: true,
            hard_reset_mode: HardResetMode::AwaitReload,
            clear_delay_ms: 250,
            reload_delay_ms: 3000,
        }
    }
}

impl WidgetConfig {
    /// Parse a host-supplied JSON object. An empty string means defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|error| ConsoleError::invalid_config(error.to_string()))
    }

    #[must_use]
    pub fn announce_close(mut self, enabled: bool) -> Self {
        self.announce_close = enabled;
        self
    }

    #[must_use]
    pub fn hard_reset_mode(mut self, mode: HardResetMode) -> Self {
        self.hard_reset_mode = mode;
        self
    }

    #[must_use]
    pub const fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }

    #[must_use]
    pub const fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = WidgetConfig::default();
        assert!(config.announce_close);
        assert_eq!(config.hard_reset_mode, HardResetMode::AwaitReload);
        assert_eq!(config.clear_delay(), Duration::from_millis(250));
        assert_eq!(config.reload_delay(), Duration::from_millis(3000));
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let config =
            WidgetConfig::from_json(r#"{"hard_reset_mode":"blind","announce_close":false}"#)
                .expect("parse");
        assert_eq!(
            config,
            WidgetConfig::default()
                .hard_reset_mode(HardResetMode::Blind)
                .announce_close(false)
        );
    }

    #[test]
    fn from_json_empty_is_default() {
        assert_eq!(WidgetConfig::from_json("  ").expect("parse"), WidgetConfig::default());
    }

    #[test]
    fn from_json_rejects_unknown_mode() {
        let error = WidgetConfig::from_json(r#"{"hard_reset_mode":"sometimes"}"#)
            .expect_err("should fail");
        assert!(matches!(error, ConsoleError::InvalidConfig { .. }));
    }
}
