/// The transient `command-status` indicator.
///
/// Every submission outcome replaces the text and restarts the flash
/// animation. `flashes` counts restarts so hosts and tests can tell two
/// identical messages apart.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusIndicator {
    text: Option<String>,
    flashes: u64,
}

impl StatusIndicator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            text: None,
            flashes: 0,
        }
    }

    pub fn flash(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
        self.flashes = self.flashes.saturating_add(1);
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[must_use]
    pub const fn flashes(&self) -> u64 {
        self.flashes
    }
}

#[cfg(test)]
mod tests {
    use super::StatusIndicator;

    #[test]
    fn flash_replaces_text_and_counts() {
        let mut status = StatusIndicator::new();
        assert_eq!(status.text(), None);
        status.flash("one");
        status.flash("one");
        assert_eq!(status.text(), Some("one"));
        assert_eq!(status.flashes(), 2);
    }
}
