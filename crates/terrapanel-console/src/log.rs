//! The console log model: an ordered, append-only list of text lines.

/// Ordered sequence of lines shown in the `console` element.
///
/// Lines are only ever appended or cleared wholesale; no line is addressable
/// once written.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsoleLog {
    lines: Vec<String>,
}

impl ConsoleLog {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Append one line.
    pub fn append(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}
