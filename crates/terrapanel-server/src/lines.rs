//! Byte stream to console lines.

/// Longest partial line kept before it is flushed as a line of its own.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Splits PTY output into lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped. Bytes after the last
/// newline are held until more output arrives or [`finish`](Self::finish)
/// is called. Invalid UTF-8 is replaced lossily.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every line it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                lines.push(self.take_line());
                continue;
            }
            self.pending.push(byte);
            if self.pending.len() >= MAX_PENDING_BYTES {
                lines.push(self.take_line());
            }
        }
        lines
    }

    /// Flush whatever partial line remains at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.take_line())
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn take_line(&mut self) -> String {
        if self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}
