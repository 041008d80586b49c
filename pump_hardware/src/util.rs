//! Newline framing for the serial byte stream.

/// Upper bound on a buffered partial line. A device that never sends `\n`
/// would otherwise grow the buffer without limit.
pub const MAX_LINE_BYTES: usize = 4096;

/// Accumulates raw bytes and yields complete lines.
///
/// `\n` terminates a line; a `\r` right before it is dropped. Lines are
/// decoded lossily as UTF-8 and trimmed. A partial line longer than
/// `max_len` is discarded.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_len: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(256),
            max_len: max_len.max(1),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.max_len && !self.buf.contains(&b'\n') {
            tracing::warn!(
                dropped = self.buf.len(),
                "serial line exceeded buffer limit; discarding partial line"
            );
            self.buf.clear();
        }
    }

    /// Pop the oldest complete line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    /// Bytes of the current partial line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
