//! Bounded, timestamped text logs kept per session and per registry.
//!
//! These back the "communication" and "system" panes of a front end; they
//! are separate from `tracing`, which still receives every entry.

use std::collections::VecDeque;

use chrono::Local;

/// Sink for human-readable log lines.
pub trait Logger {
    fn log(&mut self, message: &str);
}

/// Ring of `[HH:MM:SS] message` lines. Oldest entries fall off at capacity.
#[derive(Debug, Clone)]
pub struct CommLog {
    lines: VecDeque<String>,
    capacity: usize,
}

impl CommLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn sent(&mut self, line: &str) {
        self.log(&format!("Sent: {line}"));
    }

    pub fn received(&mut self, line: &str) {
        self.log(&format!("Received: {line}"));
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Default for CommLog {
    fn default() -> Self {
        Self::new(500)
    }
}

impl Logger for CommLog {
    fn log(&mut self, message: &str) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        let stamp = Local::now().format("%H:%M:%S");
        self.lines.push_back(format!("[{stamp}] {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_stamped_and_bounded() {
        let mut log = CommLog::new(2);
        log.sent("STATUS");
        log.received("STATUS:IDLE");
        log.log("third");
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] Received: STATUS:IDLE"));
        assert!(lines[1].starts_with('['));
        assert_eq!(&lines[1][10..], " third");
        log.clear();
        assert!(log.is_empty());
    }
}
