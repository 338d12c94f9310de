//! In-memory log sink for the chat screen
//!
//! While the alternate screen is up, anything written to stderr would tear
//! the display. `LogBuffer` is a `MakeWriter` for tracing-subscriber that
//! collects complete lines instead; the UI drains it each frame and shows the
//! newest line in the status bar.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// Lines kept before the oldest are discarded.
const CAPACITY: usize = 200;

#[derive(Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: String) {
        // A poisoned lock still holds usable lines.
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() >= CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Take every buffered line, oldest first.
    pub fn drain(&self) -> Vec<String> {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.drain(..).collect()
    }
}

/// Per-event writer: splits on newlines and pushes whole lines.
pub struct LineWriter {
    buffer: LogBuffer,
    partial: Vec<u8>,
}

impl LineWriter {
    fn push_partial(&mut self) {
        if self.partial.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.partial).trim_end().to_string();
        self.partial.clear();
        if !line.is_empty() {
            self.buffer.push(line);
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for &byte in buf {
            if byte == b'\n' {
                self.push_partial();
            } else {
                self.partial.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.push_partial();
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        self.push_partial();
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            buffer: self.clone(),
            partial: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_drain_returns_lines_in_order() {
        let buf = LogBuffer::new();
        buf.push("one".into());
        buf.push("two".into());
        assert_eq!(buf.drain(), vec!["one", "two"]);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn test_oldest_lines_dropped_at_capacity() {
        let buf = LogBuffer::new();
        for i in 0..CAPACITY + 5 {
            buf.push(format!("line {}", i));
        }
        let lines = buf.drain();
        assert_eq!(lines.len(), CAPACITY);
        assert_eq!(lines[0], "line 5");
    }

    #[test]
    fn test_writer_splits_lines_and_flushes_on_drop() {
        let buf = LogBuffer::new();
        {
            let mut writer = buf.make_writer();
            write!(writer, " INFO connected\n WARN retry").unwrap();
            assert_eq!(buf.drain(), vec![" INFO connected"]);
        }
        assert_eq!(buf.drain(), vec![" WARN retry"]);
    }
}
