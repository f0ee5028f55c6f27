//! Line protocol handling for worker stdout.
//!
//! Workers write one JSON event per line. Reads from a pipe do not respect line
//! boundaries, so [`LineBuffer`] keeps the trailing fragment of each read until
//! its newline arrives.

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::SdkError;
use crate::types::{LifecycleEvent, WorkerMessage};

/// Handler trait for worker events.
///
/// Implement this trait to observe a worker while it runs. Calls are made in
/// the order events are read, from the task supervising the process.
#[async_trait]
pub trait WorkerHandler: Send + Sync {
    /// Called for every stdout line that parsed as a worker event.
    async fn on_message(&self, message: WorkerMessage) -> Result<(), SdkError>;

    /// Called for every non-empty stderr line.
    async fn on_stderr_line(&self, line: String) -> Result<(), SdkError>;

    /// Called on process lifecycle transitions.
    async fn on_lifecycle(&self, _event: LifecycleEvent) {}
}

/// Residual-buffer line splitter.
#[derive(Debug, Default)]
pub struct LineBuffer {
    residual: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    ///
    /// Bytes after the last newline are kept for the next call. Splitting on raw
    /// bytes means a UTF-8 sequence cut between two reads is reassembled intact.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.residual.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.residual[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            lines.push(decode_line(&self.residual[start..end]));
            start = end + 1;
        }
        self.residual.drain(..start);
        lines
    }

    /// Take the unterminated fragment left at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.residual.is_empty() {
            return None;
        }
        let line = decode_line(&self.residual);
        self.residual.clear();
        Some(line)
    }

    /// Number of bytes waiting for a newline.
    pub fn pending(&self) -> usize {
        self.residual.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.strip_suffix('\r').unwrap_or(&line).to_string()
}

/// Parse one stdout line as a worker event.
///
/// Blank lines and lines that are not valid JSON yield `None`; a worker that
/// prints stray text must not fail its task.
pub fn parse_line(line: &str) -> Option<WorkerMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    trace!("Raw stdout: {}", trimmed);

    match serde_json::from_str::<WorkerMessage>(trimmed) {
        Ok(message) => Some(message),
        Err(e) => {
            let preview: String = trimmed.chars().take(200).collect();
            debug!(error = %e, preview = %preview, "Skipping unparseable worker line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_spanning_reads() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"type\":").is_empty());
        assert_eq!(buffer.pending(), 8);

        let lines = buffer.push(b"\"x\"}\nsecond\r\nthi");
        assert_eq!(lines, vec![r#"{"type":"x"}"#.to_string(), "second".to_string()]);

        assert!(buffer.push(b"rd").is_empty());
        assert_eq!(buffer.finish(), Some("third".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_split_utf8_sequence() {
        let bytes = "héllo\n".as_bytes();
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(&bytes[..2]).is_empty());
        assert_eq!(buffer.push(&bytes[2..]), vec!["héllo".to_string()]);
    }

    #[test]
    fn test_empty_lines_are_kept_by_splitter() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"\n\na\n"), vec!["", "", "a"]);
    }

    #[test]
    fn test_parse_line_skips_garbage() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("not json at all").is_none());
        assert!(parse_line("{\"type\":\"message\"").is_none());
        assert!(parse_line(r#"{"type":"tool_result","text":"ok"}"#).is_some());
    }
}
