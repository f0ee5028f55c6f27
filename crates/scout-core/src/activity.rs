//! Activity trail recorded for each task.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of activities retained per task.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 120;

/// Classification of an observed line of worker behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    /// Lifecycle note produced by the runner itself.
    Status,
    /// The worker invoked a tool.
    Tool,
    /// The worker produced assistant text.
    Assistant,
    /// A tool returned a result to the worker.
    ToolResult,
    /// A line the worker wrote to stderr.
    Stderr,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Tool => "tool",
            Self::Assistant => "assistant",
            Self::ToolResult => "toolResult",
            Self::Stderr => "stderr",
        }
    }
}

/// One classified, timestamped line of observed worker behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    /// Create an activity stamped with the current time.
    pub fn new(kind: ActivityKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// `kind: text`, the single-line form used in progress blocks.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind.label(), self.text)
    }
}

/// Fixed-capacity ring buffer of activities; the oldest entry is dropped first.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<Activity>,
}

impl ActivityLog {
    /// Create a log holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an activity, evicting the oldest one when full.
    pub fn push(&mut self, activity: Activity) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(activity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended activity.
    pub fn latest(&self) -> Option<&Activity> {
        self.entries.back()
    }

    /// Retained activities, oldest first.
    pub fn to_vec(&self) -> Vec<Activity> {
        self.entries.iter().cloned().collect()
    }

    pub fn into_vec(self) -> Vec<Activity> {
        self.entries.into()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

/// Collapse whitespace to single spaces and cut the text to `max_chars`.
///
/// Truncated previews end with `...`, which is not counted against the limit.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut preview: String = collapsed.chars().take(max_chars).collect();
    preview.push_str("...");
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let mut log = ActivityLog::new(DEFAULT_ACTIVITY_CAPACITY);
        for i in 0..130 {
            log.push(Activity::new(ActivityKind::Status, format!("line {}", i)));
        }

        assert_eq!(log.len(), 120);
        let entries = log.to_vec();
        assert_eq!(entries.first().unwrap().text, "line 10");
        assert_eq!(entries.last().unwrap().text, "line 129");
        assert_eq!(log.latest().unwrap().text, "line 129");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut log = ActivityLog::new(0);
        log.push(Activity::new(ActivityKind::Tool, "a"));
        log.push(Activity::new(ActivityKind::Tool, "b"));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.into_vec()[0].text, "b");
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("a\n  b\tc", 10), "a b c");
        assert_eq!(truncate_preview("abcdefghij", 4), "abcd...");
        assert_eq!(truncate_preview("ééééé", 2), "éé...");
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ActivityKind::ToolResult).unwrap();
        assert_eq!(json, r#""toolResult""#);
        assert_eq!(ActivityKind::ToolResult.label(), "toolResult");
    }
}
