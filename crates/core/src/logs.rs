// crates/core/src/logs.rs
//! Per-task log line queue with independent consumer cursors.

use std::sync::{Arc, Mutex};

/// Ordered, unbounded, in-memory log for one task.
///
/// The producer (the job's [`OutputBridge`](crate::OutputBridge)) appends
/// complete lines; each consumer reads through its own [`LogCursor`], so any
/// number of stream observers can follow the same task without stealing
/// lines from each other or blocking the producer.
///
/// Lines are retained for the life of the channel. Completed tasks are never
/// evicted in this process (see DESIGN.md), so a cursor created after the
/// task finished still replays the full history.
pub struct LogChannel {
    lines: Mutex<Vec<String>>,
}

impl LogChannel {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Append one complete line.
    pub fn push(&self, line: impl Into<String>) {
        match self.lines.lock() {
            Ok(mut guard) => guard.push(line.into()),
            Err(e) => tracing::error!("Mutex poisoned pushing log line: {e}"),
        }
    }

    /// Number of lines appended so far.
    pub fn len(&self) -> usize {
        self.lines.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a consumer cursor starting at the first line.
    pub fn subscribe(self: &Arc<Self>) -> LogCursor {
        LogCursor {
            channel: Arc::clone(self),
            pos: 0,
        }
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer's read position into a [`LogChannel`].
pub struct LogCursor {
    channel: Arc<LogChannel>,
    pos: usize,
}

impl LogCursor {
    /// Drain up to `max` currently-available lines without blocking.
    ///
    /// Returns an empty vec when the cursor has caught up with the producer.
    pub fn next_batch(&mut self, max: usize) -> Vec<String> {
        match self.channel.lines.lock() {
            Ok(guard) => {
                let end = guard.len().min(self.pos.saturating_add(max));
                let batch = guard[self.pos..end].to_vec();
                self.pos = end;
                batch
            }
            Err(e) => {
                tracing::error!("Mutex poisoned reading log lines: {e}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain_in_order() {
        let channel = Arc::new(LogChannel::new());
        channel.push("one");
        channel.push("two");
        channel.push("three");

        let mut cursor = channel.subscribe();
        assert_eq!(cursor.next_batch(10), vec!["one", "two", "three"]);
        assert!(cursor.next_batch(10).is_empty());
    }

    #[test]
    fn test_batch_size_is_respected() {
        let channel = Arc::new(LogChannel::new());
        for i in 0..45 {
            channel.push(format!("line{i}"));
        }

        let mut cursor = channel.subscribe();
        assert_eq!(cursor.next_batch(20).len(), 20);
        assert_eq!(cursor.next_batch(20).len(), 20);
        assert_eq!(cursor.next_batch(20).len(), 5);
        assert!(cursor.next_batch(20).is_empty());
    }

    #[test]
    fn test_independent_cursors_see_identical_sequences() {
        let channel = Arc::new(LogChannel::new());
        channel.push("a");

        let mut fast = channel.subscribe();
        let mut slow = channel.subscribe();
        assert_eq!(fast.next_batch(10), vec!["a"]);

        channel.push("b");
        channel.push("c");

        // The fast cursor being ahead does not affect the slow one.
        assert_eq!(fast.next_batch(10), vec!["b", "c"]);
        assert_eq!(slow.next_batch(10), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_late_subscriber_replays_history() {
        let channel = Arc::new(LogChannel::new());
        channel.push("early");
        channel.push("later");

        let mut cursor = channel.subscribe();
        assert_eq!(cursor.next_batch(1), vec!["early"]);
        assert_eq!(cursor.next_batch(1), vec!["later"]);
    }

    #[test]
    fn test_len() {
        let channel = Arc::new(LogChannel::new());
        assert!(channel.is_empty());
        channel.push("x");
        assert_eq!(channel.len(), 1);

        // Draining a cursor does not consume lines from the channel.
        let mut cursor = channel.subscribe();
        cursor.next_batch(10);
        assert_eq!(channel.len(), 1);
    }
}
