// crates/core/src/capture.rs
//! Output capture: raw pipeline writes in, discrete log lines out.
//!
//! [`OutputBridge`] is installed per job invocation and handed to the
//! pipeline as an ordinary `io::Write`. Every byte is forwarded verbatim to
//! the wrapped sink (so the raw process output stays intact for operators),
//! while complete lines are split off and pushed onto the task's
//! [`LogChannel`].

use std::io::{self, Write};
use std::sync::Arc;

use crate::logs::LogChannel;

/// Accumulates text fragments until a line terminator arrives.
///
/// Writes may split lines mid-way, batch several lines, or arrive with no
/// trailing terminator; the buffer absorbs all of that and only hands back
/// complete lines.
#[derive(Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return the complete lines terminated so far.
    ///
    /// Lines are trimmed of trailing whitespace; lines empty after trimming
    /// are dropped. An unterminated tail stays buffered.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buf.push_str(text);

        let mut lines = Vec::new();
        while let Some(idx) = self.buf.find('\n') {
            let rest = self.buf.split_off(idx + 1);
            let line = std::mem::replace(&mut self.buf, rest);
            let line = line.trim_end();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Take the unterminated remainder as a final line, if it is non-blank.
    pub fn take_remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let rest = rest.trim_end();
        (!rest.is_empty()).then(|| rest.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Tee writer installed around a pipeline call.
///
/// Forwards every write to `sink` unmodified, then emits complete lines to
/// the task's log channel. Dropping the bridge flushes, so the trailing
/// unterminated fragment is emitted on every exit path without the caller
/// having to remember a release call.
pub struct OutputBridge<W: Write> {
    channel: Arc<LogChannel>,
    sink: W,
    buffer: LineBuffer,
}

impl<W: Write> OutputBridge<W> {
    pub fn new(channel: Arc<LogChannel>, sink: W) -> Self {
        Self {
            channel,
            sink,
            buffer: LineBuffer::new(),
        }
    }
}

impl<W: Write> Write for OutputBridge<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Original sink first, so operators see output even if line
        // extraction goes wrong.
        self.sink.write_all(buf)?;

        let text = String::from_utf8_lossy(buf);
        for line in self.buffer.push(&text) {
            self.channel.push(line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(rest) = self.buffer.take_remainder() {
            self.channel.push(rest);
        }
        self.sink.flush()
    }
}

impl<W: Write> Drop for OutputBridge<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
