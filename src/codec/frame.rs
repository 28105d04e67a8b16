//! Frame reassembly and classification.
//!
//! Serial chunks arrive at arbitrary boundaries; [`FrameBuffer`] stitches
//! them back into complete newline-terminated frames. [`classify`] then
//! separates telemetry records from free-text flight log lines without an
//! explicit type tag: a telemetry frame is all-numeric CSV, so any line with
//! a comma and no letters is telemetry and everything else is text.

/// The kind of a complete frame, as seen by the read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Comma-separated numeric telemetry record.
    Telemetry,
    /// Human-readable flight log line.
    Text,
    /// Whitespace-only line, skipped.
    Empty,
}

/// Reassembles newline-delimited frames from raw serial chunks.
///
/// The trailing fragment of every chunk (the bytes after the last newline)
/// is carried over and prepended to the next chunk, so no frame is ever lost
/// or observed twice regardless of where the transport splits the stream.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    carry: String,
}

impl FrameBuffer {
    /// Creates an empty frame buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every complete frame it finished.
    ///
    /// Frames are returned in stream order with the line terminator (and a
    /// preceding carriage return, if the device sends CRLF) stripped.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.carry.push_str(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.carry.find('\n') {
            let mut line: String = self.carry.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            frames.push(line);
        }
        frames
    }

    /// The incomplete trailing fragment currently carried over.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.carry
    }

    /// Discards any carried fragment. Called when the connection closes.
    pub fn clear(&mut self) {
        self.carry.clear();
    }
}

/// Classifies a complete frame.
///
/// A line is telemetry iff it contains the field separator and no alphabetic
/// character; any other non-blank line is a text event.
#[must_use]
pub fn classify(line: &str) -> Frame {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Frame::Empty;
    }
    let has_alpha = trimmed.chars().any(|c| c.is_ascii_alphabetic());
    if trimmed.contains(',') && !has_alpha {
        Frame::Telemetry
    } else {
        Frame::Text
    }
}
