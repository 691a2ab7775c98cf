//! Live text buffers the diff engine mutates.
//!
//! The engine never owns document storage. Hosts hand it a [`SharedBuffer`]
//! implementing [`TextBuffer`] and keep editing that same buffer while a
//! diff session is open. [`LineBuffer`] is the in-process implementation
//! used by the binary and the tests.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by buffer mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// A line index fell outside the buffer.
    #[error("Line {line} out of range (buffer has {line_count} lines)")]
    LineOutOfRange {
        /// Requested line.
        line: usize,
        /// Number of lines in the buffer at the time of the request.
        line_count: usize,
    },
}

/// Identity of a host buffer (a file URI, an editor tab id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(String);

impl BufferId {
    /// Creates a buffer id from any string-like identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BufferId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Line-addressed text storage.
///
/// Line indices are 0-based. Implementations must keep at least the
/// semantics of [`LineBuffer`]: inserting at `line_count()` appends, and
/// every other out-of-range index is an error.
pub trait TextBuffer: Send {
    /// Number of lines currently in the buffer.
    fn line_count(&self) -> usize;

    /// Returns the text of one line, without its terminator.
    fn line(&self, index: usize) -> Option<&str>;

    /// Inserts `lines` so that the first one ends up at index `at`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::LineOutOfRange`] if `at > line_count()`.
    fn insert_lines(&mut self, at: usize, lines: &[String]) -> Result<(), BufferError>;

    /// Removes `count` lines starting at `at` and returns them.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::LineOutOfRange`] if the span runs past the end.
    fn delete_lines(&mut self, at: usize, count: usize) -> Result<Vec<String>, BufferError>;

    /// Full buffer contents, lines joined with `\n`.
    fn text(&self) -> String;

    /// Copies the lines in `start..end`, clamped to the buffer.
    fn lines_in(&self, start: usize, end: usize) -> Vec<String> {
        let end = end.min(self.line_count());
        (start..end)
            .filter_map(|i| self.line(i).map(str::to_owned))
            .collect()
    }
}

/// A buffer shared between the host (user edits) and a diff session.
pub type SharedBuffer<B> = Arc<Mutex<B>>;

/// Simple vector-of-lines buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
}

impl LineBuffer {
    /// Builds a buffer from text, splitting on `\n`.
    ///
    /// An empty string yields a single empty line, like an empty editor
    /// document.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_owned).collect(),
        }
    }

    /// Builds a buffer from individual lines.
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Wraps the buffer for sharing with a session manager.
    #[must_use]
    pub fn shared(self) -> SharedBuffer<Self> {
        Arc::new(Mutex::new(self))
    }

    /// Borrows all lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl TextBuffer for LineBuffer {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    fn insert_lines(&mut self, at: usize, lines: &[String]) -> Result<(), BufferError> {
        if at > self.lines.len() {
            return Err(BufferError::LineOutOfRange {
                line: at,
                line_count: self.lines.len(),
            });
        }
        let tail = self.lines.split_off(at);
        self.lines.extend(lines.iter().cloned());
        self.lines.extend(tail);
        Ok(())
    }

    fn delete_lines(&mut self, at: usize, count: usize) -> Result<Vec<String>, BufferError> {
        let end = at.saturating_add(count);
        if end > self.lines.len() {
            return Err(BufferError::LineOutOfRange {
                line: end.saturating_sub(1).max(at),
                line_count: self.lines.len(),
            });
        }
        Ok(self.lines.drain(at..end).collect())
    }

    fn text(&self) -> String {
        self.lines.join("\n")
    }
}
