//! Shared types for diff sessions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::cancel::CancellationToken;
use crate::buffer::{BufferError, BufferId};
use crate::diff::{Block, BlockId};

/// Errors that can occur during diff session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No open session targets the buffer.
    #[error("Session not found for buffer: {0}")]
    SessionNotFound(BufferId),
    /// The block id is unknown or already resolved.
    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),
    /// The requested region does not fit the buffer.
    #[error("Invalid range {start_line}..={end_line} for buffer with {line_count} lines")]
    InvalidRange {
        /// First line of the region.
        start_line: usize,
        /// Last line of the region, inclusive.
        end_line: usize,
        /// Buffer line count when the session started.
        line_count: usize,
    },
    /// The operation is not allowed in the session's current state.
    #[error("Operation '{operation}' not allowed while session is {state}")]
    InvalidState {
        /// Rejected operation.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },
    /// The stream consumed a line the buffer does not have.
    #[error("Stream out of sync with buffer at line {line} (buffer has {line_count} lines)")]
    StreamDesync {
        /// Buffer line the op addressed.
        line: usize,
        /// Buffer line count at that point.
        line_count: usize,
    },
    /// The diff-line source yielded an error.
    #[error("Diff source failed: {0}")]
    SourceFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The buffer rejected a mutation.
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Lifecycle of a diff session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Consuming the diff-line stream.
    Streaming,
    /// Stream finished; blocks await accept/reject.
    Reviewing,
    /// Nothing left to review.
    Idle,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming => write!(f, "streaming"),
            Self::Reviewing => write!(f, "reviewing"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// Identity of one streaming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Mints a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive line region a session edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    /// First line.
    pub start_line: usize,
    /// Last line, inclusive.
    pub end_line: usize,
}

impl LineRange {
    /// Creates a region.
    #[must_use]
    pub const fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }
}

/// Returned by `start_session`; the caller drives the run with it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Buffer the session edits.
    pub buffer_id: BufferId,
    /// Id of this run.
    pub stream_id: StreamId,
    /// Token the stream producer may fire to stop the run.
    pub cancel: CancellationToken,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stream was exhausted.
    Completed {
        /// Text of every `same` and `new` line, in order.
        committed_lines: Vec<String>,
    },
    /// The token fired before the stream ended.
    Cancelled {
        /// Ops applied before cancellation.
        applied: usize,
    },
}

/// Result of one accept/reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// The block as it was when resolved.
    pub block: Block,
    /// Blocks still awaiting review.
    pub remaining_blocks: usize,
    /// Whether the session closed because nothing was left.
    pub session_closed: bool,
}

/// A text change the host applied to a buffer outside the engine.
///
/// Lines `start_line..=end_line` were replaced by `inserted_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEdit {
    /// First line touched by the change.
    pub start_line: usize,
    /// Last line touched by the change.
    pub end_line: usize,
    /// Replacement text.
    pub inserted_text: String,
}

impl ExternalEdit {
    /// Net change in line count.
    #[must_use]
    pub fn line_delta(&self) -> isize {
        let added = self.inserted_text.matches('\n').count();
        let removed = self.end_line.saturating_sub(self.start_line);
        isize::try_from(added).unwrap_or(isize::MAX) - isize::try_from(removed).unwrap_or(isize::MAX)
    }
}
