//! Diff-line model, position tracking and block identity.

pub mod blocks;
pub mod line;
pub mod script;
pub mod tracker;

use thiserror::Error;

pub use blocks::{Block, BlockId, BlockRegistry};
pub use line::{DiffLine, DiffLineKind};
pub use script::{ScriptError, parse_script, read_script, to_script};
pub use tracker::{BlockSpan, PositionTracker, RemovedLine, RowShift, TrackedRange};

/// A broken bookkeeping invariant. Always a bug in the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct InvariantViolation(String);

impl InvariantViolation {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
