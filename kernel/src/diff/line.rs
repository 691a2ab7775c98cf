//! Diff line operations produced by the edit generator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a single diff line does to the original region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffLineKind {
    /// Context: consumes one original line, keeps it.
    #[serde(rename = "same")]
    Same,
    /// Consumes one original line and leaves a ghost row behind.
    #[serde(rename = "old", alias = "removed")]
    Removed,
    /// Produces one new line with no original counterpart.
    #[serde(rename = "new", alias = "added")]
    Added,
}

impl fmt::Display for DiffLineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Same => write!(f, "same"),
            Self::Removed => write!(f, "old"),
            Self::Added => write!(f, "new"),
        }
    }
}

/// One operation of a diff-line stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// Operation kind.
    #[serde(rename = "type")]
    pub kind: DiffLineKind,
    /// Line text, without terminator.
    pub line: String,
}

impl DiffLine {
    /// A context line.
    #[must_use]
    pub fn same(line: impl Into<String>) -> Self {
        Self {
            kind: DiffLineKind::Same,
            line: line.into(),
        }
    }

    /// A removed original line.
    #[must_use]
    pub fn removed(line: impl Into<String>) -> Self {
        Self {
            kind: DiffLineKind::Removed,
            line: line.into(),
        }
    }

    /// An added line.
    #[must_use]
    pub fn added(line: impl Into<String>) -> Self {
        Self {
            kind: DiffLineKind::Added,
            line: line.into(),
        }
    }

    /// Whether the line is part of the edited result (`same` or `new`).
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self.kind, DiffLineKind::Same | DiffLineKind::Added)
    }
}
