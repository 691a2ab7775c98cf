//! Outbound notifications from diff sessions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::buffer::BufferId;
use crate::diff::{Block, RemovedLine, TrackedRange};
use crate::session::StreamId;

/// Apply status reported to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    /// Lines are still arriving.
    Streaming,
    /// The stream ended; blocks await review.
    Done,
    /// The session is gone.
    Closed,
}

/// Progress report for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    /// Buffer the session edits.
    pub buffer_id: BufferId,
    /// Run that produced the change.
    pub stream_id: StreamId,
    /// Current status.
    pub status: ApplyStatus,
    /// Blocks still awaiting review.
    pub unresolved_blocks: usize,
    /// Buffer text after the change.
    pub text: String,
    /// When the update was produced.
    pub timestamp: DateTime<Utc>,
}

/// Rendering snapshot: what to decorate and where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overlay {
    /// Unresolved blocks.
    pub blocks: Vec<Block>,
    /// Green rows.
    pub added: Vec<TrackedRange>,
    /// Ghost rows with the text they show.
    pub removed: Vec<RemovedLine>,
}

impl Overlay {
    /// Whether there is nothing to render.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

/// Event carried by the broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiffEvent {
    /// A status update.
    Status(StatusUpdate),
    /// A new overlay for a buffer.
    Overlay {
        /// Buffer the overlay belongs to.
        buffer_id: BufferId,
        /// The snapshot.
        overlay: Overlay,
    },
}

/// Receives session notifications. Calls are made with the session lock
/// held, so implementations must not block or call back into the manager.
pub trait DiffObserver: Send + Sync {
    /// Called after every applied op and every resolution.
    fn status_update(&self, update: &StatusUpdate);

    /// Called whenever the tracked rows change.
    fn overlay_changed(&self, buffer_id: &BufferId, overlay: &Overlay);
}

/// Observer that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DiffObserver for NoopObserver {
    fn status_update(&self, _update: &StatusUpdate) {}

    fn overlay_changed(&self, _buffer_id: &BufferId, _overlay: &Overlay) {}
}

/// Errors surfaced to event subscribers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// The broadcaster was dropped.
    #[error("Event channel closed")]
    ChannelClosed,
    /// The subscriber fell behind and missed events.
    #[error("Subscriber lagged, {0} events skipped")]
    Lagged(u64),
}
