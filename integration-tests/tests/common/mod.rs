//! Shared test utilities for integration tests.
//!
//! Provides a manager wired to a broadcaster, buffer helpers and stream
//! builders for driving diff sessions end to end.

#![allow(dead_code)]

use futures_util::stream::{self, Stream, StreamExt};
use std::io;
use std::sync::Arc;
use vdiff_kernel::buffer::{BufferId, LineBuffer, SharedBuffer, TextBuffer};
use vdiff_kernel::diff::DiffLine;
use vdiff_kernel::events::{ApplyStatus, Broadcaster, DiffEvent, DiffEventReceiver, StatusUpdate};
use vdiff_kernel::infrastructure::config::DiffSettings;
use vdiff_kernel::session::SessionManager;

/// Integration test context providing shared resources.
pub struct IntegrationTestContext {
    /// Manager under test
    pub manager: SessionManager<LineBuffer>,
    /// Broadcaster the manager publishes to
    pub broadcaster: Broadcaster,
}

impl IntegrationTestContext {
    /// Creates a context with default settings.
    pub fn new() -> Self {
        Self::with_settings(DiffSettings::default())
    }

    /// Creates a context with custom diff settings.
    pub fn with_settings(settings: DiffSettings) -> Self {
        let broadcaster = Broadcaster::new();
        let manager = SessionManager::new(settings, Arc::new(broadcaster.clone()));
        Self {
            manager,
            broadcaster,
        }
    }

    /// Subscribes to the manager's events.
    pub fn subscribe(&self) -> DiffEventReceiver {
        self.broadcaster.subscribe()
    }
}

/// Creates a shared buffer from newline-separated text.
pub fn buffer(text: &str) -> SharedBuffer<LineBuffer> {
    LineBuffer::from_text(text).shared()
}

/// Current text of a shared buffer.
pub fn text_of(buffer: &SharedBuffer<LineBuffer>) -> String {
    buffer.lock().text()
}

/// Creates a buffer id.
pub fn buffer_id(name: &str) -> BufferId {
    BufferId::new(name)
}

/// A finite stream that yields every line.
pub fn lines(ops: Vec<DiffLine>) -> impl Stream<Item = Result<DiffLine, io::Error>> {
    stream::iter(ops.into_iter().map(Ok))
}

/// A stream that yields every line and then never ends.
pub fn open_ended(ops: Vec<DiffLine>) -> impl Stream<Item = Result<DiffLine, io::Error>> {
    stream::iter(ops.into_iter().map(Ok)).chain(stream::pending())
}

/// A stream that yields every line and then fails.
pub fn failing(ops: Vec<DiffLine>) -> impl Stream<Item = Result<DiffLine, io::Error>> {
    stream::iter(
        ops.into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(io::Error::other("generator crashed")))),
    )
}

/// Drains every buffered event and keeps the status updates.
pub fn drain_statuses(receiver: &mut DiffEventReceiver) -> Vec<StatusUpdate> {
    let mut statuses = Vec::new();
    while let Some(event) = receiver.try_recv() {
        if let DiffEvent::Status(update) = event {
            statuses.push(update);
        }
    }
    statuses
}

/// Waits until `count` status updates with `status` were received.
pub async fn wait_for_status(receiver: &mut DiffEventReceiver, status: ApplyStatus, count: usize) {
    let mut seen = 0;
    while seen < count {
        match receiver.recv().await {
            Ok(DiffEvent::Status(update)) if update.status == status => seen += 1,
            Ok(_) => {}
            Err(e) => panic!("event channel failed: {e}"),
        }
    }
}
