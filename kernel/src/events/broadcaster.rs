//! Broadcast fan-out of diff events.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use super::types::{DiffEvent, DiffObserver, EventError, Overlay, StatusUpdate};
use crate::buffer::BufferId;

const DEFAULT_CAPACITY: usize = 256;

/// Publishes session notifications to any number of subscribers.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<DiffEvent>,
    subscriber_count: Arc<AtomicUsize>,
}

impl Broadcaster {
    /// Creates a broadcaster with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a broadcaster that buffers up to `capacity` events per
    /// subscriber. A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> DiffEventReceiver {
        self.subscriber_count.fetch_add(1, Ordering::SeqCst);
        debug!(subscriber_count = self.subscriber_count(), "Subscriber added");
        DiffEventReceiver {
            inner: self.sender.subscribe(),
            subscriber_count: Arc::clone(&self.subscriber_count),
        }
    }

    /// Publishes an event. Never blocks; with no subscribers it is dropped.
    pub fn publish(&self, event: DiffEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => trace!(receiver_count, "Diff event sent"),
            Err(_) => trace!("Diff event dropped, no subscribers"),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffObserver for Broadcaster {
    fn status_update(&self, update: &StatusUpdate) {
        self.publish(DiffEvent::Status(update.clone()));
    }

    fn overlay_changed(&self, buffer_id: &BufferId, overlay: &Overlay) {
        self.publish(DiffEvent::Overlay {
            buffer_id: buffer_id.clone(),
            overlay: overlay.clone(),
        });
    }
}

/// Receiving end of a [`Broadcaster`] subscription.
pub struct DiffEventReceiver {
    inner: broadcast::Receiver<DiffEvent>,
    subscriber_count: Arc<AtomicUsize>,
}

impl DiffEventReceiver {
    /// Waits for the next event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ChannelClosed`] once the broadcaster is gone, or
    /// [`EventError::Lagged`] if events were overwritten before being read.
    /// A lagged receiver stays usable.
    pub async fn recv(&mut self) -> Result<DiffEvent, EventError> {
        self.inner.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventError::ChannelClosed,
            broadcast::error::RecvError::Lagged(count) => {
                warn!(skipped = count, "Subscriber lagged");
                EventError::Lagged(count)
            }
        })
    }

    /// Returns the next buffered event without waiting.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<DiffEvent> {
        self.inner.try_recv().ok()
    }
}

impl Drop for DiffEventReceiver {
    fn drop(&mut self) {
        self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        debug!(
            subscriber_count = self.subscriber_count.load(Ordering::SeqCst),
            "Subscriber removed"
        );
    }
}
