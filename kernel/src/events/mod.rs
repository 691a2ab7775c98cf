//! Status and overlay notifications.

pub mod broadcaster;
pub mod types;

pub use broadcaster::{Broadcaster, DiffEventReceiver};
pub use types::{
    ApplyStatus, DiffEvent, DiffObserver, EventError, NoopObserver, Overlay, StatusUpdate,
};
