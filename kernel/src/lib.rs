//! Streaming vertical-diff kernel.
//!
//! Applies a line-oriented edit stream to a live text buffer and presents
//! the result as independently reviewable blocks. Each block can be
//! accepted or rejected on its own while the user keeps editing the buffer.
//!
//! ```
//! use std::sync::Arc;
//! use vdiff_kernel::buffer::{BufferId, LineBuffer};
//! use vdiff_kernel::diff::DiffLine;
//! use vdiff_kernel::events::NoopObserver;
//! use vdiff_kernel::infrastructure::config::DiffSettings;
//! use vdiff_kernel::session::{LineRange, SessionManager};
//!
//! # tokio_test_block(async {
//! let manager = SessionManager::new(DiffSettings::default(), Arc::new(NoopObserver));
//! let buffer = LineBuffer::from_text("a\nb\nc").shared();
//! let id = BufferId::new("file:///demo.txt");
//! let handle = manager
//!     .start_session(id.clone(), Arc::clone(&buffer), LineRange::new(0, 2))
//!     .unwrap();
//!
//! let lines = [
//!     DiffLine::same("a"),
//!     DiffLine::removed("b"),
//!     DiffLine::added("x"),
//!     DiffLine::same("c"),
//! ];
//! let stream = futures_util::stream::iter(lines.map(Ok::<_, std::io::Error>));
//! manager.run(&handle, stream).await.unwrap();
//!
//! let block = manager.blocks(&id)[0];
//! manager.accept_reject_block(&id, &block.id, true).unwrap();
//! assert_eq!(buffer.lock().lines(), ["a", "x", "c"]);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread()
//! #         .enable_all()
//! #         .build()
//! #         .unwrap()
//! #         .block_on(f);
//! # }
//! ```

#![warn(clippy::pedantic)]

/// Text buffer abstraction and the in-memory line buffer.
pub mod buffer;
/// Diff lines, position tracking and block identity.
pub mod diff;
/// Status and overlay notifications.
pub mod events;
/// Infrastructure components (config, telemetry).
pub mod infrastructure;
/// Diff sessions and the session manager.
pub mod session;
