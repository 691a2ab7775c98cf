//! Diff sessions and their manager.

pub mod cancel;
pub mod handler;
pub mod manager;
pub mod types;

pub use cancel::CancellationToken;
pub use handler::DiffSession;
pub use manager::SessionManager;
pub use types::{
    ExternalEdit, LineRange, ResolveOutcome, RunOutcome, SessionError, SessionHandle,
    SessionState, StreamId,
};
