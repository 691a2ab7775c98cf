//! Session manager: owns one diff session per buffer and routes requests.

use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::error::Error;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::handler::DiffSession;
use super::types::{
    ExternalEdit, LineRange, ResolveOutcome, RunOutcome, SessionError, SessionHandle,
    SessionState, StreamId,
};
use crate::buffer::{BufferId, SharedBuffer, TextBuffer};
use crate::diff::{Block, BlockId, DiffLine};
use crate::events::{DiffObserver, Overlay};
use crate::infrastructure::config::DiffSettings;

struct SessionEntry<B: TextBuffer> {
    stream_id: StreamId,
    session: Arc<Mutex<DiffSession<B>>>,
}

impl<B: TextBuffer> Clone for SessionEntry<B> {
    fn clone(&self) -> Self {
        Self {
            stream_id: self.stream_id,
            session: Arc::clone(&self.session),
        }
    }
}

/// Why a run stopped consuming its stream.
enum RunEnd {
    Exhausted,
    Cancelled,
    Failed(SessionError),
}

enum Pull {
    Line(DiffLine),
    End(RunEnd),
}

/// Manages diff sessions, at most one per buffer.
///
/// Every method takes `&self`; share the manager behind an `Arc` to drive
/// a run on one task while resolving or editing from another.
pub struct SessionManager<B: TextBuffer> {
    sessions: Mutex<HashMap<BufferId, SessionEntry<B>>>,
    settings: DiffSettings,
    observer: Arc<dyn DiffObserver>,
}

impl<B: TextBuffer> std::fmt::Debug for SessionManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session_count", &self.sessions.lock().len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<B: TextBuffer> SessionManager<B> {
    /// Creates a manager that reports to `observer`.
    #[must_use]
    pub fn new(settings: DiffSettings, observer: Arc<dyn DiffObserver>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            settings,
            observer,
        }
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &DiffSettings {
        &self.settings
    }

    fn entry(&self, buffer_id: &BufferId) -> Result<SessionEntry<B>, SessionError> {
        self.sessions
            .lock()
            .get(buffer_id)
            .cloned()
            .ok_or_else(|| SessionError::SessionNotFound(buffer_id.clone()))
    }

    fn remove_if_current(&self, buffer_id: &BufferId, stream_id: StreamId) {
        let mut sessions = self.sessions.lock();
        if sessions
            .get(buffer_id)
            .is_some_and(|entry| entry.stream_id == stream_id)
        {
            sessions.remove(buffer_id);
            debug!(buffer = %buffer_id, stream = %stream_id, "Session removed");
        }
    }

    /// Opens a session over `range` of `buffer`.
    ///
    /// An existing session for the same buffer is superseded: its run is
    /// cancelled and its tracking dropped, leaving the buffer as it is. The
    /// old session stays locked from before the new snapshot is taken until
    /// it is discarded, so its run cannot slip an op in between.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRange`] if the range does not fit the
    /// buffer. The previous session, if any, is kept in that case.
    #[instrument(skip(self, buffer))]
    pub fn start_session(
        &self,
        buffer_id: BufferId,
        buffer: SharedBuffer<B>,
        range: LineRange,
    ) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.lock();
        let previous = sessions.get(&buffer_id).cloned();
        let mut superseded = previous.as_ref().map(|entry| entry.session.lock());

        let session = DiffSession::start(
            buffer_id.clone(),
            buffer,
            range,
            Arc::clone(&self.observer),
        )?;
        if let Some(old) = superseded.as_mut() {
            warn!(
                buffer = %buffer_id,
                superseded = %old.stream_id(),
                "Session conflict: superseding active session"
            );
            old.discard();
        }
        drop(superseded);

        let handle = SessionHandle {
            buffer_id: buffer_id.clone(),
            stream_id: session.stream_id(),
            cancel: session.cancel_token().clone(),
        };
        sessions.insert(
            buffer_id.clone(),
            SessionEntry {
                stream_id: handle.stream_id,
                session: Arc::new(Mutex::new(session)),
            },
        );

        info!(buffer = %buffer_id, stream = %handle.stream_id, "Session started");
        Ok(handle)
    }

    /// Consumes `stream` into the session identified by `handle`.
    ///
    /// The session lock is held only while one op is applied. The handle's
    /// token is checked before every pull; ops already applied stay.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] if the session is gone or
    /// superseded, [`SessionError::InvalidState`] if it already ran, and
    /// [`SessionError::SourceFailure`] or [`SessionError::StreamDesync`] if
    /// the run broke off. In the latter cases the applied prefix stays up
    /// for review.
    #[instrument(skip(self, handle, stream), fields(buffer = %handle.buffer_id, stream = %handle.stream_id))]
    pub async fn run<S, E>(
        &self,
        handle: &SessionHandle,
        stream: S,
    ) -> Result<RunOutcome, SessionError>
    where
        S: Stream<Item = Result<DiffLine, E>>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let entry = self.entry(&handle.buffer_id)?;
        if entry.stream_id != handle.stream_id {
            return Err(SessionError::SessionNotFound(handle.buffer_id.clone()));
        }
        entry.session.lock().begin_run()?;

        let end = if self.settings.instant {
            self.drain_then_apply(handle, &entry, stream).await
        } else {
            self.apply_paced(handle, &entry, stream).await
        };

        let (applied, closed, committed_lines) = {
            let mut session = entry.session.lock();
            session.finish_streaming();
            (
                session.applied(),
                session.state() == SessionState::Idle,
                session.take_committed(),
            )
        };
        if closed {
            self.remove_if_current(&handle.buffer_id, handle.stream_id);
        }

        match end {
            RunEnd::Exhausted => {
                info!(applied, "Run completed");
                Ok(RunOutcome::Completed { committed_lines })
            }
            RunEnd::Cancelled => {
                info!(applied, "Run cancelled");
                if self.settings.reject_on_cancel && !closed {
                    entry.session.lock().clear(false)?;
                    self.remove_if_current(&handle.buffer_id, handle.stream_id);
                }
                Ok(RunOutcome::Cancelled { applied })
            }
            RunEnd::Failed(e) => {
                error!(error = %e, applied, "Run failed, keeping applied ops");
                Err(e)
            }
        }
    }

    async fn pull<S, E>(handle: &SessionHandle, stream: &mut S) -> Pull
    where
        S: Stream<Item = Result<DiffLine, E>> + Unpin,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        tokio::select! {
            biased;
            () = handle.cancel.cancelled() => Pull::End(RunEnd::Cancelled),
            item = stream.next() => match item {
                None => Pull::End(RunEnd::Exhausted),
                Some(Ok(line)) => Pull::Line(line),
                Some(Err(e)) => Pull::End(RunEnd::Failed(SessionError::SourceFailure(e.into()))),
            },
        }
    }

    /// Applies one op. `None` means keep going.
    fn apply_one(entry: &SessionEntry<B>, line: &DiffLine) -> Option<RunEnd> {
        let mut session = entry.session.lock();
        if session.state() != SessionState::Streaming {
            return Some(RunEnd::Cancelled);
        }
        session.apply_line(line).err().map(RunEnd::Failed)
    }

    async fn apply_paced<S, E>(
        &self,
        handle: &SessionHandle,
        entry: &SessionEntry<B>,
        stream: S,
    ) -> RunEnd
    where
        S: Stream<Item = Result<DiffLine, E>>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let mut stream = pin!(stream);
        let delay = self.settings.op_delay();
        loop {
            let line = match Self::pull(handle, &mut stream).await {
                Pull::Line(line) => line,
                Pull::End(end) => return end,
            };
            if let Some(end) = Self::apply_one(entry, &line) {
                return end;
            }
            if let Some(delay) = delay {
                tokio::select! {
                    biased;
                    () = handle.cancel.cancelled() => return RunEnd::Cancelled,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    async fn drain_then_apply<S, E>(
        &self,
        handle: &SessionHandle,
        entry: &SessionEntry<B>,
        stream: S,
    ) -> RunEnd
    where
        S: Stream<Item = Result<DiffLine, E>>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let mut stream = pin!(stream);
        let mut lines = Vec::new();
        loop {
            match Self::pull(handle, &mut stream).await {
                Pull::Line(line) => lines.push(line),
                Pull::End(RunEnd::Exhausted) => break,
                Pull::End(end) => return end,
            }
        }
        debug!(lines = lines.len(), "Stream drained, applying");
        lines
            .iter()
            .find_map(|line| Self::apply_one(entry, line))
            .unwrap_or(RunEnd::Exhausted)
    }

    /// Accepts or rejects one block. Closing the last block removes the
    /// session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] or
    /// [`SessionError::BlockNotFound`]; the caller should re-query blocks.
    pub fn accept_reject_block(
        &self,
        buffer_id: &BufferId,
        block_id: &BlockId,
        accept: bool,
    ) -> Result<ResolveOutcome, SessionError> {
        let entry = self.entry(buffer_id)?;
        let outcome = entry.session.lock().accept_reject_block(block_id, accept)?;
        if outcome.session_closed {
            self.remove_if_current(buffer_id, entry.stream_id);
        }
        Ok(outcome)
    }

    /// Resolves every block of the buffer's session and removes it. A run
    /// still streaming into the session is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] if no session exists.
    pub fn clear_session(&self, buffer_id: &BufferId, accept: bool) -> Result<(), SessionError> {
        let entry = self.entry(buffer_id)?;
        let result = entry.session.lock().clear(accept);
        self.remove_if_current(buffer_id, entry.stream_id);
        result
    }

    /// Reconciles a line-count change the host made to the buffer.
    ///
    /// Ignored while the session is streaming.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] if no session exists.
    pub fn on_external_edit(
        &self,
        buffer_id: &BufferId,
        at_line: usize,
        line_delta: isize,
    ) -> Result<(), SessionError> {
        let entry = self.entry(buffer_id)?;
        let closed = {
            let mut session = entry.session.lock();
            session.apply_external_edit(at_line, line_delta);
            session.state() == SessionState::Idle
        };
        if closed {
            self.remove_if_current(buffer_id, entry.stream_id);
        }
        Ok(())
    }

    /// Reconciles a range replacement reported by the host.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] if no session exists.
    pub fn on_text_change(&self, buffer_id: &BufferId, edit: &ExternalEdit) -> Result<(), SessionError> {
        self.on_external_edit(buffer_id, edit.start_line, edit.line_delta())
    }

    /// Unresolved blocks of the buffer's session; empty without one.
    #[must_use]
    pub fn blocks(&self, buffer_id: &BufferId) -> Vec<Block> {
        self.entry(buffer_id)
            .map(|entry| entry.session.lock().blocks().to_vec())
            .unwrap_or_default()
    }

    /// Id of the run currently owning the buffer.
    #[must_use]
    pub fn stream_id_for(&self, buffer_id: &BufferId) -> Option<StreamId> {
        self.sessions.lock().get(buffer_id).map(|entry| entry.stream_id)
    }

    /// Rendering snapshot of the buffer's session.
    #[must_use]
    pub fn overlay(&self, buffer_id: &BufferId) -> Option<Overlay> {
        self.entry(buffer_id)
            .ok()
            .map(|entry| entry.session.lock().overlay())
    }

    /// State of the buffer's session.
    #[must_use]
    pub fn session_state(&self, buffer_id: &BufferId) -> Option<SessionState> {
        self.entry(buffer_id)
            .ok()
            .map(|entry| entry.session.lock().state())
    }

    /// Number of open sessions.
    #[must_use]
    pub fn active_session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Fires the cancellation token of the buffer's session. Returns
    /// whether a session existed.
    pub fn cancel(&self, buffer_id: &BufferId) -> bool {
        match self.entry(buffer_id) {
            Ok(entry) => {
                entry.session.lock().cancel_token().cancel();
                true
            }
            Err(_) => false,
        }
    }
}
