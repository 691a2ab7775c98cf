//! One diff session: applies stream ops to a buffer and resolves blocks.

use chrono::Utc;
use std::slice;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace};

use super::cancel::CancellationToken;
use super::types::{LineRange, ResolveOutcome, SessionError, SessionState, StreamId};
use crate::buffer::{BufferId, SharedBuffer, TextBuffer};
use crate::diff::{Block, BlockId, BlockRegistry, DiffLine, DiffLineKind, PositionTracker, RowShift};
use crate::events::{ApplyStatus, DiffObserver, Overlay, StatusUpdate};

/// The in-progress run of removed/added lines, i.e. the block being built.
#[derive(Debug, Clone, Copy)]
struct OpenRun {
    start: usize,
    removed: usize,
}

/// Per-buffer diff state.
///
/// All positions are view lines (see [`PositionTracker`]). The session owns
/// no text; every mutation goes through the shared buffer.
pub struct DiffSession<B: TextBuffer> {
    buffer_id: BufferId,
    buffer: SharedBuffer<B>,
    observer: Arc<dyn DiffObserver>,
    stream_id: StreamId,
    cancel: CancellationToken,
    state: SessionState,
    range: LineRange,
    original: Vec<String>,
    tracker: PositionTracker,
    registry: BlockRegistry,
    cursor: usize,
    open_run: Option<OpenRun>,
    committed: Vec<String>,
    applied: usize,
    run_active: bool,
    listening: bool,
}

impl<B: TextBuffer> std::fmt::Debug for DiffSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffSession")
            .field("buffer_id", &self.buffer_id)
            .field("stream_id", &self.stream_id)
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("block_count", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<B: TextBuffer> DiffSession<B> {
    /// Opens a session over `range` and snapshots the region.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRange`] if the range is inverted or
    /// runs past the buffer.
    pub fn start(
        buffer_id: BufferId,
        buffer: SharedBuffer<B>,
        range: LineRange,
        observer: Arc<dyn DiffObserver>,
    ) -> Result<Self, SessionError> {
        let original = {
            let guard = buffer.lock();
            let line_count = guard.line_count();
            if range.start_line > range.end_line || range.end_line >= line_count {
                return Err(SessionError::InvalidRange {
                    start_line: range.start_line,
                    end_line: range.end_line,
                    line_count,
                });
            }
            guard.lines_in(range.start_line, range.end_line + 1)
        };

        Ok(Self {
            buffer_id,
            buffer,
            observer,
            stream_id: StreamId::generate(),
            cancel: CancellationToken::new(),
            state: SessionState::Streaming,
            range,
            original,
            tracker: PositionTracker::new(),
            registry: BlockRegistry::new(),
            cursor: range.start_line,
            open_run: None,
            committed: Vec::new(),
            applied: 0,
            run_active: false,
            listening: false,
        })
    }

    /// Buffer the session edits.
    #[must_use]
    pub fn buffer_id(&self) -> &BufferId {
        &self.buffer_id
    }

    /// Id of the session's run.
    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// The session's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Region the session was started over.
    #[must_use]
    pub fn range(&self) -> LineRange {
        self.range
    }

    /// The region's lines as they were at start.
    #[must_use]
    pub fn original(&self) -> &[String] {
        &self.original
    }

    /// Unresolved blocks in ascending position.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        self.registry.blocks()
    }

    /// Ops applied so far.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Whether external edits are currently reconciled.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Current rendering snapshot.
    #[must_use]
    pub fn overlay(&self) -> Overlay {
        Overlay {
            blocks: self.registry.blocks().to_vec(),
            added: self.tracker.added_ranges().to_vec(),
            removed: self.tracker.removed_lines().to_vec(),
        }
    }

    /// Builds a status update from the current state.
    #[must_use]
    pub fn status(&self, status: ApplyStatus) -> StatusUpdate {
        StatusUpdate {
            buffer_id: self.buffer_id.clone(),
            stream_id: self.stream_id,
            status,
            unresolved_blocks: self.registry.len(),
            text: self.buffer.lock().text(),
            timestamp: Utc::now(),
        }
    }

    fn notify(&self, status: ApplyStatus) {
        self.observer.status_update(&self.status(status));
        self.observer
            .overlay_changed(&self.buffer_id, &self.overlay());
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Marks the run as started. External edits stay ignored until
    /// [`finish_streaming`](Self::finish_streaming).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if a run already happened or
    /// the session is no longer streaming.
    pub fn begin_run(&mut self) -> Result<(), SessionError> {
        if self.run_active || self.applied > 0 || self.state != SessionState::Streaming {
            return Err(self.invalid_state("run"));
        }
        self.run_active = true;
        self.listening = false;
        debug!(buffer = %self.buffer_id, stream = %self.stream_id, "Run started");
        Ok(())
    }

    /// Applies one diff line to the buffer and bookkeeping, then notifies.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::StreamDesync`] if a `same` or `old` line has
    /// no buffer line left to consume, [`SessionError::InvalidState`] if no
    /// run is active.
    pub fn apply_line(&mut self, diff_line: &DiffLine) -> Result<(), SessionError> {
        if !self.run_active || self.state != SessionState::Streaming {
            return Err(self.invalid_state("apply_line"));
        }
        let buffer = Arc::clone(&self.buffer);
        let mut buffer = buffer.lock();
        let line = self.tracker.to_buffer_line(self.cursor);

        match diff_line.kind {
            DiffLineKind::Same => {
                ensure_line(&*buffer, line)?;
                self.open_run = None;
                self.committed.push(diff_line.line.clone());
            }
            DiffLineKind::Removed => {
                ensure_line(&*buffer, line)?;
                let run = self.open_run.get_or_insert(OpenRun {
                    start: self.cursor,
                    removed: 0,
                });
                let ghost_row = run.start + run.removed;
                run.removed += 1;

                let texts = buffer.delete_lines(line, 1)?;
                self.tracker.shift_after(self.cursor + 1, -1);
                self.tracker.shift_after(ghost_row, 1);
                self.tracker.add_removed(ghost_row, &texts);
            }
            DiffLineKind::Added => {
                buffer.insert_lines(line, slice::from_ref(&diff_line.line))?;
                self.open_run.get_or_insert(OpenRun {
                    start: self.cursor,
                    removed: 0,
                });
                self.tracker.shift_after(self.cursor, 1);
                self.tracker.add_added(self.cursor, 1);
                self.committed.push(diff_line.line.clone());
            }
        }
        drop(buffer);

        self.cursor += 1;
        self.applied += 1;
        if self.registry.sync(&self.tracker.spans()) > 0 {
            trace!(buffer = %self.buffer_id, blocks = self.registry.len(), "Block opened");
        }
        self.notify(ApplyStatus::Streaming);
        Ok(())
    }

    /// Ends the run. The session moves to `Reviewing`, or closes (accepting
    /// nothing, since nothing is tracked) when no block was produced.
    pub fn finish_streaming(&mut self) {
        self.run_active = false;
        self.open_run = None;
        if self.state != SessionState::Streaming {
            return;
        }
        self.listening = true;
        if self.registry.is_empty() {
            self.close(true);
        } else {
            self.state = SessionState::Reviewing;
            info!(
                buffer = %self.buffer_id,
                blocks = self.registry.len(),
                applied = self.applied,
                "Streaming finished"
            );
            self.notify(ApplyStatus::Done);
        }
    }

    /// Takes the `same` and `new` lines seen by the run.
    pub fn take_committed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.committed)
    }

    /// Accepts or rejects one block.
    ///
    /// When the last block is resolved the session closes with the same
    /// `accept` flag.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::BlockNotFound`] for an unknown id and
    /// [`SessionError::InvalidState`] while streaming.
    #[instrument(skip(self), fields(buffer = %self.buffer_id))]
    pub fn accept_reject_block(
        &mut self,
        block_id: &BlockId,
        accept: bool,
    ) -> Result<ResolveOutcome, SessionError> {
        if self.state != SessionState::Reviewing {
            return Err(self.invalid_state("accept_reject_block"));
        }
        let block = *self
            .registry
            .get(block_id)
            .ok_or(SessionError::BlockNotFound(*block_id))?;

        self.resolve(&block, accept)?;
        self.registry.sync(&self.tracker.spans());

        let remaining_blocks = self.registry.len();
        let session_closed = remaining_blocks == 0;
        info!(
            block = %block.id,
            accept,
            start_line = block.start_line,
            remaining_blocks,
            "Block resolved"
        );
        if session_closed {
            self.close(accept);
        } else {
            self.notify(ApplyStatus::Done);
        }
        Ok(ResolveOutcome {
            block,
            remaining_blocks,
            session_closed,
        })
    }

    /// Applies one resolution to buffer, tracker and registry, without
    /// notifying.
    fn resolve(&mut self, block: &Block, accept: bool) -> Result<(), SessionError> {
        let offset = if accept {
            -to_offset(block.num_red)
        } else {
            let line = self.tracker.to_buffer_line(block.start_line);
            let mut buffer = self.buffer.lock();
            let line_count = buffer.line_count();
            if line + block.num_green > line_count {
                return Err(SessionError::StreamDesync {
                    line: line + block.num_green,
                    line_count,
                });
            }
            let ghosts: Vec<String> = self.tracker.removed_lines()
                [self.tracker.removed_before(block.start_line)..]
                .iter()
                .take(block.num_red)
                .map(|ghost| ghost.text.clone())
                .collect();
            buffer.delete_lines(line, block.num_green)?;
            buffer.insert_lines(line, &ghosts)?;
            -to_offset(block.num_green)
        };

        if block.num_red > 0 {
            self.tracker.take_removed_at(block.start_line, block.num_red);
        }
        if block.num_green > 0 {
            self.tracker.take_added_at(block.start_line + block.num_red);
        }
        self.registry.remove(&block.id);
        self.tracker.shift_after(block.start_line, offset);
        self.registry.shift_after(block.start_line, offset);
        Ok(())
    }

    /// Resolves every block and closes the session.
    ///
    /// Accepting drops the ghost rows. Rejecting restores blocks from last
    /// to first, which leaves earlier positions valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer refuses a restore.
    #[instrument(skip(self), fields(buffer = %self.buffer_id))]
    pub fn clear(&mut self, accept: bool) -> Result<(), SessionError> {
        if !accept {
            let blocks: Vec<Block> = self.registry.blocks().iter().rev().copied().collect();
            for block in &blocks {
                self.resolve(block, false)?;
            }
        }
        self.close(accept);
        Ok(())
    }

    fn close(&mut self, accept: bool) {
        self.tracker.clear();
        self.registry.clear();
        self.cancel.cancel();
        self.state = SessionState::Idle;
        self.listening = false;
        info!(buffer = %self.buffer_id, accept, "Session closed");
        self.notify(ApplyStatus::Closed);
    }

    /// Drops all tracking without touching the buffer. Used when a newer
    /// session supersedes this one.
    pub fn discard(&mut self) {
        self.cancel.cancel();
        self.tracker.clear();
        self.registry.clear();
        self.state = SessionState::Idle;
        self.listening = false;
    }

    /// Reconciles a line-count change the host made at `buffer_line`.
    ///
    /// Returns `false` if the edit was ignored because the session is not
    /// listening. A session whose last block disappears closes.
    pub fn apply_external_edit(&mut self, buffer_line: usize, line_delta: isize) -> bool {
        if !self.listening {
            debug!(
                buffer = %self.buffer_id,
                buffer_line,
                line_delta,
                "External edit ignored while streaming"
            );
            return false;
        }
        let shift = self.tracker.apply_external_edit(buffer_line, line_delta);
        if shift == RowShift::None {
            return true;
        }
        self.registry.remap(&shift);
        self.registry.sync(&self.tracker.spans());
        debug!(buffer = %self.buffer_id, buffer_line, line_delta, "External edit applied");

        if self.registry.is_empty() {
            self.close(true);
        } else {
            self.notify(ApplyStatus::Done);
        }
        true
    }
}

fn ensure_line<B: TextBuffer + ?Sized>(buffer: &B, line: usize) -> Result<(), SessionError> {
    let line_count = buffer.line_count();
    if line < line_count {
        Ok(())
    } else {
        Err(SessionError::StreamDesync { line, line_count })
    }
}

fn to_offset(count: usize) -> isize {
    isize::try_from(count).unwrap_or(isize::MAX)
}
