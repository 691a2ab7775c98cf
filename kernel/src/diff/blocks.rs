//! Block identity over tracker spans.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::InvariantViolation;
use super::tracker::{BlockSpan, RowShift, translate};

/// Stable identity of a block for the lifetime of its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BlockId(Uuid);

impl BlockId {
    /// Mints a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One independently reviewable change: `num_red` ghost rows followed by
/// `num_green` added rows, starting at view line `start_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Block id.
    pub id: BlockId,
    /// First view line.
    pub start_line: usize,
    /// Removed lines.
    pub num_red: usize,
    /// Added lines.
    pub num_green: usize,
}

impl Block {
    /// One past the last view line of the block.
    #[must_use]
    pub const fn end_line(&self) -> usize {
        self.start_line + self.num_red + self.num_green
    }
}

/// Ordered set of blocks for one session.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
}

impl BlockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks in ascending position.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of unresolved blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether every block has been resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Looks a block up by id.
    #[must_use]
    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == *id)
    }

    /// Removes a block by id.
    pub fn remove(&mut self, id: &BlockId) -> Option<Block> {
        let idx = self.blocks.iter().position(|b| b.id == *id)?;
        Some(self.blocks.remove(idx))
    }

    /// Drops every block.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Replaces the block set with `spans`.
    ///
    /// A span that runs over the start of a known block is cut there, so
    /// blocks brought next to each other by an external edit stay separate.
    /// A piece starting where a known block starts inherits that block's
    /// id; other pieces get new ids. Blocks with no piece are dropped.
    /// Returns the number of new blocks.
    pub fn sync(&mut self, spans: &[BlockSpan]) -> usize {
        let pieces: Vec<BlockSpan> = spans.iter().flat_map(|span| self.split(span)).collect();
        let mut minted = 0;
        let next: Vec<Block> = pieces
            .iter()
            .map(|piece| {
                let id = match self
                    .blocks
                    .binary_search_by_key(&piece.start_line, |b| b.start_line)
                {
                    Ok(idx) => self.blocks[idx].id,
                    Err(_) => {
                        minted += 1;
                        BlockId::generate()
                    }
                };
                Block {
                    id,
                    start_line: piece.start_line,
                    num_red: piece.num_red,
                    num_green: piece.num_green,
                }
            })
            .collect();
        self.blocks = next;
        self.assert_invariants();
        minted
    }

    /// Cuts `span` at every known block start strictly inside it.
    fn split(&self, span: &BlockSpan) -> Vec<BlockSpan> {
        let end = span.start_line + span.num_red + span.num_green;
        let ghost_end = span.start_line + span.num_red;
        let first = self.blocks.partition_point(|b| b.start_line <= span.start_line);
        let cuts = self.blocks[first..]
            .iter()
            .map(|b| b.start_line)
            .take_while(|&line| line < end);

        let mut pieces = Vec::new();
        let mut start = span.start_line;
        for cut in cuts.chain(std::iter::once(end)) {
            let ghosts_to = ghost_end.clamp(start, cut);
            pieces.push(BlockSpan {
                start_line: start,
                num_red: ghosts_to - start,
                num_green: cut - ghosts_to,
            });
            start = cut;
        }
        pieces
    }

    /// Translates every block starting at or after `line` by `offset`.
    ///
    /// # Panics
    ///
    /// Panics if a block would move above line 0.
    pub fn shift_after(&mut self, line: usize, offset: isize) {
        for block in self.blocks.iter_mut().filter(|b| b.start_line >= line) {
            block.start_line = translate(block.start_line, offset);
        }
    }

    /// Moves block starts the way an external edit moved rows.
    ///
    /// Added-only blocks whose rows were all deleted are dropped, so no two
    /// blocks collapse onto one start. Counts are refreshed by the next
    /// [`sync`](Self::sync).
    pub fn remap(&mut self, shift: &RowShift) {
        self.blocks.retain(|b| {
            b.num_red > 0 || shift.deleted_within(b.start_line, b.end_line()) < b.num_green
        });
        for block in &mut self.blocks {
            block.start_line = shift.apply(block.start_line);
        }
    }

    /// Checks ordering, non-overlap and non-empty blocks.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if let Some(b) = self.blocks.iter().find(|b| b.num_red + b.num_green == 0) {
            return Err(InvariantViolation::new(format!("empty block {}", b.id)));
        }
        for pair in self.blocks.windows(2) {
            if pair[0].end_line() > pair[1].start_line {
                return Err(InvariantViolation::new(format!(
                    "block at {} overlaps block at {}",
                    pair[0].start_line, pair[1].start_line
                )));
            }
        }
        Ok(())
    }

    fn assert_invariants(&self) {
        if let Err(violation) = self.validate() {
            panic!("block registry corrupted: {violation}");
        }
    }
}
