//! Position bookkeeping for added lines and ghost rows.
//!
//! All positions are view lines: the live buffer's lines interleaved with
//! one ghost row per removed line. A ghost row sits directly above the
//! live line that followed the removed text. Buffer coordinates are
//! recovered with [`PositionTracker::to_buffer_line`].

use serde::Serialize;
use std::cmp::Ordering;

use super::InvariantViolation;

/// A contiguous run of view lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TrackedRange {
    /// First view line of the run.
    pub start_line: usize,
    /// Number of lines in the run.
    pub line_count: usize,
}

impl TrackedRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(start_line: usize, line_count: usize) -> Self {
        Self {
            start_line,
            line_count,
        }
    }

    /// One past the last line of the range.
    #[must_use]
    pub const fn end_line(&self) -> usize {
        self.start_line + self.line_count
    }
}

/// A ghost row: one removed line, kept for rendering and restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedLine {
    /// View line the ghost occupies.
    pub line: usize,
    /// Original text of the removed line.
    pub text: String,
}

/// A block-shaped grouping of tracked rows, before identity is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// First view line of the block (its first ghost row, if any).
    pub start_line: usize,
    /// Number of ghost rows.
    pub num_red: usize,
    /// Number of added rows following the ghost rows.
    pub num_green: usize,
}

/// How an external edit moved view rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowShift {
    /// Nothing moved.
    None,
    /// `count` live rows were inserted at view row `at`.
    Inserted {
        /// View row of the first inserted line.
        at: usize,
        /// Number of inserted lines.
        count: usize,
    },
    /// The listed live rows, ascending, were deleted.
    Deleted {
        /// View rows that no longer exist.
        rows: Vec<usize>,
    },
}

impl RowShift {
    /// New position of a surviving row.
    #[must_use]
    pub fn apply(&self, row: usize) -> usize {
        match self {
            Self::None => row,
            Self::Inserted { at, count } if row >= *at => row + count,
            Self::Inserted { .. } => row,
            Self::Deleted { rows } => row - deleted_before(rows, row),
        }
    }

    /// Number of deleted rows in `start..end`.
    #[must_use]
    pub fn deleted_within(&self, start: usize, end: usize) -> usize {
        match self {
            Self::Deleted { rows } => deleted_before(rows, end) - deleted_before(rows, start),
            _ => 0,
        }
    }
}

fn deleted_before(rows: &[usize], row: usize) -> usize {
    rows.partition_point(|&r| r < row)
}

pub(crate) fn translate(line: usize, offset: isize) -> usize {
    match line.checked_add_signed(offset) {
        Some(moved) => moved,
        None => panic!("shifting line {line} by {offset} moves it above the first line"),
    }
}

/// Ordered sets of added ranges and ghost rows for one session.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    added: Vec<TrackedRange>,
    removed: Vec<RemovedLine>,
}

impl PositionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Added ranges in ascending order.
    #[must_use]
    pub fn added_ranges(&self) -> &[TrackedRange] {
        &self.added
    }

    /// Ghost rows in ascending order.
    #[must_use]
    pub fn removed_lines(&self) -> &[RemovedLine] {
        &self.removed
    }

    /// Records `line_count` added lines starting at `at_line`.
    ///
    /// Extends the range that ends exactly at `at_line` instead of opening a
    /// new one.
    pub fn add_added(&mut self, at_line: usize, line_count: usize) {
        if line_count == 0 {
            return;
        }
        let idx = self.added.partition_point(|r| r.start_line < at_line);
        match idx.checked_sub(1).map(|prev| &mut self.added[prev]) {
            Some(prev) if prev.end_line() == at_line => prev.line_count += line_count,
            _ => self.added.insert(idx, TrackedRange::new(at_line, line_count)),
        }
        self.assert_invariants();
    }

    /// Records one ghost row per entry of `lines`, starting at `at_line`.
    pub fn add_removed(&mut self, at_line: usize, lines: &[String]) {
        let idx = self.removed.partition_point(|r| r.line < at_line);
        for (i, text) in lines.iter().enumerate() {
            self.removed.insert(
                idx + i,
                RemovedLine {
                    line: at_line + i,
                    text: text.clone(),
                },
            );
        }
        self.assert_invariants();
    }

    /// Translates every row at or after `line` by `offset`.
    ///
    /// # Panics
    ///
    /// Panics if a row would move above line 0 or the result overlaps,
    /// which means the caller's arithmetic is broken.
    pub fn shift_after(&mut self, line: usize, offset: isize) {
        if offset == 0 {
            return;
        }
        for range in self.added.iter_mut().filter(|r| r.start_line >= line) {
            range.start_line = translate(range.start_line, offset);
        }
        for ghost in self.removed.iter_mut().filter(|r| r.line >= line) {
            ghost.line = translate(ghost.line, offset);
        }
        self.assert_invariants();
    }

    /// Removes and returns the added range starting exactly at `line`.
    pub fn take_added_at(&mut self, line: usize) -> Option<TrackedRange> {
        let idx = self.added.iter().position(|r| r.start_line == line)?;
        Some(self.added.remove(idx))
    }

    /// Removes and returns up to `count` consecutive ghost rows starting at
    /// `line`. Empty when no ghost row starts there.
    pub fn take_removed_at(&mut self, line: usize, count: usize) -> Vec<RemovedLine> {
        let Some(first) = self.removed.iter().position(|r| r.line == line) else {
            return Vec::new();
        };
        let run = self.removed[first..]
            .iter()
            .enumerate()
            .take(count)
            .take_while(|(offset, r)| r.line == line + offset)
            .count();
        self.removed.drain(first..first + run).collect()
    }

    /// Drops all tracked rows.
    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
    }

    /// Number of ghost rows strictly above `view_line`.
    #[must_use]
    pub fn removed_before(&self, view_line: usize) -> usize {
        self.removed.partition_point(|r| r.line < view_line)
    }

    /// Converts a view line to the buffer line it maps to.
    #[must_use]
    pub fn to_buffer_line(&self, view_line: usize) -> usize {
        view_line - self.removed_before(view_line)
    }

    /// Converts a buffer line to its view line, stepping over ghost rows
    /// anchored above it.
    #[must_use]
    pub fn to_view_line(&self, buffer_line: usize) -> usize {
        let mut view = buffer_line;
        for ghost in &self.removed {
            if ghost.line <= view {
                view += 1;
            } else {
                break;
            }
        }
        view
    }

    /// View row where an edit at `buffer_line` lands: above any ghost rows
    /// anchored to that buffer line.
    #[must_use]
    pub fn edit_anchor(&self, buffer_line: usize) -> usize {
        let anchored_above = self
            .removed
            .iter()
            .enumerate()
            .take_while(|(i, ghost)| ghost.line - i < buffer_line)
            .count();
        buffer_line + anchored_above
    }

    /// Reconciles a line-count change made outside the engine.
    ///
    /// `buffer_line` is in buffer coordinates. A positive `delta` inserts
    /// rows at [`edit_anchor`](Self::edit_anchor); an insertion strictly
    /// inside an added range grows it. A negative `delta` deletes the live
    /// rows of buffer lines `buffer_line..buffer_line + |delta|`; added
    /// ranges lose the deleted rows (and are dropped when emptied) and every
    /// row below closes up. Ghost rows are never deleted.
    pub fn apply_external_edit(&mut self, buffer_line: usize, delta: isize) -> RowShift {
        let count = delta.unsigned_abs();
        let shift = match delta.cmp(&0) {
            Ordering::Equal => return RowShift::None,
            Ordering::Greater => RowShift::Inserted {
                at: self.edit_anchor(buffer_line),
                count,
            },
            Ordering::Less => RowShift::Deleted {
                rows: (buffer_line..buffer_line + count)
                    .map(|line| self.to_view_line(line))
                    .collect(),
            },
        };

        if let RowShift::Inserted { at, count } = shift {
            for range in &mut self.added {
                if range.start_line < at && at < range.end_line() {
                    range.line_count += count;
                }
            }
        }
        for range in &mut self.added {
            let gone = shift.deleted_within(range.start_line, range.end_line());
            range.start_line = shift.apply(range.start_line);
            range.line_count -= gone;
        }
        self.added.retain(|range| range.line_count > 0);
        for ghost in &mut self.removed {
            ghost.line = shift.apply(ghost.line);
        }
        self.assert_invariants();
        shift
    }

    /// Groups tracked rows into block spans, in view order.
    ///
    /// A run of consecutive ghost rows pairs with the added range starting
    /// right below it; unpaired runs and ranges form spans on their own.
    #[must_use]
    pub fn spans(&self) -> Vec<BlockSpan> {
        let mut spans = Vec::new();
        let mut ai = 0;
        let mut ri = 0;

        while ri < self.removed.len() || ai < self.added.len() {
            let next_added = self.added.get(ai);
            let ghost_first = match (self.removed.get(ri), next_added) {
                (Some(ghost), Some(range)) => ghost.line < range.start_line,
                (Some(_), None) => true,
                _ => false,
            };

            if ghost_first {
                let start = self.removed[ri].line;
                let mut num_red = 0;
                while ri < self.removed.len() && self.removed[ri].line == start + num_red {
                    num_red += 1;
                    ri += 1;
                }
                let num_green = match self.added.get(ai) {
                    Some(range) if range.start_line == start + num_red => {
                        ai += 1;
                        range.line_count
                    }
                    _ => 0,
                };
                spans.push(BlockSpan {
                    start_line: start,
                    num_red,
                    num_green,
                });
            } else if let Some(range) = next_added {
                spans.push(BlockSpan {
                    start_line: range.start_line,
                    num_red: 0,
                    num_green: range.line_count,
                });
                ai += 1;
            }
        }
        spans
    }

    /// Checks ordering, non-overlap and non-empty ranges.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if let Some(r) = self.added.iter().find(|r| r.line_count == 0) {
            return Err(InvariantViolation::new(format!(
                "empty added range at line {}",
                r.start_line
            )));
        }
        let mut spans: Vec<(usize, usize)> = self
            .added
            .iter()
            .map(|r| (r.start_line, r.end_line()))
            .chain(self.removed.iter().map(|r| (r.line, r.line + 1)))
            .collect();
        if !self.added.is_sorted_by_key(|r| r.start_line)
            || !self.removed.is_sorted_by_key(|r| r.line)
        {
            return Err(InvariantViolation::new("tracked rows out of order"));
        }
        spans.sort_unstable();
        for pair in spans.windows(2) {
            if pair[0].1 > pair[1].0 {
                return Err(InvariantViolation::new(format!(
                    "rows {}..{} overlap rows {}..{}",
                    pair[0].0, pair[0].1, pair[1].0, pair[1].1
                )));
            }
        }
        Ok(())
    }

    fn assert_invariants(&self) {
        if let Err(violation) = self.validate() {
            panic!("position tracker corrupted: {violation}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn add_added_coalesces_contiguous_ranges() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(3, 1);
        tracker.add_added(4, 2);
        tracker.add_added(9, 1);
        assert_eq!(
            tracker.added_ranges(),
            [TrackedRange::new(3, 3), TrackedRange::new(9, 1)]
        );
    }

    #[test]
    fn add_removed_keeps_one_unit_per_line() {
        let mut tracker = PositionTracker::new();
        tracker.add_removed(2, &texts(&["b", "c"]));
        let lines: Vec<_> = tracker.removed_lines().iter().map(|r| r.line).collect();
        assert_eq!(lines, [2, 3]);
        assert_eq!(tracker.removed_lines()[1].text, "c");
    }

    #[test]
    fn shift_after_leaves_earlier_rows() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(1, 1);
        tracker.add_removed(5, &texts(&["x"]));
        tracker.add_added(8, 2);

        tracker.shift_after(5, 3);

        assert_eq!(
            tracker.added_ranges(),
            [TrackedRange::new(1, 1), TrackedRange::new(11, 2)]
        );
        assert_eq!(tracker.removed_lines()[0].line, 8);
    }

    #[test]
    fn shift_after_negative_offset() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(6, 1);
        tracker.shift_after(2, -4);
        assert_eq!(tracker.added_ranges(), [TrackedRange::new(2, 1)]);
    }

    #[test]
    #[should_panic(expected = "above the first line")]
    fn shift_above_first_line_panics() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(1, 1);
        tracker.shift_after(0, -2);
    }

    #[test]
    #[should_panic(expected = "position tracker corrupted")]
    fn overlapping_shift_panics() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(0, 2);
        tracker.add_added(4, 1);
        tracker.shift_after(4, -3);
    }

    #[test]
    fn take_removed_takes_only_consecutive_run() {
        let mut tracker = PositionTracker::new();
        tracker.add_removed(1, &texts(&["a", "b"]));
        tracker.add_removed(5, &texts(&["c"]));

        let run = tracker.take_removed_at(1, 10);
        assert_eq!(run.len(), 2);
        assert_eq!(tracker.removed_lines().len(), 1);
        assert!(tracker.take_removed_at(2, 1).is_empty());
    }

    #[test]
    fn take_removed_stops_at_count() {
        let mut tracker = PositionTracker::new();
        tracker.add_removed(0, &texts(&["a", "b", "c"]));

        let taken = tracker.take_removed_at(0, 1);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].text, "a");
        let rest: Vec<usize> = tracker.removed_lines().iter().map(|r| r.line).collect();
        assert_eq!(rest, [1, 2]);
    }

    #[test]
    fn take_added_at_exact_start_only() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(2, 3);
        assert!(tracker.take_added_at(3).is_none());
        assert_eq!(tracker.take_added_at(2), Some(TrackedRange::new(2, 3)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn view_and_buffer_lines_round_trip() {
        // view: 0 a | 1 ~b | 2 x | 3 c
        let mut tracker = PositionTracker::new();
        tracker.add_removed(1, &texts(&["b"]));
        tracker.add_added(2, 1);

        assert_eq!(tracker.to_buffer_line(0), 0);
        assert_eq!(tracker.to_buffer_line(2), 1);
        assert_eq!(tracker.to_buffer_line(3), 2);
        assert_eq!(tracker.to_view_line(0), 0);
        assert_eq!(tracker.to_view_line(1), 2);
        assert_eq!(tracker.to_view_line(2), 3);
    }

    #[test]
    fn spans_pair_ghosts_with_following_additions() {
        let mut tracker = PositionTracker::new();
        tracker.add_removed(1, &texts(&["b"]));
        tracker.add_added(2, 1);
        tracker.add_removed(5, &texts(&["e", "f"]));
        tracker.add_added(9, 3);

        assert_eq!(
            tracker.spans(),
            [
                BlockSpan {
                    start_line: 1,
                    num_red: 1,
                    num_green: 1
                },
                BlockSpan {
                    start_line: 5,
                    num_red: 2,
                    num_green: 0
                },
                BlockSpan {
                    start_line: 9,
                    num_red: 0,
                    num_green: 3
                },
            ]
        );
    }

    #[test]
    fn adjacent_added_ranges_stay_separate_spans() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(0, 1);
        tracker.add_added(2, 1);
        tracker.shift_after(2, -1);
        assert_eq!(tracker.spans().len(), 2);
    }

    #[test]
    fn external_insert_inside_added_range_grows_it() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(2, 3);
        tracker.add_added(8, 1);

        let shift = tracker.apply_external_edit(3, 2);

        assert_eq!(shift, RowShift::Inserted { at: 3, count: 2 });
        assert_eq!(
            tracker.added_ranges(),
            [TrackedRange::new(2, 5), TrackedRange::new(10, 1)]
        );
    }

    #[test]
    fn external_delete_inside_added_range_shrinks_it() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(2, 4);
        tracker.add_removed(7, &texts(&["z"]));

        tracker.apply_external_edit(3, -2);

        assert_eq!(tracker.added_ranges(), [TrackedRange::new(2, 2)]);
        assert_eq!(tracker.removed_lines()[0].line, 5);
    }

    #[test]
    fn external_delete_of_whole_range_drops_it() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(2, 2);
        tracker.add_added(6, 1);

        tracker.apply_external_edit(1, -3);

        assert_eq!(tracker.added_ranges(), [TrackedRange::new(3, 1)]);
    }

    #[test]
    fn external_delete_keeps_ghost_rows() {
        // view: 0 a | 1 ~b | 2 c | 3 d
        let mut tracker = PositionTracker::new();
        tracker.add_removed(1, &texts(&["b"]));

        let shift = tracker.apply_external_edit(0, -2);

        assert_eq!(shift, RowShift::Deleted { rows: vec![0, 2] });
        assert_eq!(tracker.removed_lines()[0].line, 0);
    }

    #[test]
    fn external_insert_at_range_start_shifts_range() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(4, 1);
        assert_eq!(
            tracker.apply_external_edit(4, 2),
            RowShift::Inserted { at: 4, count: 2 }
        );
        assert_eq!(tracker.added_ranges(), [TrackedRange::new(6, 1)]);
    }

    #[test]
    fn external_insert_lands_above_anchored_ghosts() {
        // view: 0 a | 1 ~b | 2 x | 3 c
        let mut tracker = PositionTracker::new();
        tracker.add_removed(1, &texts(&["b"]));
        tracker.add_added(2, 1);

        assert_eq!(tracker.edit_anchor(1), 1);
        tracker.apply_external_edit(1, 1);

        assert_eq!(tracker.removed_lines()[0].line, 2);
        assert_eq!(tracker.added_ranges(), [TrackedRange::new(3, 1)]);
    }

    #[test]
    fn zero_delta_edit_is_noop() {
        let mut tracker = PositionTracker::new();
        tracker.add_added(4, 1);
        assert_eq!(tracker.apply_external_edit(0, 0), RowShift::None);
        assert_eq!(tracker.added_ranges(), [TrackedRange::new(4, 1)]);
    }

    #[test]
    fn row_shift_maps_rows() {
        let inserted = RowShift::Inserted { at: 3, count: 2 };
        assert_eq!(inserted.apply(2), 2);
        assert_eq!(inserted.apply(3), 5);

        let deleted = RowShift::Deleted { rows: vec![1, 2] };
        assert_eq!(deleted.apply(0), 0);
        assert_eq!(deleted.apply(4), 2);
        assert_eq!(deleted.deleted_within(0, 2), 1);
    }
}
