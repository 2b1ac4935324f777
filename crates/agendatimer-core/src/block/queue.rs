//! Ordered block queue with skip-aware rotation.
//!
//! The active block is tracked by the `is_active` flag on the blocks
//! themselves; every mutation goes through [`BlockQueue::activate_at`] or
//! [`BlockQueue::deactivate_all`] so at most one flag is ever set.
//!
//! All operations are total. Unknown ids and out-of-range indices are ignored
//! and callers observe the no-op through unchanged queries.

use serde::{Deserialize, Serialize};

use super::{round_minutes, Block};

/// Planned-time totals over the queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct QueueSummary {
    pub block_count: usize,
    pub done_count: usize,
    pub total_minutes: f64,
    pub done_minutes: f64,
    pub remaining_minutes: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Default)]
pub struct BlockQueue {
    blocks: Vec<Block>,
    /// Bumped on every mutation; persistence compares it to decide whether to save.
    revision: u64,
}

impl BlockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted blocks.
    ///
    /// A stored active index wins over stored flags when it is in range, so a
    /// store that drifted into two active flags is normalized on load.
    pub fn from_parts(blocks: Vec<Block>, active_index: Option<usize>) -> Self {
        let mut queue = Self { blocks, revision: 0 };
        let flagged = queue.blocks.iter().position(|b| b.is_active);
        queue.deactivate_all();
        if let Some(i) = active_index.filter(|&i| i < queue.blocks.len()).or(flagged) {
            queue.activate_at(i);
        }
        queue.revision = 0;
        queue
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn all(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active(&self) -> Option<&Block> {
        self.blocks.iter().find(|b| b.is_active)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.blocks.iter().position(|b| b.is_active)
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// Leftmost block that is not done.
    pub fn first_unfinished_index(&self) -> Option<usize> {
        self.blocks.iter().position(|b| !b.is_done)
    }

    pub fn has_unfinished(&self) -> bool {
        self.first_unfinished_index().is_some()
    }

    /// The block that `advance()` would land on, when it differs from the
    /// active one. Does not mutate.
    pub fn peek_next(&self) -> Option<usize> {
        let from = self.scan_origin(Direction::Forward);
        self.scan(from, Direction::Forward)
            .filter(|&i| Some(i) != self.current_index())
    }

    pub fn summary(&self) -> QueueSummary {
        let mut summary = QueueSummary {
            block_count: self.blocks.len(),
            ..QueueSummary::default()
        };
        for block in &self.blocks {
            summary.total_minutes += block.duration_minutes;
            if block.is_done {
                summary.done_count += 1;
                summary.done_minutes += block.duration_minutes;
            } else {
                summary.remaining_minutes += block.duration_minutes;
            }
        }
        summary.total_minutes = round_minutes(summary.total_minutes);
        summary.done_minutes = round_minutes(summary.done_minutes);
        summary.remaining_minutes = round_minutes(summary.remaining_minutes);
        summary
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Append a block. The first block of an empty queue becomes active.
    pub fn add(&mut self, title: impl Into<String>, duration_minutes: f64) -> &Block {
        let was_empty = self.blocks.is_empty();
        self.blocks.push(Block::new(title, duration_minutes));
        let index = self.blocks.len() - 1;
        if was_empty {
            self.activate_at(index);
        }
        self.touch();
        &self.blocks[index]
    }

    /// Delete a block. Removing the active block leaves nothing active.
    pub fn remove(&mut self, id: &str) -> Option<Block> {
        let index = self.index_of(id)?;
        let removed = self.blocks.remove(index);
        self.touch();
        Some(removed)
    }

    pub fn update(&mut self, id: &str, title: impl Into<String>, duration_minutes: f64) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        block.title = title.into();
        block.duration_minutes = round_minutes(duration_minutes);
        self.touch();
        true
    }

    pub fn toggle_done(&mut self, id: &str) -> bool {
        self.set_done(id, None)
    }

    pub fn mark_done(&mut self, id: &str) -> bool {
        self.set_done(id, Some(true))
    }

    pub fn mark_not_done(&mut self, id: &str) -> bool {
        self.set_done(id, Some(false))
    }

    /// Activate the block at `index`.
    ///
    /// A done target redirects to the nearest not-done block scanning forward
    /// from it; with nothing unfinished the call is a no-op.
    pub fn set_active(&mut self, index: usize) -> Option<usize> {
        let target = self.blocks.get(index)?;
        let resolved = if target.is_done {
            let origin = if index == 0 { self.blocks.len() - 1 } else { index - 1 };
            self.scan(origin, Direction::Forward)?
        } else {
            index
        };
        self.deactivate_all();
        self.activate_at(resolved);
        self.touch();
        Some(resolved)
    }

    /// Move to the next not-done block, wrapping at the end.
    ///
    /// Returns `None` and leaves nothing active when every block is done.
    pub fn advance(&mut self) -> Option<usize> {
        self.rotate(Direction::Forward)
    }

    /// Move to the previous not-done block, wrapping at the start.
    pub fn retreat(&mut self) -> Option<usize> {
        self.rotate(Direction::Backward)
    }

    /// Reorder a block. The active flag travels with the block.
    pub fn move_block(&mut self, from: usize, to: usize) -> bool {
        if from >= self.blocks.len() || to >= self.blocks.len() || from == to {
            return false;
        }
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        self.touch();
        true
    }

    pub fn clear(&mut self) {
        if !self.blocks.is_empty() {
            self.blocks.clear();
            self.touch();
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn rotate(&mut self, direction: Direction) -> Option<usize> {
        if self.blocks.is_empty() {
            return None;
        }
        let origin = self.scan_origin(direction);
        self.deactivate_all();
        self.touch();
        let found = self.scan(origin, direction)?;
        self.activate_at(found);
        tracing::debug!(index = found, ?direction, "block queue rotated");
        Some(found)
    }

    /// Position the scan starts one step away from. With nothing active the
    /// origin sits just outside the queue so the first probe is the first
    /// (or last) block.
    fn scan_origin(&self, direction: Direction) -> usize {
        match (self.current_index(), direction) {
            (Some(i), _) => i,
            (None, Direction::Forward) => self.blocks.len().saturating_sub(1),
            (None, Direction::Backward) => 0,
        }
    }

    /// Probe at most `len` positions starting one step past `origin`,
    /// wrapping around. The origin itself is probed last.
    fn scan(&self, origin: usize, direction: Direction) -> Option<usize> {
        let len = self.blocks.len();
        (1..=len)
            .map(|step| match direction {
                Direction::Forward => (origin + step) % len,
                Direction::Backward => (origin + len * 2 - step) % len,
            })
            .find(|&i| !self.blocks[i].is_done)
    }

    fn set_done(&mut self, id: &str, value: Option<bool>) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        block.is_done = value.unwrap_or(!block.is_done);
        self.touch();
        true
    }

    fn activate_at(&mut self, index: usize) {
        self.deactivate_all();
        if let Some(block) = self.blocks.get_mut(index) {
            block.is_active = true;
        }
    }

    fn deactivate_all(&mut self) {
        for block in &mut self.blocks {
            block.is_active = false;
        }
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
