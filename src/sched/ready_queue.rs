//! Priority bitmap ready queue.
//!
//! One FIFO per priority level plus a bitmap with one bit per level. Bit
//! `n` is set iff level `n` has at least one ready thread, so the most
//! urgent ready level is the lowest set bit. The dispatch candidate is kept
//! in `cache` and refreshed on every mutation.

use super::list::{List, SchedLink};
use crate::config::NUM_PRIORITY_LEVELS;
use crate::thread::table::ThreadTable;
use crate::thread::{Membership, Priority};
use core::array;

const WORD_BITS: usize = u32::BITS as usize;
const BITMAP_WORDS: usize = (NUM_PRIORITY_LEVELS + WORD_BITS - 1) / WORD_BITS;

#[derive(Debug)]
pub(crate) struct ReadyQueue {
    bitmap: [u32; BITMAP_WORDS],
    queues: [List<SchedLink>; NUM_PRIORITY_LEVELS],
    cache: Option<u16>,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            bitmap: [0; BITMAP_WORDS],
            queues: array::from_fn(|_| List::new()),
            cache: None,
        }
    }

    /// Append `slot` to the tail of its priority level.
    ///
    /// # Panics
    ///
    /// Panics if the thread's priority is out of range.
    pub(crate) fn add(&mut self, table: &mut ThreadTable, slot: u16) {
        let priority = table.tcb(slot).priority;
        let level = priority.level();

        self.queues[level].push_back(table, slot);
        self.bitmap[level / WORD_BITS] |= 1 << (level % WORD_BITS);
        table.tcb_mut(slot).membership = Membership::Ready;

        let preempts_cache = match self.cache {
            Some(cached) => priority.is_higher_than(table.tcb(cached).priority),
            None => true,
        };
        if preempts_cache {
            self.cache = Some(slot);
        }
    }

    /// Unlink `slot` from its priority level.
    pub(crate) fn remove(&mut self, table: &mut ThreadTable, slot: u16) {
        let level = table.tcb(slot).priority.level();

        self.queues[level].remove(table, slot);
        if self.queues[level].is_empty() {
            self.bitmap[level / WORD_BITS] &= !(1 << (level % WORD_BITS));
        }
        table.tcb_mut(slot).membership = Membership::Detached;

        if self.cache == Some(slot) {
            self.cache = self.highest_level().and_then(|level| self.queues[level].head());
        }
    }

    /// Re-queue `slot` behind its equal-priority peers.
    pub(crate) fn move_to_tail(&mut self, table: &mut ThreadTable, slot: u16) {
        self.remove(table, slot);
        self.add(table, slot);
    }

    /// Thread that would be dispatched now.
    pub(crate) fn next_ready(&self) -> Option<u16> {
        self.cache
    }

    pub(crate) fn highest_ready_priority(&self) -> Option<Priority> {
        self.highest_level().and_then(Priority::from_level)
    }

    #[cfg(test)]
    pub(crate) fn level_len(&self, table: &ThreadTable, priority: Priority) -> usize {
        self.queues[priority.level()].len(table)
    }

    /// Slots queued at `priority`, head first.
    pub(crate) fn level_iter<'a>(
        &self,
        table: &'a ThreadTable,
        priority: Priority,
    ) -> impl Iterator<Item = u16> + 'a {
        self.queues[priority.level()].iter(table)
    }

    fn highest_level(&self) -> Option<usize> {
        self.bitmap
            .iter()
            .enumerate()
            .find(|(_, word)| **word != 0)
            .map(|(index, word)| index * WORD_BITS + word.trailing_zeros() as usize)
    }
}
