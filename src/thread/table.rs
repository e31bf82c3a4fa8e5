//! Fixed-capacity arena of thread control blocks.

use super::{Priority, Thread, ThreadId, ThreadState};
use alloc::vec::Vec;

/// Thread control blocks indexed by slot.
///
/// Slots are handed out in order, then recycled through a free list once
/// released. Releasing a slot bumps its generation so older handles no
/// longer resolve.
#[derive(Debug)]
pub(crate) struct ThreadTable {
    slots: Vec<Thread>,
    free: Vec<u16>,
    capacity: usize,
}

impl ThreadTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            capacity,
        }
    }

    /// Claim a slot for a new thread; `None` when the table is full.
    pub(crate) fn allocate(
        &mut self,
        name: &'static str,
        priority: Priority,
        state: ThreadState,
    ) -> Option<u16> {
        if let Some(slot) = self.free.pop() {
            let generation = self.slots[slot as usize].generation;
            self.slots[slot as usize] = Thread::new(generation, name, priority, state);
            return Some(slot);
        }
        if self.slots.len() >= self.capacity {
            return None;
        }
        let slot = self.slots.len() as u16;
        self.slots.push(Thread::new(0, name, priority, state));
        Some(slot)
    }

    /// Return a slot to the free list.
    pub(crate) fn release(&mut self, slot: u16) {
        let thread = &mut self.slots[slot as usize];
        debug_assert!(thread.live, "slot {} released twice", slot);
        thread.live = false;
        thread.generation = thread.generation.wrapping_add(1);
        self.free.push(slot);
    }

    /// Resolve a handle to its slot.
    ///
    /// # Panics
    ///
    /// Panics on a handle whose slot has been released since it was issued.
    pub(crate) fn resolve(&self, id: ThreadId) -> u16 {
        let slot = id.slot();
        match self.slots.get(slot as usize) {
            Some(thread) if thread.live && thread.generation == id.generation() => slot,
            _ => panic!("stale thread handle {}", id),
        }
    }

    pub(crate) fn id_of(&self, slot: u16) -> ThreadId {
        ThreadId::new(slot, self.slots[slot as usize].generation)
    }

    pub(crate) fn tcb(&self, slot: u16) -> &Thread {
        &self.slots[slot as usize]
    }

    pub(crate) fn tcb_mut(&mut self, slot: u16) -> &mut Thread {
        &mut self.slots[slot as usize]
    }

    /// Live threads, in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u16, &Thread)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, thread)| thread.live)
            .map(|(slot, thread)| (slot as u16, thread))
    }

    #[cfg(test)]
    pub(crate) fn live_count(&self) -> usize {
        self.iter().count()
    }
}
