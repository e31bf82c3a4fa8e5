//! Wait queue roots.
//!
//! Synchronization objects do not embed their wait queue list; they hold a
//! [`WaitQueueId`] naming a root stored in the kernel, so every list
//! manipulation happens inside the scheduler's critical section.

use super::list::{List, SchedLink};
use alloc::vec::Vec;
use core::fmt;

/// Handle to a kernel-owned wait queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitQueueId {
    index: u16,
    generation: u16,
}

impl fmt::Display for WaitQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wq{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Root {
    generation: u16,
    live: bool,
    list: List<SchedLink>,
}

#[derive(Debug)]
pub(crate) struct WaitQueueTable {
    roots: Vec<Root>,
    free: Vec<u16>,
    capacity: usize,
}

impl WaitQueueTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            roots: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    pub(crate) fn create(&mut self) -> Option<WaitQueueId> {
        if let Some(index) = self.free.pop() {
            let root = &mut self.roots[index as usize];
            root.live = true;
            return Some(WaitQueueId {
                index,
                generation: root.generation,
            });
        }
        if self.roots.len() >= self.capacity {
            return None;
        }
        let index = self.roots.len() as u16;
        self.roots.push(Root {
            generation: 0,
            live: true,
            list: List::new(),
        });
        Some(WaitQueueId { index, generation: 0 })
    }

    /// Free a root.
    ///
    /// # Panics
    ///
    /// Panics if threads are still waiting on it.
    pub(crate) fn destroy(&mut self, id: WaitQueueId) {
        let root = self.root_mut(id);
        assert!(root.list.is_empty(), "wait queue {} destroyed with waiters", id);
        root.live = false;
        root.generation = root.generation.wrapping_add(1);
        self.free.push(id.index);
    }

    pub(crate) fn list(&self, id: WaitQueueId) -> &List<SchedLink> {
        &self.root(id).list
    }

    pub(crate) fn list_mut(&mut self, id: WaitQueueId) -> &mut List<SchedLink> {
        &mut self.root_mut(id).list
    }

    #[cfg(test)]
    pub(crate) fn live_count(&self) -> usize {
        self.roots.iter().filter(|root| root.live).count()
    }

    fn root(&self, id: WaitQueueId) -> &Root {
        match self.roots.get(id.index as usize) {
            Some(root) if root.live && root.generation == id.generation => root,
            _ => panic!("stale wait queue handle {}", id),
        }
    }

    fn root_mut(&mut self, id: WaitQueueId) -> &mut Root {
        match self.roots.get_mut(id.index as usize) {
            Some(root) if root.live && root.generation == id.generation => root,
            _ => panic!("stale wait queue handle {}", id),
        }
    }
}
