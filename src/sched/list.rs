//! Intrusive doubly linked lists over thread table slots.
//!
//! Links are stored inside the thread control blocks; a list only owns its
//! head and tail. Each thread carries two independent link sets so it can
//! sit in a scheduler list (ready queue or wait queue) and in the timeout
//! list at the same time.

use crate::thread::table::ThreadTable;
use crate::thread::Thread;
use core::marker::PhantomData;

/// Previous/next slot indices of one link set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    prev: Option<u16>,
    next: Option<u16>,
}

impl Links {
    pub(crate) fn is_unlinked(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

/// Selects which link set of a thread a list threads through.
pub(crate) trait Linkage {
    fn links(thread: &Thread) -> &Links;
    fn links_mut(thread: &mut Thread) -> &mut Links;
}

/// Ready queue and wait queue link.
#[derive(Debug)]
pub(crate) struct SchedLink;

/// Timeout list link.
#[derive(Debug)]
pub(crate) struct TimeoutLink;

impl Linkage for SchedLink {
    fn links(thread: &Thread) -> &Links {
        &thread.sched_link
    }

    fn links_mut(thread: &mut Thread) -> &mut Links {
        &mut thread.sched_link
    }
}

impl Linkage for TimeoutLink {
    fn links(thread: &Thread) -> &Links {
        &thread.timeout_link
    }

    fn links_mut(thread: &mut Thread) -> &mut Links {
        &mut thread.timeout_link
    }
}

/// Head and tail of an intrusive FIFO.
#[derive(Debug)]
pub(crate) struct List<L> {
    head: Option<u16>,
    tail: Option<u16>,
    _link: PhantomData<L>,
}

impl<L: Linkage> List<L> {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            _link: PhantomData,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn head(&self) -> Option<u16> {
        self.head
    }

    pub(crate) fn next(table: &ThreadTable, slot: u16) -> Option<u16> {
        L::links(table.tcb(slot)).next
    }

    /// Append `slot` at the tail.
    pub(crate) fn push_back(&mut self, table: &mut ThreadTable, slot: u16) {
        let links = L::links_mut(table.tcb_mut(slot));
        debug_assert!(links.is_unlinked(), "slot {} already linked", slot);
        links.prev = self.tail;
        links.next = None;

        match self.tail {
            Some(tail) => L::links_mut(table.tcb_mut(tail)).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    /// Insert `slot` right before `at`, which must be in this list.
    pub(crate) fn insert_before(&mut self, table: &mut ThreadTable, at: u16, slot: u16) {
        let prev = L::links(table.tcb(at)).prev;
        {
            let links = L::links_mut(table.tcb_mut(slot));
            debug_assert!(links.is_unlinked(), "slot {} already linked", slot);
            links.prev = prev;
            links.next = Some(at);
        }
        L::links_mut(table.tcb_mut(at)).prev = Some(slot);

        match prev {
            Some(prev) => L::links_mut(table.tcb_mut(prev)).next = Some(slot),
            None => self.head = Some(slot),
        }
    }

    /// Unlink `slot`, which must be in this list.
    pub(crate) fn remove(&mut self, table: &mut ThreadTable, slot: u16) {
        let Links { prev, next } = *L::links(table.tcb(slot));

        match prev {
            Some(prev) => L::links_mut(table.tcb_mut(prev)).next = next,
            None => {
                debug_assert_eq!(self.head, Some(slot), "slot {} not in this list", slot);
                self.head = next;
            }
        }
        match next {
            Some(next) => L::links_mut(table.tcb_mut(next)).prev = prev,
            None => self.tail = prev,
        }

        *L::links_mut(table.tcb_mut(slot)) = Links::default();
    }

    pub(crate) fn pop_front(&mut self, table: &mut ThreadTable) -> Option<u16> {
        let head = self.head?;
        self.remove(table, head);
        Some(head)
    }

    pub(crate) fn iter<'a>(&self, table: &'a ThreadTable) -> Iter<'a, L> {
        Iter {
            table,
            cursor: self.head,
            _link: PhantomData,
        }
    }

    pub(crate) fn len(&self, table: &ThreadTable) -> usize {
        self.iter(table).count()
    }
}

impl<L: Linkage> Default for List<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Front-to-back iterator over a list's slots.
pub(crate) struct Iter<'a, L> {
    table: &'a ThreadTable,
    cursor: Option<u16>,
    _link: PhantomData<L>,
}

impl<'a, L: Linkage> Iterator for Iter<'a, L> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        let slot = self.cursor?;
        self.cursor = L::links(self.table.tcb(slot)).next;
        Some(slot)
    }
}
