//! Thread control blocks and the thread state machine.
//!
//! Threads live in a fixed-capacity arena owned by the kernel and are
//! referred to from outside through generation-checked [`ThreadId`] handles.
//! A handle to a released slot is detected instead of silently aliasing the
//! slot's next occupant.

use crate::sched::list::Links;
use crate::sched::wait_queue::WaitQueueId;
use crate::sched::SWAP_OK;
use crate::time::TimeoutState;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;

pub mod builder;
pub mod priority;
pub(crate) mod table;

pub use builder::ThreadBuilder;
pub use priority::Priority;

/// Handle to a thread slot.
///
/// Handles are cheap to copy. The generation makes a handle to a released
/// and reused slot distinguishable from a handle to the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId {
    index: u16,
    generation: u16,
}

impl ThreadId {
    pub(crate) const fn new(index: u16, generation: u16) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the thread table.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this handle was issued.
    pub fn generation(self) -> u16 {
        self.generation
    }

    pub(crate) fn slot(self) -> u16 {
        self.index
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

bitflags! {
    /// Per-thread state flags.
    ///
    /// A thread with none of [`ThreadState::NOT_READY`] set and no active
    /// timeout is ready. Running is not a flag: it is the fact of being the
    /// kernel's current thread.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ThreadState: u8 {
        /// Created but not started yet.
        const PRESTART = 1 << 0;
        /// Blocked on a wait queue.
        const PENDING = 1 << 1;
        /// Explicitly suspended.
        const SUSPENDED = 1 << 2;
        /// Terminated; never runs again.
        const DEAD = 1 << 3;
        /// Bootstrap placeholder used before multithreading starts.
        const DUMMY = 1 << 4;
        /// Waiting inside a poll operation.
        const POLLING = 1 << 5;
    }
}

impl ThreadState {
    /// Flags that keep a thread out of the ready queue.
    pub const NOT_READY: ThreadState = ThreadState::PRESTART
        .union(ThreadState::PENDING)
        .union(ThreadState::SUSPENDED)
        .union(ThreadState::DEAD)
        .union(ThreadState::DUMMY);
}

/// Which scheduler list, if any, holds the thread's scheduling link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Membership {
    Detached,
    Ready,
    Waiting(WaitQueueId),
}

/// Thread control block.
#[derive(Debug)]
pub(crate) struct Thread {
    pub(crate) generation: u16,
    pub(crate) live: bool,
    pub(crate) name: &'static str,
    /// Effective priority: `base_priority` raised by any held ceiling.
    pub(crate) priority: Priority,
    pub(crate) base_priority: Priority,
    /// Ceilings of the mutexes the thread holds, in acquisition order.
    pub(crate) held_ceilings: Vec<Priority>,
    pub(crate) state: ThreadState,
    pub(crate) sched_locked: u8,
    pub(crate) membership: Membership,
    /// Ready queue or wait queue link, depending on `membership`.
    pub(crate) sched_link: Links,
    pub(crate) timeout_link: Links,
    pub(crate) timeout: TimeoutState,
    /// Ticks relative to the previous entry of the timeout list.
    pub(crate) timeout_delta: u32,
    pub(crate) swap_retval: i32,
}

impl Thread {
    pub(crate) fn new(generation: u16, name: &'static str, priority: Priority, state: ThreadState) -> Self {
        Self {
            generation,
            live: true,
            name,
            priority,
            base_priority: priority,
            held_ceilings: Vec::new(),
            state,
            sched_locked: 0,
            membership: Membership::Detached,
            sched_link: Links::default(),
            timeout_link: Links::default(),
            timeout: TimeoutState::Inactive,
            timeout_delta: 0,
            swap_retval: SWAP_OK,
        }
    }

    /// Ready predicate: no blocking flag and no running timeout.
    pub(crate) fn is_ready(&self) -> bool {
        !self.state.intersects(ThreadState::NOT_READY) && self.timeout != TimeoutState::Active
    }

    /// Base priority raised to the most urgent held ceiling.
    pub(crate) fn effective_priority(&self) -> Priority {
        self.held_ceilings
            .iter()
            .fold(self.base_priority, |priority, &ceiling| {
                if ceiling.is_higher_than(priority) {
                    ceiling
                } else {
                    priority
                }
            })
    }

    /// Preemptible class and not holding the scheduler lock.
    pub(crate) fn is_preemptible(&self) -> bool {
        self.priority.is_preemptible() && self.sched_locked == 0
    }
}
