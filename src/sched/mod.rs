//! Scheduler state and the blocking primitives built on it.
//!
//! [`SchedState`] gathers the thread table, the ready queue, the wait queue
//! roots and the timeout registry. It is only ever reached through the
//! kernel's critical section, so its methods take `&mut self` and never lock.

pub(crate) mod list;
pub mod observer;
pub(crate) mod ready_queue;
pub mod wait_queue;

pub use observer::SchedObserver;
pub use wait_queue::WaitQueueId;

use crate::config::KernelConfig;
use crate::errors::{KernelResult, SpawnError};
use crate::thread::table::ThreadTable;
use crate::thread::{Membership, Priority, ThreadState};
use crate::time::timeout_queue::TimeoutQueue;
use crate::time::{Timeout, TimeoutState};
use list::{List, SchedLink};
use ready_queue::ReadyQueue;
use wait_queue::WaitQueueTable;

/// Result code of a swap ended by an explicit wake.
pub const SWAP_OK: i32 = 0;

/// `EAGAIN` errno value.
pub const EAGAIN: i32 = 11;

/// Result code of a swap ended by timeout expiry.
pub const SWAP_TIMEOUT: i32 = -EAGAIN;

#[derive(Debug)]
pub(crate) struct SchedState {
    pub(crate) threads: ThreadTable,
    pub(crate) ready_q: ReadyQueue,
    pub(crate) wait_queues: WaitQueueTable,
    pub(crate) timeouts: TimeoutQueue,
    pub(crate) current: u16,
    pub(crate) idle: u16,
    pub(crate) bootstrap: u16,
    /// Set while expired timeouts are being handled.
    pub(crate) handling_timeouts: bool,
}

impl SchedState {
    /// Build the state with the idle thread ready and the bootstrap
    /// placeholder current.
    pub(crate) fn new(config: &KernelConfig) -> KernelResult<Self> {
        let mut threads = ThreadTable::new(config.max_threads);
        let idle = threads
            .allocate("idle", Priority::IDLE, ThreadState::empty())
            .ok_or(SpawnError::TooManyThreads)?;
        let bootstrap = threads
            .allocate("bootstrap", Priority::HIGHEST, ThreadState::DUMMY)
            .ok_or(SpawnError::TooManyThreads)?;

        let mut ready_q = ReadyQueue::new();
        ready_q.add(&mut threads, idle);

        Ok(Self {
            threads,
            ready_q,
            wait_queues: WaitQueueTable::new(config.max_wait_queues),
            timeouts: TimeoutQueue::new(),
            current: bootstrap,
            idle,
            bootstrap,
            handling_timeouts: false,
        })
    }

    /// Clear PRESTART and queue the thread if nothing else blocks it.
    ///
    /// Returns `true` if the thread was inserted into the ready queue.
    pub(crate) fn ready_thread(&mut self, slot: u16) -> bool {
        let tcb = self.threads.tcb_mut(slot);
        tcb.state.remove(ThreadState::PRESTART);
        if tcb.is_ready() && tcb.membership == Membership::Detached {
            self.ready_q.add(&mut self.threads, slot);
            true
        } else {
            false
        }
    }

    pub(crate) fn remove_from_ready_q(&mut self, slot: u16) {
        if self.threads.tcb(slot).membership == Membership::Ready {
            self.ready_q.remove(&mut self.threads, slot);
        }
    }

    /// Block `slot` on `wait_q`. Does not switch.
    ///
    /// # Panics
    ///
    /// Panics if the thread is already pending or is the idle thread.
    pub(crate) fn pend(&mut self, slot: u16, wait_q: WaitQueueId, timeout: Timeout) {
        assert!(slot != self.idle, "idle thread cannot pend");
        assert!(
            !self.threads.tcb(slot).state.contains(ThreadState::PENDING),
            "thread {} is already pending",
            self.threads.id_of(slot)
        );

        self.remove_from_ready_q(slot);
        self.wait_queues.list_mut(wait_q).push_back(&mut self.threads, slot);

        let tcb = self.threads.tcb_mut(slot);
        tcb.membership = Membership::Waiting(wait_q);
        tcb.state.insert(ThreadState::PENDING);
        tcb.swap_retval = SWAP_TIMEOUT;

        // a zero-tick bound still arms a timeout; it fires on the next announce
        let ticks = match timeout {
            Timeout::Forever => None,
            Timeout::NoWait => Some(0),
            Timeout::Ticks(ticks) => Some(ticks),
        };
        if let Some(ticks) = ticks {
            self.timeouts.add(&mut self.threads, slot, ticks);
        }
    }

    /// Take `slot` off its wait queue and cancel its timeout. Does not
    /// ready the thread.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not pending.
    pub(crate) fn unpend(&mut self, slot: u16) {
        let wait_q = match self.threads.tcb(slot).membership {
            Membership::Waiting(wait_q) => wait_q,
            _ => panic!("thread {} is not pending", self.threads.id_of(slot)),
        };

        self.wait_queues.list_mut(wait_q).remove(&mut self.threads, slot);
        let tcb = self.threads.tcb_mut(slot);
        tcb.membership = Membership::Detached;
        tcb.state.remove(ThreadState::PENDING);

        self.timeouts.abort(&mut self.threads, slot);
    }

    /// Unpend the oldest waiter of `wait_q`.
    ///
    /// While expired timeouts are being handled, waiters whose timeout has
    /// already fired are left for the expiry path.
    pub(crate) fn unpend_first(&mut self, wait_q: WaitQueueId) -> Option<u16> {
        let mut cursor = self.wait_queues.list(wait_q).head();
        while let Some(slot) = cursor {
            let expired =
                self.handling_timeouts && self.threads.tcb(slot).timeout == TimeoutState::Expired;
            if !expired {
                self.unpend(slot);
                return Some(slot);
            }
            cursor = List::<SchedLink>::next(&self.threads, slot);
        }
        None
    }

    /// Handle the oldest expired timeout: unpend the thread if it still
    /// waits, then ready it. The swap result stays `SWAP_TIMEOUT`.
    pub(crate) fn expire_next(&mut self) -> Option<(u16, bool)> {
        let slot = self.timeouts.pop_expired(&mut self.threads)?;
        if self.threads.tcb(slot).state.contains(ThreadState::PENDING) {
            self.unpend(slot);
        }
        let readied = self.ready_thread(slot);
        Some((slot, readied))
    }

    /// Whether the scheduler should leave the current thread right now.
    pub(crate) fn must_switch_threads(&self, in_isr: bool) -> bool {
        if in_isr {
            return false;
        }
        match self.ready_q.next_ready() {
            Some(next) => next != self.current && self.threads.tcb(self.current).is_preemptible(),
            None => false,
        }
    }

    pub(crate) fn next_ready(&self) -> u16 {
        self.ready_q.next_ready().unwrap_or(self.idle)
    }

    /// Set the thread's base priority and apply the effective priority
    /// that results from it and the ceilings the thread holds.
    ///
    /// # Panics
    ///
    /// Panics for the idle thread.
    pub(crate) fn set_base_priority(&mut self, slot: u16, priority: Priority) {
        assert!(slot != self.idle, "idle thread priority is fixed");
        self.threads.tcb_mut(slot).base_priority = priority;
        let effective = self.threads.tcb(slot).effective_priority();
        self.set_priority(slot, effective);
    }

    /// Record a ceiling taken by the thread and raise it if needed.
    pub(crate) fn push_ceiling(&mut self, slot: u16, ceiling: Priority) {
        self.threads.tcb_mut(slot).held_ceilings.push(ceiling);
        self.refresh_priority(slot);
    }

    /// Forget one held ceiling and fall back to whatever remains in effect.
    pub(crate) fn pop_ceiling(&mut self, slot: u16, ceiling: Priority) {
        let held = &mut self.threads.tcb_mut(slot).held_ceilings;
        if let Some(index) = held.iter().position(|&held| held == ceiling) {
            held.remove(index);
        }
        self.refresh_priority(slot);
    }

    fn refresh_priority(&mut self, slot: u16) {
        let tcb = self.threads.tcb(slot);
        let effective = tcb.effective_priority();
        if effective != tcb.priority {
            self.set_priority(slot, effective);
        }
    }

    /// Change a thread's effective priority, re-queueing it at the tail of
    /// the new level if it is ready.
    pub(crate) fn set_priority(&mut self, slot: u16, priority: Priority) {
        let queued = self.threads.tcb(slot).membership == Membership::Ready;
        if queued {
            self.ready_q.remove(&mut self.threads, slot);
        }
        self.threads.tcb_mut(slot).priority = priority;
        if queued {
            self.ready_q.add(&mut self.threads, slot);
        }
    }
}
