use crate::arch::ContextSwitch;
use crate::errors::{KernelResult, SyncError};
use crate::kernel::Kernel;
use crate::sched::WaitQueueId;
use crate::time::Timeout;
use core::cell::Cell;

/// Outcome of [`Barrier::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    is_leader: bool,
}

impl BarrierWaitResult {
    /// True for the one arrival that released the others.
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }
}

/// Rendezvous point for a fixed number of threads.
pub struct Barrier<'k, A: ContextSwitch> {
    kernel: &'k Kernel<A>,
    wait_q: WaitQueueId,
    max: u32,
    count: critical_section::Mutex<Cell<u32>>,
}

impl<'k, A: ContextSwitch> Barrier<'k, A> {
    /// Barrier released by every `max`-th arrival. `max` must be at least 1.
    pub fn new(kernel: &'k Kernel<A>, max: u32) -> KernelResult<Self> {
        if max == 0 {
            return Err(SyncError::InvalidArgument.into());
        }
        Ok(Self {
            kernel,
            wait_q: kernel.wait_queue_create()?,
            max,
            count: critical_section::Mutex::new(Cell::new(0)),
        })
    }

    /// Block until `max` threads have arrived.
    ///
    /// The last arrival resets the count, wakes everyone and returns at
    /// once as the leader.
    pub fn wait(&self) -> BarrierWaitResult {
        let key = self.kernel.irq_lock();
        let arrived = {
            let count = self.count.borrow(key.critical_section());
            let arrived = count.get() + 1;
            count.set(if arrived >= self.max { 0 } else { arrived });
            arrived
        };

        if arrived >= self.max {
            let mut woken = 0;
            while self.kernel.wake_locked(&key, self.wait_q).is_some() {
                woken += 1;
            }
            log::trace!("barrier {} released {} waiters", self.wait_q, woken);
            self.kernel.swap_or_unlock(key);
            BarrierWaitResult { is_leader: true }
        } else {
            self.kernel.pend_current_locked(&key, self.wait_q, Timeout::Forever);
            self.kernel.swap(key);
            BarrierWaitResult { is_leader: false }
        }
    }

    pub fn parties(&self) -> u32 {
        self.max
    }

    pub fn wait_queue(&self) -> WaitQueueId {
        self.wait_q
    }
}

impl<A: ContextSwitch> Drop for Barrier<'_, A> {
    fn drop(&mut self) {
        self.kernel.wait_queue_destroy(self.wait_q);
    }
}
