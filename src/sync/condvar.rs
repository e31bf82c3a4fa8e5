use super::Mutex;
use crate::arch::ContextSwitch;
use crate::errors::{KernelResult, SyncError, SyncResult};
use crate::kernel::Kernel;
use crate::sched::WaitQueueId;
use crate::time::Timeout;

/// Condition variable. It owns a wait queue and nothing else; the mutex is
/// supplied on every wait.
pub struct CondVar<'k, A: ContextSwitch> {
    kernel: &'k Kernel<A>,
    wait_q: WaitQueueId,
}

impl<'k, A: ContextSwitch> CondVar<'k, A> {
    pub fn new(kernel: &'k Kernel<A>) -> KernelResult<Self> {
        Ok(Self {
            kernel,
            wait_q: kernel.wait_queue_create()?,
        })
    }

    /// Release `mutex`, wait for a signal, then take `mutex` again.
    ///
    /// Releasing the mutex and blocking happen in one critical section, so
    /// a signal sent after the caller dropped the mutex is never lost. The
    /// mutex is held again on every return, `Err(Timeout)` included.
    ///
    /// # Panics
    ///
    /// Panics if `mutex` is not locked.
    pub fn wait(&self, mutex: &Mutex<'_, A>, timeout: Timeout) -> SyncResult<()> {
        let key = self.kernel.irq_lock();
        assert!(
            mutex.is_locked_locked(&key),
            "condition variable wait without holding the mutex"
        );
        mutex.release_locked(&key);

        if timeout.is_no_wait() {
            self.kernel.irq_unlock(key);
            mutex.relock();
            return Err(SyncError::Timeout);
        }

        self.kernel.pend_current_locked(&key, self.wait_q, timeout);
        let rc = self.kernel.swap(key);

        mutex.relock();
        SyncError::from_swap(rc)
    }

    /// Wake the oldest waiter. Returns whether there was one.
    pub fn signal(&self) -> bool {
        let key = self.kernel.irq_lock();
        let woken = self.kernel.wake_locked(&key, self.wait_q);
        self.kernel.swap_or_unlock(key);
        woken.is_some()
    }

    /// Wake every waiter, then reschedule once. Returns how many woke.
    pub fn broadcast(&self) -> usize {
        let key = self.kernel.irq_lock();
        let mut woken = 0;
        while self.kernel.wake_locked(&key, self.wait_q).is_some() {
            woken += 1;
        }
        self.kernel.swap_or_unlock(key);
        woken
    }

    pub fn wait_queue(&self) -> WaitQueueId {
        self.wait_q
    }
}

impl<A: ContextSwitch> Drop for CondVar<'_, A> {
    fn drop(&mut self) {
        self.kernel.wait_queue_destroy(self.wait_q);
    }
}
