use crate::arch::{ContextSwitch, IrqKey};
use crate::errors::{KernelResult, SyncError, SyncResult};
use crate::kernel::Kernel;
use crate::sched::WaitQueueId;
use crate::thread::{Priority, ThreadId};
use crate::time::Timeout;
use core::cell::Cell;

#[derive(Debug, Clone, Copy)]
struct MutexState {
    /// 1 when free, 0 when held
    value: u8,
    owner: Option<ThreadId>,
}

/// Non-recursive mutex on top of a binary semaphore.
///
/// With a priority ceiling, the owner runs at the ceiling while it holds
/// the lock. The kernel tracks ceilings per thread, so a thread holding
/// several ceiling mutexes runs at the most urgent one still held, in
/// whatever order they are released.
///
/// Unlock and condition variable release do not hand the lock over: they
/// free it and wake the oldest waiter, which then competes for it again.
pub struct Mutex<'k, A: ContextSwitch> {
    kernel: &'k Kernel<A>,
    wait_q: WaitQueueId,
    ceiling: Option<Priority>,
    state: critical_section::Mutex<Cell<MutexState>>,
}

impl<'k, A: ContextSwitch> Mutex<'k, A> {
    pub fn new(kernel: &'k Kernel<A>) -> KernelResult<Self> {
        Ok(Self {
            kernel,
            wait_q: kernel.wait_queue_create()?,
            ceiling: None,
            state: critical_section::Mutex::new(Cell::new(MutexState {
                value: 1,
                owner: None,
            })),
        })
    }

    /// Mutex that boosts its owner to `ceiling`.
    pub fn with_ceiling(kernel: &'k Kernel<A>, ceiling: Priority) -> KernelResult<Self> {
        if !ceiling.is_valid() || ceiling == Priority::IDLE {
            return Err(SyncError::InvalidArgument.into());
        }
        let mut mutex = Self::new(kernel)?;
        mutex.ceiling = Some(ceiling);
        Ok(mutex)
    }

    fn state(&self, key: &IrqKey) -> MutexState {
        self.state.borrow(key.critical_section()).get()
    }

    fn set_state(&self, key: &IrqKey, state: MutexState) {
        self.state.borrow(key.critical_section()).set(state)
    }

    fn try_acquire_locked(&self, key: &IrqKey) -> bool {
        let mut state = self.state(key);
        if state.value == 0 {
            return false;
        }

        let current = self.kernel.current_locked(key);
        state.value = 0;
        state.owner = Some(current);
        self.set_state(key, state);
        if let Some(ceiling) = self.ceiling {
            self.kernel.push_ceiling_locked(key, current, ceiling);
        }
        true
    }

    /// Take the mutex if it is free.
    pub fn trylock(&self) -> SyncResult<()> {
        let key = self.kernel.irq_lock();
        let acquired = self.try_acquire_locked(&key);
        self.kernel.irq_unlock(key);
        if acquired {
            Ok(())
        } else {
            Err(SyncError::Busy)
        }
    }

    /// Take the mutex, blocking for at most `timeout`.
    ///
    /// Returns `Busy` for `NoWait` and `Timeout` once the bound elapses.
    pub fn lock(&self, timeout: Timeout) -> SyncResult<()> {
        let deadline = timeout
            .ticks()
            .map(|ticks| self.kernel.uptime_ticks() + ticks as u64);

        loop {
            let key = self.kernel.irq_lock();
            if self.try_acquire_locked(&key) {
                self.kernel.irq_unlock(key);
                return Ok(());
            }

            let wait = match deadline {
                _ if timeout.is_forever() => Timeout::Forever,
                Some(deadline) => {
                    let now = self.kernel.uptime_ticks();
                    if now >= deadline {
                        self.kernel.irq_unlock(key);
                        return Err(SyncError::Timeout);
                    }
                    Timeout::Ticks((deadline - now).min(u32::MAX as u64) as u32)
                }
                None => {
                    self.kernel.irq_unlock(key);
                    return Err(SyncError::Busy);
                }
            };

            self.kernel.pend_current_locked(&key, self.wait_q, wait);
            SyncError::from_swap(self.kernel.swap(key))?;
        }
    }

    /// Block until the mutex is held again, whatever wakes the caller.
    pub(crate) fn relock(&self) {
        while self.lock(Timeout::Forever).is_err() {}
    }

    /// Release the mutex held by the current thread.
    pub fn unlock(&self) -> SyncResult<()> {
        let key = self.kernel.irq_lock();
        let state = self.state(&key);
        if state.value != 0 || state.owner != Some(self.kernel.current_locked(&key)) {
            self.kernel.irq_unlock(key);
            return Err(SyncError::NotOwner);
        }
        self.release_locked(&key);
        self.kernel.swap_or_unlock(key);
        Ok(())
    }

    /// Free the mutex and wake its oldest waiter. Returns whether a waiter
    /// was woken.
    pub(crate) fn release_locked(&self, key: &IrqKey) -> bool {
        let mut state = self.state(key);
        state.value = 1;
        let owner = state.owner.take();
        self.set_state(key, state);

        if let (Some(owner), Some(ceiling)) = (owner, self.ceiling) {
            self.kernel.pop_ceiling_locked(key, owner, ceiling);
        }
        self.kernel.wake_locked(key, self.wait_q).is_some()
    }

    pub(crate) fn is_locked_locked(&self, key: &IrqKey) -> bool {
        self.state(key).value == 0
    }

    pub fn is_locked(&self) -> bool {
        let key = self.kernel.irq_lock();
        let locked = self.is_locked_locked(&key);
        self.kernel.irq_unlock(key);
        locked
    }

    pub fn owner(&self) -> Option<ThreadId> {
        let key = self.kernel.irq_lock();
        let owner = self.state(&key).owner;
        self.kernel.irq_unlock(key);
        owner
    }

    pub fn ceiling(&self) -> Option<Priority> {
        self.ceiling
    }

    pub fn wait_queue(&self) -> WaitQueueId {
        self.wait_q
    }
}

impl<A: ContextSwitch> Drop for Mutex<'_, A> {
    fn drop(&mut self) {
        self.kernel.wait_queue_destroy(self.wait_q);
    }
}
