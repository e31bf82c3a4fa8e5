//! The kernel: scheduler state behind the global interrupt lock.
//!
//! This module provides the main [`Kernel`] struct. All ready queue, wait
//! queue and timeout mutation happens while an [`IrqKey`] is held; the
//! scheduler state sits in a `critical_section::Mutex` that can only be
//! borrowed with a token derived from that key.
//!
//! Methods ending in `_locked` take a borrowed key and leave the lock held,
//! so callers can compose several steps into one critical section before
//! handing the key to [`Kernel::swap`] or [`Kernel::swap_or_unlock`].

use crate::arch::{ContextSwitch, IrqKey};
use crate::config::KernelConfig;
use crate::errors::{KernelResult, ResourceError, SpawnError};
use crate::sched::observer::{SchedObserver, NOOP_OBSERVER};
use crate::sched::wait_queue::WaitQueueId;
use crate::sched::{SchedState, SWAP_OK};
use crate::thread::{Membership, Priority, ThreadId, ThreadState};
use crate::time::tick::TickCounter;
use crate::time::{Duration, Timeout};
use core::cell::RefCell;
use portable_atomic::{AtomicU64, Ordering};

/// Thread counts reported by [`Kernel::thread_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadStats {
    /// Live threads, idle and bootstrap included
    pub total: usize,
    /// Threads in the ready queue, the running one included
    pub ready: usize,
    /// Threads blocked on a wait queue
    pub pending: usize,
}

/// Scheduler core of a single-CPU real-time kernel.
///
/// # Type Parameters
///
/// * `A` - Port providing interrupt locking and context switching
pub struct Kernel<A> {
    arch: A,
    config: KernelConfig,
    state: critical_section::Mutex<RefCell<SchedState>>,
    ticks: TickCounter,
    observer: spin::Once<&'static dyn SchedObserver>,
    switches: AtomicU64,
}

impl<A: ContextSwitch> Kernel<A> {
    /// Create a kernel with the idle thread ready and a bootstrap
    /// placeholder as the current thread.
    pub fn new(arch: A, config: KernelConfig) -> KernelResult<Self> {
        config.validate()?;
        let state = SchedState::new(&config)?;

        log::debug!(
            "kernel initialized: {} thread slots, {} wait queues, {} Hz",
            config.max_threads,
            config.max_wait_queues,
            config.tick_hz
        );

        Ok(Self {
            arch,
            config,
            state: critical_section::Mutex::new(RefCell::new(state)),
            ticks: TickCounter::new(config.tick_hz),
            observer: spin::Once::new(),
            switches: AtomicU64::new(0),
        })
    }

    /// The port this kernel runs on.
    pub fn arch(&self) -> &A {
        &self.arch
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Register the scheduler event observer.
    ///
    /// Returns `false` if an observer was already registered.
    pub fn set_observer(&self, observer: &'static dyn SchedObserver) -> bool {
        let mut installed = false;
        self.observer.call_once(|| {
            installed = true;
            observer
        });
        installed
    }

    fn observer(&self) -> &'static dyn SchedObserver {
        match self.observer.get() {
            Some(observer) => *observer,
            None => &NOOP_OBSERVER,
        }
    }

    pub(crate) fn with_state<R>(&self, key: &IrqKey, f: impl FnOnce(&mut SchedState) -> R) -> R {
        let cs = key.critical_section();
        let mut state = self.state.borrow_ref_mut(cs);
        f(&mut state)
    }

    fn with_lock<R>(&self, f: impl FnOnce(&mut SchedState) -> R) -> R {
        let key = self.arch.irq_lock();
        let result = self.with_state(&key, f);
        self.arch.irq_unlock(key);
        result
    }

    // ---- interrupt lock and context switch ----

    /// Take the global interrupt lock.
    pub fn irq_lock(&self) -> IrqKey {
        self.arch.irq_lock()
    }

    /// Release the global interrupt lock.
    pub fn irq_unlock(&self, key: IrqKey) {
        self.arch.irq_unlock(key)
    }

    pub fn in_isr(&self) -> bool {
        self.arch.in_isr()
    }

    /// Suspend the current thread and run the next ready one.
    ///
    /// Consumes the lock. Returns the result code set for the current
    /// thread by whoever resumed it.
    pub fn swap(&self, key: IrqKey) -> i32 {
        debug_assert!(!self.arch.in_isr(), "swap from interrupt context");
        self.arch.suspend(self, key)
    }

    /// Switch now if a more urgent thread may preempt the current one,
    /// otherwise just release the lock.
    pub fn swap_or_unlock(&self, key: IrqKey) {
        let in_isr = self.arch.in_isr();
        if self.with_state(&key, |s| s.must_switch_threads(in_isr)) {
            self.swap(key);
        } else {
            self.arch.irq_unlock(key);
        }
    }

    /// Whether the current thread should be preempted right now.
    pub fn must_switch_threads(&self) -> bool {
        let in_isr = self.arch.in_isr();
        self.with_lock(|s| s.must_switch_threads(in_isr))
    }

    /// Leave the bootstrap placeholder and run the most urgent ready thread.
    ///
    /// # Panics
    ///
    /// Panics if multithreading has already started.
    pub fn begin_multithreading(&self) {
        let key = self.arch.irq_lock();
        let bootstrap = self.with_state(&key, |s| {
            assert_eq!(s.current, s.bootstrap, "multithreading already started");
            s.threads.tcb_mut(s.bootstrap).state.insert(ThreadState::DEAD);
            s.threads.id_of(s.bootstrap)
        });
        log::debug!("leaving bootstrap thread {}", bootstrap);
        self.swap(key);
    }

    /// Record the thread the port just switched to.
    pub fn set_current(&self, thread: ThreadId) {
        let observer = self.observer();
        let switched = self.with_lock(|s| {
            let slot = s.threads.resolve(thread);
            let previous = s.current;
            s.current = slot;
            if previous == slot {
                return None;
            }
            let from = s.threads.id_of(previous);
            observer.context_switch(from, thread);
            Some(from)
        });
        if let Some(from) = switched {
            self.switches.fetch_add(1, Ordering::Relaxed);
            log::trace!("switch {} -> {}", from, thread);
        }
    }

    /// Thread the scheduler would dispatch now.
    pub fn next_ready(&self) -> ThreadId {
        self.with_lock(|s| s.threads.id_of(s.next_ready()))
    }

    pub fn current(&self) -> ThreadId {
        self.with_lock(|s| s.threads.id_of(s.current))
    }

    pub(crate) fn current_locked(&self, key: &IrqKey) -> ThreadId {
        self.with_state(key, |s| s.threads.id_of(s.current))
    }

    pub fn idle_thread(&self) -> ThreadId {
        self.with_lock(|s| s.threads.id_of(s.idle))
    }

    /// Most urgent priority with a ready thread.
    pub fn highest_ready_priority(&self) -> Priority {
        self.with_lock(|s| s.ready_q.highest_ready_priority().unwrap_or(Priority::IDLE))
    }

    /// Result code the thread's pending swap will return.
    pub fn swap_retval(&self, thread: ThreadId) -> i32 {
        self.with_lock(|s| {
            let slot = s.threads.resolve(thread);
            s.threads.tcb(slot).swap_retval
        })
    }

    /// Set the result code the thread's pending swap will return.
    pub fn set_swap_retval_locked(&self, key: &IrqKey, thread: ThreadId, value: i32) {
        self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.threads.tcb_mut(slot).swap_retval = value;
        })
    }

    /// Total number of switches recorded through [`Kernel::set_current`].
    pub fn context_switches(&self) -> u64 {
        self.switches.load(Ordering::Relaxed)
    }

    // ---- wait queues ----

    /// Allocate a wait queue root.
    pub fn wait_queue_create(&self) -> KernelResult<WaitQueueId> {
        let id = self
            .with_lock(|s| s.wait_queues.create())
            .ok_or(ResourceError::WaitQueuesExhausted)?;
        Ok(id)
    }

    /// Free a wait queue root.
    ///
    /// # Panics
    ///
    /// Panics if threads are still waiting on it.
    pub fn wait_queue_destroy(&self, wait_q: WaitQueueId) {
        self.with_lock(|s| s.wait_queues.destroy(wait_q))
    }

    /// Threads waiting on `wait_q`, oldest first.
    pub fn waiters(&self, wait_q: WaitQueueId) -> alloc::vec::Vec<ThreadId> {
        self.with_lock(|s| {
            s.wait_queues
                .list(wait_q)
                .iter(&s.threads)
                .map(|slot| s.threads.id_of(slot))
                .collect()
        })
    }

    /// Block the current thread on `wait_q`. The caller must then swap.
    ///
    /// # Panics
    ///
    /// Panics in interrupt context, for the idle thread, or if the current
    /// thread is already pending.
    pub fn pend_current_locked(&self, key: &IrqKey, wait_q: WaitQueueId, timeout: Timeout) {
        assert!(!self.arch.in_isr(), "cannot block in interrupt context");
        let current = self.current_locked(key);
        self.pend_locked(key, current, wait_q, timeout);
    }

    /// Block `thread` on `wait_q` without switching.
    ///
    /// Every bound but `Forever` arms a timeout; `NoWait` and `Ticks(0)`
    /// expire on the next tick announcement.
    pub fn pend_locked(&self, key: &IrqKey, thread: ThreadId, wait_q: WaitQueueId, timeout: Timeout) {
        self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.pend(slot, wait_q, timeout);
        });
        log::trace!("pend {} on {} ({:?})", thread, wait_q, timeout);
        self.observer().thread_pend(thread, Some(wait_q));
    }

    /// Block `thread` on `wait_q` without switching.
    pub fn pend(&self, thread: ThreadId, wait_q: WaitQueueId, timeout: Timeout) {
        let key = self.arch.irq_lock();
        self.pend_locked(&key, thread, wait_q, timeout);
        self.arch.irq_unlock(key);
    }

    /// Remove `thread` from its wait queue and cancel its timeout. The
    /// thread is not readied.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not pending.
    pub fn unpend_locked(&self, key: &IrqKey, thread: ThreadId) {
        self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.unpend(slot);
        })
    }

    pub fn unpend(&self, thread: ThreadId) {
        let key = self.arch.irq_lock();
        self.unpend_locked(&key, thread);
        self.arch.irq_unlock(key);
    }

    /// Unpend the oldest waiter of `wait_q` without readying it.
    pub fn unpend_first_locked(&self, key: &IrqKey, wait_q: WaitQueueId) -> Option<ThreadId> {
        self.with_state(key, |s| {
            let slot = s.unpend_first(wait_q)?;
            Some(s.threads.id_of(slot))
        })
    }

    pub fn unpend_first(&self, wait_q: WaitQueueId) -> Option<ThreadId> {
        let key = self.arch.irq_lock();
        let thread = self.unpend_first_locked(&key, wait_q);
        self.arch.irq_unlock(key);
        thread
    }

    /// Wake the oldest waiter of `wait_q` with [`SWAP_OK`] and ready it.
    pub fn wake_locked(&self, key: &IrqKey, wait_q: WaitQueueId) -> Option<ThreadId> {
        let thread = self.unpend_first_locked(key, wait_q)?;
        self.set_swap_retval_locked(key, thread, SWAP_OK);
        self.ready_thread_locked(key, thread);
        Some(thread)
    }

    /// Cancel the thread's timeout. Returns `false` if none was armed.
    pub fn abort_timeout_locked(&self, key: &IrqKey, thread: ThreadId) -> bool {
        self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.timeouts.abort(&mut s.threads, slot)
        })
    }

    pub fn abort_timeout(&self, thread: ThreadId) -> bool {
        let key = self.arch.irq_lock();
        let aborted = self.abort_timeout_locked(&key, thread);
        self.arch.irq_unlock(key);
        aborted
    }

    /// Ticks left before the thread's timeout fires.
    pub fn thread_timeout_remaining(&self, thread: ThreadId) -> Option<u32> {
        self.with_lock(|s| {
            let slot = s.threads.resolve(thread);
            s.timeouts.remaining(&s.threads, slot)
        })
    }

    // ---- thread state machine ----

    /// Clear PRESTART and queue the thread if nothing else blocks it.
    pub fn ready_thread_locked(&self, key: &IrqKey, thread: ThreadId) {
        let queued = self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.ready_thread(slot)
        });
        if queued {
            log::trace!("ready {}", thread);
            self.observer().thread_ready(thread);
        }
    }

    pub fn ready_thread(&self, thread: ThreadId) {
        let key = self.arch.irq_lock();
        self.ready_thread_locked(&key, thread);
        self.arch.irq_unlock(key);
    }

    /// Allocate a thread in PRESTART.
    ///
    /// The priority is clamped to the configured ceiling.
    pub fn thread_create(&self, name: &'static str, priority: Priority) -> KernelResult<ThreadId> {
        if !priority.is_valid() {
            return Err(SpawnError::InvalidPriority(priority.raw()).into());
        }
        if priority == Priority::IDLE {
            return Err(SpawnError::ReservedPriority.into());
        }
        let priority = priority.clamp_to(self.config.priority_ceiling);

        let thread = self
            .with_lock(|s| {
                let slot = s.threads.allocate(name, priority, ThreadState::PRESTART)?;
                Some(s.threads.id_of(slot))
            })
            .ok_or_else(|| {
                log::warn!("thread table full ({} slots)", self.config.max_threads);
                SpawnError::TooManyThreads
            })?;

        log::debug!("created thread {} '{}' at {}", thread, name, priority);
        Ok(thread)
    }

    /// Start a thread still in PRESTART, cancelling any delayed start.
    pub fn thread_start(&self, thread: ThreadId) {
        let key = self.arch.irq_lock();
        let prestart = self.with_state(&key, |s| {
            let slot = s.threads.resolve(thread);
            s.threads.tcb(slot).state.contains(ThreadState::PRESTART)
        });
        if !prestart {
            self.arch.irq_unlock(key);
            return;
        }
        self.abort_timeout_locked(&key, thread);
        self.ready_thread_locked(&key, thread);
        self.swap_or_unlock(key);
    }

    /// Start a thread in PRESTART after `ticks` ticks.
    pub(crate) fn thread_start_delayed(&self, thread: ThreadId, ticks: u32) {
        self.with_lock(|s| {
            let slot = s.threads.resolve(thread);
            s.timeouts.add(&mut s.threads, slot, ticks);
        })
    }

    /// Suspend a thread. Suspending the current thread switches away.
    ///
    /// # Panics
    ///
    /// Panics for the idle thread.
    pub fn thread_suspend(&self, thread: ThreadId) {
        let key = self.arch.irq_lock();
        let is_current = self.with_state(&key, |s| {
            let slot = s.threads.resolve(thread);
            assert!(slot != s.idle, "idle thread cannot be suspended");
            s.remove_from_ready_q(slot);
            s.threads.tcb_mut(slot).state.insert(ThreadState::SUSPENDED);
            slot == s.current
        });
        log::trace!("suspend {}", thread);
        if is_current {
            self.swap(key);
        } else {
            self.arch.irq_unlock(key);
        }
    }

    /// Resume a suspended thread.
    pub fn thread_resume(&self, thread: ThreadId) {
        let key = self.arch.irq_lock();
        let suspended = self.with_state(&key, |s| {
            let slot = s.threads.resolve(thread);
            let tcb = s.threads.tcb_mut(slot);
            let suspended = tcb.state.contains(ThreadState::SUSPENDED);
            tcb.state.remove(ThreadState::SUSPENDED);
            suspended
        });
        if !suspended {
            self.arch.irq_unlock(key);
            return;
        }
        self.ready_thread_locked(&key, thread);
        self.swap_or_unlock(key);
    }

    /// Terminate a thread. Aborting the current thread switches away.
    ///
    /// # Panics
    ///
    /// Panics for the idle thread.
    pub fn thread_abort(&self, thread: ThreadId) {
        let key = self.arch.irq_lock();
        let is_current = self.with_state(&key, |s| {
            let slot = s.threads.resolve(thread);
            assert!(slot != s.idle, "idle thread cannot be aborted");
            if s.threads.tcb(slot).state.contains(ThreadState::PENDING) {
                s.unpend(slot);
            }
            s.timeouts.abort(&mut s.threads, slot);
            s.remove_from_ready_q(slot);
            s.threads.tcb_mut(slot).state.insert(ThreadState::DEAD);
            slot == s.current
        });
        log::debug!("abort {}", thread);
        if is_current {
            self.swap(key);
        } else {
            self.swap_or_unlock(key);
        }
    }

    /// Free the slot of a terminated thread. Its handles become stale.
    pub fn thread_release(&self, thread: ThreadId) -> KernelResult<()> {
        self.with_lock(|s| {
            let slot = s.threads.resolve(thread);
            if slot == s.idle || slot == s.bootstrap {
                return Err(ResourceError::ReservedThread.into());
            }
            let tcb = s.threads.tcb(slot);
            if !tcb.state.contains(ThreadState::DEAD) || slot == s.current {
                return Err(ResourceError::ThreadNotDead.into());
            }
            debug_assert_eq!(tcb.membership, Membership::Detached);
            s.threads.release(slot);
            Ok(())
        })
    }

    pub fn thread_state(&self, thread: ThreadId) -> ThreadState {
        self.with_lock(|s| {
            let slot = s.threads.resolve(thread);
            s.threads.tcb(slot).state
        })
    }

    pub fn thread_priority(&self, thread: ThreadId) -> Priority {
        let key = self.arch.irq_lock();
        let priority = self.thread_priority_locked(&key, thread);
        self.arch.irq_unlock(key);
        priority
    }

    pub(crate) fn thread_priority_locked(&self, key: &IrqKey, thread: ThreadId) -> Priority {
        self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.threads.tcb(slot).priority
        })
    }

    pub fn thread_name(&self, thread: ThreadId) -> &'static str {
        self.with_lock(|s| {
            let slot = s.threads.resolve(thread);
            s.threads.tcb(slot).name
        })
    }

    /// Whether the thread is in the ready queue (running counts as ready).
    pub fn is_ready(&self, thread: ThreadId) -> bool {
        self.with_lock(|s| {
            let slot = s.threads.resolve(thread);
            s.threads.tcb(slot).membership == Membership::Ready
        })
    }

    /// Threads ready at `priority`, head first.
    pub fn ready_at(&self, priority: Priority) -> alloc::vec::Vec<ThreadId> {
        self.with_lock(|s| {
            s.ready_q
                .level_iter(&s.threads, priority)
                .map(|slot| s.threads.id_of(slot))
                .collect()
        })
    }

    /// Change a thread's priority, clamped to the configured ceiling.
    ///
    /// A ready thread goes to the tail of its new level even if the
    /// priority did not change. A thread holding a ceiling mutex keeps
    /// running at the ceiling until it releases it.
    ///
    /// # Panics
    ///
    /// Panics for the idle thread.
    pub fn thread_priority_set(&self, thread: ThreadId, priority: Priority) {
        let key = self.arch.irq_lock();
        self.set_priority_locked(&key, thread, priority);
        self.swap_or_unlock(key);
    }

    /// Set the base priority. Ceilings held through mutexes stay in effect
    /// on top of it.
    ///
    /// # Panics
    ///
    /// Panics for the idle thread or an out-of-range priority.
    pub(crate) fn set_priority_locked(&self, key: &IrqKey, thread: ThreadId, priority: Priority) {
        assert!(
            priority.is_valid() && priority != Priority::IDLE,
            "priority {} out of range",
            priority
        );
        let priority = priority.clamp_to(self.config.priority_ceiling);
        self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.set_base_priority(slot, priority);
        });
        log::trace!("priority of {} set to {}", thread, priority);
    }

    /// Raise `thread` to `ceiling` for as long as it holds the ceiling.
    pub(crate) fn push_ceiling_locked(&self, key: &IrqKey, thread: ThreadId, ceiling: Priority) {
        let ceiling = ceiling.clamp_to(self.config.priority_ceiling);
        let priority = self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.push_ceiling(slot, ceiling);
            s.threads.tcb(slot).priority
        });
        log::trace!("{} takes ceiling {}, runs at {}", thread, ceiling, priority);
    }

    /// Drop one ceiling taken with [`Kernel::push_ceiling_locked`].
    pub(crate) fn pop_ceiling_locked(&self, key: &IrqKey, thread: ThreadId, ceiling: Priority) {
        let ceiling = ceiling.clamp_to(self.config.priority_ceiling);
        let priority = self.with_state(key, |s| {
            let slot = s.threads.resolve(thread);
            s.pop_ceiling(slot, ceiling);
            s.threads.tcb(slot).priority
        });
        log::trace!("{} drops ceiling {}, runs at {}", thread, ceiling, priority);
    }

    pub fn thread_stats(&self) -> ThreadStats {
        self.with_lock(|s| {
            s.threads.iter().fold(ThreadStats::default(), |mut stats, (_, tcb)| {
                stats.total += 1;
                match tcb.membership {
                    Membership::Ready => stats.ready += 1,
                    Membership::Waiting(_) => stats.pending += 1,
                    Membership::Detached => {}
                }
                stats
            })
        })
    }

    // ---- scheduler lock ----

    /// Disable involuntary preemption of the current thread. Nests.
    pub fn sched_lock(&self) {
        self.with_lock(|s| {
            let tcb = s.threads.tcb_mut(s.current);
            assert!(tcb.sched_locked < u8::MAX, "scheduler lock nested too deeply");
            tcb.sched_locked += 1;
        })
    }

    /// Undo one [`Kernel::sched_lock`] without rescheduling.
    ///
    /// # Panics
    ///
    /// Panics if the scheduler is not locked.
    pub fn sched_unlock_no_reschedule(&self) {
        self.with_lock(|s| {
            let tcb = s.threads.tcb_mut(s.current);
            assert!(tcb.sched_locked > 0, "scheduler not locked");
            tcb.sched_locked -= 1;
        })
    }

    /// Undo one [`Kernel::sched_lock`], then switch if a more urgent thread
    /// became ready meanwhile.
    pub fn sched_unlock(&self) {
        let key = self.arch.irq_lock();
        self.with_state(&key, |s| {
            let tcb = s.threads.tcb_mut(s.current);
            assert!(tcb.sched_locked > 0, "scheduler not locked");
            tcb.sched_locked -= 1;
        });
        self.swap_or_unlock(key);
    }

    /// Let the other ready threads of the same priority run first.
    pub fn yield_now(&self) {
        let key = self.arch.irq_lock();
        let must_swap = self.with_state(&key, |s| {
            let current = s.current;
            if s.threads.tcb(current).membership == Membership::Ready {
                s.ready_q.move_to_tail(&mut s.threads, current);
            }
            s.next_ready() != current
        });
        if must_swap {
            self.swap(key);
        } else {
            self.arch.irq_unlock(key);
        }
    }

    // ---- time ----

    /// Ticks since boot.
    pub fn uptime_ticks(&self) -> u64 {
        self.ticks.ticks()
    }

    pub fn uptime(&self) -> Duration {
        self.ticks.ticks_to_duration(self.ticks.ticks())
    }

    /// Convert a duration to a timeout at the configured tick rate,
    /// rounding up.
    pub fn timeout(&self, duration: Duration) -> Timeout {
        self.ticks.timeout_for(duration)
    }

    /// Put the current thread to sleep.
    ///
    /// `NoWait` yields, `Forever` suspends.
    pub fn sleep(&self, timeout: Timeout) {
        let ticks = match timeout {
            Timeout::Forever => {
                let current = self.current();
                return self.thread_suspend(current);
            }
            t => match t.ticks() {
                Some(ticks) => ticks,
                None => return self.yield_now(),
            },
        };

        let key = self.arch.irq_lock();
        let current = self.with_state(&key, |s| {
            let slot = s.current;
            assert!(slot != s.idle, "idle thread cannot sleep");
            s.remove_from_ready_q(slot);
            s.timeouts.add(&mut s.threads, slot, ticks);
            s.threads.id_of(slot)
        });
        log::trace!("sleep {} for {} ticks", current, ticks);
        self.observer().thread_pend(current, None);
        self.swap(key);
    }

    /// Advance the system clock by `n` ticks and handle expired timeouts.
    ///
    /// Expired entries are handled one at a time with the lock released in
    /// between, so interrupts are not held off for the whole batch.
    pub fn announce_ticks(&self, n: u32) {
        let key = self.arch.irq_lock();
        let now = self.ticks.announce(n);
        let fired = self.with_state(&key, |s| {
            s.handling_timeouts = true;
            s.timeouts.announce(&mut s.threads, n)
        });
        if fired > 0 {
            log::trace!("tick {}: {} timeouts expired", now, fired);
        }
        self.arch.irq_unlock(key);

        let observer = self.observer();
        loop {
            let key = self.arch.irq_lock();
            let expired = self.with_state(&key, |s| {
                let (slot, queued) = s.expire_next()?;
                Some((s.threads.id_of(slot), queued))
            });
            match expired {
                Some((thread, queued)) => {
                    log::debug!("timeout expired for {}", thread);
                    observer.timeout_expired(thread);
                    if queued {
                        observer.thread_ready(thread);
                    }
                    self.arch.irq_unlock(key);
                }
                None => {
                    self.with_state(&key, |s| {
                        debug_assert!(!s.timeouts.has_expired());
                        s.handling_timeouts = false;
                    });
                    self.swap_or_unlock(key);
                    return;
                }
            }
        }
    }
}
