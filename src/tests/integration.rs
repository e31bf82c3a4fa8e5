//! Integration tests for blocking, waking and scheduling decisions.

#[cfg(test)]
mod sync_tests {
    use super::super::helpers::{assert_quiescent, leak, sim_kernel, spawn};
    use crate::errors::SyncError;
    use crate::sync::{Barrier, CondVar, Mutex};
    use crate::thread::{Priority, ThreadState};
    use crate::time::Timeout;
    use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_cond_wait_returns_holding_mutex_after_signal() {
        let kernel = sim_kernel();
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        let t2 = spawn(kernel, "t2", Priority::Preemptible(5));
        kernel.begin_multithreading();
        assert_eq!(kernel.current(), t1);

        let mutex = leak(Mutex::new(kernel).unwrap());
        let cv = leak(CondVar::new(kernel).unwrap());
        let signalled = leak(AtomicBool::new(false));

        mutex.lock(Timeout::Forever).unwrap();
        kernel.arch().push_thread(t2, move |_| {
            mutex.lock(Timeout::Forever).unwrap();
            signalled.store(cv.signal(), Ordering::SeqCst);
            mutex.unlock().unwrap();
        });

        assert_eq!(cv.wait(mutex, Timeout::Forever), Ok(()));
        assert!(signalled.load(Ordering::SeqCst));
        assert!(mutex.is_locked());
        assert_eq!(mutex.owner(), Some(t1));
        assert_eq!(kernel.current(), t1);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_cond_wait_timeout_still_reacquires_mutex() {
        let kernel = sim_kernel();
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let mutex = leak(Mutex::new(kernel).unwrap());
        let cv = leak(CondVar::new(kernel).unwrap());
        let wait_q = cv.wait_queue();

        kernel.arch().push_isr(|k| k.announce_ticks(4));
        kernel.arch().push_isr(move |k| {
            // one tick short of the deadline the thread is still queued
            assert!(k.thread_state(t1).contains(ThreadState::PENDING));
            assert_eq!(k.waiters(wait_q), [t1]);
            assert_eq!(k.thread_timeout_remaining(t1), Some(1));
            k.announce_ticks(1);
        });

        let start = kernel.uptime_ticks();
        mutex.lock(Timeout::Forever).unwrap();
        assert_eq!(cv.wait(mutex, Timeout::Ticks(5)), Err(SyncError::Timeout));

        assert!(kernel.uptime_ticks() - start >= 5);
        assert_eq!(mutex.owner(), Some(t1));
        assert!(kernel.waiters(wait_q).is_empty());
        assert!(!kernel.thread_state(t1).contains(ThreadState::PENDING));
        assert_quiescent(kernel);
    }

    #[test]
    fn test_cond_wait_no_wait_releases_and_reacquires() {
        let kernel = sim_kernel();
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let mutex = leak(Mutex::new(kernel).unwrap());
        let cv = leak(CondVar::new(kernel).unwrap());

        mutex.lock(Timeout::Forever).unwrap();
        assert_eq!(cv.wait(mutex, Timeout::NoWait), Err(SyncError::Timeout));
        assert_eq!(mutex.owner(), Some(t1));
        assert_quiescent(kernel);
    }

    #[test]
    #[should_panic(expected = "without holding the mutex")]
    fn test_cond_wait_without_mutex_panics() {
        let kernel = sim_kernel();
        spawn(kernel, "t1", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let mutex = leak(Mutex::new(kernel).unwrap());
        let cv = leak(CondVar::new(kernel).unwrap());
        let _ = cv.wait(mutex, Timeout::Forever);
    }

    #[test]
    fn test_broadcast_wakes_every_waiter() {
        let kernel = sim_kernel();
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        let t2 = spawn(kernel, "t2", Priority::Preemptible(5));
        let t3 = spawn(kernel, "t3", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let mutex = leak(Mutex::new(kernel).unwrap());
        let cv = leak(CondVar::new(kernel).unwrap());
        let t2_held = leak(AtomicBool::new(false));
        let woken = leak(AtomicUsize::new(0));

        kernel.arch().push_thread(t2, move |_| {
            mutex.lock(Timeout::Forever).unwrap();
            assert_eq!(cv.wait(mutex, Timeout::Forever), Ok(()));
            t2_held.store(mutex.owner() == Some(t2), Ordering::SeqCst);
            mutex.unlock().unwrap();
        });
        kernel.arch().push_thread(t3, move |_| {
            mutex.lock(Timeout::Forever).unwrap();
            woken.store(cv.broadcast(), Ordering::SeqCst);
            mutex.unlock().unwrap();
        });

        mutex.lock(Timeout::Forever).unwrap();
        assert_eq!(cv.wait(mutex, Timeout::Forever), Ok(()));

        assert_eq!(woken.load(Ordering::SeqCst), 2);
        assert!(t2_held.load(Ordering::SeqCst));
        assert_eq!(mutex.owner(), Some(t1));
        assert!(kernel.waiters(cv.wait_queue()).is_empty());
        assert_quiescent(kernel);
    }

    #[test]
    fn test_signal_wakes_in_arrival_order_not_priority() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Preemptible(1));
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        let t2 = spawn(kernel, "t2", Priority::Preemptible(3));
        let t3 = spawn(kernel, "t3", Priority::Preemptible(5));
        kernel.begin_multithreading();
        assert_eq!(kernel.current(), main);

        let cv = leak(CondVar::new(kernel).unwrap());
        for thread in [t1, t2, t3] {
            kernel.pend(thread, cv.wait_queue(), Timeout::Forever);
        }

        assert!(cv.signal());
        assert!(kernel.is_ready(t1));
        assert!(!kernel.is_ready(t2));
        assert_eq!(kernel.waiters(cv.wait_queue()), [t2, t3]);

        assert!(cv.signal());
        assert!(kernel.is_ready(t2));

        // with both ready, priority decides who runs
        kernel.thread_priority_set(main, Priority::Preemptible(10));
        assert_eq!(kernel.arch().dispatched().last(), Some(&t2));

        assert_eq!(cv.broadcast(), 1);
        assert!(!cv.signal());
        assert_quiescent(kernel);
    }

    #[test]
    fn test_barrier_releases_once_with_single_leader() {
        let kernel = sim_kernel();
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        let t2 = spawn(kernel, "t2", Priority::Preemptible(5));
        let t3 = spawn(kernel, "t3", Priority::Preemptible(5));
        kernel.begin_multithreading();
        assert_eq!(kernel.current(), t1);

        let barrier = leak(Barrier::new(kernel, 3).unwrap());
        let leaders = leak(AtomicUsize::new(0));
        let returned = leak(AtomicUsize::new(0));

        for thread in [t2, t3] {
            kernel.arch().push_thread(thread, move |_| {
                if barrier.wait().is_leader() {
                    leaders.fetch_add(1, Ordering::SeqCst);
                }
                returned.fetch_add(1, Ordering::SeqCst);
            });
        }

        if barrier.wait().is_leader() {
            leaders.fetch_add(1, Ordering::SeqCst);
        }
        returned.fetch_add(1, Ordering::SeqCst);

        assert_eq!(leaders.load(Ordering::SeqCst), 1);
        assert_eq!(returned.load(Ordering::SeqCst), 3);
        assert!(kernel.waiters(barrier.wait_queue()).is_empty());
        assert_eq!(kernel.thread_stats().pending, 0);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_mutex_lock_times_out() {
        let kernel = sim_kernel();
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        let t2 = spawn(kernel, "t2", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let mutex = leak(Mutex::new(kernel).unwrap());
        mutex.lock(Timeout::Forever).unwrap();

        kernel.set_current(t2);
        kernel.arch().push_isr(|k| k.announce_ticks(3));
        assert_eq!(mutex.lock(Timeout::Ticks(3)), Err(SyncError::Timeout));

        assert_eq!(mutex.owner(), Some(t1));
        assert!(kernel.waiters(mutex.wait_queue()).is_empty());
        assert_quiescent(kernel);
    }

    #[test]
    fn test_mutex_unlock_wakes_waiter() {
        let kernel = sim_kernel();
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        let t2 = spawn(kernel, "t2", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let mutex = leak(Mutex::new(kernel).unwrap());
        kernel.set_current(t2);
        mutex.lock(Timeout::Forever).unwrap();
        kernel.set_current(t1);

        kernel.arch().push_thread(t2, move |_| {
            mutex.unlock().unwrap();
        });
        assert_eq!(mutex.lock(Timeout::Forever), Ok(()));
        assert_eq!(mutex.owner(), Some(t1));
        assert_eq!(mutex.unlock(), Ok(()));
        assert_quiescent(kernel);
    }

    #[test]
    fn test_unlock_by_non_owner_is_rejected() {
        let kernel = sim_kernel();
        let t1 = spawn(kernel, "t1", Priority::Preemptible(5));
        let t2 = spawn(kernel, "t2", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let mutex = leak(Mutex::new(kernel).unwrap());
        mutex.lock(Timeout::Forever).unwrap();
        kernel.set_current(t2);
        assert_eq!(mutex.unlock(), Err(SyncError::NotOwner));
        kernel.set_current(t1);
        assert_eq!(mutex.unlock(), Ok(()));
        assert_quiescent(kernel);
    }

    #[test]
    fn test_nested_ceilings_released_out_of_order() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Preemptible(10));
        kernel.begin_multithreading();

        let outer = leak(Mutex::with_ceiling(kernel, Priority::Preemptible(5)).unwrap());
        let inner = leak(Mutex::with_ceiling(kernel, Priority::Preemptible(2)).unwrap());
        outer.lock(Timeout::Forever).unwrap();
        inner.lock(Timeout::Forever).unwrap();
        assert_eq!(kernel.thread_priority(main), Priority::Preemptible(2));

        let mid = spawn(kernel, "mid", Priority::Preemptible(4));
        assert_eq!(kernel.arch().dispatched(), [main]);

        // the inner ceiling is still held
        outer.unlock().unwrap();
        assert_eq!(kernel.thread_priority(main), Priority::Preemptible(2));
        assert_eq!(kernel.arch().dispatched(), [main]);

        inner.unlock().unwrap();
        assert_eq!(kernel.thread_priority(main), Priority::Preemptible(10));
        assert_eq!(kernel.arch().dispatched(), [main, mid]);
        assert_eq!(kernel.current(), main);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_nested_ceilings_released_in_order() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Preemptible(10));
        kernel.begin_multithreading();

        let outer = leak(Mutex::with_ceiling(kernel, Priority::Preemptible(5)).unwrap());
        let inner = leak(Mutex::with_ceiling(kernel, Priority::Preemptible(2)).unwrap());
        outer.lock(Timeout::Forever).unwrap();
        inner.lock(Timeout::Forever).unwrap();
        let mid = spawn(kernel, "mid", Priority::Preemptible(4));

        inner.unlock().unwrap();
        assert_eq!(kernel.thread_priority(main), Priority::Preemptible(5));
        assert_eq!(kernel.arch().dispatched(), [main, mid]);

        outer.unlock().unwrap();
        assert_eq!(kernel.thread_priority(main), Priority::Preemptible(10));
        assert_quiescent(kernel);
    }

    #[test]
    fn test_priority_set_under_ceiling_applies_on_release() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Preemptible(10));
        kernel.begin_multithreading();

        let mutex = leak(Mutex::with_ceiling(kernel, Priority::Preemptible(2)).unwrap());
        mutex.lock(Timeout::Forever).unwrap();
        kernel.thread_priority_set(main, Priority::Preemptible(3));
        assert_eq!(kernel.thread_priority(main), Priority::Preemptible(2));

        mutex.unlock().unwrap();
        assert_eq!(kernel.thread_priority(main), Priority::Preemptible(3));
        assert_quiescent(kernel);
    }
}

#[cfg(test)]
mod scheduler_tests {
    use super::super::helpers::{assert_quiescent, sim_kernel, sim_kernel_with, spawn};
    use crate::config::KernelConfig;
    use crate::sched::{SchedObserver, WaitQueueId, SWAP_TIMEOUT};
    use crate::thread::{Priority, ThreadBuilder, ThreadId, ThreadState};
    use crate::time::{Duration, Timeout};
    use portable_atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_equal_priority_runs_in_ready_order() {
        let kernel = sim_kernel();
        let a = spawn(kernel, "a", Priority::Preemptible(4));
        let b = spawn(kernel, "b", Priority::Preemptible(4));
        kernel.begin_multithreading();

        assert_eq!(kernel.current(), a);
        assert_eq!(kernel.ready_at(Priority::Preemptible(4)), [a, b]);

        kernel.yield_now();
        assert_eq!(kernel.arch().dispatched().last(), Some(&b));
        assert_eq!(kernel.ready_at(Priority::Preemptible(4)), [b, a]);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_yield_without_peer_keeps_running() {
        let kernel = sim_kernel();
        let a = spawn(kernel, "a", Priority::Preemptible(4));
        spawn(kernel, "low", Priority::Preemptible(9));
        kernel.begin_multithreading();

        let switches = kernel.context_switches();
        kernel.yield_now();
        assert_eq!(kernel.current(), a);
        assert_eq!(kernel.context_switches(), switches);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_pend_unpend_round_trip_restores_state() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(1));
        let t = spawn(kernel, "t", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let wait_q = kernel.wait_queue_create().unwrap();
        let before = kernel.thread_state(t);

        kernel.pend(t, wait_q, Timeout::Ticks(10));
        assert!(kernel.thread_state(t).contains(ThreadState::PENDING));
        assert_eq!(kernel.thread_timeout_remaining(t), Some(10));
        assert_eq!(kernel.swap_retval(t), SWAP_TIMEOUT);

        kernel.unpend(t);
        assert_eq!(kernel.thread_state(t), before);
        assert_eq!(kernel.thread_timeout_remaining(t), None);
        assert!(kernel.waiters(wait_q).is_empty());
        assert!(!kernel.abort_timeout(t));

        kernel.ready_thread(t);
        assert!(kernel.is_ready(t));
        kernel.wait_queue_destroy(wait_q);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_zero_tick_pend_times_out_on_next_tick() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Preemptible(1));
        let t = spawn(kernel, "t", Priority::Preemptible(5));
        let u = spawn(kernel, "u", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let wait_q = kernel.wait_queue_create().unwrap();
        kernel.pend(t, wait_q, Timeout::Ticks(0));
        kernel.pend(u, wait_q, Timeout::NoWait);
        assert_eq!(kernel.thread_timeout_remaining(t), Some(0));
        assert_eq!(kernel.thread_timeout_remaining(u), Some(0));

        kernel.announce_ticks(1);
        for thread in [t, u] {
            assert!(kernel.is_ready(thread));
            assert!(!kernel.thread_state(thread).contains(ThreadState::PENDING));
            assert_eq!(kernel.swap_retval(thread), SWAP_TIMEOUT);
        }
        assert!(kernel.waiters(wait_q).is_empty());
        assert_eq!(kernel.current(), main);
        assert_quiescent(kernel);
    }

    #[test]
    #[should_panic(expected = "idle thread priority is fixed")]
    fn test_idle_priority_cannot_change() {
        let kernel = sim_kernel();
        kernel.thread_priority_set(kernel.idle_thread(), Priority::Preemptible(0));
    }

    #[test]
    #[should_panic(expected = "already pending")]
    fn test_double_pend_panics() {
        let kernel = sim_kernel();
        let t = spawn(kernel, "t", Priority::Preemptible(5));
        let wait_q = kernel.wait_queue_create().unwrap();
        kernel.pend(t, wait_q, Timeout::Forever);
        kernel.pend(t, wait_q, Timeout::Forever);
    }

    #[test]
    fn test_unpend_first_is_fifo() {
        let kernel = sim_kernel();
        let a = spawn(kernel, "a", Priority::Preemptible(7));
        let b = spawn(kernel, "b", Priority::Preemptible(2));
        let wait_q = kernel.wait_queue_create().unwrap();

        kernel.pend(a, wait_q, Timeout::Forever);
        kernel.pend(b, wait_q, Timeout::Forever);
        assert_eq!(kernel.unpend_first(wait_q), Some(a));
        assert_eq!(kernel.unpend_first(wait_q), Some(b));
        assert_eq!(kernel.unpend_first(wait_q), None);
        assert!(!kernel.thread_state(a).contains(ThreadState::PENDING));
    }

    #[test]
    fn test_priority_change_requeues_at_tail() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(1));
        let a = spawn(kernel, "a", Priority::Preemptible(6));
        let b = spawn(kernel, "b", Priority::Preemptible(6));
        let c = spawn(kernel, "c", Priority::Preemptible(6));
        let d = spawn(kernel, "d", Priority::Preemptible(7));
        kernel.begin_multithreading();

        // a keeps its priority yet loses its place in the level
        kernel.thread_priority_set(a, Priority::Preemptible(6));
        assert_eq!(kernel.ready_at(Priority::Preemptible(6)), [b, c, a]);

        kernel.thread_priority_set(b, Priority::Preemptible(7));
        assert_eq!(kernel.ready_at(Priority::Preemptible(7)), [d, b]);
        assert_eq!(kernel.ready_at(Priority::Preemptible(6)), [c, a]);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_priority_ceiling_clamps_requests() {
        let kernel = sim_kernel_with(KernelConfig::new().priority_ceiling(Priority::Preemptible(2)));
        let t = kernel.thread_create("t", Priority::Cooperative(0)).unwrap();
        assert_eq!(kernel.thread_priority(t), Priority::Preemptible(2));

        kernel.thread_priority_set(t, Priority::Preemptible(0));
        assert_eq!(kernel.thread_priority(t), Priority::Preemptible(2));

        kernel.thread_priority_set(t, Priority::Preemptible(9));
        assert_eq!(kernel.thread_priority(t), Priority::Preemptible(9));
    }

    #[test]
    fn test_higher_priority_wake_preempts_immediately() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Preemptible(5));
        let urgent = spawn(kernel, "urgent", Priority::Preemptible(1));
        let wait_q = kernel.wait_queue_create().unwrap();
        kernel.pend(urgent, wait_q, Timeout::Forever);
        kernel.begin_multithreading();
        assert_eq!(kernel.current(), main);

        let key = kernel.irq_lock();
        assert_eq!(kernel.wake_locked(&key, wait_q), Some(urgent));
        kernel.swap_or_unlock(key);
        assert_eq!(kernel.arch().dispatched().last(), Some(&urgent));
        assert_eq!(kernel.current(), main);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_cooperative_thread_is_not_preempted() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Cooperative(8));
        let urgent = ThreadBuilder::new()
            .name("urgent")
            .priority(Priority::Cooperative(1))
            .start(Timeout::Forever)
            .create(kernel)
            .unwrap();
        kernel.begin_multithreading();
        let switches = kernel.context_switches();

        kernel.thread_start(urgent);
        assert!(kernel.is_ready(urgent));
        assert_eq!(kernel.current(), main);
        assert_eq!(kernel.context_switches(), switches);
        assert!(!kernel.must_switch_threads());
        assert_quiescent(kernel);
    }

    #[test]
    fn test_sched_lock_defers_preemption() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Preemptible(5));
        kernel.begin_multithreading();

        kernel.sched_lock();
        kernel.sched_lock();
        let urgent = spawn(kernel, "urgent", Priority::Preemptible(1));
        assert_eq!(kernel.current(), main);
        assert!(!kernel.must_switch_threads());

        kernel.sched_unlock_no_reschedule();
        assert!(!kernel.must_switch_threads());
        kernel.sched_unlock();
        assert_eq!(kernel.arch().dispatched().last(), Some(&urgent));
        assert_quiescent(kernel);
    }

    #[test]
    #[should_panic(expected = "scheduler not locked")]
    fn test_sched_unlock_without_lock_panics() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(5));
        kernel.begin_multithreading();
        kernel.sched_unlock_no_reschedule();
    }

    #[test]
    fn test_interrupt_context_never_switches() {
        let kernel = sim_kernel();
        let main = spawn(kernel, "main", Priority::Preemptible(5));
        kernel.begin_multithreading();

        let urgent = ThreadBuilder::new()
            .priority(Priority::Preemptible(0))
            .start(Timeout::Forever)
            .create(kernel)
            .unwrap();
        kernel.arch().push_isr(move |k| {
            k.thread_start(urgent);
            assert!(!k.must_switch_threads());
        });
        kernel.arch().push_isr(move |k| k.thread_resume(main));

        kernel.thread_suspend(main);
        assert!(kernel.is_ready(urgent));
        assert!(kernel.is_ready(main));
        assert_quiescent(kernel);
    }

    #[test]
    fn test_delayed_start() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(1));
        kernel.begin_multithreading();

        let late = ThreadBuilder::new()
            .name("late")
            .priority(Priority::Preemptible(8))
            .start_delay(3)
            .create(kernel)
            .unwrap();
        assert!(kernel.thread_state(late).contains(ThreadState::PRESTART));
        assert_eq!(kernel.thread_timeout_remaining(late), Some(3));

        kernel.announce_ticks(2);
        assert!(!kernel.is_ready(late));
        kernel.announce_ticks(1);
        assert!(kernel.is_ready(late));
        assert!(!kernel.thread_state(late).contains(ThreadState::PRESTART));
        assert_quiescent(kernel);
    }

    #[test]
    fn test_thread_start_cancels_delay() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(1));
        kernel.begin_multithreading();

        let late = ThreadBuilder::new()
            .priority(Priority::Preemptible(8))
            .start_delay(50)
            .create(kernel)
            .unwrap();
        kernel.thread_start(late);
        assert!(kernel.is_ready(late));
        assert_eq!(kernel.thread_timeout_remaining(late), None);
        assert_quiescent(kernel);
    }

    #[test]
    fn test_sleep_wakes_after_ticks() {
        let kernel = sim_kernel_with(KernelConfig::new().tick_hz(1000));
        let main = spawn(kernel, "main", Priority::Preemptible(3));
        kernel.begin_multithreading();

        kernel.arch().push_isr(|k| k.announce_ticks(2));
        kernel.arch().push_isr(|k| k.announce_ticks(1));
        let start = kernel.uptime_ticks();
        kernel.sleep(kernel.timeout(Duration::from_millis(3)));

        assert!(kernel.uptime_ticks() - start >= 3);
        assert_eq!(kernel.current(), main);
        assert_eq!(kernel.arch().dispatched().last(), Some(&kernel.idle_thread()));
        assert_quiescent(kernel);
    }

    #[test]
    fn test_suspend_and_resume() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(1));
        let t = spawn(kernel, "t", Priority::Preemptible(6));
        kernel.begin_multithreading();

        kernel.thread_suspend(t);
        assert!(!kernel.is_ready(t));
        assert!(kernel.thread_state(t).contains(ThreadState::SUSPENDED));

        kernel.thread_resume(t);
        assert!(kernel.is_ready(t));
        assert!(!kernel.thread_state(t).contains(ThreadState::SUSPENDED));
        assert_quiescent(kernel);
    }

    #[test]
    fn test_abort_pending_thread_leaves_queue() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(1));
        let t = spawn(kernel, "t", Priority::Preemptible(6));
        kernel.begin_multithreading();

        let wait_q = kernel.wait_queue_create().unwrap();
        kernel.pend(t, wait_q, Timeout::Ticks(4));
        kernel.thread_abort(t);

        assert!(kernel.thread_state(t).contains(ThreadState::DEAD));
        assert!(kernel.waiters(wait_q).is_empty());
        assert_eq!(kernel.thread_timeout_remaining(t), None);
        kernel.announce_ticks(10);
        assert!(!kernel.is_ready(t));
        assert_quiescent(kernel);
    }

    #[test]
    #[should_panic(expected = "stale thread handle")]
    fn test_released_handle_is_stale() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(1));
        kernel.begin_multithreading();

        let t = spawn(kernel, "t", Priority::Preemptible(6));
        kernel.thread_abort(t);
        kernel.thread_release(t).unwrap();
        let reused = spawn(kernel, "reused", Priority::Preemptible(6));
        assert_eq!(reused.index(), t.index());

        kernel.thread_state(t);
    }

    #[test]
    fn test_observer_sees_scheduler_events() {
        struct Counter {
            ready: AtomicUsize,
            pend: AtomicUsize,
            expired: AtomicUsize,
            switches: AtomicUsize,
        }

        impl SchedObserver for Counter {
            fn thread_ready(&self, _thread: ThreadId) {
                self.ready.fetch_add(1, Ordering::SeqCst);
            }

            fn thread_pend(&self, _thread: ThreadId, _wait_q: Option<WaitQueueId>) {
                self.pend.fetch_add(1, Ordering::SeqCst);
            }

            fn timeout_expired(&self, _thread: ThreadId) {
                self.expired.fetch_add(1, Ordering::SeqCst);
            }

            fn context_switch(&self, _from: ThreadId, _to: ThreadId) {
                self.switches.fetch_add(1, Ordering::SeqCst);
            }
        }

        static COUNTER: Counter = Counter {
            ready: AtomicUsize::new(0),
            pend: AtomicUsize::new(0),
            expired: AtomicUsize::new(0),
            switches: AtomicUsize::new(0),
        };

        let kernel = sim_kernel();
        assert!(kernel.set_observer(&COUNTER));

        let t = spawn(kernel, "t", Priority::Preemptible(6));
        kernel.begin_multithreading();
        let wait_q = kernel.wait_queue_create().unwrap();
        kernel.arch().push_isr(|k| k.announce_ticks(2));
        let key = kernel.irq_lock();
        kernel.pend_current_locked(&key, wait_q, Timeout::Ticks(2));
        assert_eq!(kernel.swap(key), SWAP_TIMEOUT);

        assert_eq!(kernel.current(), t);
        assert_eq!(COUNTER.ready.load(Ordering::SeqCst), 2);
        assert_eq!(COUNTER.pend.load(Ordering::SeqCst), 1);
        assert_eq!(COUNTER.expired.load(Ordering::SeqCst), 1);
        assert_eq!(
            COUNTER.switches.load(Ordering::SeqCst) as u64,
            kernel.context_switches()
        );
        assert_quiescent(kernel);
    }

    #[test]
    fn test_thread_stats_track_states() {
        let kernel = sim_kernel();
        spawn(kernel, "main", Priority::Preemptible(1));
        let t = spawn(kernel, "t", Priority::Preemptible(6));
        let parked = kernel.thread_create("parked", Priority::Preemptible(6)).unwrap();
        kernel.begin_multithreading();

        let wait_q = kernel.wait_queue_create().unwrap();
        kernel.pend(t, wait_q, Timeout::Forever);
        let stats = kernel.thread_stats();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.ready, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(kernel.thread_name(parked), "parked");
    }
}
