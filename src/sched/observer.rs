//! Scheduler event hooks.

use crate::sched::wait_queue::WaitQueueId;
use crate::thread::ThreadId;

/// Receiver for scheduler events, for tracing and instrumentation.
///
/// Every method has an empty default. Hooks run with the interrupt lock
/// held and must not call back into the kernel.
pub trait SchedObserver: Sync {
    /// A thread was inserted into the ready queue.
    fn thread_ready(&self, _thread: ThreadId) {}

    /// A thread left the ready queue to block. `wait_q` is `None` for a
    /// plain sleep.
    fn thread_pend(&self, _thread: ThreadId, _wait_q: Option<WaitQueueId>) {}

    /// A thread's timeout fired.
    fn timeout_expired(&self, _thread: ThreadId) {}

    /// The port switched the current thread.
    fn context_switch(&self, _from: ThreadId, _to: ThreadId) {}
}

/// Observer used until one is registered.
#[derive(Debug)]
pub(crate) struct NoopObserver;

impl SchedObserver for NoopObserver {}

pub(crate) static NOOP_OBSERVER: NoopObserver = NoopObserver;
