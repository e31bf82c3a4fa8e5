use super::{Priority, ThreadId};
use crate::arch::ContextSwitch;
use crate::errors::KernelResult;
use crate::kernel::Kernel;
use crate::time::Timeout;

/// Thread creation options.
///
/// `start` decides what happens after the control block is allocated:
/// `NoWait` readies the thread at once, `Ticks(n)` readies it after `n`
/// ticks, and `Forever` leaves it in PRESTART until
/// [`Kernel::thread_start`] is called.
#[derive(Debug, Clone, Copy)]
pub struct ThreadBuilder {
    priority: Priority,
    name: &'static str,
    start: Timeout,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self {
            priority: Priority::Preemptible(0),
            name: "thread",
            start: Timeout::NoWait,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn start(mut self, start: Timeout) -> Self {
        self.start = start;
        self
    }

    /// Delay the start by `ticks` ticks.
    pub fn start_delay(self, ticks: u32) -> Self {
        self.start(Timeout::Ticks(ticks))
    }

    /// Create the thread on `kernel`.
    pub fn create<A: ContextSwitch>(self, kernel: &Kernel<A>) -> KernelResult<ThreadId> {
        let thread = kernel.thread_create(self.name, self.priority)?;
        match self.start {
            Timeout::Forever => {}
            start => match start.ticks() {
                Some(ticks) => kernel.thread_start_delayed(thread, ticks),
                None => kernel.thread_start(thread),
            },
        }
        Ok(thread)
    }
}

impl Default for ThreadBuilder {
    fn default() -> Self {
        Self::new()
    }
}
