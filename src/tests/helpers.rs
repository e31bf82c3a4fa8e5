//! Test helper utilities: a scripted port for host tests.

use crate::arch::{Arch, ContextSwitch, IrqKey};
use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::sched::SWAP_OK;
use crate::thread::{Priority, ThreadBuilder, ThreadId, ThreadState};
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

type StepFn = Box<dyn FnOnce(&Kernel<SimArch>) + Send>;

/// Work queued to run while a thread is switched out.
pub(crate) enum Step {
    /// Run as the given thread.
    Thread(ThreadId, StepFn),
    /// Run in interrupt context.
    Isr(StepFn),
}

/// Port that simulates context switches on the test thread.
///
/// The test body plays the current thread. When that thread blocks, the
/// port switches to the next ready thread and runs queued steps until the
/// blocked thread is ready again, then switches back and returns its swap
/// result. A thread that is preempted but still ready resumes at once.
pub(crate) struct SimArch {
    depth: AtomicUsize,
    in_isr: AtomicBool,
    script: spin::Mutex<VecDeque<Step>>,
    dispatched: spin::Mutex<Vec<ThreadId>>,
}

impl SimArch {
    pub(crate) fn new() -> Self {
        Self {
            depth: AtomicUsize::new(0),
            in_isr: AtomicBool::new(false),
            script: spin::Mutex::new(VecDeque::new()),
            dispatched: spin::Mutex::new(Vec::new()),
        }
    }

    /// Queue `f` to run as `thread`.
    pub(crate) fn push_thread<F>(&self, thread: ThreadId, f: F)
    where
        F: FnOnce(&Kernel<SimArch>) + Send + 'static,
    {
        self.script.lock().push_back(Step::Thread(thread, Box::new(f)));
    }

    /// Queue `f` to run as an interrupt handler.
    pub(crate) fn push_isr<F>(&self, f: F)
    where
        F: FnOnce(&Kernel<SimArch>) + Send + 'static,
    {
        self.script.lock().push_back(Step::Isr(Box::new(f)));
    }

    /// Threads switched to, in order.
    pub(crate) fn dispatched(&self) -> Vec<ThreadId> {
        self.dispatched.lock().clone()
    }

    pub(crate) fn irq_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub(crate) fn steps_left(&self) -> usize {
        self.script.lock().len()
    }

    fn run(&self, kernel: &Kernel<SimArch>, step: Step) {
        match step {
            Step::Thread(thread, f) => {
                kernel.set_current(thread);
                f(kernel);
            }
            Step::Isr(f) => {
                let was_in_isr = self.in_isr.swap(true, Ordering::SeqCst);
                f(kernel);
                self.in_isr.store(was_in_isr, Ordering::SeqCst);
            }
        }
    }
}

impl Arch for SimArch {
    fn irq_lock(&self) -> IrqKey {
        let previous = self.depth.fetch_add(1, Ordering::SeqCst);
        // SAFETY: the simulated CPU has no real interrupts to mask.
        unsafe { IrqKey::new(previous as u32) }
    }

    fn irq_unlock(&self, key: IrqKey) {
        let previous = self.depth.fetch_sub(1, Ordering::SeqCst);
        assert!(previous > 0, "irq_unlock without irq_lock");
        assert_eq!(key.state() as usize, previous - 1, "irq keys released out of order");
    }

    fn in_isr(&self) -> bool {
        self.in_isr.load(Ordering::SeqCst)
    }
}

impl ContextSwitch for SimArch {
    fn suspend(&self, kernel: &Kernel<Self>, key: IrqKey) -> i32 {
        let outgoing = kernel.current();
        let incoming = kernel.next_ready();
        if incoming == outgoing {
            self.irq_unlock(key);
            return kernel.swap_retval(outgoing);
        }

        kernel.set_current(incoming);
        self.dispatched.lock().push(incoming);
        self.irq_unlock(key);

        if kernel
            .thread_state(outgoing)
            .intersects(ThreadState::DUMMY | ThreadState::DEAD)
        {
            return SWAP_OK;
        }

        while !kernel.is_ready(outgoing) {
            let step = self.script.lock().pop_front();
            match step {
                Some(step) => self.run(kernel, step),
                None => panic!("thread {} blocked with no steps left to run", outgoing),
            }
        }

        kernel.set_current(outgoing);
        kernel.swap_retval(outgoing)
    }
}

/// Leak a value for the rest of the test process.
pub(crate) fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

pub(crate) fn sim_kernel() -> &'static Kernel<SimArch> {
    sim_kernel_with(KernelConfig::new())
}

pub(crate) fn sim_kernel_with(config: KernelConfig) -> &'static Kernel<SimArch> {
    leak(Kernel::new(SimArch::new(), config).unwrap())
}

/// Create and start a thread.
pub(crate) fn spawn(kernel: &Kernel<SimArch>, name: &'static str, priority: Priority) -> ThreadId {
    ThreadBuilder::new()
        .name(name)
        .priority(priority)
        .create(kernel)
        .unwrap()
}

pub(crate) fn assert_quiescent(kernel: &Kernel<SimArch>) {
    assert_eq!(kernel.arch().irq_depth(), 0, "interrupt lock still held");
    assert_eq!(kernel.arch().steps_left(), 0, "script not fully consumed");
}
