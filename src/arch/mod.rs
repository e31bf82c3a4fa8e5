//! Port contracts: interrupt locking and the context switch.
//!
//! The scheduler never touches hardware. A port implements [`Arch`] to
//! provide the global interrupt lock and [`ContextSwitch`] to suspend the
//! running thread and resume whichever thread the kernel selects.

use crate::kernel::Kernel;
use critical_section::CriticalSection;
use core::marker::PhantomData;

/// Proof that the global interrupt lock is held.
///
/// Returned by [`Arch::irq_lock`] and consumed by [`Arch::irq_unlock`] or by
/// a context switch. The saved interrupt state travels inside the key.
#[must_use = "dropping an IrqKey leaves interrupts locked"]
#[derive(Debug)]
pub struct IrqKey {
    state: u32,
    _not_send: PhantomData<*const ()>,
}

impl IrqKey {
    /// Wrap the interrupt state saved by a port's lock routine.
    ///
    /// # Safety
    ///
    /// Interrupts must actually be disabled on the current CPU, and must
    /// stay disabled until the key is handed back to the port.
    pub unsafe fn new(state: u32) -> Self {
        Self {
            state,
            _not_send: PhantomData,
        }
    }

    /// Interrupt state saved when the lock was taken.
    pub fn state(&self) -> u32 {
        self.state
    }

    pub(crate) fn critical_section(&self) -> CriticalSection<'_> {
        // SAFETY: an IrqKey only exists while interrupts are disabled.
        unsafe { CriticalSection::new() }
    }
}

/// Interrupt control provided by a port.
pub trait Arch {
    /// Disable interrupts, returning the previous state. Calls nest.
    fn irq_lock(&self) -> IrqKey;

    /// Restore the interrupt state saved in `key`.
    fn irq_unlock(&self, key: IrqKey);

    /// Whether the CPU is executing an interrupt handler.
    fn in_isr(&self) -> bool;
}

/// Thread switching provided by a port.
pub trait ContextSwitch: Arch + Sized {
    /// Suspend the calling thread and dispatch [`Kernel::next_ready`].
    ///
    /// The port makes the incoming thread current with
    /// [`Kernel::set_current`] and releases `key` on the incoming side. When
    /// the caller is eventually resumed, the call returns the caller's
    /// [`Kernel::swap_retval`].
    fn suspend(&self, kernel: &Kernel<Self>, key: IrqKey) -> i32;
}

/// Port for single-context hosts.
///
/// There are no interrupts and no stacks to switch. `suspend` makes the
/// next ready thread current and returns immediately, so the caller simply
/// continues as that thread.
#[derive(Debug, Default)]
pub struct NoOpArch;

impl Arch for NoOpArch {
    fn irq_lock(&self) -> IrqKey {
        // SAFETY: nothing can interrupt a single-context host.
        unsafe { IrqKey::new(0) }
    }

    fn irq_unlock(&self, _key: IrqKey) {}

    fn in_isr(&self) -> bool {
        false
    }
}

impl ContextSwitch for NoOpArch {
    fn suspend(&self, kernel: &Kernel<Self>, key: IrqKey) -> i32 {
        let next = kernel.next_ready();
        self.irq_unlock(key);
        kernel.set_current(next);
        kernel.swap_retval(next)
    }
}
