#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(unreachable_pub)]

//! Scheduler core for embedded real-time kernels.
//!
//! This library provides the thread-scheduling and blocking-synchronization
//! core of a single-CPU real-time kernel: a priority-bitmap ready queue with
//! O(1) dispatch, intrusive wait queues with tick-driven timeouts, and a
//! mutex, condition variable and barrier built directly on top of them.
//!
//! # Priorities
//!
//! [`Priority::Cooperative`] threads are never preempted involuntarily.
//! [`Priority::Preemptible`] threads are preempted as soon as a more urgent
//! thread becomes ready. Equal-priority threads run in the order they became
//! ready, and wait queues wake strictly in arrival order whatever the
//! waiters' priorities.
//!
//! # Ports
//!
//! The crate never touches hardware. A port implements [`Arch`] (the global
//! interrupt lock) and [`ContextSwitch`] (suspending the running thread),
//! drives the clock through [`Kernel::announce_ticks`], and owns thread
//! stacks. [`NoOpArch`] is a port for single-context hosts.
//!
//! # Quick Start
//!
//! ```
//! use rt_sched::{Kernel, KernelConfig, NoOpArch, Priority, ThreadBuilder};
//!
//! let kernel = Kernel::new(NoOpArch, KernelConfig::new().tick_hz(1000)).unwrap();
//!
//! let worker = ThreadBuilder::new()
//!     .name("worker")
//!     .priority(Priority::Preemptible(4))
//!     .create(&kernel)
//!     .unwrap();
//!
//! kernel.begin_multithreading();
//! assert_eq!(kernel.current(), worker);
//! ```
//!
//! # Logging
//!
//! Scheduler events are reported through the `log` facade at `trace` and
//! `debug` level. Install any logger to see them, or register a
//! [`SchedObserver`] to receive them as callbacks.

// Core modules
pub mod arch;
pub mod config;
pub mod errors;
pub mod kernel;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(test)]
extern crate std;

extern crate alloc;

#[cfg(test)]
mod tests;

// ============================================================================
// Public API
// ============================================================================

// Ports
pub use arch::{Arch, ContextSwitch, IrqKey, NoOpArch};

// Kernel
pub use config::KernelConfig;
pub use kernel::{Kernel, ThreadStats};

// Scheduler
pub use sched::{SchedObserver, WaitQueueId, EAGAIN, SWAP_OK, SWAP_TIMEOUT};

// Threads
pub use thread::{Priority, ThreadBuilder, ThreadId, ThreadState};

// Synchronization
pub use sync::{Barrier, BarrierWaitResult, CondVar, Mutex};

// Time
pub use time::{Duration, Timeout};

// Errors
pub use errors::{KernelError, KernelResult, SyncError, SyncResult};
