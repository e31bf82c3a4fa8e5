//! Mutex, condition variable and barrier.
//!
//! Each object owns one kernel wait queue and blocks through the kernel's
//! pend/swap primitives; none of them keeps its own list of threads.

mod barrier;
mod condvar;
mod mutex;

pub use barrier::{Barrier, BarrierWaitResult};
pub use condvar::CondVar;
pub use mutex::Mutex;
