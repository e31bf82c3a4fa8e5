//! Ticks, timeouts and the timeout registry.

pub(crate) mod tick;
pub(crate) mod timeout_queue;

pub use core::time::Duration;

/// Bound on a blocking call, in system ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    /// Do not block.
    NoWait,
    /// Block for at most this many ticks.
    Ticks(u32),
    /// Block until woken.
    Forever,
}

impl Timeout {
    /// Tick count if the timeout is finite and non-zero.
    pub fn ticks(self) -> Option<u32> {
        match self {
            Timeout::Ticks(0) | Timeout::NoWait | Timeout::Forever => None,
            Timeout::Ticks(ticks) => Some(ticks),
        }
    }

    /// `NoWait` or a zero tick count.
    pub fn is_no_wait(self) -> bool {
        matches!(self, Timeout::NoWait | Timeout::Ticks(0))
    }

    pub fn is_forever(self) -> bool {
        matches!(self, Timeout::Forever)
    }
}

/// Timeout status of a thread.
///
/// `Expired` covers the window between the tick that fired the timeout and
/// the moment the expiry is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeoutState {
    Inactive,
    Active,
    Expired,
}
