//! Kernel configuration.
//!
//! Priority counts are compile-time constants because they size the ready
//! queue bitmap. Everything else lives in [`KernelConfig`], which is handed
//! to [`Kernel::new`](crate::Kernel::new) once at boot.

use crate::errors::ConfigError;
use crate::thread::Priority;

/// Number of cooperative priority levels (raw values `-16..=-1`).
pub const NUM_COOP_PRIORITIES: usize = 16;

/// Number of preemptible priority levels available to application threads
/// (raw values `0..=31`). The idle thread sits one level below them.
pub const NUM_PREEMPT_PRIORITIES: usize = 32;

/// Total number of ready queue levels, including the idle level.
pub const NUM_PRIORITY_LEVELS: usize = NUM_COOP_PRIORITIES + NUM_PREEMPT_PRIORITIES + 1;

/// Default tick rate of the system clock.
pub const DEFAULT_TICK_HZ: u32 = 100;

/// Default capacity of the thread table (idle and bootstrap threads included).
pub const DEFAULT_MAX_THREADS: usize = 32;

/// Default number of wait queues that can exist at once.
pub const DEFAULT_MAX_WAIT_QUEUES: usize = 64;

/// Runtime kernel configuration.
///
/// # Examples
///
/// ```
/// use rt_sched::{KernelConfig, Priority};
///
/// let config = KernelConfig::new()
///     .max_threads(8)
///     .tick_hz(1000)
///     .priority_ceiling(Priority::Preemptible(0));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub(crate) max_threads: usize,
    pub(crate) max_wait_queues: usize,
    pub(crate) tick_hz: u32,
    pub(crate) priority_ceiling: Priority,
}

impl KernelConfig {
    /// Configuration with the default limits and no effective ceiling.
    pub const fn new() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            max_wait_queues: DEFAULT_MAX_WAIT_QUEUES,
            tick_hz: DEFAULT_TICK_HZ,
            priority_ceiling: Priority::HIGHEST,
        }
    }

    /// Set the thread table capacity.
    pub const fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the maximum number of live wait queues.
    pub const fn max_wait_queues(mut self, max_wait_queues: usize) -> Self {
        self.max_wait_queues = max_wait_queues;
        self
    }

    /// Set the tick rate used to convert durations into ticks.
    pub const fn tick_hz(mut self, tick_hz: u32) -> Self {
        self.tick_hz = tick_hz;
        self
    }

    /// Set the most urgent priority any thread may be given.
    ///
    /// Requests above the ceiling are clamped down to it.
    pub const fn priority_ceiling(mut self, ceiling: Priority) -> Self {
        self.priority_ceiling = ceiling;
        self
    }

    /// Configured tick rate.
    pub fn ticks_per_second(&self) -> u32 {
        self.tick_hz
    }

    /// Configured priority ceiling.
    pub fn ceiling(&self) -> Priority {
        self.priority_ceiling
    }

    /// Check the configuration for values the kernel cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // idle + bootstrap + at least one real thread
        if self.max_threads < 3 {
            return Err(ConfigError::TooFewThreads(self.max_threads));
        }
        if self.max_threads > u16::MAX as usize {
            return Err(ConfigError::TooManyThreads(self.max_threads));
        }
        if self.max_wait_queues > u16::MAX as usize {
            return Err(ConfigError::TooManyWaitQueues(self.max_wait_queues));
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::InvalidTickRate(self.tick_hz));
        }
        if !self.priority_ceiling.is_valid() || self.priority_ceiling == Priority::IDLE {
            return Err(ConfigError::InvalidCeiling(self.priority_ceiling.raw()));
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
