//! Error types for the scheduler and synchronization layer.
//!
//! Recoverable outcomes (timeouts, busy resources, exhausted tables, bad
//! configuration) are reported through these types. Kernel invariant
//! violations such as pending a thread twice are programming errors and
//! panic instead.

#![allow(clippy::uninlined_format_args)]

use core::fmt;

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Result type for blocking and non-blocking synchronization calls.
pub type SyncResult<T> = Result<T, SyncError>;

/// Top-level kernel error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Thread creation errors
    Spawn(SpawnError),
    /// Fixed-size table exhaustion and slot misuse
    Resource(ResourceError),
    /// Invalid kernel configuration
    Config(ConfigError),
    /// Synchronization errors
    Sync(SyncError),
}

/// Errors that can occur while creating a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// Thread table is full
    TooManyThreads,
    /// Priority outside the configured ranges, carried as its raw value
    InvalidPriority(i16),
    /// The idle priority is reserved for the idle thread
    ReservedPriority,
}

/// Errors related to fixed kernel tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// No free wait queue slot
    WaitQueuesExhausted,
    /// Slot release requested for a thread that has not terminated
    ThreadNotDead,
    /// The idle or bootstrap thread cannot be released
    ReservedThread,
}

/// Configuration errors reported by [`KernelConfig::validate`](crate::KernelConfig::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Thread table cannot hold the idle and bootstrap threads plus one more
    TooFewThreads(usize),
    /// Thread table larger than a handle index can address
    TooManyThreads(usize),
    /// Wait queue table larger than a handle index can address
    TooManyWaitQueues(usize),
    /// Tick rate of zero
    InvalidTickRate(u32),
    /// Ceiling outside the priority ranges or equal to the idle priority
    InvalidCeiling(i16),
}

/// Errors returned by mutex, condition variable and barrier operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// The timeout elapsed before the wait was satisfied
    Timeout,
    /// The resource is unavailable and the call does not block
    Busy,
    /// Unlock attempted by a thread that does not own the mutex
    NotOwner,
    /// Argument rejected at construction time
    InvalidArgument,
    /// Any other non-zero result code delivered by the context switch
    Code(i32),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Spawn(e) => write!(f, "Thread spawn error: {}", e),
            KernelError::Resource(e) => write!(f, "Resource error: {}", e),
            KernelError::Config(e) => write!(f, "Configuration error: {}", e),
            KernelError::Sync(e) => write!(f, "Synchronization error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::TooManyThreads => write!(f, "Maximum number of threads reached"),
            SpawnError::InvalidPriority(prio) => write!(f, "Invalid priority: {}", prio),
            SpawnError::ReservedPriority => write!(f, "Idle priority is reserved"),
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::WaitQueuesExhausted => write!(f, "No free wait queue"),
            ResourceError::ThreadNotDead => write!(f, "Thread has not terminated"),
            ResourceError::ReservedThread => write!(f, "Reserved thread cannot be released"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TooFewThreads(n) => write!(f, "Thread table too small: {}", n),
            ConfigError::TooManyThreads(n) => write!(f, "Thread table too large: {}", n),
            ConfigError::TooManyWaitQueues(n) => write!(f, "Wait queue table too large: {}", n),
            ConfigError::InvalidTickRate(hz) => write!(f, "Invalid tick rate: {} Hz", hz),
            ConfigError::InvalidCeiling(raw) => write!(f, "Invalid priority ceiling: {}", raw),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Timeout => write!(f, "Operation timed out"),
            SyncError::Busy => write!(f, "Resource busy"),
            SyncError::NotOwner => write!(f, "Caller does not own the mutex"),
            SyncError::InvalidArgument => write!(f, "Invalid argument"),
            SyncError::Code(code) => write!(f, "Wait failed with code {}", code),
        }
    }
}

// Conversion implementations for ergonomic error handling

impl From<SpawnError> for KernelError {
    fn from(error: SpawnError) -> Self {
        KernelError::Spawn(error)
    }
}

impl From<ResourceError> for KernelError {
    fn from(error: ResourceError) -> Self {
        KernelError::Resource(error)
    }
}

impl From<ConfigError> for KernelError {
    fn from(error: ConfigError) -> Self {
        KernelError::Config(error)
    }
}

impl From<SyncError> for KernelError {
    fn from(error: SyncError) -> Self {
        KernelError::Sync(error)
    }
}

impl SyncError {
    /// Map a swap result code to a synchronization result.
    pub fn from_swap(code: i32) -> SyncResult<()> {
        match code {
            crate::sched::SWAP_OK => Ok(()),
            crate::sched::SWAP_TIMEOUT => Err(SyncError::Timeout),
            other => Err(SyncError::Code(other)),
        }
    }
}
