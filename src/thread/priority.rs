//! Thread priorities.
//!
//! Priorities are split in two classes. Cooperative threads are never
//! preempted involuntarily; preemptible threads are. Within the combined
//! ordering a lower raw value is more urgent, and every cooperative priority
//! is more urgent than every preemptible one.

use crate::config::{NUM_COOP_PRIORITIES, NUM_PREEMPT_PRIORITIES, NUM_PRIORITY_LEVELS};
use core::fmt;

/// Scheduling priority of a thread.
///
/// `Cooperative(n)` is valid for `n < NUM_COOP_PRIORITIES`, `Cooperative(0)`
/// being the most urgent priority in the system. `Preemptible(n)` is valid
/// for `n <= NUM_PREEMPT_PRIORITIES`; the last value is reserved for the
/// idle thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Exempt from involuntary preemption.
    Cooperative(u8),
    /// Preempted as soon as a more urgent thread becomes ready.
    Preemptible(u8),
}

impl Priority {
    /// The most urgent priority.
    pub const HIGHEST: Priority = Priority::Cooperative(0);

    /// Priority of the idle thread.
    pub const IDLE: Priority = Priority::Preemptible(NUM_PREEMPT_PRIORITIES as u8);

    /// Least urgent priority usable by application threads.
    pub const LOWEST_APPLICATION: Priority = Priority::Preemptible(NUM_PREEMPT_PRIORITIES as u8 - 1);

    /// Build a priority from its raw signed value.
    ///
    /// Negative values map to the cooperative class.
    pub fn from_raw(raw: i16) -> Option<Self> {
        let coop = NUM_COOP_PRIORITIES as i16;
        if (-coop..0).contains(&raw) {
            Some(Priority::Cooperative((raw + coop) as u8))
        } else if (0..=NUM_PREEMPT_PRIORITIES as i16).contains(&raw) {
            Some(Priority::Preemptible(raw as u8))
        } else {
            None
        }
    }

    /// Raw signed value; lower is more urgent.
    pub const fn raw(self) -> i16 {
        match self {
            Priority::Cooperative(n) => n as i16 - NUM_COOP_PRIORITIES as i16,
            Priority::Preemptible(n) => n as i16,
        }
    }

    /// Whether the value lies inside the configured ranges.
    pub const fn is_valid(self) -> bool {
        match self {
            Priority::Cooperative(n) => (n as usize) < NUM_COOP_PRIORITIES,
            Priority::Preemptible(n) => (n as usize) <= NUM_PREEMPT_PRIORITIES,
        }
    }

    /// Ready queue level; level 0 is the most urgent.
    ///
    /// # Panics
    ///
    /// Panics if the priority is out of range.
    pub fn level(self) -> usize {
        assert!(self.is_valid(), "priority {} out of range", self);
        (self.raw() + NUM_COOP_PRIORITIES as i16) as usize
    }

    /// Inverse of [`Priority::level`].
    pub fn from_level(level: usize) -> Option<Self> {
        if level < NUM_PRIORITY_LEVELS {
            Self::from_raw(level as i16 - NUM_COOP_PRIORITIES as i16)
        } else {
            None
        }
    }

    /// True for the cooperative class.
    pub const fn is_cooperative(self) -> bool {
        matches!(self, Priority::Cooperative(_))
    }

    /// True for the preemptible class.
    pub const fn is_preemptible(self) -> bool {
        matches!(self, Priority::Preemptible(_))
    }

    /// Strict comparison: `self` would preempt a thread running at `other`.
    pub const fn is_higher_than(self, other: Priority) -> bool {
        self.raw() < other.raw()
    }

    /// Non-strict comparison, used for placement decisions only.
    pub const fn is_higher_or_equal(self, other: Priority) -> bool {
        self.raw() <= other.raw()
    }

    /// Clamp `self` so it is not more urgent than `ceiling`.
    pub const fn clamp_to(self, ceiling: Priority) -> Priority {
        if self.is_higher_than(ceiling) {
            ceiling
        } else {
            self
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Cooperative(n) => write!(f, "coop({})", n),
            Priority::Preemptible(n) => write!(f, "preempt({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_mapping() {
        assert_eq!(Priority::HIGHEST.raw(), -16);
        assert_eq!(Priority::Cooperative(15).raw(), -1);
        assert_eq!(Priority::Preemptible(0).raw(), 0);
        assert_eq!(Priority::IDLE.raw(), 32);
        assert_eq!(Priority::from_raw(-1), Some(Priority::Cooperative(15)));
        assert_eq!(Priority::from_raw(7), Some(Priority::Preemptible(7)));
        assert_eq!(Priority::from_raw(-17), None);
        assert_eq!(Priority::from_raw(33), None);
    }

    #[test]
    fn test_levels_round_trip_every_valid_priority() {
        for level in 0..NUM_PRIORITY_LEVELS {
            let prio = Priority::from_level(level).unwrap();
            assert_eq!(prio.level(), level);
        }
        assert_eq!(Priority::from_level(NUM_PRIORITY_LEVELS), None);
    }

    #[test]
    fn test_comparators() {
        let coop = Priority::Cooperative(3);
        let high = Priority::Preemptible(1);
        let low = Priority::Preemptible(9);

        assert!(coop.is_higher_than(high));
        assert!(high.is_higher_than(low));
        assert!(!low.is_higher_than(low));
        assert!(low.is_higher_or_equal(low));
        assert!(!low.is_higher_or_equal(high));
    }

    #[test]
    fn test_clamp_to_ceiling() {
        let ceiling = Priority::Preemptible(2);
        assert_eq!(Priority::Cooperative(0).clamp_to(ceiling), ceiling);
        assert_eq!(Priority::Preemptible(1).clamp_to(ceiling), ceiling);
        assert_eq!(Priority::Preemptible(5).clamp_to(ceiling), Priority::Preemptible(5));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_level_of_invalid_priority_panics() {
        let _ = Priority::Preemptible(200).level();
    }
}
