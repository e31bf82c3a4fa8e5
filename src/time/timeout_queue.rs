//! Delta-list timeout registry.
//!
//! Each pending entry stores its deadline relative to the entry before it,
//! so advancing time only touches the head. Entries whose deadline has
//! passed move to the expired list and wait there until the kernel handles
//! them one by one.

use super::TimeoutState;
use crate::sched::list::{List, TimeoutLink};
use crate::thread::table::ThreadTable;

#[derive(Debug)]
pub(crate) struct TimeoutQueue {
    pending: List<TimeoutLink>,
    expired: List<TimeoutLink>,
}

impl TimeoutQueue {
    pub(crate) const fn new() -> Self {
        Self {
            pending: List::new(),
            expired: List::new(),
        }
    }

    /// Arm a timeout `ticks` from now. Equal deadlines fire in arming order.
    pub(crate) fn add(&mut self, table: &mut ThreadTable, slot: u16, ticks: u32) {
        debug_assert_eq!(table.tcb(slot).timeout, TimeoutState::Inactive);

        let mut remaining = ticks;
        let mut cursor = self.pending.head();
        while let Some(entry) = cursor {
            let delta = table.tcb(entry).timeout_delta;
            if remaining < delta {
                table.tcb_mut(entry).timeout_delta = delta - remaining;
                self.pending.insert_before(table, entry, slot);
                Self::arm(table, slot, remaining);
                return;
            }
            remaining -= delta;
            cursor = List::<TimeoutLink>::next(table, entry);
        }

        self.pending.push_back(table, slot);
        Self::arm(table, slot, remaining);
    }

    /// Cancel an active or expired-but-unhandled timeout.
    ///
    /// Returns `false` if the thread had no timeout to cancel.
    pub(crate) fn abort(&mut self, table: &mut ThreadTable, slot: u16) -> bool {
        match table.tcb(slot).timeout {
            TimeoutState::Inactive => false,
            TimeoutState::Active => {
                let delta = table.tcb(slot).timeout_delta;
                if let Some(next) = List::<TimeoutLink>::next(table, slot) {
                    table.tcb_mut(next).timeout_delta += delta;
                }
                self.pending.remove(table, slot);
                Self::disarm(table, slot);
                true
            }
            TimeoutState::Expired => {
                self.expired.remove(table, slot);
                Self::disarm(table, slot);
                true
            }
        }
    }

    /// Advance time by `ticks`, moving every entry that is now due onto the
    /// expired list. Returns the number of entries that expired.
    pub(crate) fn announce(&mut self, table: &mut ThreadTable, ticks: u32) -> usize {
        let mut left = ticks;
        let mut fired = 0;

        while let Some(head) = self.pending.head() {
            let delta = table.tcb(head).timeout_delta;
            if delta > left {
                table.tcb_mut(head).timeout_delta = delta - left;
                break;
            }
            left -= delta;
            self.pending.remove(table, head);

            let tcb = table.tcb_mut(head);
            tcb.timeout_delta = 0;
            tcb.timeout = TimeoutState::Expired;
            self.expired.push_back(table, head);
            fired += 1;
        }
        fired
    }

    /// Take the oldest expired entry for handling.
    pub(crate) fn pop_expired(&mut self, table: &mut ThreadTable) -> Option<u16> {
        let slot = self.expired.pop_front(table)?;
        table.tcb_mut(slot).timeout = TimeoutState::Inactive;
        Some(slot)
    }

    /// Ticks left before `slot`'s timeout fires.
    pub(crate) fn remaining(&self, table: &ThreadTable, slot: u16) -> Option<u32> {
        match table.tcb(slot).timeout {
            TimeoutState::Inactive => None,
            TimeoutState::Expired => Some(0),
            TimeoutState::Active => {
                let mut total = 0u32;
                for entry in self.pending.iter(table) {
                    total = total.saturating_add(table.tcb(entry).timeout_delta);
                    if entry == slot {
                        return Some(total);
                    }
                }
                None
            }
        }
    }

    pub(crate) fn has_expired(&self) -> bool {
        !self.expired.is_empty()
    }

    fn arm(table: &mut ThreadTable, slot: u16, delta: u32) {
        let tcb = table.tcb_mut(slot);
        tcb.timeout_delta = delta;
        tcb.timeout = TimeoutState::Active;
    }

    fn disarm(table: &mut ThreadTable, slot: u16) {
        let tcb = table.tcb_mut(slot);
        tcb.timeout_delta = 0;
        tcb.timeout = TimeoutState::Inactive;
    }
}
