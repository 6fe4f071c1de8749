//! Block height tracker — confirmation arithmetic and listener cursor state.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Cursor state owned by the listener.
///
/// Values are copied out at the start of a poll cycle and committed back at
/// its end. `generation` changes on every rollback so a cycle can tell that a
/// `cancel()` happened while it was running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerState {
    /// Highest height handed to the executor. `None` until the first cycle seeds it.
    pub last_dispatched: Option<u64>,
    /// `last_dispatched` as it was when the most recent cycle started.
    pub in_flight_target: Option<u64>,
    generation: u64,
}

impl ListenerState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record the starting point of a new cycle.
    pub fn begin_cycle(&mut self) -> Self {
        self.in_flight_target = self.last_dispatched;
        *self
    }

    /// Move the cursor forward, unless a rollback happened since `snapshot`.
    ///
    /// Returns `false` when the commit was discarded.
    pub fn commit(&mut self, snapshot: &ListenerState, height: u64) -> bool {
        if self.generation != snapshot.generation {
            return false;
        }
        self.last_dispatched = Some(height);
        true
    }

    /// Roll the cursor back to `to` and invalidate any running cycle.
    pub fn rollback(&mut self, to: Option<u64>) {
        self.last_dispatched = to;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// What a poll cycle should do for an observed chain head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CyclePlan {
    /// Confirmed height is not above the cursor.
    NoAdvance { confirmed: u64 },
    /// First successful cycle: adopt `confirmed` without replaying history.
    Seed { confirmed: u64 },
    /// Deliver these heights in ascending order.
    Dispatch { heights: RangeInclusive<u64> },
}

/// Applies the fixed confirmation depth to raw chain heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightTracker {
    confirmation_depth: u64,
}

impl HeightTracker {
    pub fn new(confirmation_depth: u64) -> Self {
        Self { confirmation_depth }
    }

    pub fn confirmation_depth(&self) -> u64 {
        self.confirmation_depth
    }

    /// `raw_head - depth`, clamped at zero.
    pub fn compute_confirmed(&self, raw_head: u64) -> u64 {
        raw_head.saturating_sub(self.confirmation_depth)
    }

    /// Any confirmed height advances an unseeded cursor.
    pub fn is_advance(&self, candidate: u64, last_dispatched: Option<u64>) -> bool {
        match last_dispatched {
            Some(last) => candidate > last,
            None => true,
        }
    }

    /// Decide the work for a cycle that observed `raw_head`.
    pub fn plan(&self, raw_head: u64, last_dispatched: Option<u64>) -> CyclePlan {
        let confirmed = self.compute_confirmed(raw_head);
        if !self.is_advance(confirmed, last_dispatched) {
            return CyclePlan::NoAdvance { confirmed };
        }
        match last_dispatched {
            None => CyclePlan::Seed { confirmed },
            Some(last) => CyclePlan::Dispatch {
                heights: last + 1..=confirmed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_is_head_minus_depth_clamped() {
        let t = HeightTracker::new(12);
        assert_eq!(t.compute_confirmed(112), 100);
        assert_eq!(t.compute_confirmed(12), 0);
        assert_eq!(t.compute_confirmed(5), 0);
        assert_eq!(HeightTracker::new(0).compute_confirmed(7), 7);
    }

    #[test]
    fn confirmed_matches_max_formula() {
        for depth in 0..20u64 {
            let t = HeightTracker::new(depth);
            for head in 0..40u64 {
                let expected = (head as i64 - depth as i64).max(0) as u64;
                assert_eq!(t.compute_confirmed(head), expected, "head={head} depth={depth}");
            }
        }
    }

    #[test]
    fn advance_requires_strictly_greater() {
        let t = HeightTracker::new(2);
        assert!(t.is_advance(9, Some(8)));
        assert!(!t.is_advance(8, Some(8)));
        assert!(!t.is_advance(7, Some(8)));
        assert!(t.is_advance(0, None));
    }

    #[test]
    fn cold_start_seeds_then_dispatches_new_range() {
        let t = HeightTracker::new(2);
        assert_eq!(t.plan(10, None), CyclePlan::Seed { confirmed: 8 });
        assert_eq!(
            t.plan(12, Some(8)),
            CyclePlan::Dispatch { heights: 9..=10 }
        );
        assert_eq!(t.plan(10, Some(8)), CyclePlan::NoAdvance { confirmed: 8 });
    }

    #[test]
    fn genesis_is_a_real_height() {
        let t = HeightTracker::new(0);
        assert_eq!(t.plan(0, None), CyclePlan::Seed { confirmed: 0 });
        assert_eq!(t.plan(1, Some(0)), CyclePlan::Dispatch { heights: 1..=1 });
    }

    #[test]
    fn commit_discarded_after_rollback() {
        let mut state = ListenerState::default();
        state.rollback(Some(100));
        let snapshot = state.begin_cycle();
        assert_eq!(state.in_flight_target, Some(100));

        state.rollback(state.in_flight_target);
        assert!(!state.commit(&snapshot, 105));
        assert_eq!(state.last_dispatched, Some(100));

        let snapshot = state.begin_cycle();
        assert!(state.commit(&snapshot, 105));
        assert_eq!(state.last_dispatched, Some(105));
    }
}
