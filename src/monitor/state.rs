//! Philosopher states and the table state guarded by the monitor lock.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::table::Ring;

/// Philosopher lifecycle state.
///
/// State transitions:
/// ```text
/// THINKING → HUNGRY → EATING → THINKING
///               ↓
///           THINKING   (cancelled while waiting)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhilosopherState {
    #[default]
    Thinking,
    Hungry,
    Eating,
}

impl PhilosopherState {
    pub fn is_eating(self) -> bool {
        self == PhilosopherState::Eating
    }
}

impl fmt::Display for PhilosopherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhilosopherState::Thinking => "THINKING",
            PhilosopherState::Hungry => "HUNGRY",
            PhilosopherState::Eating => "EATING",
        };
        f.pad(name)
    }
}

/// Everything the monitor serializes: one state per philosopher and one
/// holder per fork.
///
/// Indices are assumed valid; the monitor checks them before calling in.
#[derive(Debug, Clone)]
pub(crate) struct TableState {
    ring: Ring,
    states: Vec<PhilosopherState>,
    holders: Vec<Option<usize>>,
}

impl TableState {
    pub(crate) fn new(ring: Ring) -> Self {
        Self {
            ring,
            states: vec![PhilosopherState::Thinking; ring.seats()],
            holders: vec![None; ring.seats()],
        }
    }

    pub(crate) fn state(&self, id: usize) -> PhilosopherState {
        self.states[id]
    }

    pub(crate) fn holder(&self, fork: usize) -> Option<usize> {
        self.holders[fork]
    }

    pub(crate) fn states(&self) -> &[PhilosopherState] {
        &self.states
    }

    pub(crate) fn holders(&self) -> &[Option<usize>] {
        &self.holders
    }

    pub(crate) fn eating_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_eating()).count()
    }

    /// Mark `id` hungry and try to admit it straight away.
    /// Returns true if it is now eating.
    pub(crate) fn become_hungry(&mut self, id: usize) -> bool {
        if self.states[id] != PhilosopherState::Eating {
            self.states[id] = PhilosopherState::Hungry;
        }
        self.try_eat(id)
    }

    /// Admission predicate: hungry and neither neighbor eating. On success
    /// the state change and both fork grabs happen together.
    pub(crate) fn try_eat(&mut self, id: usize) -> bool {
        match self.states[id] {
            PhilosopherState::Eating => return true,
            PhilosopherState::Thinking => return false,
            PhilosopherState::Hungry => {}
        }
        let left = self.ring.left_neighbor(id);
        let right = self.ring.right_neighbor(id);
        if self.states[left].is_eating() || self.states[right].is_eating() {
            return false;
        }

        self.states[id] = PhilosopherState::Eating;
        for fork in self.ring.forks_of(id) {
            self.holders[fork] = Some(id);
        }
        true
    }

    /// Drop both forks, go back to thinking, and let both neighbors retry.
    pub(crate) fn release(&mut self, id: usize) {
        for fork in self.ring.forks_of(id) {
            if self.holders[fork] == Some(id) {
                self.holders[fork] = None;
            }
        }
        self.states[id] = PhilosopherState::Thinking;

        self.try_eat(self.ring.left_neighbor(id));
        self.try_eat(self.ring.right_neighbor(id));
    }

    /// Roll back an acquisition that will never be completed.
    pub(crate) fn abandon(&mut self, id: usize) {
        match self.states[id] {
            PhilosopherState::Hungry => self.states[id] = PhilosopherState::Thinking,
            PhilosopherState::Eating => self.release(id),
            PhilosopherState::Thinking => {}
        }
    }

    /// Check mutual exclusion and fork/holder correspondence.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        for id in 0..self.ring.seats() {
            let state = self.states[id];
            let [left_fork, right_fork] = self.ring.forks_of(id);
            if state.is_eating() {
                for neighbor in [self.ring.left_neighbor(id), self.ring.right_neighbor(id)] {
                    if self.states[neighbor].is_eating() {
                        return Err(format!("neighbors {} and {} both eating", id, neighbor));
                    }
                }
                if self.holders[left_fork] != Some(id) || self.holders[right_fork] != Some(id) {
                    return Err(format!("philosopher {} eating without both forks", id));
                }
            }
        }
        for (fork, holder) in self.holders.iter().enumerate() {
            if let Some(holder) = *holder {
                if !self.ring.users_of(fork).contains(&holder) {
                    return Err(format!("fork {} held by non-adjacent {}", fork, holder));
                }
                if !self.states[holder].is_eating() {
                    return Err(format!(
                        "fork {} held by {} which is {}",
                        fork, holder, self.states[holder]
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(seats: usize) -> TableState {
        TableState::new(Ring::new(seats).unwrap())
    }

    #[test]
    fn test_new_table_is_all_thinking_and_free() {
        let t = table(5);
        assert!(t.states().iter().all(|s| *s == PhilosopherState::Thinking));
        assert!(t.holders().iter().all(Option::is_none));
        assert!(t.check_invariants().is_ok());
    }

    #[test]
    fn test_hungry_philosopher_with_idle_neighbors_eats() {
        let mut t = table(5);
        assert!(t.become_hungry(0));
        assert_eq!(t.state(0), PhilosopherState::Eating);
        assert_eq!(t.holder(0), Some(0));
        assert_eq!(t.holder(4), Some(0));
        assert!(t.check_invariants().is_ok());
    }

    #[test]
    fn test_neighbor_of_eater_stays_hungry() {
        let mut t = table(5);
        assert!(t.become_hungry(0));
        assert!(!t.become_hungry(1));
        assert_eq!(t.state(1), PhilosopherState::Hungry);
        assert_eq!(t.holder(1), None);
    }

    #[test]
    fn test_release_admits_waiting_neighbor() {
        let mut t = table(5);
        t.become_hungry(0);
        t.become_hungry(1);
        t.release(0);
        assert_eq!(t.state(0), PhilosopherState::Thinking);
        assert_eq!(t.state(1), PhilosopherState::Eating);
        assert_eq!(t.holder(0), Some(1));
        assert_eq!(t.holder(1), Some(1));
        assert_eq!(t.holder(4), None);
        assert!(t.check_invariants().is_ok());
    }

    #[test]
    fn test_release_does_not_admit_neighbor_blocked_on_other_side() {
        let mut t = table(5);
        t.become_hungry(0);
        t.become_hungry(2);
        t.become_hungry(1);
        t.release(0);
        // 2 is still eating
        assert_eq!(t.state(1), PhilosopherState::Hungry);
    }

    #[test]
    fn test_abandon_hungry_reverts_to_thinking() {
        let mut t = table(5);
        t.become_hungry(0);
        t.become_hungry(1);
        t.abandon(1);
        assert_eq!(t.state(1), PhilosopherState::Thinking);
        t.release(0);
        assert_eq!(t.state(1), PhilosopherState::Thinking);
        assert!(t.holders().iter().all(Option::is_none));
    }

    #[test]
    fn test_abandon_eating_releases_forks() {
        let mut t = table(5);
        t.become_hungry(3);
        t.abandon(3);
        assert_eq!(t.state(3), PhilosopherState::Thinking);
        assert_eq!(t.holder(2), None);
        assert_eq!(t.holder(3), None);
    }

    #[test]
    fn test_non_neighbors_eat_together() {
        let mut t = table(5);
        assert!(t.become_hungry(0));
        assert!(t.become_hungry(2));
        assert_eq!(t.eating_count(), 2);
        assert!(t.check_invariants().is_ok());
    }

    #[derive(Debug, Clone)]
    enum Step {
        Hungry(usize),
        Release(usize),
        Abandon(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0usize..16).prop_map(Step::Hungry),
            (0usize..16).prop_map(Step::Release),
            (0usize..16).prop_map(Step::Abandon),
        ]
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_for_any_sequence(
            seats in 2usize..9,
            steps in proptest::collection::vec(step(), 0..200),
        ) {
            let mut t = table(seats);
            for s in steps {
                match s {
                    Step::Hungry(raw) => {
                        let id = raw % seats;
                        if t.state(id) == PhilosopherState::Thinking {
                            t.become_hungry(id);
                        }
                    }
                    // the protocol only releases a philosopher that is eating
                    Step::Release(raw) => {
                        let id = raw % seats;
                        if t.state(id).is_eating() {
                            t.release(id);
                        }
                    }
                    Step::Abandon(raw) => t.abandon(raw % seats),
                }
                prop_assert_eq!(t.check_invariants(), Ok(()));
            }
        }

        #[test]
        fn prop_hungry_philosophers_are_always_blocked(
            seats in 3usize..9,
            hungry in proptest::collection::vec(0usize..16, 1..20),
        ) {
            let mut t = table(seats);
            for raw in hungry {
                t.become_hungry(raw % seats);
            }
            let eater = (0..seats).find(|&id| t.state(id).is_eating());
            if let Some(eater) = eater {
                t.release(eater);
            }
            // every philosopher still hungry is blocked by an eating neighbor
            let ring = Ring::new(seats).unwrap();
            for id in 0..seats {
                if t.state(id) == PhilosopherState::Hungry {
                    prop_assert!(
                        t.state(ring.left_neighbor(id)).is_eating()
                            || t.state(ring.right_neighbor(id)).is_eating()
                    );
                }
            }
        }
    }
}
