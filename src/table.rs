//! Table layout and the seams between the coordination core and its callers.
//!
//! Philosophers and forks sit on a ring of `N` seats:
//! ```text
//!          fork 4   P0   fork 0
//!       P4                    P1
//!     fork 3                fork 1
//!          P3    fork 2    P2
//! ```
//! Philosopher `i` eats with fork `(i - 1) mod N` on its left and fork `i`
//! on its right; fork `i` is shared by philosophers `i` and `(i + 1) mod N`.

use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::monitor::PhilosopherState;
use crate::types::{Error, Result};

/// Circular seating arrangement. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ring {
    seats: usize,
}

impl Ring {
    /// Build a ring of `seats` philosophers. At least two are required.
    pub fn new(seats: usize) -> Result<Self> {
        if seats < 2 {
            return Err(Error::invalid_configuration(format!(
                "a table needs at least two philosophers, got {}",
                seats
            )));
        }
        Ok(Self { seats })
    }

    pub fn seats(&self) -> usize {
        self.seats
    }

    /// Validate a philosopher or fork index.
    pub fn check(&self, id: usize) -> Result<usize> {
        if id >= self.seats {
            return Err(Error::invalid_index(id, self.seats));
        }
        Ok(id)
    }

    // The helpers below expect an index already passed through `check`.

    pub fn left_neighbor(&self, id: usize) -> usize {
        (id + self.seats - 1) % self.seats
    }

    pub fn right_neighbor(&self, id: usize) -> usize {
        (id + 1) % self.seats
    }

    pub fn left_fork(&self, id: usize) -> usize {
        (id + self.seats - 1) % self.seats
    }

    pub fn right_fork(&self, id: usize) -> usize {
        id
    }

    /// Both forks philosopher `id` eats with, left first.
    pub fn forks_of(&self, id: usize) -> [usize; 2] {
        [self.left_fork(id), self.right_fork(id)]
    }

    /// The two philosophers sharing fork `fork`.
    pub fn users_of(&self, fork: usize) -> [usize; 2] {
        [fork, self.right_neighbor(fork)]
    }

    pub fn are_neighbors(&self, a: usize, b: usize) -> bool {
        a != b && (self.right_neighbor(a) == b || self.left_neighbor(a) == b)
    }
}

/// Acquire/release protocol driven by the actor loop.
///
/// `acquire` returns only once philosopher `id` holds both forks. On
/// `Err(Error::Cancelled)` nothing is held and no permit is kept.
#[async_trait]
pub trait Seating: Send + Sync + fmt::Debug {
    async fn acquire(&self, id: usize, cancel: &CancellationToken) -> Result<()>;

    fn release(&self, id: usize) -> Result<()>;
}

/// Read-only queries for status reporting.
///
/// Every answer is a snapshot and may be stale by the time it is shown.
pub trait TableView: Send + Sync + fmt::Debug {
    fn seats(&self) -> usize;

    fn state_of(&self, id: usize) -> Result<PhilosopherState>;

    fn holder_of(&self, fork: usize) -> Result<Option<usize>>;

    /// Waiting at the footman. Always `false` without a gate.
    fn is_awaiting_admission(&self, id: usize) -> Result<bool>;
}
