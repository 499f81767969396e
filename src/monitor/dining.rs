//! Dining monitor - the single serialization point for philosopher and fork state.
//!
//! Every operation takes the same lock. A philosopher that cannot eat yet
//! parks on a broadcast [`Notify`] with the lock released, and re-checks the
//! admission predicate after every wake. Admission grabs both forks at once,
//! so nobody ever holds one fork while waiting for the other.
//!
//! Fairness is not enforced among hungry philosophers. Under an adversarial
//! schedule a philosopher whose neighbors keep alternating can starve.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::state::{PhilosopherState, TableState};
use crate::table::{Ring, Seating, TableView};
use crate::types::{Error, Result};

/// Copy of the whole table taken under one lock acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// `states[i]` is philosopher `i`.
    pub states: Vec<PhilosopherState>,
    /// `holders[f]` is the philosopher holding fork `f`, if any.
    pub holders: Vec<Option<usize>>,
}

/// State-tracking monitor for the dining table.
#[derive(Debug)]
pub struct DiningMonitor {
    ring: Ring,
    table: Mutex<TableState>,
    changed: Notify,
}

impl DiningMonitor {
    /// Build a monitor for `seats` philosophers, all thinking, all forks free.
    pub fn new(seats: usize) -> Result<Self> {
        let ring = Ring::new(seats)?;
        Ok(Self {
            ring,
            table: Mutex::new(TableState::new(ring)),
            changed: Notify::new(),
        })
    }

    pub fn ring(&self) -> Ring {
        self.ring
    }

    pub fn seats(&self) -> usize {
        self.ring.seats()
    }

    // Table updates never panic midway, so a poisoned lock still holds a
    // consistent table.
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Become hungry and wait until both forks are held.
    ///
    /// Returns `Err(Error::Cancelled)` if `cancel` fires first. The
    /// philosopher is then back to thinking and holds nothing. Dropping the
    /// returned future before it completes rolls back the same way.
    pub async fn request_resources(&self, id: usize, cancel: &CancellationToken) -> Result<()> {
        let id = self.ring.check(id)?;
        if cancel.is_cancelled() {
            return Err(Error::cancelled(format!(
                "philosopher {} cancelled before requesting forks",
                id
            )));
        }

        let mut pending = PendingRequest::new(self, id);
        let admitted = self.lock().become_hungry(id);
        if admitted {
            pending.complete();
            tracing::debug!(philosopher = id, "forks_acquired");
            return Ok(());
        }
        tracing::debug!(philosopher = id, "waiting_for_forks");

        loop {
            // Register before checking so a release in between is not missed.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let admitted = self.lock().try_eat(id);
            if admitted {
                pending.complete();
                tracing::debug!(philosopher = id, "forks_acquired");
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = &mut notified => {}
                _ = cancel.cancelled() => {
                    tracing::debug!(philosopher = id, "fork_request_cancelled");
                    // `pending` rolls the request back as it drops
                    return Err(Error::cancelled(format!(
                        "philosopher {} cancelled while waiting for forks",
                        id
                    )));
                }
            }
        }
    }

    /// Put both forks down, go back to thinking and wake every waiter.
    ///
    /// Neighbors whose predicate now holds are admitted before this returns.
    pub fn release_resources(&self, id: usize) -> Result<()> {
        let id = self.ring.check(id)?;
        self.lock().release(id);
        self.changed.notify_waiters();
        tracing::debug!(philosopher = id, "forks_released");
        Ok(())
    }

    pub fn state_of(&self, id: usize) -> Result<PhilosopherState> {
        let id = self.ring.check(id)?;
        Ok(self.lock().state(id))
    }

    /// Philosopher currently holding `fork`, or `None` if it is free.
    pub fn holder_of(&self, fork: usize) -> Result<Option<usize>> {
        let fork = self.ring.check(fork)?;
        Ok(self.lock().holder(fork))
    }

    pub fn eating_count(&self) -> usize {
        self.lock().eating_count()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let table = self.lock();
        MonitorSnapshot {
            states: table.states().to_vec(),
            holders: table.holders().to_vec(),
        }
    }

    fn abandon(&self, id: usize) {
        self.lock().abandon(id);
        self.changed.notify_waiters();
    }
}

/// Rolls back a request whose future is cancelled or dropped mid-wait.
struct PendingRequest<'a> {
    monitor: &'a DiningMonitor,
    id: usize,
    done: bool,
}

impl<'a> PendingRequest<'a> {
    fn new(monitor: &'a DiningMonitor, id: usize) -> Self {
        Self {
            monitor,
            id,
            done: false,
        }
    }

    fn complete(&mut self) {
        self.done = true;
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.monitor.abandon(self.id);
        }
    }
}

#[async_trait]
impl Seating for DiningMonitor {
    async fn acquire(&self, id: usize, cancel: &CancellationToken) -> Result<()> {
        self.request_resources(id, cancel).await
    }

    fn release(&self, id: usize) -> Result<()> {
        self.release_resources(id)
    }
}

impl TableView for DiningMonitor {
    fn seats(&self) -> usize {
        self.ring.seats()
    }

    fn state_of(&self, id: usize) -> Result<PhilosopherState> {
        DiningMonitor::state_of(self, id)
    }

    fn holder_of(&self, fork: usize) -> Result<Option<usize>> {
        DiningMonitor::holder_of(self, fork)
    }

    fn is_awaiting_admission(&self, id: usize) -> Result<bool> {
        self.ring.check(id)?;
        Ok(false)
    }
}
