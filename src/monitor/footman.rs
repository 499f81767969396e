//! Footman - admission gate in front of the dining monitor.
//!
//! At most `max_seated` philosophers are past the gate at once, whatever the
//! monitor decides. With the default of `N - 1` at least one philosopher is
//! always outside, so a full-ring circular wait cannot form even for a naive
//! fork acquisition order.
//!
//! Permits are handed out in FIFO order of arrival at the gate.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use super::dining::DiningMonitor;
use super::state::PhilosopherState;
use crate::table::{Ring, Seating, TableView};
use crate::types::{Error, Result};

/// Per-seat bookkeeping owned by the footman.
#[derive(Debug)]
struct SeatBook {
    awaiting: Vec<bool>,
    permits: Vec<Option<OwnedSemaphorePermit>>,
}

/// Counting admission gate wrapping a [`DiningMonitor`].
#[derive(Debug)]
pub struct Footman {
    monitor: Arc<DiningMonitor>,
    gate: Arc<Semaphore>,
    max_seated: usize,
    book: Mutex<SeatBook>,
}

impl Footman {
    /// Gate `monitor` so that at most `max_seated` philosophers are seated.
    pub fn new(monitor: Arc<DiningMonitor>, max_seated: usize) -> Result<Self> {
        let seats = monitor.seats();
        if max_seated < 1 || max_seated > seats {
            return Err(Error::invalid_configuration(format!(
                "max_seated must be between 1 and {}, got {}",
                seats, max_seated
            )));
        }
        Ok(Self {
            monitor,
            gate: Arc::new(Semaphore::new(max_seated)),
            max_seated,
            book: Mutex::new(SeatBook {
                awaiting: vec![false; seats],
                permits: (0..seats).map(|_| None).collect(),
            }),
        })
    }

    /// Gate with the classic `N - 1` seats.
    pub fn with_default_capacity(monitor: Arc<DiningMonitor>) -> Result<Self> {
        let max_seated = monitor.seats().saturating_sub(1).max(1);
        Self::new(monitor, max_seated)
    }

    pub fn monitor(&self) -> &Arc<DiningMonitor> {
        &self.monitor
    }

    pub fn ring(&self) -> Ring {
        self.monitor.ring()
    }

    pub fn seats(&self) -> usize {
        self.monitor.seats()
    }

    pub fn max_seated(&self) -> usize {
        self.max_seated
    }

    /// Permits not currently taken.
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    /// Philosophers past the gate, eating or still waiting for forks.
    pub fn seated_count(&self) -> usize {
        self.max_seated - self.gate.available_permits()
    }

    fn book(&self) -> MutexGuard<'_, SeatBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for a seat, then for both forks.
    ///
    /// If the fork request fails or is cancelled the seat is given back
    /// before the error is returned.
    pub async fn sit(&self, id: usize, cancel: &CancellationToken) -> Result<()> {
        let id = self.ring().check(id)?;
        if cancel.is_cancelled() {
            return Err(Error::cancelled(format!(
                "philosopher {} cancelled before reaching the footman",
                id
            )));
        }

        let already_seated = self.book().permits[id].is_some();
        if already_seated {
            return self.monitor.request_resources(id, cancel).await;
        }

        let awaiting = AwaitingAdmission::mark(self, id);
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(philosopher = id, "admission_cancelled");
                return Err(Error::cancelled(format!(
                    "philosopher {} cancelled while waiting for the footman",
                    id
                )));
            }
            permit = self.gate.clone().acquire_owned() => permit
                .map_err(|_| Error::internal("footman gate closed"))?,
        };
        drop(awaiting);
        tracing::debug!(
            philosopher = id,
            seated = self.seated_count(),
            "admitted_by_footman"
        );

        // On error `permit` drops here and the seat is free again.
        self.monitor.request_resources(id, cancel).await?;
        self.book().permits[id] = Some(permit);
        Ok(())
    }

    /// Put the forks down, then give the seat back.
    pub fn stand_up(&self, id: usize) -> Result<()> {
        let id = self.ring().check(id)?;
        self.monitor.release_resources(id)?;

        let permit = self.book().permits[id].take();
        match permit {
            Some(permit) => {
                drop(permit);
                tracing::debug!(philosopher = id, "left_the_table");
            }
            None => tracing::warn!(philosopher = id, "stand_up_without_seat"),
        }
        Ok(())
    }

    /// True while `id` is queued at the gate.
    pub fn is_awaiting_admission(&self, id: usize) -> Result<bool> {
        let id = self.ring().check(id)?;
        Ok(self.book().awaiting[id])
    }

    fn set_awaiting(&self, id: usize, value: bool) {
        self.book().awaiting[id] = value;
    }
}

/// Keeps the "awaiting admission" flag set for as long as it lives.
struct AwaitingAdmission<'a> {
    footman: &'a Footman,
    id: usize,
}

impl<'a> AwaitingAdmission<'a> {
    fn mark(footman: &'a Footman, id: usize) -> Self {
        footman.set_awaiting(id, true);
        Self { footman, id }
    }
}

impl Drop for AwaitingAdmission<'_> {
    fn drop(&mut self) {
        self.footman.set_awaiting(self.id, false);
    }
}

#[async_trait]
impl Seating for Footman {
    async fn acquire(&self, id: usize, cancel: &CancellationToken) -> Result<()> {
        self.sit(id, cancel).await
    }

    fn release(&self, id: usize) -> Result<()> {
        self.stand_up(id)
    }
}

impl TableView for Footman {
    fn seats(&self) -> usize {
        self.monitor.seats()
    }

    fn state_of(&self, id: usize) -> Result<PhilosopherState> {
        self.monitor.state_of(id)
    }

    fn holder_of(&self, fork: usize) -> Result<Option<usize>> {
        self.monitor.holder_of(fork)
    }

    fn is_awaiting_admission(&self, id: usize) -> Result<bool> {
        Footman::is_awaiting_admission(self, id)
    }
}
