//! Per-fork semaphore table.
//!
//! Each fork is a binary semaphore taken left first, then right. That order
//! alone can deadlock when every philosopher holds its left fork; the footman
//! gate in front (at most `max_seated`, default `N - 1`) rules that out.
//!
//! Unlike [`DiningMonitor`](crate::monitor::DiningMonitor), a hungry
//! philosopher here may hold its left fork while it waits for the right one.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::monitor::PhilosopherState;
use crate::table::{Ring, Seating, TableView};
use crate::types::{Error, Result};

/// Permits held by a seated philosopher. Fields drop in order, so both
/// forks are back before the seat is.
#[derive(Debug)]
struct Meal {
    _left: OwnedSemaphorePermit,
    _right: OwnedSemaphorePermit,
    _seat: OwnedSemaphorePermit,
}

#[derive(Debug, Default)]
struct Seat {
    state: PhilosopherState,
    awaiting: bool,
    meal: Option<Meal>,
}

#[derive(Debug)]
struct Book {
    seats: Vec<Seat>,
    holders: Vec<Option<usize>>,
}

/// Footman gate plus one binary semaphore per fork.
#[derive(Debug)]
pub struct SemaphoreTable {
    ring: Ring,
    footman: Arc<Semaphore>,
    forks: Vec<Arc<Semaphore>>,
    max_seated: usize,
    book: Mutex<Book>,
}

impl SemaphoreTable {
    pub fn new(seats: usize, max_seated: usize) -> Result<Self> {
        let ring = Ring::new(seats)?;
        if max_seated < 1 || max_seated > seats {
            return Err(Error::invalid_configuration(format!(
                "max_seated must be between 1 and {}, got {}",
                seats, max_seated
            )));
        }
        if max_seated == seats {
            tracing::warn!(
                seats,
                "semaphore table without a free seat can deadlock"
            );
        }
        Ok(Self {
            ring,
            footman: Arc::new(Semaphore::new(max_seated)),
            forks: (0..seats).map(|_| Arc::new(Semaphore::new(1))).collect(),
            max_seated,
            book: Mutex::new(Book {
                seats: (0..seats).map(|_| Seat::default()).collect(),
                holders: vec![None; seats],
            }),
        })
    }

    pub fn with_default_capacity(seats: usize) -> Result<Self> {
        Self::new(seats, seats.saturating_sub(1).max(1))
    }

    pub fn ring(&self) -> Ring {
        self.ring
    }

    pub fn seats(&self) -> usize {
        self.ring.seats()
    }

    pub fn max_seated(&self) -> usize {
        self.max_seated
    }

    pub fn available_permits(&self) -> usize {
        self.footman.available_permits()
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn take(
        &self,
        semaphore: &Arc<Semaphore>,
        cancel: &CancellationToken,
        id: usize,
        what: &str,
    ) -> Result<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled(format!(
                "philosopher {} cancelled while waiting for {}",
                id, what
            ))),
            permit = semaphore.clone().acquire_owned() => permit
                .map_err(|_| Error::internal(format!("{} semaphore closed", what))),
        }
    }

    async fn sit_and_eat(&self, id: usize, cancel: &CancellationToken) -> Result<()> {
        let [left, right] = self.ring.forks_of(id);
        let mut attempt = Attempt::start(self, id);

        let seat = self.take(&self.footman, cancel, id, "the footman").await?;
        attempt.admitted();

        let left_permit = self.take(&self.forks[left], cancel, id, "its left fork").await?;
        attempt.picked_up(left);
        let right_permit = self.take(&self.forks[right], cancel, id, "its right fork").await?;
        attempt.picked_up(right);

        attempt.finish(Meal {
            _left: left_permit,
            _right: right_permit,
            _seat: seat,
        });
        Ok(())
    }
}

/// Tracks a philosopher between arriving at the gate and starting to eat.
/// Dropping it unfinished puts the bookkeeping back to thinking.
struct Attempt<'a> {
    table: &'a SemaphoreTable,
    id: usize,
    finished: bool,
}

impl<'a> Attempt<'a> {
    fn start(table: &'a SemaphoreTable, id: usize) -> Self {
        let mut book = table.book();
        book.seats[id].state = PhilosopherState::Hungry;
        book.seats[id].awaiting = true;
        drop(book);
        Self {
            table,
            id,
            finished: false,
        }
    }

    fn admitted(&mut self) {
        self.table.book().seats[self.id].awaiting = false;
    }

    fn picked_up(&mut self, fork: usize) {
        self.table.book().holders[fork] = Some(self.id);
    }

    fn finish(mut self, meal: Meal) {
        let mut book = self.table.book();
        book.seats[self.id].state = PhilosopherState::Eating;
        book.seats[self.id].meal = Some(meal);
        self.finished = true;
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut book = self.table.book();
        let seat = &mut book.seats[self.id];
        seat.state = PhilosopherState::Thinking;
        seat.awaiting = false;
        for fork in self.table.ring.forks_of(self.id) {
            if book.holders[fork] == Some(self.id) {
                book.holders[fork] = None;
            }
        }
    }
}

#[async_trait]
impl Seating for SemaphoreTable {
    async fn acquire(&self, id: usize, cancel: &CancellationToken) -> Result<()> {
        let id = self.ring.check(id)?;
        if cancel.is_cancelled() {
            return Err(Error::cancelled(format!(
                "philosopher {} cancelled before reaching the footman",
                id
            )));
        }
        let seated = self.book().seats[id].meal.is_some();
        if seated {
            return Ok(());
        }
        self.sit_and_eat(id, cancel).await?;
        tracing::debug!(philosopher = id, "forks_acquired");
        Ok(())
    }

    fn release(&self, id: usize) -> Result<()> {
        let id = self.ring.check(id)?;
        let meal = {
            let mut book = self.book();
            book.seats[id].state = PhilosopherState::Thinking;
            for fork in self.ring.forks_of(id) {
                if book.holders[fork] == Some(id) {
                    book.holders[fork] = None;
                }
            }
            book.seats[id].meal.take()
        };
        match meal {
            Some(meal) => {
                drop(meal);
                tracing::debug!(philosopher = id, "forks_released");
            }
            None => tracing::warn!(philosopher = id, "release_without_meal"),
        }
        Ok(())
    }
}

impl TableView for SemaphoreTable {
    fn seats(&self) -> usize {
        self.ring.seats()
    }

    fn state_of(&self, id: usize) -> Result<PhilosopherState> {
        let id = self.ring.check(id)?;
        Ok(self.book().seats[id].state)
    }

    fn holder_of(&self, fork: usize) -> Result<Option<usize>> {
        let fork = self.ring.check(fork)?;
        Ok(self.book().holders[fork])
    }

    fn is_awaiting_admission(&self, id: usize) -> Result<bool> {
        let id = self.ring.check(id)?;
        Ok(self.book().seats[id].awaiting)
    }
}
