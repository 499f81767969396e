//! Actor loop: think, get both forks, eat, put them down, repeat.
//!
//! The loop only talks to the table through [`Seating`], so the same
//! philosopher runs against the bare monitor, the footman or the
//! semaphore table. Cancellation is checked before every phase and
//! interrupts both delays and a blocked `acquire`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::table::Seating;
use crate::types::{Result, TimingConfig};

/// What one philosopher did before it was stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhilosopherStats {
    pub id: usize,
    /// Meals eaten to the end. A meal cut short by cancellation is not counted.
    pub meals: u64,
    /// Time spent between asking for forks and getting them.
    #[serde(with = "humantime_serde")]
    pub hungry_time: Duration,
    #[serde(with = "humantime_serde")]
    pub eating_time: Duration,
}

/// One seat at the table.
#[derive(Debug)]
pub struct Philosopher {
    id: usize,
    seating: Arc<dyn Seating>,
    timing: TimingConfig,
}

impl Philosopher {
    pub fn new(id: usize, seating: Arc<dyn Seating>, timing: TimingConfig) -> Self {
        Self {
            id,
            seating,
            timing,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run until `cancel` fires.
    ///
    /// Cancellation ends the loop with `Ok`. A philosopher stopped while
    /// waiting for forks holds nothing and does not release; one stopped
    /// while eating puts its forks down first. Any other error (a bad index)
    /// is returned as is.
    pub async fn run(self, cancel: CancellationToken) -> Result<PhilosopherStats> {
        let id = self.id;
        let mut stats = PhilosopherStats {
            id,
            ..PhilosopherStats::default()
        };
        tracing::info!(philosopher = id, "philosopher_started");

        loop {
            if cancel.is_cancelled() {
                break;
            }
            tracing::debug!(philosopher = id, phase = "thinking");
            if !self.pause(self.think_delay(), &cancel).await {
                break;
            }

            tracing::debug!(philosopher = id, phase = "hungry");
            let asked = Instant::now();
            match self.seating.acquire(id, &cancel).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => return Err(e),
            }
            stats.hungry_time += asked.elapsed();

            tracing::debug!(philosopher = id, phase = "eating");
            let started = Instant::now();
            let finished = self.pause(self.eat_delay(), &cancel).await;
            self.seating.release(id)?;
            stats.eating_time += started.elapsed();
            if !finished {
                break;
            }
            stats.meals += 1;
        }

        tracing::info!(philosopher = id, meals = stats.meals, "philosopher_stopped");
        Ok(stats)
    }

    /// Sleep for `delay`. Returns false if cancelled first.
    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn think_delay(&self) -> Duration {
        sample(self.timing.think_min, self.timing.think_max)
    }

    fn eat_delay(&self) -> Duration {
        sample(self.timing.eat_min, self.timing.eat_max)
    }
}

// The rng is not `Send`, so it must never live across an await.
fn sample(min: Duration, max: Duration) -> Duration {
    if min >= max {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}
