//! Dinner orchestration.
//!
//! Builds the table for the configured strategy, spawns one task per
//! philosopher plus the optional reporter, and on shutdown cancels them all
//! and waits for every one to exit.

use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::forks::SemaphoreTable;
use crate::monitor::{DiningMonitor, Footman};
use crate::philosopher::{Philosopher, PhilosopherStats};
use crate::reporter::StatusReporter;
use crate::table::{Seating, TableView};
use crate::types::{Config, Error, Result, Strategy, TableConfig};

/// The same table seen through its two seams.
#[derive(Debug, Clone)]
pub struct Table {
    pub seating: Arc<dyn Seating>,
    pub view: Arc<dyn TableView>,
}

impl Table {
    /// Wrap any type that implements both seams.
    pub fn from_shared<T>(table: Arc<T>) -> Self
    where
        T: Seating + TableView + 'static,
    {
        Self {
            seating: table.clone(),
            view: table,
        }
    }

    /// Build the table described by `config`.
    pub fn build(config: &TableConfig) -> Result<Self> {
        let table = match config.strategy {
            Strategy::Monitor => Self::from_shared(Arc::new(DiningMonitor::new(config.seats)?)),
            Strategy::Footman => {
                let monitor = Arc::new(DiningMonitor::new(config.seats)?);
                let footman = Footman::new(monitor, config.effective_max_seated())?;
                Self::from_shared(Arc::new(footman))
            }
            Strategy::Semaphores => Self::from_shared(Arc::new(SemaphoreTable::new(
                config.seats,
                config.effective_max_seated(),
            )?)),
        };
        Ok(table)
    }
}

/// A running dinner.
#[derive(Debug)]
pub struct Dinner {
    table: Table,
    cancel: CancellationToken,
    philosophers: Vec<JoinHandle<Result<PhilosopherStats>>>,
    reporter: Option<(Arc<StatusReporter>, JoinHandle<()>)>,
}

impl Dinner {
    /// Validate `config`, build its table and start everyone.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        config.validate()?;
        let table = Table::build(&config.table)?;
        tracing::info!(
            seats = config.table.seats,
            strategy = %config.table.strategy,
            max_seated = config.table.effective_max_seated(),
            "dinner_starting"
        );
        Ok(Self::spawn(table, config))
    }

    /// Start one philosopher per seat of an already built table.
    pub fn spawn(table: Table, config: &Config) -> Self {
        let cancel = CancellationToken::new();

        let philosophers = (0..table.view.seats())
            .map(|id| {
                let philosopher =
                    Philosopher::new(id, table.seating.clone(), config.timing.clone());
                tokio::spawn(philosopher.run(cancel.child_token()))
            })
            .collect();

        let reporter = config.reporter.enabled.then(|| {
            let reporter = Arc::new(StatusReporter::new(
                table.view.clone(),
                config.reporter.clone(),
            ));
            let handle = tokio::spawn(reporter.clone().run(cancel.child_token()));
            (reporter, handle)
        });

        Self {
            table,
            cancel,
            philosophers,
            reporter,
        }
    }

    pub fn view(&self) -> &Arc<dyn TableView> {
        &self.table.view
    }

    pub fn reporter(&self) -> Option<&Arc<StatusReporter>> {
        self.reporter.as_ref().map(|(reporter, _)| reporter)
    }

    /// Token that stops the whole dinner when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every task and wait for all of them to exit.
    ///
    /// Returns per-philosopher stats ordered by seat. A philosopher that
    /// failed or panicked is reported after the others have been joined.
    pub async fn shutdown(self) -> Result<Vec<PhilosopherStats>> {
        tracing::info!("dinner_stopping");
        self.cancel.cancel();

        let results = join_all(self.philosophers).await;
        if let Some((_, handle)) = self.reporter {
            if let Err(e) = handle.await {
                tracing::warn!("status_reporter_join_failed: {}", e);
            }
        }

        let mut stats = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (id, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(s)) => stats.push(s),
                Ok(Err(e)) => {
                    tracing::error!(philosopher = id, "philosopher_failed: {}", e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(philosopher = id, "philosopher_task_failed: {}", e);
                    first_error.get_or_insert_with(|| {
                        Error::internal(format!("philosopher {} task failed: {}", id, e))
                    });
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        tracing::info!(
            meals = stats.iter().map(|s| s.meals).sum::<u64>(),
            "dinner_stopped"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::PhilosopherState;
    use crate::types::TimingConfig;
    use std::time::Duration;

    fn quick_config(strategy: Strategy) -> Config {
        let mut config = Config::default();
        config.table.strategy = strategy;
        config.timing = TimingConfig::fixed(Duration::from_millis(5), Duration::from_millis(5));
        config.reporter.interval = Duration::from_millis(20);
        config
    }

    #[test]
    fn test_build_each_strategy() {
        for strategy in [Strategy::Monitor, Strategy::Footman, Strategy::Semaphores] {
            let table = Table::build(&TableConfig {
                seats: 4,
                max_seated: None,
                strategy,
            })
            .unwrap();
            assert_eq!(table.view.seats(), 4);
        }
    }

    #[test]
    fn test_build_rejects_bad_seat_cap() {
        let result = Table::build(&TableConfig {
            seats: 4,
            max_seated: Some(5),
            strategy: Strategy::Footman,
        });
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let mut config = Config::default();
        config.table.seats = 1;
        assert!(matches!(
            Dinner::start(&config),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dinner_runs_and_shuts_down_cleanly() {
        let dinner = Dinner::start(&quick_config(Strategy::Footman)).unwrap();
        let view = dinner.view().clone();
        let mut updates = dinner.reporter().unwrap().subscribe();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().is_some());

        let stats = dinner.shutdown().await.unwrap();
        assert_eq!(stats.len(), 5);
        assert!(stats.iter().enumerate().all(|(id, s)| s.id == id));
        assert!(stats.iter().map(|s| s.meals).sum::<u64>() > 0);
        for id in 0..5 {
            assert_eq!(view.state_of(id).unwrap(), PhilosopherState::Thinking);
            assert_eq!(view.holder_of(id).unwrap(), None);
            assert!(!view.is_awaiting_admission(id).unwrap());
        }
    }

    #[tokio::test]
    async fn test_dinner_without_reporter() {
        let mut config = quick_config(Strategy::Monitor);
        config.reporter.enabled = false;
        let dinner = Dinner::start(&config).unwrap();
        assert!(dinner.reporter().is_none());
        let stats = dinner.shutdown().await.unwrap();
        assert_eq!(stats.len(), 5);
    }

    #[tokio::test]
    async fn test_failed_philosopher_is_reported() {
        let table = Table::from_shared(Arc::new(DiningMonitor::new(3).unwrap()));
        let mut config = quick_config(Strategy::Monitor);
        config.reporter.enabled = false;
        let mut dinner = Dinner::spawn(table.clone(), &config);
        // a fourth philosopher on a three-seat table
        let stray = Philosopher::new(3, table.seating.clone(), config.timing.clone());
        dinner
            .philosophers
            .push(tokio::spawn(stray.run(dinner.cancel.child_token())));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            dinner.shutdown().await,
            Err(Error::InvalidIndex { index: 3, len: 3 })
        ));
    }
}
