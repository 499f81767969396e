//! Status reporter.
//!
//! Reads the table through [`TableView`] only and never touches the
//! monitor lock directly. Every query is its own snapshot, so a rendered
//! table can mix values from slightly different instants; that is fine
//! for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::monitor::PhilosopherState;
use crate::table::{Ring, TableView};
use crate::types::{ReporterConfig, Result};

/// One row of the status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatStatus {
    pub id: usize,
    pub state: PhilosopherState,
    pub holds_left_fork: bool,
    pub holds_right_fork: bool,
    pub awaiting_admission: bool,
}

/// Everything the reporter shows, tagged with when it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub taken_at: DateTime<Utc>,
    pub seats: Vec<SeatStatus>,
    /// `holders[f]` is the philosopher holding fork `f`, if any.
    pub holders: Vec<Option<usize>>,
}

impl TableSnapshot {
    /// Read every seat and fork from `view`.
    pub fn capture(view: &dyn TableView) -> Result<Self> {
        let ring = Ring::new(view.seats())?;
        let mut holders = Vec::with_capacity(ring.seats());
        for fork in 0..ring.seats() {
            holders.push(view.holder_of(fork)?);
        }

        let mut seats = Vec::with_capacity(ring.seats());
        for id in 0..ring.seats() {
            seats.push(SeatStatus {
                id,
                state: view.state_of(id)?,
                holds_left_fork: holders[ring.left_fork(id)] == Some(id),
                holds_right_fork: holders[ring.right_fork(id)] == Some(id),
                awaiting_admission: view.is_awaiting_admission(id)?,
            });
        }

        Ok(Self {
            taken_at: Utc::now(),
            seats,
            holders,
        })
    }

    /// Philosophers currently queued at the footman.
    pub fn waiting_outside(&self) -> Vec<usize> {
        self.seats
            .iter()
            .filter(|s| s.awaiting_admission)
            .map(|s| s.id)
            .collect()
    }

    /// Render as a fixed-width text table.
    pub fn render(&self) -> String {
        let sep = format!(
            "+{}+{}+{}+{}+{}+",
            "-".repeat(13),
            "-".repeat(10),
            "-".repeat(11),
            "-".repeat(12),
            "-".repeat(10)
        );
        let mut out = String::new();
        out.push_str(&sep);
        out.push('\n');
        out.push_str(&format!(
            "| {:>11} | {:<8} | {:<9} | {:<10} | {:<8} |\n",
            "philosopher", "state", "left fork", "right fork", "footman"
        ));
        out.push_str(&sep);
        out.push('\n');
        for seat in &self.seats {
            out.push_str(&format!(
                "| {:>11} | {:<8} | {:<9} | {:<10} | {:<8} |\n",
                seat.id,
                seat.state,
                fork_mark(seat.holds_left_fork),
                fork_mark(seat.holds_right_fork),
                if seat.awaiting_admission { "waiting" } else { "" }
            ));
        }
        out.push_str(&sep);
        out.push('\n');
        out
    }
}

fn fork_mark(held: bool) -> &'static str {
    if held {
        "[#]"
    } else {
        "[ ]"
    }
}

/// Periodic reporter over any [`TableView`].
///
/// Each tick captures a [`TableSnapshot`], logs it (rendered or as JSON) and
/// publishes it to subscribers. Paused reporters keep ticking but skip the
/// capture.
#[derive(Debug)]
pub struct StatusReporter {
    view: Arc<dyn TableView>,
    config: ReporterConfig,
    paused: AtomicBool,
    latest: watch::Sender<Option<TableSnapshot>>,
}

impl StatusReporter {
    pub fn new(view: Arc<dyn TableView>, config: ReporterConfig) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            view,
            config,
            paused: AtomicBool::new(false),
            latest,
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Option<TableSnapshot>> {
        self.latest.subscribe()
    }

    /// Most recent published snapshot, if any.
    pub fn latest(&self) -> Option<TableSnapshot> {
        self.latest.borrow().clone()
    }

    /// Capture, log and publish one snapshot.
    pub fn report_once(&self) -> Result<TableSnapshot> {
        let snapshot = TableSnapshot::capture(self.view.as_ref())?;
        if self.config.json {
            let json = serde_json::to_string(&snapshot)?;
            tracing::info!(target: "dining::report", snapshot = %json, "table_status");
        } else {
            tracing::info!(
                target: "dining::report",
                waiting_outside = ?snapshot.waiting_outside(),
                "table_status\n{}",
                snapshot.render()
            );
        }
        self.latest.send_replace(Some(snapshot.clone()));
        Ok(snapshot)
    }

    /// Report every `interval` until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        // `interval` panics on a zero period
        let mut ticker = interval(self.config.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval = ?self.config.interval, "status_reporter_started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("status_reporter_stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if self.is_paused() {
                        continue;
                    }
                    if let Err(e) = self.report_once() {
                        tracing::error!("status_report_failed: {}", e);
                    }
                }
            }
        }
    }
}
