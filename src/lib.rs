//! # Dining Core - coordination for the dining philosophers
//!
//! Exclusive access to pairwise-shared forks around a ring of philosophers:
//! - `DiningMonitor`: one lock, an admission predicate over neighbor state,
//!   broadcast wake-up on every release
//! - `Footman`: fair counting gate in front of the monitor (default `N - 1`)
//! - `SemaphoreTable`: one binary semaphore per fork behind a footman
//! - `Philosopher`: the think/eat actor loop with cooperative cancellation
//! - `StatusReporter`: read-only periodic snapshots of the table
//!
//! ## Architecture
//!
//! ```text
//!   Philosopher ──acquire──▶ Footman ──sit──▶ DiningMonitor
//!        ▲                      │                  │
//!        └──────release─────────┴──stand_up────────┘
//!
//!   StatusReporter ──TableView (read only)──▶ Footman / DiningMonitor
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod dinner;
pub mod forks;
pub mod monitor;
pub mod philosopher;
pub mod reporter;
pub mod table;
pub mod types;

// Internal utilities
pub mod observability;

pub use monitor::{DiningMonitor, Footman, PhilosopherState};
pub use table::{Ring, Seating, TableView};
pub use types::{Config, Error, Result};
