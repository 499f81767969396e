//! Coordination core: the dining monitor and the footman gate in front of it.
//!
//! The footman holds an `Arc<DiningMonitor>` and calls through it, so the
//! monitor also works on its own.

mod dining;
mod footman;
mod state;

pub use dining::{DiningMonitor, MonitorSnapshot};
pub use footman::Footman;
pub use state::PhilosopherState;
