//! Configuration structures.
//!
//! Configuration is loaded from a JSON file and command-line overrides.
//! Missing sections fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::{Error, Result};

/// Global dinner configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Table layout and admission policy.
    #[serde(default)]
    pub table: TableConfig,

    /// Think/eat delays for the actor loop.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Status reporter configuration.
    #[serde(default)]
    pub reporter: ReporterConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section. Fails fast with `InvalidConfiguration`.
    pub fn validate(&self) -> Result<()> {
        self.table.validate()?;
        self.timing.validate()?;
        if self.reporter.enabled && self.reporter.interval.is_zero() {
            return Err(Error::invalid_configuration(
                "reporter.interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Which seating implementation a dinner runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Dining monitor only.
    Monitor,
    /// Footman gate in front of the dining monitor.
    #[default]
    Footman,
    /// One binary semaphore per fork behind a footman gate.
    Semaphores,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Monitor => "monitor",
            Strategy::Footman => "footman",
            Strategy::Semaphores => "semaphores",
        };
        f.write_str(name)
    }
}

/// Table layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Number of philosophers (and forks). At least 2.
    pub seats: usize,

    /// Maximum philosophers past the footman. `None` means `seats - 1`.
    /// Ignored by [`Strategy::Monitor`].
    #[serde(default)]
    pub max_seated: Option<usize>,

    /// Seating implementation.
    #[serde(default)]
    pub strategy: Strategy,
}

impl TableConfig {
    /// Seat cap after applying the `seats - 1` default.
    pub fn effective_max_seated(&self) -> usize {
        self.max_seated
            .unwrap_or_else(|| self.seats.saturating_sub(1).max(1))
    }

    fn validate(&self) -> Result<()> {
        if self.seats < 2 {
            return Err(Error::invalid_configuration(format!(
                "table.seats must be at least 2, got {}",
                self.seats
            )));
        }
        let max_seated = self.effective_max_seated();
        if max_seated < 1 || max_seated > self.seats {
            return Err(Error::invalid_configuration(format!(
                "table.max_seated must be between 1 and {}, got {}",
                self.seats, max_seated
            )));
        }
        Ok(())
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            seats: 5,
            max_seated: None,
            strategy: Strategy::default(),
        }
    }
}

/// Think/eat delay ranges. Each delay is drawn uniformly from `[min, max]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(with = "humantime_serde")]
    pub think_min: Duration,

    #[serde(with = "humantime_serde")]
    pub think_max: Duration,

    #[serde(with = "humantime_serde")]
    pub eat_min: Duration,

    #[serde(with = "humantime_serde")]
    pub eat_max: Duration,
}

impl TimingConfig {
    /// Fixed delays, mostly for tests.
    pub fn fixed(think: Duration, eat: Duration) -> Self {
        Self {
            think_min: think,
            think_max: think,
            eat_min: eat,
            eat_max: eat,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.think_min > self.think_max {
            return Err(Error::invalid_configuration(format!(
                "timing.think_min ({:?}) exceeds timing.think_max ({:?})",
                self.think_min, self.think_max
            )));
        }
        if self.eat_min > self.eat_max {
            return Err(Error::invalid_configuration(format!(
                "timing.eat_min ({:?}) exceeds timing.eat_max ({:?})",
                self.eat_min, self.eat_max
            )));
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            think_min: Duration::from_millis(500),
            think_max: Duration::from_millis(2500),
            eat_min: Duration::from_millis(500),
            eat_max: Duration::from_millis(2500),
        }
    }
}

/// Status reporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Spawn the periodic reporter alongside the philosophers.
    pub enabled: bool,

    /// Time between reports.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Emit snapshots as JSON instead of the rendered table.
    pub json: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(500),
            json: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.table.seats, 5);
        assert_eq!(config.table.effective_max_seated(), 4);
        assert_eq!(config.table.strategy, Strategy::Footman);
    }

    #[test]
    fn test_too_few_seats_rejected() {
        let mut config = Config::default();
        config.table.seats = 1;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_max_seated_bounds() {
        let mut config = Config::default();
        config.table.max_seated = Some(0);
        assert!(config.validate().is_err());

        config.table.max_seated = Some(6);
        assert!(config.validate().is_err());

        config.table.max_seated = Some(5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let mut config = Config::default();
        config.timing.eat_min = Duration::from_secs(3);
        config.timing.eat_max = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_report_interval_rejected_only_when_enabled() {
        let mut config = Config::default();
        config.reporter.interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.reporter.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_fills_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "table": {{ "seats": 7, "strategy": "semaphores" }},
                "timing": {{
                    "think_min": "10ms",
                    "think_max": "20ms",
                    "eat_min": "5ms",
                    "eat_max": "15ms"
                }}
            }}"#
        )
        .unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.table.seats, 7);
        assert_eq!(config.table.effective_max_seated(), 6);
        assert_eq!(config.table.strategy, Strategy::Semaphores);
        assert_eq!(config.timing.think_min, Duration::from_millis(10));
        assert_eq!(config.reporter.interval, Duration::from_millis(500));
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_from_json_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "table": {{ "seats": 1 }} }}"#).unwrap();
        assert!(matches!(
            Config::from_json_file(file.path()),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_from_json_file_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            Config::from_json_file(missing),
            Err(Error::Io(_))
        ));
    }
}
