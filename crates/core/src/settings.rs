use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("tick interval must be between 10ms and 60s")]
    InvalidTickInterval,

    #[error("persist debounce must be between 10ms and 60s")]
    InvalidPersistDebounce,

    #[error("max violations must be > 0")]
    InvalidMaxViolations,
}

/// Tunables of the exam engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    tick_interval: Duration,
    persist_debounce: Duration,
    low_time_threshold_secs: u32,
    max_violations: u32,
}

impl Default for EngineSettings {
    /// One-second ticks, one-second quiet window before saving, low-time warning under
    /// five minutes, three anti-cheat violations shown as the limit.
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            persist_debounce: Duration::from_millis(1_000),
            low_time_threshold_secs: 300,
            max_violations: 3,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    #[must_use]
    pub fn persist_debounce(&self) -> Duration {
        self.persist_debounce
    }

    #[must_use]
    pub fn low_time_threshold_secs(&self) -> u32 {
        self.low_time_threshold_secs
    }

    #[must_use]
    pub fn max_violations(&self) -> u32 {
        self.max_violations
    }
}

/// Partial settings, e.g. from CLI flags or environment. Unset fields keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct EngineSettingsDraft {
    pub tick_interval: Option<Duration>,
    pub persist_debounce: Option<Duration>,
    pub low_time_threshold_secs: Option<u32>,
    pub max_violations: Option<u32>,
}

impl EngineSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if an interval is outside `10ms..=60s` or the violation
    /// limit is zero.
    pub fn validate(self) -> Result<EngineSettings, SettingsError> {
        let defaults = EngineSettings::default();
        let tick_interval = self.tick_interval.unwrap_or(defaults.tick_interval);
        let persist_debounce = self.persist_debounce.unwrap_or(defaults.persist_debounce);
        let max_violations = self.max_violations.unwrap_or(defaults.max_violations);

        if !interval_in_bounds(tick_interval) {
            return Err(SettingsError::InvalidTickInterval);
        }
        if !interval_in_bounds(persist_debounce) {
            return Err(SettingsError::InvalidPersistDebounce);
        }
        if max_violations == 0 {
            return Err(SettingsError::InvalidMaxViolations);
        }

        Ok(EngineSettings {
            tick_interval,
            persist_debounce,
            low_time_threshold_secs: self
                .low_time_threshold_secs
                .unwrap_or(defaults.low_time_threshold_secs),
            max_violations,
        })
    }
}

fn interval_in_bounds(value: Duration) -> bool {
    (Duration::from_millis(10)..=Duration::from_secs(60)).contains(&value)
}
