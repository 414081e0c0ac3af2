//! Polling interval selection.
//!
//! A check entering `OK` is polled at its healthy interval, a check entering
//! any other state at its recheck interval. Each is resolved independently as
//! per-check override, then global setting, then [`DEFAULT_INTERVAL`].

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{DurationError, parse_duration};

use super::types::ServiceState;

/// Fallback used when neither a global nor a per-check interval is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RawOverrides {
    healthy: Option<String>,
    recheck: Option<String>,
}

/// Process-wide interval configuration.
#[derive(Debug, Clone)]
pub struct IntervalPolicy {
    default: Duration,
    healthy: Option<Duration>,
    recheck: Option<Duration>,
    overrides: HashMap<String, RawOverrides>,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl IntervalPolicy {
    pub fn new(default: Duration) -> Self {
        Self { default, healthy: None, recheck: None, overrides: HashMap::new() }
    }

    pub fn with_healthy(mut self, interval: Duration) -> Self {
        self.healthy = Some(interval);
        self
    }

    pub fn with_recheck(mut self, interval: Duration) -> Self {
        self.recheck = Some(interval);
        self
    }

    /// Register an unparsed healthy interval override for one check.
    pub fn with_healthy_override(mut self, check: impl Into<String>, raw: impl Into<String>) -> Self {
        self.overrides.entry(check.into()).or_default().healthy = Some(raw.into());
        self
    }

    /// Register an unparsed recheck interval override for one check.
    pub fn with_recheck_override(mut self, check: impl Into<String>, raw: impl Into<String>) -> Self {
        self.overrides.entry(check.into()).or_default().recheck = Some(raw.into());
        self
    }

    pub fn default_interval(&self) -> Duration {
        self.default
    }

    pub fn healthy(&self) -> Option<Duration> {
        self.healthy
    }

    pub fn recheck(&self) -> Option<Duration> {
        self.recheck
    }

    /// Resolve the intervals of a single check.
    ///
    /// Fails if one of the check's overrides does not parse; the error only
    /// concerns that check.
    pub fn resolve(&self, check: &str) -> Result<CheckIntervals, DurationError> {
        let overrides = self.overrides.get(check);
        let per_check = |raw: Option<&String>| raw.map(|raw| parse_duration(raw)).transpose();

        let healthy_override = per_check(overrides.and_then(|o| o.healthy.as_ref()))?;
        let recheck_override = per_check(overrides.and_then(|o| o.recheck.as_ref()))?;

        Ok(CheckIntervals {
            healthy: healthy_override.or(self.healthy).unwrap_or(self.default),
            recheck: recheck_override.or(self.recheck).unwrap_or(self.default),
        })
    }
}

/// Intervals of one check after applying the precedence rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckIntervals {
    pub healthy: Duration,
    pub recheck: Duration,
}

impl CheckIntervals {
    pub fn for_state(&self, state: ServiceState) -> Duration {
        if state.is_ok() { self.healthy } else { self.recheck }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PER_CHECK_HEALTHY: Duration = Duration::from_secs(600);
    const GLOBAL_HEALTHY: Duration = Duration::from_secs(300);
    const PER_CHECK_RECHECK: Duration = Duration::from_secs(10);
    const GLOBAL_RECHECK: Duration = Duration::from_secs(30);
    const DEFAULT: Duration = Duration::from_secs(45);

    #[test]
    fn test_healthy_precedence() {
        let full = IntervalPolicy::new(DEFAULT)
            .with_healthy(GLOBAL_HEALTHY)
            .with_healthy_override("web", "10m");
        assert_eq!(full.resolve("web").unwrap().for_state(ServiceState::Ok), PER_CHECK_HEALTHY);

        let global_only = IntervalPolicy::new(DEFAULT).with_healthy(GLOBAL_HEALTHY);
        assert_eq!(global_only.resolve("web").unwrap().for_state(ServiceState::Ok), GLOBAL_HEALTHY);

        let default_only = IntervalPolicy::new(DEFAULT);
        assert_eq!(default_only.resolve("web").unwrap().for_state(ServiceState::Ok), DEFAULT);
    }

    #[test]
    fn test_recheck_precedence_for_every_non_ok_state() {
        let full = IntervalPolicy::new(DEFAULT)
            .with_healthy(GLOBAL_HEALTHY)
            .with_recheck(GLOBAL_RECHECK)
            .with_healthy_override("web", "10m")
            .with_recheck_override("web", "10s");
        let global_only = IntervalPolicy::new(DEFAULT)
            .with_healthy(GLOBAL_HEALTHY)
            .with_recheck(GLOBAL_RECHECK);
        let default_only = IntervalPolicy::new(DEFAULT).with_healthy(GLOBAL_HEALTHY);

        for state in [ServiceState::Warning, ServiceState::Critical, ServiceState::Unknown] {
            assert_eq!(full.resolve("web").unwrap().for_state(state), PER_CHECK_RECHECK);
            assert_eq!(global_only.resolve("web").unwrap().for_state(state), GLOBAL_RECHECK);
            assert_eq!(default_only.resolve("web").unwrap().for_state(state), DEFAULT);
        }
    }

    #[test]
    fn test_overrides_are_scoped_to_their_check() {
        let policy = IntervalPolicy::new(DEFAULT)
            .with_recheck(GLOBAL_RECHECK)
            .with_recheck_override("web", "10s");

        let db = policy.resolve("db").unwrap();
        assert_eq!(db.recheck, GLOBAL_RECHECK);
        assert_eq!(db.healthy, DEFAULT);
    }

    #[test]
    fn test_malformed_override_fails_only_that_check() {
        let policy = IntervalPolicy::new(DEFAULT).with_healthy_override("web", "-1s");

        assert!(matches!(policy.resolve("web"), Err(DurationError::NotPositive(_))));
        assert!(policy.resolve("db").is_ok());
    }

    #[test]
    fn test_default_policy() {
        let intervals = IntervalPolicy::default().resolve("any").unwrap();
        assert_eq!(intervals, CheckIntervals { healthy: DEFAULT_INTERVAL, recheck: DEFAULT_INTERVAL });
    }
}
