use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Health state of a check, encoded as the probe's exit code.
///
/// The ordinals follow the plugin exit-code convention, they are not a
/// severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServiceState {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

/// How a raw exit code was mapped onto a [`ServiceState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCodeMapping {
    /// The code was one of the four defined ordinals
    Defined(ServiceState),
    /// The code was outside `0..=3` and was clamped to `Unknown`
    OutOfRange(i32),
    /// The probe was terminated without an exit code (e.g. by a signal)
    NoExitCode,
}

impl ExitCodeMapping {
    pub fn state(self) -> ServiceState {
        match self {
            ExitCodeMapping::Defined(state) => state,
            ExitCodeMapping::OutOfRange(_) | ExitCodeMapping::NoExitCode => ServiceState::Unknown,
        }
    }
}

impl ServiceState {
    pub const ALL: [ServiceState; 4] =
        [ServiceState::Ok, ServiceState::Warning, ServiceState::Critical, ServiceState::Unknown];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    /// Map a probe exit code onto a state.
    pub fn from_exit_code(code: Option<i32>) -> ExitCodeMapping {
        match code {
            Some(code) => match u8::try_from(code).ok().and_then(Self::from_ordinal) {
                Some(state) => ExitCodeMapping::Defined(state),
                None => ExitCodeMapping::OutOfRange(code),
            },
            None => ExitCodeMapping::NoExitCode,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ServiceState::Ok
    }

    /// Slack emoji shortcode used as the state indicator in notifications.
    pub fn emoji(self) -> &'static str {
        match self {
            ServiceState::Ok => ":large_green_circle:",
            ServiceState::Warning => ":large_yellow_circle:",
            ServiceState::Critical => ":red_circle:",
            ServiceState::Unknown => ":large_purple_circle:",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Ok => write!(f, "OK"),
            ServiceState::Warning => write!(f, "Warning"),
            ServiceState::Critical => write!(f, "Critical"),
            ServiceState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A detected state change, handed to the notifier once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub check_name: String,
    pub old_state: ServiceState,
    pub new_state: ServiceState,
    pub command: String,
    /// Raw probe output of the run that caused the change
    pub output: String,
    /// Interval selected for the new state
    pub interval: Duration,
    /// When the run that caused the change finished
    pub last_check: DateTime<Utc>,
    /// When the change was detected
    pub timestamp: DateTime<Utc>,
}

impl Transition {
    /// Time of the next scheduled run.
    pub fn next_check(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.interval)
            .ok()
            .and_then(|interval| self.last_check.checked_add_signed(interval))
            .unwrap_or(self.last_check)
    }
}

/// Read-only view of a check, published by its scheduling loop after every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStatus {
    pub name: String,
    pub command: String,
    pub state: ServiceState,
    /// Raw exit code of the last run, `None` before the first run or when the
    /// probe was killed
    pub exit_code: Option<i32>,
    pub summary: String,
    pub interval: Duration,
    pub last_check: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(ServiceState::from_exit_code(Some(0)), ExitCodeMapping::Defined(ServiceState::Ok));
        assert_eq!(
            ServiceState::from_exit_code(Some(1)),
            ExitCodeMapping::Defined(ServiceState::Warning)
        );
        assert_eq!(
            ServiceState::from_exit_code(Some(2)),
            ExitCodeMapping::Defined(ServiceState::Critical)
        );
        assert_eq!(
            ServiceState::from_exit_code(Some(3)),
            ExitCodeMapping::Defined(ServiceState::Unknown)
        );
    }

    #[test]
    fn test_undefined_exit_codes_clamp_to_unknown() {
        for code in [4, 127, 255, -1] {
            let mapping = ServiceState::from_exit_code(Some(code));
            assert_eq!(mapping, ExitCodeMapping::OutOfRange(code));
            assert_eq!(mapping.state(), ServiceState::Unknown);
        }
        assert_eq!(ServiceState::from_exit_code(None).state(), ServiceState::Unknown);
    }

    #[test]
    fn test_ordinals_round_trip() {
        for state in ServiceState::ALL {
            assert_eq!(ServiceState::from_ordinal(state.ordinal()), Some(state));
        }
        assert_eq!(ServiceState::from_ordinal(4), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ServiceState::Ok.to_string(), "OK");
        assert_eq!(ServiceState::Critical.to_string(), "Critical");
    }

    #[test]
    fn test_next_check() {
        let last_check = Utc::now();
        let transition = Transition {
            check_name: "web".into(),
            old_state: ServiceState::Unknown,
            new_state: ServiceState::Ok,
            command: "true".into(),
            output: String::new(),
            interval: Duration::from_secs(90),
            last_check,
            timestamp: last_check,
        };
        assert_eq!(transition.next_check() - last_check, chrono::Duration::seconds(90));
    }
}
