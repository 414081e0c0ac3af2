//! The per-check state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{CheckDefinition, DurationError};
use crate::notify::payload::output_summary;

use super::executor::{CommandError, ProbeExecutor, tokenize};
use super::interval::{CheckIntervals, IntervalPolicy};
use super::types::{CheckStatus, ExitCodeMapping, ServiceState, Transition};

/// Configuration errors that make a check unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("check {name}: {source}")]
    Command {
        name: String,
        #[source]
        source: CommandError,
    },
    #[error("check {name}: invalid interval: {source}")]
    Interval {
        name: String,
        #[source]
        source: DurationError,
    },
}

impl CheckError {
    pub fn check_name(&self) -> &str {
        match self {
            CheckError::Command { name, .. } | CheckError::Interval { name, .. } => name,
        }
    }
}

/// One monitored probe.
///
/// A check is only ever mutated by the scheduling loop that owns it, and
/// [`Check::run`] takes `&mut self`, so runs of the same check never overlap.
#[derive(Debug)]
pub struct Check {
    name: String,
    command: String,
    output: String,
    state: ServiceState,
    exit_code: Option<i32>,
    intervals: CheckIntervals,
    interval: Duration,
    last_check: Option<DateTime<Utc>>,
}

impl Check {
    /// Build a check, validating its command line and interval overrides.
    ///
    /// The check starts out `Unknown`, polled at its recheck interval.
    pub fn new(definition: &CheckDefinition, policy: &IntervalPolicy) -> Result<Self, CheckError> {
        let name = definition.name.clone();

        tokenize(&definition.command)
            .map_err(|source| CheckError::Command { name: name.clone(), source })?;
        let intervals = policy
            .resolve(&name)
            .map_err(|source| CheckError::Interval { name: name.clone(), source })?;

        let state = ServiceState::Unknown;
        Ok(Self {
            name,
            command: definition.command.clone(),
            output: String::new(),
            state,
            exit_code: None,
            intervals,
            interval: intervals.for_state(state),
            last_check: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    /// Run the probe once and record its result.
    ///
    /// Returns the transition when the state differs from the one before the
    /// run; the polling interval is recomputed only in that case.
    pub async fn run(
        &mut self,
        executor: &dyn ProbeExecutor,
    ) -> Result<Option<Transition>, CheckError> {
        let argv = tokenize(&self.command)
            .map_err(|source| CheckError::Command { name: self.name.clone(), source })?;

        let previous = self.state;

        info!("Running {}: {}", self.name, self.command);
        let probe = executor.execute(&argv).await;

        let mapping = ServiceState::from_exit_code(probe.exit_code);
        match mapping {
            ExitCodeMapping::Defined(_) => {}
            ExitCodeMapping::OutOfRange(code) => {
                warn!("Check {} exited with undefined code {}, treating as Unknown", self.name, code)
            }
            ExitCodeMapping::NoExitCode => {
                warn!("Check {} was terminated without an exit code, treating as Unknown", self.name)
            }
        }

        self.output = probe.stdout;
        self.state = mapping.state();
        self.exit_code = probe.exit_code;
        let finished = Utc::now();
        self.last_check = Some(finished);

        if previous == self.state {
            return Ok(None);
        }

        let interval = self.determine_interval();
        info!(
            "State changed {}: {}->{}, rechecking in {:?}",
            self.name, previous, self.state, interval
        );

        Ok(Some(Transition {
            check_name: self.name.clone(),
            old_state: previous,
            new_state: self.state,
            command: self.command.clone(),
            output: self.output.clone(),
            interval,
            last_check: finished,
            timestamp: Utc::now(),
        }))
    }

    /// Select the polling interval for the current state and make it active.
    pub fn determine_interval(&mut self) -> Duration {
        self.interval = self.intervals.for_state(self.state);
        self.interval
    }

    pub fn status(&self) -> CheckStatus {
        CheckStatus {
            name: self.name.clone(),
            command: self.command.clone(),
            state: self.state,
            exit_code: self.exit_code,
            summary: output_summary(&self.output).to_string(),
            interval: self.interval,
            last_check: self.last_check,
        }
    }
}

/// Construct a check for every definition.
///
/// Broken definitions are logged and handed back as errors; the remaining
/// checks are still returned.
pub fn build_checks(
    definitions: &[CheckDefinition],
    policy: &IntervalPolicy,
) -> (Vec<Check>, Vec<CheckError>) {
    let mut checks = Vec::with_capacity(definitions.len());
    let mut errors = Vec::new();

    for definition in definitions {
        match Check::new(definition, policy) {
            Ok(check) => {
                info!("Loaded {}: {}", check.name(), check.command());
                checks.push(check);
            }
            Err(e) => {
                error!("Skipping {}", e);
                errors.push(e);
            }
        }
    }

    (checks, errors)
}
