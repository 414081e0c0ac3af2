//! Probe execution: turns a command line into a child process run.

use std::io::ErrorKind;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code reported when the probe binary could not be found or started.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = 127;
/// Exit code reported when the probe binary exists but is not executable.
pub const NOT_EXECUTABLE_EXIT_CODE: i32 = 126;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command line is empty")]
    Empty,
    #[error("could not tokenize command line \"{0}\"")]
    Malformed(String),
}

/// Split a command line into argv using shell word rules.
///
/// Quotes and backslash escapes are honoured; nothing is expanded and pipes or
/// redirections are passed through as plain words.
pub fn tokenize(command: &str) -> Result<Vec<String>, CommandError> {
    let argv = shlex::split(command).ok_or_else(|| CommandError::Malformed(command.to_string()))?;
    if argv.is_empty() {
        return Err(CommandError::Empty);
    }
    Ok(argv)
}

/// Raw result of one probe run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutput {
    pub stdout: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ProbeOutput {
    pub fn new(stdout: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self { stdout: stdout.into(), exit_code }
    }
}

/// Runs one probe to completion.
#[async_trait::async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// Execute `argv` and report its output and exit code. Launch failures are
    /// reported as exit codes, never as errors.
    async fn execute(&self, argv: &[String]) -> ProbeOutput;
}

/// Executes probes as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ProbeExecutor for CommandExecutor {
    async fn execute(&self, argv: &[String]) -> ProbeOutput {
        let Some((program, args)) = argv.split_first() else {
            return ProbeOutput::new("", Some(LAUNCH_FAILURE_EXIT_CODE));
        };

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => {
                debug!("{} exited with {:?}", program, output.status.code());
                ProbeOutput::new(String::from_utf8_lossy(&output.stdout), output.status.code())
            }
            Err(e) => {
                let code = match e.kind() {
                    ErrorKind::PermissionDenied => NOT_EXECUTABLE_EXIT_CODE,
                    _ => LAUNCH_FAILURE_EXIT_CODE,
                };
                warn!("Failed to launch {}: {}", program, e);
                ProbeOutput::new("", Some(code))
            }
        }
    }
}
