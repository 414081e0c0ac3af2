//! Slash-command parsing and dispatch onto the scheduled checks.

use crate::monitoring::CheckRegistry;
use crate::monitoring::types::CheckStatus;

pub const USAGE: &str = "Usage: `run <check>` | `run all` | `status [check]`";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    RunAll,
    Run(String),
    StatusAll,
    Status(String),
    Help,
}

impl SlashCommand {
    /// Parse the free text that followed the slash command.
    pub fn parse(text: &str) -> Self {
        let mut words = text.split_whitespace();
        let verb = words.next().map(str::to_ascii_lowercase);
        let target = words.next();
        if words.next().is_some() {
            return SlashCommand::Help;
        }

        match (verb.as_deref(), target) {
            (Some("run"), Some("all")) => SlashCommand::RunAll,
            (Some("run"), Some(name)) => SlashCommand::Run(name.to_string()),
            (Some("status"), None) => SlashCommand::StatusAll,
            (Some("status"), Some(name)) => SlashCommand::Status(name.to_string()),
            _ => SlashCommand::Help,
        }
    }
}

/// Execute a command against the registry and return the reply text.
pub fn dispatch(registry: &CheckRegistry, command: &SlashCommand) -> String {
    match command {
        SlashCommand::RunAll => format!("Running {} checks", registry.trigger_all()),
        SlashCommand::Run(name) => {
            if registry.trigger(name) {
                format!("Running {name}")
            } else {
                unknown_check(registry, name)
            }
        }
        SlashCommand::StatusAll => {
            if registry.is_empty() {
                return "No checks configured".to_string();
            }
            registry.statuses().iter().map(status_line).collect::<Vec<_>>().join("\n")
        }
        SlashCommand::Status(name) => match registry.status(name) {
            Some(status) => status_line(&status),
            None => unknown_check(registry, name),
        },
        SlashCommand::Help => USAGE.to_string(),
    }
}

fn unknown_check(registry: &CheckRegistry, name: &str) -> String {
    let known: Vec<&str> = registry.names().collect();
    format!("No check named {name}. Known checks: {}", known.join(", "))
}

fn status_line(status: &CheckStatus) -> String {
    match status.last_check {
        Some(last_check) => format!(
            "{} {}: {} (last check {}) {}",
            status.state.emoji(),
            status.name,
            status.state,
            last_check.format("%Y-%m-%d %H:%M:%S UTC"),
            status.summary
        )
        .trim_end()
        .to_string(),
        None => format!("{} {}: not checked yet", status.state.emoji(), status.name),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::watch;

    use super::*;
    use crate::monitoring::types::ServiceState;
    use crate::monitoring::{CheckHandle, Trigger};

    fn registry() -> (CheckRegistry, Trigger) {
        let trigger = Trigger::new();
        let (_tx, rx) = watch::channel(CheckStatus {
            name: "web".into(),
            command: "check_http".into(),
            state: ServiceState::Ok,
            exit_code: Some(0),
            summary: "HTTP OK".into(),
            interval: Duration::from_secs(60),
            last_check: Some(chrono::Utc::now()),
        });
        (CheckRegistry::new([CheckHandle::new("web", trigger.clone(), rx)]), trigger)
    }

    #[test]
    fn test_parse() {
        assert_eq!(SlashCommand::parse("run all"), SlashCommand::RunAll);
        assert_eq!(SlashCommand::parse("  RUN web "), SlashCommand::Run("web".into()));
        assert_eq!(SlashCommand::parse("status"), SlashCommand::StatusAll);
        assert_eq!(SlashCommand::parse("status db"), SlashCommand::Status("db".into()));
        assert_eq!(SlashCommand::parse(""), SlashCommand::Help);
        assert_eq!(SlashCommand::parse("run"), SlashCommand::Help);
        assert_eq!(SlashCommand::parse("run a b"), SlashCommand::Help);
        assert_eq!(SlashCommand::parse("reboot"), SlashCommand::Help);
    }

    #[test]
    fn test_dispatch_status() {
        let (registry, _trigger) = registry();

        let reply = dispatch(&registry, &SlashCommand::Status("web".into()));
        assert!(reply.starts_with(":large_green_circle: web: OK (last check"));
        assert!(reply.ends_with("HTTP OK"));

        let reply = dispatch(&registry, &SlashCommand::Status("db".into()));
        assert_eq!(reply, "No check named db. Known checks: web");
    }

    #[test]
    fn test_dispatch_status_all_lists_one_line_per_check() {
        let status = |name: &str, last_check| CheckStatus {
            name: name.into(),
            command: "probe".into(),
            state: ServiceState::Unknown,
            exit_code: None,
            summary: String::new(),
            interval: Duration::from_secs(60),
            last_check,
        };
        let (_db_tx, db_rx) = watch::channel(status("db", None));
        let (_web_tx, web_rx) = watch::channel(status("web", Some(chrono::Utc::now())));
        let registry = CheckRegistry::new([
            CheckHandle::new("web", Trigger::new(), web_rx),
            CheckHandle::new("db", Trigger::new(), db_rx),
        ]);

        let reply = dispatch(&registry, &SlashCommand::StatusAll);
        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("db: not checked yet"));
        assert!(lines[1].contains("web: Unknown (last check"));
        assert!(!reply.ends_with('\n'));

        assert_eq!(dispatch(&CheckRegistry::default(), &SlashCommand::StatusAll), "No checks configured");
    }

    #[test]
    fn test_dispatch_help() {
        let (registry, _trigger) = registry();
        assert_eq!(dispatch(&registry, &SlashCommand::Help), USAGE);
    }

    #[tokio::test]
    async fn test_dispatch_run_fires_trigger() {
        let (registry, trigger) = registry();

        assert_eq!(dispatch(&registry, &SlashCommand::Run("web".into())), "Running web");
        tokio::time::timeout(Duration::from_millis(100), trigger.fired())
            .await
            .expect("trigger was not fired");

        assert_eq!(dispatch(&registry, &SlashCommand::RunAll), "Running 1 checks");
    }
}
