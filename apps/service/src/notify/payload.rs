//! Slack block-kit formatting of state transitions.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::config::format_duration;
use crate::monitoring::types::{ServiceState, Transition};

/// First line of probe output, without the `|`-separated performance data.
pub fn output_summary(output: &str) -> &str {
    let first_line = output.lines().next().unwrap_or_default();
    first_line.split('|').next().unwrap_or_default().trim_end()
}

/// Header line of a notification, e.g. `web: :red_circle: Critical → :large_green_circle: OK`.
pub fn header(event: &Transition) -> String {
    format!("{}: {} → {}", event.check_name, indicator(event.old_state), indicator(event.new_state))
}

/// Build the webhook payload for a transition observed at `now`.
pub fn build_payload(event: &Transition, now: DateTime<Utc>) -> Value {
    let command = format!("Check command: `{}`", escape_mrkdwn(&event.command));
    let output = format!("Check output: `{}`", escape_mrkdwn(output_summary(&event.output)));
    let timing = format!(
        "Last check: {}\nInterval: {}\nNext check in: {}",
        event.last_check.to_rfc3339_opts(SecondsFormat::Secs, true),
        format_duration(event.interval),
        format_eta(next_check_in(event, now)),
    );

    json!({
        "blocks": [
            {
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": header(event),
                    "emoji": true
                }
            },
            context(command),
            context(output),
            context(timing),
        ]
    })
}

fn context(text: String) -> Value {
    json!({
        "type": "context",
        "elements": [
            {
                "type": "mrkdwn",
                "text": text
            }
        ]
    })
}

fn indicator(state: ServiceState) -> String {
    format!("{} {}", state.emoji(), state)
}

fn next_check_in(event: &Transition, now: DateTime<Utc>) -> Duration {
    (event.next_check() - now).to_std().unwrap_or_default()
}

fn format_eta(eta: Duration) -> String {
    let rounded = Duration::from_secs((eta.as_millis() as u64).div_ceil(1000));
    if rounded.is_zero() { "now".to_string() } else { format_duration(rounded) }
}

/// Escape the characters Slack treats as control sequences in mrkdwn text.
fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
