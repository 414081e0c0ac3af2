//! Startup configuration.
//!
//! Everything is read once from environment-style key/value pairs into an
//! immutable [`Settings`], which is then handed to the checks and the
//! scheduler. Nothing looks at the process environment after startup.

mod duration;

use std::collections::BTreeMap;
use std::{env, fmt};

use thiserror::Error;
use tracing::debug;
use url::Url;

pub use duration::{DurationError, format_duration, parse_duration};

use crate::monitoring::interval::{DEFAULT_INTERVAL, IntervalPolicy};

/// Prefix shared by every recognised key.
pub const KEY_PREFIX: &str = "UPPE_";

const CHECK_INFIX: &str = "check_";
const HEALTHY_INFIX: &str = "interval_";
const RECHECK_INFIX: &str = "rinterval_";
const HEALTHY_KEY: &str = "interval";
const RECHECK_KEY: &str = "rinterval";
const DEFAULT_INTERVAL_KEY: &str = "default_interval";
const WEBHOOK_KEY: &str = "webhook";
const SIGNING_KEY: &str = "signingkey";

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid duration for {key}: {source}")]
    InvalidDuration {
        key: String,
        #[source]
        source: DurationError,
    },
    #[error("invalid webhook url \"{value}\": {source}")]
    InvalidWebhook {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("check key {0} has no name")]
    EmptyCheckName(String),
}

/// One `UPPE_check_<name>=<command>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDefinition {
    pub name: String,
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Check definitions, ordered by name
    pub checks: Vec<CheckDefinition>,
    pub intervals: IntervalPolicy,
    /// Notification sink; notifications are dropped when unset
    pub webhook: Option<Url>,
    /// Shared secret of the command endpoint's request verifier
    pub signing_secret: Option<String>,
}

impl Settings {
    /// Build settings from the current process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(env::vars())
    }

    /// Build settings from arbitrary key/value pairs.
    ///
    /// Malformed global values fail the whole load. Per-check interval
    /// overrides are stored verbatim and only validated when that check is
    /// constructed, so one bad override cannot take the other checks down.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut checks = BTreeMap::new();
        let mut default_interval = DEFAULT_INTERVAL;
        let mut healthy = None;
        let mut recheck = None;
        let mut healthy_overrides = Vec::new();
        let mut recheck_overrides = Vec::new();
        let mut webhook = None;
        let mut signing_secret = None;

        for (key, value) in vars {
            let key = key.as_ref();
            let Some(rest) = key.strip_prefix(KEY_PREFIX) else {
                continue;
            };
            let value: String = value.into();

            match rest {
                HEALTHY_KEY => healthy = Some(parse_key(key, &value)?),
                RECHECK_KEY => recheck = Some(parse_key(key, &value)?),
                DEFAULT_INTERVAL_KEY => default_interval = parse_key(key, &value)?,
                WEBHOOK_KEY => {
                    if !value.trim().is_empty() {
                        let url = Url::parse(value.trim())
                            .map_err(|source| Error::InvalidWebhook { value: value.clone(), source })?;
                        webhook = Some(url);
                    }
                }
                SIGNING_KEY => {
                    if !value.is_empty() {
                        signing_secret = Some(value);
                    }
                }
                _ => {
                    if let Some(name) = rest.strip_prefix(CHECK_INFIX) {
                        if name.is_empty() {
                            return Err(Error::EmptyCheckName(key.to_string()));
                        }
                        checks.insert(name.to_string(), value);
                    } else if let Some(name) = rest.strip_prefix(HEALTHY_INFIX) {
                        healthy_overrides.push((name.to_string(), value));
                    } else if let Some(name) = rest.strip_prefix(RECHECK_INFIX) {
                        recheck_overrides.push((name.to_string(), value));
                    } else {
                        debug!("Ignoring unrecognised key {}", key);
                    }
                }
            }
        }

        let mut intervals = IntervalPolicy::new(default_interval);
        if let Some(healthy) = healthy {
            intervals = intervals.with_healthy(healthy);
        }
        if let Some(recheck) = recheck {
            intervals = intervals.with_recheck(recheck);
        }
        for (name, raw) in healthy_overrides {
            if !checks.contains_key(&name) {
                debug!("Healthy interval override for undefined check {}", name);
            }
            intervals = intervals.with_healthy_override(name, raw);
        }
        for (name, raw) in recheck_overrides {
            if !checks.contains_key(&name) {
                debug!("Recheck interval override for undefined check {}", name);
            }
            intervals = intervals.with_recheck_override(name, raw);
        }

        let checks = checks
            .into_iter()
            .map(|(name, command)| CheckDefinition { name, command })
            .collect();

        Ok(Self { checks, intervals, webhook, signing_secret })
    }
}

fn parse_key(key: &str, value: &str) -> Result<std::time::Duration, Error> {
    parse_duration(value).map_err(|source| Error::InvalidDuration { key: key.to_string(), source })
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let unset = |value: Option<std::time::Duration>| {
            value.map(format_duration).unwrap_or_else(|| "-".to_string())
        };

        writeln!(f, "Current Check Configuration:")?;
        write_title_1(f, "Intervals")?;
        write_1(f, "Default", &format_duration(self.intervals.default_interval()))?;
        write_1(f, "Healthy", &unset(self.intervals.healthy()))?;
        write_1(f, "Recheck", &unset(self.intervals.recheck()))?;

        write_title_1(f, "Notifications")?;
        match &self.webhook {
            Some(url) => write_1(f, "Webhook", &format!("{}://{}", url.scheme(), url.host_str().unwrap_or("")))?,
            None => write_1(f, "Webhook", &"disabled")?,
        }
        write_1(f, "Signing Key", &if self.signing_secret.is_some() { "set" } else { "unset" })?;

        write_title_1(f, "Checks")?;
        for check in &self.checks {
            write_1(f, check.name.as_str(), &check.command)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::monitoring::types::ServiceState;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_loads_checks_by_prefix() {
        let settings = Settings::from_vars(vars(&[
            ("UPPE_check_web", "check_http -H example.com"),
            ("UPPE_check_disk", "check_disk -w 10%"),
            ("PATH", "/usr/bin"),
            ("UPPE_listen", "0.0.0.0:80"),
        ]))
        .unwrap();

        assert_eq!(
            settings.checks,
            vec![
                CheckDefinition { name: "disk".into(), command: "check_disk -w 10%".into() },
                CheckDefinition { name: "web".into(), command: "check_http -H example.com".into() },
            ]
        );
        assert!(settings.webhook.is_none());
        assert!(settings.signing_secret.is_none());
    }

    #[test]
    fn test_global_and_per_check_intervals() {
        let settings = Settings::from_vars(vars(&[
            ("UPPE_check_web", "true"),
            ("UPPE_interval", "5m"),
            ("UPPE_rinterval", "30s"),
            ("UPPE_interval_web", "10m"),
            ("UPPE_default_interval", "2m"),
        ]))
        .unwrap();

        assert_eq!(settings.intervals.default_interval(), Duration::from_secs(120));
        let web = settings.intervals.resolve("web").unwrap();
        assert_eq!(web.for_state(ServiceState::Ok), Duration::from_secs(600));
        assert_eq!(web.for_state(ServiceState::Critical), Duration::from_secs(30));
    }

    #[test]
    fn test_malformed_global_interval_is_fatal() {
        let err = Settings::from_vars(vars(&[("UPPE_interval", "often")])).unwrap_err();
        assert!(matches!(err, Error::InvalidDuration { ref key, .. } if key == "UPPE_interval"));

        let err = Settings::from_vars(vars(&[("UPPE_rinterval", "0s")])).unwrap_err();
        assert!(matches!(err, Error::InvalidDuration { .. }));
    }

    #[test]
    fn test_malformed_per_check_interval_is_deferred() {
        let settings = Settings::from_vars(vars(&[
            ("UPPE_check_web", "true"),
            ("UPPE_check_db", "true"),
            ("UPPE_rinterval_web", "fast"),
        ]))
        .unwrap();

        assert!(settings.intervals.resolve("web").is_err());
        assert!(settings.intervals.resolve("db").is_ok());
    }

    #[test]
    fn test_webhook_and_secret() {
        let settings = Settings::from_vars(vars(&[
            ("UPPE_webhook", "https://hooks.example.com/services/T000"),
            ("UPPE_signingkey", "s3cr3t"),
        ]))
        .unwrap();

        assert_eq!(settings.webhook.unwrap().host_str(), Some("hooks.example.com"));
        assert_eq!(settings.signing_secret.as_deref(), Some("s3cr3t"));

        let err = Settings::from_vars(vars(&[("UPPE_webhook", "not a url")])).unwrap_err();
        assert!(matches!(err, Error::InvalidWebhook { .. }));
    }

    #[test]
    fn test_empty_check_name() {
        let err = Settings::from_vars(vars(&[("UPPE_check_", "true")])).unwrap_err();
        assert!(matches!(err, Error::EmptyCheckName(_)));
    }

    #[test]
    fn test_display_redacts_secret() {
        let settings = Settings::from_vars(vars(&[
            ("UPPE_check_web", "true"),
            ("UPPE_signingkey", "s3cr3t"),
        ]))
        .unwrap();

        let rendered = settings.to_string();
        assert!(rendered.contains("web: true"));
        assert!(rendered.contains("Signing Key: set"));
        assert!(!rendered.contains("s3cr3t"));
    }
}
