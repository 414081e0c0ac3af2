use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{error, info, warn};

use super::check::{Check, CheckError};
use super::executor::ProbeExecutor;
use super::types::{CheckStatus, Transition};
use crate::notify::Notifier;

/// Single-slot "run now" signal of one check.
///
/// Firing an already pending trigger is a no-op: the loop runs once, however
/// many times it was fired in between.
#[derive(Debug, Clone, Default)]
pub struct Trigger {
    notify: Arc<Notify>,
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.notify.notify_one();
    }

    /// Wait until the trigger is fired, consuming the pending signal.
    pub async fn fired(&self) {
        self.notify.notified().await;
    }
}

/// Control side of a scheduled check.
#[derive(Debug, Clone)]
pub struct CheckHandle {
    name: String,
    trigger: Trigger,
    status: watch::Receiver<CheckStatus>,
}

impl CheckHandle {
    pub fn new(name: impl Into<String>, trigger: Trigger, status: watch::Receiver<CheckStatus>) -> Self {
        Self { name: name.into(), trigger, status }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the check's loop to run as soon as possible.
    pub fn run_now(&self) {
        self.trigger.fire();
    }

    /// Latest snapshot published by the check's loop.
    pub fn status(&self) -> CheckStatus {
        self.status.borrow().clone()
    }
}

/// Name-indexed handles of every scheduled check.
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: Arc<BTreeMap<String, CheckHandle>>,
}

impl CheckRegistry {
    pub fn new(handles: impl IntoIterator<Item = CheckHandle>) -> Self {
        let checks = handles.into_iter().map(|handle| (handle.name.clone(), handle)).collect();
        Self { checks: Arc::new(checks) }
    }

    pub fn get(&self, name: &str) -> Option<&CheckHandle> {
        self.checks.get(name)
    }

    /// Trigger one check; returns false if no such check is scheduled.
    pub fn trigger(&self, name: &str) -> bool {
        match self.checks.get(name) {
            Some(handle) => {
                handle.run_now();
                true
            }
            None => false,
        }
    }

    /// Trigger every check, returning how many were triggered.
    pub fn trigger_all(&self) -> usize {
        self.checks.values().for_each(CheckHandle::run_now);
        self.checks.len()
    }

    pub fn status(&self, name: &str) -> Option<CheckStatus> {
        self.checks.get(name).map(CheckHandle::status)
    }

    pub fn statuses(&self) -> Vec<CheckStatus> {
        self.checks.values().map(CheckHandle::status).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Checks handed to the scheduler, with their loop tasks.
pub struct ScheduledChecks {
    pub registry: CheckRegistry,
    pub tasks: Vec<JoinHandle<Result<(), CheckError>>>,
}

impl ScheduledChecks {
    /// Wait for every loop to end. Loops only end on a fatal check error, so
    /// in normal operation this never returns.
    pub async fn join(self) {
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Check loop stopped: {}", e),
                Err(e) => error!("Check loop panicked: {}", e),
            }
        }
    }
}

/// Runs every check on its own independent loop.
pub struct Scheduler {
    executor: Arc<dyn ProbeExecutor>,
    notifier: Arc<dyn Notifier>,
    baseline: bool,
}

impl Scheduler {
    /// Create a scheduler. Checks get a baseline run as soon as they are
    /// scheduled unless disabled with [`Scheduler::with_baseline`].
    pub fn new(executor: Arc<dyn ProbeExecutor>, notifier: Arc<dyn Notifier>) -> Self {
        Self { executor, notifier, baseline: true }
    }

    pub fn with_baseline(mut self, baseline: bool) -> Self {
        self.baseline = baseline;
        self
    }

    /// Spawn the loop of a single check.
    pub fn schedule_check(&self, check: Check) -> (CheckHandle, JoinHandle<Result<(), CheckError>>) {
        let trigger = Trigger::new();
        let (status_tx, status_rx) = watch::channel(check.status());
        let handle = CheckHandle::new(check.name(), trigger.clone(), status_rx);

        if self.baseline {
            trigger.fire();
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(deliver_notifications(self.notifier.clone(), events_rx));

        let task = tokio::spawn(run_loop(check, self.executor.clone(), trigger, status_tx, events_tx));

        (handle, task)
    }

    /// Spawn one loop per check.
    pub fn schedule_checks(&self, checks: Vec<Check>) -> ScheduledChecks {
        let (handles, tasks): (Vec<_>, Vec<_>) =
            checks.into_iter().map(|check| self.schedule_check(check)).unzip();

        ScheduledChecks { registry: CheckRegistry::new(handles), tasks }
    }
}

/// Deliver one check's transitions in the order they were detected.
///
/// Ends once the check's loop is gone and its queue is drained.
async fn deliver_notifications(
    notifier: Arc<dyn Notifier>,
    mut events: mpsc::UnboundedReceiver<Transition>,
) {
    while let Some(event) = events.recv().await {
        notifier.send(&event).await;
    }
}

async fn run_loop(
    mut check: Check,
    executor: Arc<dyn ProbeExecutor>,
    trigger: Trigger,
    status_tx: watch::Sender<CheckStatus>,
    events_tx: mpsc::UnboundedSender<Transition>,
) -> Result<(), CheckError> {
    info!("Scheduled {}: {} every {:?}", check.name(), check.command(), check.interval());

    let timer = sleep(check.interval());
    tokio::pin!(timer);

    loop {
        let scheduled = tokio::select! {
            () = &mut timer => true,
            () = trigger.fired() => false,
        };

        let transition = check.run(executor.as_ref()).await.inspect_err(|e| {
            error!("Stopping check {}: {}", check.name(), e);
        })?;
        status_tx.send_replace(check.status());

        if let Some(transition) = transition {
            timer.as_mut().reset(Instant::now() + check.interval());

            if events_tx.send(transition).is_err() {
                warn!("Notification queue of {} is closed, dropping transition", check.name());
            }
        } else if scheduled {
            // Advance along the original grid, skipping ticks missed by a slow probe.
            let now = Instant::now();
            let mut next = timer.deadline() + check.interval();
            while next <= now {
                next += check.interval();
            }
            timer.as_mut().reset(next);
        }
    }
}
