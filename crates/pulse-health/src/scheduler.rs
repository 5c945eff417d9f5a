//! Scheduler — decides when each check runs and fans out execution.
//!
//! One loop owns the per-check "next due" map. Every tick it collects the
//! checks whose due time has passed, pushes their due time forward by
//! their interval, and runs them concurrently. The tick waits for all of
//! its checks before sleeping, so a check is never dispatched twice at once
//! by the loop.
//!
//! A shutdown signal aborts in-flight checks. Aborted checks never reach
//! the result cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use pulse_core::{CheckDefinition, HealthResult, OverallStatus};

use crate::engine::{EngineCore, StatusCallback};
use crate::error::CheckError;

/// Per-check due-time bookkeeping for the tick loop.
#[derive(Debug)]
pub struct Scheduler {
    tick: Duration,
    /// `None` once a check's interval reaches past the clock's range.
    next_due: HashMap<String, Option<Instant>>,
}

impl Scheduler {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            next_due: HashMap::new(),
        }
    }

    /// Select checks due at `now` and advance their next-due time.
    ///
    /// Checks seen for the first time are due immediately. On-demand checks
    /// (zero interval) are never selected. Bookkeeping for checks that are
    /// no longer registered is dropped.
    pub fn due_checks(&mut self, checks: &[CheckDefinition], now: Instant) -> Vec<CheckDefinition> {
        self.next_due
            .retain(|name, _| checks.iter().any(|c| &c.name == name));

        let mut due = Vec::new();
        for def in checks.iter().filter(|d| !d.is_on_demand()) {
            let is_due = match self.next_due.get(&def.name) {
                None => true,
                Some(Some(next)) => *next <= now,
                Some(None) => false,
            };
            if !is_due {
                continue;
            }

            let next = now.checked_add(def.interval);
            if next.is_none() {
                warn!(
                    check = %def.name,
                    interval_secs = def.interval.as_secs(),
                    "check interval out of range, running it only once"
                );
            }
            self.next_due.insert(def.name.clone(), next);
            due.push(def.clone());
        }
        due
    }

    /// When `name` is next due, if it has been scheduled and will run again.
    pub fn next_due(&self, name: &str) -> Option<Instant> {
        self.next_due.get(name).copied().flatten()
    }

    /// Whether `name` has been dispatched at least once.
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.next_due.contains_key(name)
    }

    /// Run the tick loop until the shutdown signal fires.
    pub(crate) async fn run(
        mut self,
        core: Arc<EngineCore>,
        on_status_change: Option<StatusCallback>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(tick_ms = self.tick.as_millis() as u64, "health scheduler started");
        let mut last_status: Option<OverallStatus> = None;

        loop {
            let now = Instant::now();
            let checks = core.registry.list().await;
            let due = self.due_checks(&checks, now);

            if !due.is_empty() {
                debug!(due = due.len(), registered = checks.len(), "dispatching due checks");
                let outcome = dispatch(&core, due, &mut shutdown).await;
                if outcome.cancelled {
                    break;
                }

                let health = core.current_status().await;
                if last_status != Some(health.overall_status) {
                    info!(
                        from = last_status.map(|s| s.as_str()).unwrap_or("none"),
                        to = %health.overall_status,
                        "system health changed"
                    );
                    last_status = Some(health.overall_status);
                    if let Some(ref cb) = on_status_change {
                        cb(health).await;
                    }
                }
            }

            tokio::select! {
                _ = sleep_until_checked(now.checked_add(self.tick)) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        info!("health scheduler stopped");
    }
}

/// Results gathered from one fan-out.
#[derive(Debug, Default)]
pub(crate) struct DispatchOutcome {
    pub results: Vec<HealthResult>,
    /// Shutdown fired before every check finished.
    pub cancelled: bool,
}

/// Run `defs` concurrently and wait for all of them, or abort the rest
/// when shutdown is requested.
///
/// Each task writes its own result to the cache. A panicking task is
/// recorded here as an `unknown` result.
pub(crate) async fn dispatch(
    core: &Arc<EngineCore>,
    defs: Vec<CheckDefinition>,
    shutdown: &mut watch::Receiver<bool>,
) -> DispatchOutcome {
    let mut tasks = JoinSet::new();
    let mut names = HashMap::new();
    for def in defs {
        let name = def.name.clone();
        let handle = tasks.spawn(Arc::clone(core).run_check(def));
        names.insert(handle.id(), name);
    }

    let mut outcome = DispatchOutcome::default();
    loop {
        tokio::select! {
            joined = tasks.join_next_with_id() => match joined {
                None => break,
                Some(Ok((_, result))) => outcome.results.push(result),
                Some(Err(e)) if e.is_panic() => {
                    let name = names.remove(&e.id()).unwrap_or_default();
                    let message = panic_message(e.into_panic());
                    error!(check = %name, panic = %message, "check executor panicked");
                    let result = CheckError::ExecutorPanic(message).into_result(&name);
                    core.record(result.clone()).await;
                    outcome.results.push(result);
                }
                Some(Err(e)) => {
                    debug!(error = %e, "check task ended without a result");
                }
            },
            _ = shutdown_requested(shutdown) => {
                let in_flight = tasks.len();
                tasks.shutdown().await;
                if in_flight > 0 {
                    info!(in_flight, "cancelled in-flight checks");
                }
                outcome.cancelled = true;
                break;
            }
        }
    }
    outcome
}

/// Sleeps until `deadline`, or forever if it is out of the clock's range.
async fn sleep_until_checked(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Resolves once shutdown is requested. Never resolves if the sender is
/// gone without requesting shutdown.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::CheckType;

    fn every(name: &str, secs: u64) -> CheckDefinition {
        CheckDefinition::new(name, CheckType::Tcp, "host:1").with_interval(Duration::from_secs(secs))
    }

    fn names(defs: &[CheckDefinition]) -> Vec<&str> {
        defs.iter().map(|d| d.name.as_str()).collect()
    }

    #[tokio::test]
    async fn new_checks_are_due_immediately() {
        let mut scheduler = Scheduler::new(Duration::from_secs(10));
        let checks = vec![every("api", 30), every("disk", 60)];
        let now = Instant::now();

        let due = scheduler.due_checks(&checks, now);
        assert_eq!(names(&due), vec!["api", "disk"]);
        assert_eq!(scheduler.next_due("api"), Some(now + Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn check_waits_for_its_interval() {
        let mut scheduler = Scheduler::new(Duration::from_secs(10));
        let checks = vec![every("api", 30), every("disk", 60)];
        let start = Instant::now();
        scheduler.due_checks(&checks, start);

        for secs in [10, 20] {
            let due = scheduler.due_checks(&checks, start + Duration::from_secs(secs));
            assert!(due.is_empty(), "nothing due at {secs}s");
        }

        let due = scheduler.due_checks(&checks, start + Duration::from_secs(30));
        assert_eq!(names(&due), vec!["api"]);

        let due = scheduler.due_checks(&checks, start + Duration::from_secs(60));
        assert_eq!(names(&due), vec!["api", "disk"]);
    }

    #[tokio::test]
    async fn late_tick_reschedules_from_dispatch_time() {
        let mut scheduler = Scheduler::new(Duration::from_secs(10));
        let checks = vec![every("api", 30)];
        let start = Instant::now();
        scheduler.due_checks(&checks, start);

        let late = start + Duration::from_secs(45);
        assert_eq!(scheduler.due_checks(&checks, late).len(), 1);
        assert_eq!(scheduler.next_due("api"), Some(late + Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn out_of_range_interval_runs_once() {
        let mut scheduler = Scheduler::new(Duration::from_secs(10));
        let checks = vec![every("rare", u64::MAX / 2), every("api", 30)];
        let start = Instant::now();

        let due = scheduler.due_checks(&checks, start);
        assert_eq!(names(&due), vec!["rare", "api"]);
        assert!(scheduler.is_scheduled("rare"));
        assert!(scheduler.next_due("rare").is_none());

        let due = scheduler.due_checks(&checks, start + Duration::from_secs(30));
        assert_eq!(names(&due), vec!["api"]);
        let due = scheduler.due_checks(&checks, start + Duration::from_secs(3600));
        assert_eq!(names(&due), vec!["api"]);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_tick_sleeps_until_shutdown() {
        let slept = tokio::time::timeout(
            Duration::from_secs(3600),
            sleep_until_checked(Instant::now().checked_add(Duration::MAX)),
        )
        .await;
        assert!(slept.is_err());
    }

    #[tokio::test]
    async fn on_demand_checks_are_never_due() {
        let mut scheduler = Scheduler::new(Duration::from_secs(10));
        let checks = vec![every("manual", 0)];
        let start = Instant::now();
        assert!(scheduler.due_checks(&checks, start).is_empty());
        assert!(
            scheduler
                .due_checks(&checks, start + Duration::from_secs(3600))
                .is_empty()
        );
        assert!(scheduler.next_due("manual").is_none());
        assert!(!scheduler.is_scheduled("manual"));
    }

    #[tokio::test]
    async fn unregistered_checks_are_forgotten() {
        let mut scheduler = Scheduler::new(Duration::from_secs(10));
        let start = Instant::now();
        scheduler.due_checks(&[every("api", 30), every("old", 30)], start);
        assert!(scheduler.next_due("old").is_some());

        scheduler.due_checks(&[every("api", 30)], start + Duration::from_secs(1));
        assert!(scheduler.next_due("old").is_none());
    }

    #[tokio::test]
    async fn shutdown_requested_ignores_dropped_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let fired = tokio::time::timeout(Duration::from_millis(50), shutdown_requested(&mut rx)).await;
        assert!(fired.is_err());

        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        shutdown_requested(&mut rx).await;
    }

    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "unknown panic");
    }
}
