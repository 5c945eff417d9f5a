//! Health engine — owns the registry, cache, and scheduler lifecycle.
//!
//! `HealthEngine` is the only entry point callers need: register checks,
//! `start()`/`stop()` the background scheduler, and read status snapshots.
//! All mutable state stays inside the engine; callers receive copies.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use pulse_core::{CheckDefinition, EngineConfig, HealthResult, PulseConfig, SystemHealth};

use crate::aggregator::aggregate;
use crate::cache::ResultCache;
use crate::error::{EngineError, EngineResult};
use crate::executor::ExecutorSet;
use crate::registry::CheckRegistry;
use crate::retry::{BreakerSet, CircuitBreaker, RetryPolicy};
use crate::scheduler::{Scheduler, dispatch};

/// Callback invoked by the scheduler when the overall status changes.
pub type StatusCallback = Arc<dyn Fn(SystemHealth) -> BoxFuture + Send + Sync>;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// State shared between the engine handle and scheduler tasks.
pub(crate) struct EngineCore {
    pub(crate) registry: CheckRegistry,
    pub(crate) cache: ResultCache,
    executors: ExecutorSet,
    retry: RetryPolicy,
    breakers: BreakerSet,
    /// Serializes runs of the same check across scheduled and on-demand paths.
    check_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EngineCore {
    /// Run one check through retry and breaker, time it, and cache the result.
    pub(crate) async fn run_check(self: Arc<Self>, def: CheckDefinition) -> HealthResult {
        let lock = self.check_lock(&def.name).await;
        let _guard = lock.lock().await;

        let breaker = self.breakers.get_or_create(&def.name).await;
        let executors = &self.executors;
        let def_ref = &def;

        let started = Instant::now();
        let mut result = self
            .retry
            .execute(def_ref, &breaker, move || executors.execute(def_ref))
            .await;
        result.duration = started.elapsed();

        debug!(
            check = %def.name,
            status = %result.status,
            duration_ms = result.duration.as_millis() as u64,
            attempts = result.retry_count,
            "check completed"
        );

        self.record(result.clone()).await;
        result
    }

    /// Cache a result unless its check was unregistered meanwhile.
    pub(crate) async fn record(&self, result: HealthResult) {
        if self.registry.contains(&result.check_name).await {
            self.cache.insert(result).await;
        } else {
            debug!(check = %result.check_name, "dropping result for unregistered check");
        }
    }

    pub(crate) async fn current_status(&self) -> SystemHealth {
        let results = self.cache.snapshot().await;
        let definitions = self.registry.snapshot().await;
        aggregate(&results, &definitions)
    }

    async fn check_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.check_locks.lock().await;
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    async fn forget(&self, name: &str) {
        self.cache.remove(name).await;
        self.breakers.remove(name).await;
        self.check_locks.lock().await.remove(name);
    }
}

enum Lifecycle {
    Stopped,
    Running {
        shutdown_tx: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
}

/// The health-monitoring engine.
pub struct HealthEngine {
    core: Arc<EngineCore>,
    config: EngineConfig,
    lifecycle: Mutex<Lifecycle>,
    on_status_change: Option<StatusCallback>,
}

impl HealthEngine {
    /// Create an engine with the built-in executors.
    pub fn new(config: EngineConfig) -> Self {
        let executors = ExecutorSet::new(&config);
        Self::with_executors(config, executors)
    }

    /// Create an engine with a custom executor set.
    pub fn with_executors(config: EngineConfig, executors: ExecutorSet) -> Self {
        let core = EngineCore {
            registry: CheckRegistry::new(),
            cache: ResultCache::new(),
            executors,
            retry: RetryPolicy::from_config(&config),
            breakers: BreakerSet::new(config.circuit_breaker_threshold),
            check_locks: Mutex::new(HashMap::new()),
        };
        Self {
            core: Arc::new(core),
            config,
            lifecycle: Mutex::new(Lifecycle::Stopped),
            on_status_change: None,
        }
    }

    /// Build an engine from a parsed `pulse.toml` and register its checks.
    pub async fn from_config(config: &PulseConfig) -> EngineResult<Self> {
        let engine = Self::new(config.engine_config()?);
        engine.register_all(config.definitions()?).await;
        Ok(engine)
    }

    /// Set a callback for overall status changes seen by the scheduler.
    pub fn with_callback(mut self, callback: StatusCallback) -> Self {
        self.on_status_change = Some(callback);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Register a check, replacing any existing check with the same name.
    pub async fn register(&self, def: CheckDefinition) -> Option<CheckDefinition> {
        self.core.registry.register(def).await
    }

    pub async fn register_all(&self, defs: impl IntoIterator<Item = CheckDefinition>) {
        for def in defs {
            self.register(def).await;
        }
    }

    /// Remove a check along with its cached result and breaker.
    pub async fn unregister(&self, name: &str) -> Option<CheckDefinition> {
        let removed = self.core.registry.unregister(name).await;
        if removed.is_some() {
            self.core.forget(name).await;
        }
        removed
    }

    pub async fn checks(&self) -> Vec<CheckDefinition> {
        self.core.registry.list().await
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Start the background scheduler. No-op if already running.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(*lifecycle, Lifecycle::Running { .. }) {
            warn!("health engine already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(self.config.tick_interval);
        let handle = tokio::spawn(scheduler.run(
            Arc::clone(&self.core),
            self.on_status_change.clone(),
            shutdown_rx,
        ));

        *lifecycle = Lifecycle::Running {
            shutdown_tx,
            handle,
        };
        let checks = self.core.registry.len().await;
        info!(checks, "health engine started");
    }

    /// Stop the scheduler, cancelling in-flight checks, and wait for it to
    /// exit. No-op if already stopped.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Lifecycle::Running {
            shutdown_tx,
            handle,
        } = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        else {
            debug!("health engine already stopped");
            return;
        };

        let _ = shutdown_tx.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "health scheduler task ended abnormally");
        }
        info!("health engine stopped");
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock().await, Lifecycle::Running { .. })
    }

    // ── Status ─────────────────────────────────────────────────────

    /// Aggregate the cached results without running any checks.
    pub async fn get_current_status(&self) -> SystemHealth {
        self.core.current_status().await
    }

    /// Run every registered check now, regardless of due time, and return
    /// the aggregate once they finish.
    pub async fn run_comprehensive_check(&self) -> SystemHealth {
        let checks = self.core.registry.list().await;
        info!(checks = checks.len(), "running comprehensive health check");

        let mut shutdown = self.shutdown_signal().await;
        let outcome = dispatch(&self.core, checks, &mut shutdown).await;
        if outcome.cancelled {
            warn!("comprehensive check interrupted by shutdown");
        }
        self.get_current_status().await
    }

    /// Run a single check now, including on-demand checks.
    pub async fn run_check(&self, name: &str) -> EngineResult<HealthResult> {
        let def = self
            .core
            .registry
            .get(name)
            .await
            .ok_or_else(|| EngineError::CheckNotFound(name.to_string()))?;

        let mut shutdown = self.shutdown_signal().await;
        let outcome = dispatch(&self.core, vec![def], &mut shutdown).await;
        outcome
            .results
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Cancelled(name.to_string()))
    }

    /// Latest cached result for one check.
    pub async fn get_check_result(&self, name: &str) -> Option<HealthResult> {
        self.core.cache.get(name).await
    }

    // ── Circuit breakers ───────────────────────────────────────────

    /// Clear a check's circuit breaker.
    pub async fn reset_circuit_breaker(&self, name: &str) -> EngineResult<()> {
        if !self.core.registry.contains(name).await {
            return Err(EngineError::CheckNotFound(name.to_string()));
        }
        self.core.breakers.reset(name).await;
        Ok(())
    }

    /// Breaker state for a check that has run at least once.
    pub async fn circuit_breaker_state(&self, name: &str) -> Option<CircuitBreaker> {
        self.core.breakers.snapshot(name).await
    }

    /// On-demand runs are cancelled by `stop()` while the scheduler runs.
    async fn shutdown_signal(&self) -> watch::Receiver<bool> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Running { shutdown_tx, .. } => shutdown_tx.subscribe(),
            Lifecycle::Stopped => watch::channel(false).1,
        }
    }
}

impl Drop for HealthEngine {
    fn drop(&mut self) {
        if let Lifecycle::Running {
            shutdown_tx,
            handle,
        } = self.lifecycle.get_mut()
        {
            let _ = shutdown_tx.send(true);
            handle.abort();
        }
    }
}
