//! Retry policy and circuit breaker.
//!
//! Each attempt that fails counts against the check's breaker. Once the
//! breaker trips, further calls short-circuit without invoking the executor
//! until an operator resets it. Breakers never reset on their own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use pulse_core::{CheckDefinition, EngineConfig, HealthResult};

/// Failure-threshold guard for a single check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreaker {
    failure_count: u32,
    /// Zero disables tripping.
    threshold: u32,
    tripped: bool,
    last_failure_time: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            failure_count: 0,
            threshold,
            tripped: false,
            last_failure_time: None,
        }
    }

    /// Record a failed attempt. Returns `true` if the breaker is now tripped.
    pub fn record_failure(&mut self) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(Utc::now());
        if self.threshold > 0 && self.failure_count >= self.threshold {
            self.tripped = true;
        }
        self.tripped
    }

    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.tripped = false;
        self.last_failure_time = None;
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn last_failure_time(&self) -> Option<DateTime<Utc>> {
        self.last_failure_time
    }
}

/// One breaker per check name, created on first use.
#[derive(Debug)]
pub struct BreakerSet {
    threshold: u32,
    breakers: RwLock<HashMap<String, Arc<Mutex<CircuitBreaker>>>>,
}

impl BreakerSet {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, name: &str) -> Arc<Mutex<CircuitBreaker>> {
        if let Some(breaker) = self.breakers.read().await.get(name) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write().await;
        Arc::clone(
            breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CircuitBreaker::new(self.threshold)))),
        )
    }

    /// Current breaker state, if the check has run at least once.
    pub async fn snapshot(&self, name: &str) -> Option<CircuitBreaker> {
        let breaker = self.breakers.read().await.get(name).cloned()?;
        let state = breaker.lock().await.clone();
        Some(state)
    }

    /// Clear a check's breaker. Returns `false` if it has none yet.
    pub async fn reset(&self, name: &str) -> bool {
        let Some(breaker) = self.breakers.read().await.get(name).cloned() else {
            return false;
        };
        breaker.lock().await.reset();
        info!(check = %name, "circuit breaker reset");
        true
    }

    pub async fn remove(&self, name: &str) {
        self.breakers.write().await.remove(name);
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Base of the backoff, in seconds: the sleep after attempt `n`
    /// (counting from 0) is `backoff_factor^n`.
    pub backoff_factor: f64,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(backoff_factor: f64, max_backoff: Duration) -> Self {
        Self {
            backoff_factor,
            max_backoff,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.backoff_factor, config.max_backoff)
    }

    /// Sleep before the retry that follows attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.backoff_factor.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Run up to `def.retries + 1` attempts, stopping at the first success
    /// or when the breaker trips.
    ///
    /// `retry_count` on the returned result is the number of attempts made.
    pub async fn execute<F, Fut>(
        &self,
        def: &CheckDefinition,
        breaker: &Mutex<CircuitBreaker>,
        mut attempt: F,
    ) -> HealthResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HealthResult>,
    {
        {
            let breaker = breaker.lock().await;
            if breaker.is_tripped() {
                debug!(check = %def.name, failures = breaker.failure_count(), "circuit breaker open, skipping check");
                return HealthResult::unhealthy(&def.name, "circuit breaker open")
                    .with_detail("circuit_breaker", "open")
                    .with_detail("failure_count", breaker.failure_count());
            }
        }

        let max_attempts = def.retries.saturating_add(1);
        let mut attempts = 0u32;
        loop {
            let mut result = attempt().await;
            attempts += 1;
            result.retry_count = attempts;

            if !result.status.is_failure() {
                if attempts > 1 {
                    debug!(check = %def.name, attempts, "check succeeded after retry");
                }
                return result;
            }

            let tripped = {
                let mut breaker = breaker.lock().await;
                let tripped = breaker.record_failure();
                if tripped {
                    warn!(
                        check = %def.name,
                        failures = breaker.failure_count(),
                        threshold = breaker.threshold(),
                        "circuit breaker tripped"
                    );
                }
                tripped
            };
            if tripped {
                return result.with_detail("circuit_breaker", "open");
            }

            if attempts >= max_attempts {
                return result;
            }

            let delay = self.delay_for(attempts - 1);
            debug!(
                check = %def.name,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "check attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
