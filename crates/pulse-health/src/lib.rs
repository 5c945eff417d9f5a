//! pulse-health — the health-monitoring engine.
//!
//! Registers heterogeneous checks, runs them on independent intervals with
//! per-check timeouts, retries and circuit breakers, caches the latest
//! result per check, and aggregates everything into a system verdict.
//!
//! # Architecture
//!
//! ```text
//! HealthEngine
//!   ├── CheckRegistry (name → CheckDefinition)
//!   ├── Scheduler task (per-check next-due map, one tick loop)
//!   │   └── per tick: JoinSet fan-out of due checks
//!   │       └── RetryPolicy + CircuitBreaker
//!   │           └── ExecutorSet (http | tcp | resource | command)
//!   ├── ResultCache (name → latest HealthResult)
//!   └── aggregate(cache, registry) → SystemHealth
//! ```
//!
//! # Failure handling
//!
//! Executors never fail outward: timeouts, connection errors, non-success
//! responses and panics all become `unhealthy` or `unknown` results. A
//! required check that is unhealthy makes the system `critical`; anything
//! else unhealthy or in warning makes it `degraded`.
//!
//! `stop()` aborts in-flight checks; their partial results are discarded.

pub mod aggregator;
pub mod cache;
pub mod engine;
pub mod error;
pub mod executor;
pub mod registry;
pub mod retry;
pub mod scheduler;

pub use aggregator::aggregate;
pub use cache::ResultCache;
pub use engine::{HealthEngine, StatusCallback};
pub use error::{CheckError, EngineError, EngineResult};
pub use executor::{CheckExecutor, CheckFuture, ExecutorSet};
pub use registry::CheckRegistry;
pub use retry::{BreakerSet, CircuitBreaker, RetryPolicy};
pub use scheduler::Scheduler;
