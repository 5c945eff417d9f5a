//! Check executors — one strategy per check type.
//!
//! Executors implement a single attempt of a check. [`ExecutorSet`] maps
//! each [`CheckType`] to its executor and wraps every call with the
//! definition's timeout, turning any [`CheckError`] into a result so that
//! nothing escapes the executor boundary.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use pulse_core::{CheckDefinition, CheckType, EngineConfig, HealthResult};

use crate::error::CheckError;

pub mod command;
pub mod http;
pub mod resource;
pub mod tcp;

pub use self::command::CommandExecutor;
pub use self::http::HttpExecutor;
pub use self::resource::ResourceExecutor;
pub use self::tcp::TcpExecutor;

/// Future returned by a single check attempt.
pub type CheckFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HealthResult, CheckError>> + Send + 'a>>;

/// Runs one attempt of a check.
///
/// Implementations do not enforce the timeout and leave `duration` at zero;
/// both are handled by the caller.
pub trait CheckExecutor: Send + Sync {
    fn run<'a>(&'a self, def: &'a CheckDefinition) -> CheckFuture<'a>;
}

/// Run an executor under the definition's timeout.
pub async fn execute(executor: &dyn CheckExecutor, def: &CheckDefinition) -> HealthResult {
    match tokio::time::timeout(def.timeout, executor.run(def)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            debug!(check = %def.name, error = %e, kind = e.kind(), "check attempt failed");
            e.into_result(&def.name)
        }
        Err(_) => {
            debug!(check = %def.name, timeout_ms = def.timeout.as_millis() as u64, "check attempt timed out");
            CheckError::Timeout(def.check_type)
                .into_result(&def.name)
                .with_detail("timeout_secs", def.timeout.as_secs_f64())
        }
    }
}

/// Flat `CheckType → executor` strategy map.
#[derive(Clone)]
pub struct ExecutorSet {
    executors: HashMap<CheckType, Arc<dyn CheckExecutor>>,
}

impl ExecutorSet {
    /// The built-in executors for every check type.
    pub fn new(config: &EngineConfig) -> Self {
        Self::empty()
            .with_executor(CheckType::Http, Arc::new(HttpExecutor::new()))
            .with_executor(CheckType::Tcp, Arc::new(TcpExecutor))
            .with_executor(
                CheckType::Resource,
                Arc::new(ResourceExecutor::new(config.resource_tool.clone())),
            )
            .with_executor(CheckType::Command, Arc::new(CommandExecutor::default()))
    }

    /// A set with no executors; every check resolves to `unknown`.
    pub fn empty() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Install or replace the executor for a check type.
    pub fn with_executor(mut self, check_type: CheckType, executor: Arc<dyn CheckExecutor>) -> Self {
        self.executors.insert(check_type, executor);
        self
    }

    pub fn get(&self, check_type: CheckType) -> Option<Arc<dyn CheckExecutor>> {
        self.executors.get(&check_type).cloned()
    }

    /// Run one attempt of `def` with the executor for its type.
    pub async fn execute(&self, def: &CheckDefinition) -> HealthResult {
        match self.executors.get(&def.check_type) {
            Some(executor) => execute(executor.as_ref(), def).await,
            None => CheckError::UnknownCheckType(def.check_type).into_result(&def.name),
        }
    }
}

impl Default for ExecutorSet {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

/// Truncate to at most `max` characters, marking the cut.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use pulse_core::CheckStatus;

    struct Sleepy(Duration);

    impl CheckExecutor for Sleepy {
        fn run<'a>(&'a self, def: &'a CheckDefinition) -> CheckFuture<'a> {
            Box::pin(async move {
                tokio::time::sleep(self.0).await;
                Ok::<_, CheckError>(HealthResult::healthy(&def.name, "done"))
            })
        }
    }

    struct Refused;

    impl CheckExecutor for Refused {
        fn run<'a>(&'a self, _def: &'a CheckDefinition) -> CheckFuture<'a> {
            Box::pin(async {
                Err::<HealthResult, _>(CheckError::ConnectionFailure("refused".to_string()))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_unhealthy_result() {
        let def = CheckDefinition::new("slow", CheckType::Tcp, "x:1")
            .with_timeout(Duration::from_secs(1));
        let result = execute(&Sleepy(Duration::from_secs(60)), &def).await;

        assert_eq!(result.status, CheckStatus::Unhealthy);
        assert_eq!(result.message, "tcp check timed out");
    }

    #[tokio::test(start_paused = true)]
    async fn completes_within_timeout() {
        let def = CheckDefinition::new("quick", CheckType::Tcp, "x:1")
            .with_timeout(Duration::from_secs(5));
        let result = execute(&Sleepy(Duration::from_millis(10)), &def).await;
        assert_eq!(result.status, CheckStatus::Healthy);
        assert_eq!(result.duration, Duration::ZERO);
    }

    #[tokio::test]
    async fn error_becomes_result_with_details() {
        let def = CheckDefinition::new("db", CheckType::Tcp, "db:5432");
        let result = execute(&Refused, &def).await;
        assert_eq!(result.status, CheckStatus::Unhealthy);
        assert_eq!(result.details["error_kind"], "connection_failure");
        assert_eq!(result.details["error"], "connection failed: refused");
    }

    #[tokio::test]
    async fn missing_executor_is_unknown() {
        let set = ExecutorSet::empty().with_executor(CheckType::Tcp, Arc::new(Refused));
        let def = CheckDefinition::new("api", CheckType::Http, "http://api/health");
        let result = set.execute(&def).await;
        assert_eq!(result.status, CheckStatus::Unknown);
        assert_eq!(result.details["error_kind"], "unknown_check_type");
    }

    #[test]
    fn default_set_covers_every_type() {
        let set = ExecutorSet::default();
        for check_type in CheckType::ALL {
            assert!(set.get(check_type).is_some(), "missing executor for {check_type}");
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello…");
        assert_eq!(truncate("ééééé", 2), "éé…");
    }
}
