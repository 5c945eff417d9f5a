//! Engine and check error types.

use thiserror::Error;

use pulse_core::{CheckStatus, CheckType, ConfigError, HealthResult};

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by the engine's operator-facing API.
///
/// Individual check failures never surface here; they become results.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("check not found: {0}")]
    CheckNotFound(String),

    #[error("check cancelled before completion: {0}")]
    Cancelled(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures raised inside an executor. Converted into a [`HealthResult`]
/// at the executor boundary and never propagated further.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{0} check timed out")]
    Timeout(CheckType),

    #[error("connection failed: {0}")]
    ConnectionFailure(String),

    #[error("{0}")]
    NonSuccessResponse(String),

    #[error("no executor registered for check type {0}")]
    UnknownCheckType(CheckType),

    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("executor panicked: {0}")]
    ExecutorPanic(String),
}

impl CheckError {
    /// Stable identifier recorded under `details.error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::Timeout(_) => "timeout",
            CheckError::ConnectionFailure(_) => "connection_failure",
            CheckError::NonSuccessResponse(_) => "non_success_response",
            CheckError::UnknownCheckType(_) => "unknown_check_type",
            CheckError::InvalidTarget { .. } => "invalid_target",
            CheckError::Spawn { .. } => "spawn",
            CheckError::ExecutorPanic(_) => "executor_panic",
        }
    }

    /// Failures of the probed target are `unhealthy`; misconfiguration and
    /// engine faults leave the target's state `unknown`.
    pub fn status(&self) -> CheckStatus {
        match self {
            CheckError::Timeout(_)
            | CheckError::ConnectionFailure(_)
            | CheckError::NonSuccessResponse(_)
            | CheckError::Spawn { .. } => CheckStatus::Unhealthy,
            CheckError::UnknownCheckType(_)
            | CheckError::InvalidTarget { .. }
            | CheckError::ExecutorPanic(_) => CheckStatus::Unknown,
        }
    }

    pub fn into_result(self, check_name: &str) -> HealthResult {
        let message = self.to_string();
        HealthResult::new(check_name, self.status(), message.clone())
            .with_detail("error", message)
            .with_detail("error_kind", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_check_type() {
        let result = CheckError::Timeout(CheckType::Http).into_result("api");
        assert_eq!(result.status, CheckStatus::Unhealthy);
        assert_eq!(result.message, "http check timed out");
        assert_eq!(result.details["error_kind"], "timeout");
    }

    #[test]
    fn misconfiguration_is_unknown() {
        let result = CheckError::InvalidTarget {
            target: "nope".to_string(),
            reason: "missing port".to_string(),
        }
        .into_result("db");
        assert_eq!(result.status, CheckStatus::Unknown);
        assert_eq!(result.check_name, "db");
        assert!(result.details["error"].as_str().unwrap().contains("missing port"));
    }

    #[test]
    fn panic_is_unknown() {
        let result = CheckError::ExecutorPanic("boom".to_string()).into_result("x");
        assert_eq!(result.status, CheckStatus::Unknown);
        assert_eq!(result.details["error_kind"], "executor_panic");
    }
}
