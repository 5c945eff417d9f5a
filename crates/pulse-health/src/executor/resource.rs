//! Resource-query check executor.
//!
//! Runs `<tool> get <target...>` (by default `kubectl get ...`) and scans
//! the output for known failure markers.

use tokio::process::Command;

use pulse_core::{CheckDefinition, CheckStatus, HealthResult};

use super::command::{STDERR_EXCERPT_CHARS, run_process};
use super::{CheckExecutor, CheckFuture, truncate};
use crate::error::CheckError;

/// Substrings that mark a resource as failing, matched case-insensitively.
pub const FAILURE_MARKERS: &[&str] = &[
    "CrashLoopBackOff",
    "ImagePullBackOff",
    "OOMKilled",
    "Evicted",
    "Error",
    "Failed",
];

const EMPTY_MARKER: &str = "No resources found";

#[derive(Debug, Clone)]
pub struct ResourceExecutor {
    tool: String,
}

impl ResourceExecutor {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    async fn check(&self, def: &CheckDefinition) -> Result<HealthResult, CheckError> {
        let mut cmd = Command::new(&self.tool);
        cmd.arg("get").args(def.target.split_whitespace());
        let output = run_process(cmd, &self.tool).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Ok(CheckError::NonSuccessResponse(format!("{} get failed", self.tool))
                .into_result(&def.name)
                .with_detail("exit_code", output.status.code())
                .with_detail("stderr", truncate(stderr.trim(), STDERR_EXCERPT_CHARS)));
        }

        let (status, message, markers) = classify_output(&stdout, &stderr);
        let mut result = HealthResult::new(&def.name, status, message)
            .with_detail("resource_lines", stdout.lines().count());
        if !markers.is_empty() {
            result = result.with_detail("failure_markers", markers);
        }
        Ok(result)
    }
}

impl Default for ResourceExecutor {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl CheckExecutor for ResourceExecutor {
    fn run<'a>(&'a self, def: &'a CheckDefinition) -> CheckFuture<'a> {
        Box::pin(self.check(def))
    }
}

/// Classify a successful query's output.
///
/// Returns the status, a message, and the failure markers found.
pub fn classify_output(stdout: &str, stderr: &str) -> (CheckStatus, String, Vec<&'static str>) {
    let markers = find_failure_markers(stdout);
    if !markers.is_empty() {
        let message = format!("resource reports {}", markers.join(", "));
        return (CheckStatus::Unhealthy, message, markers);
    }

    if stdout.trim().is_empty() || stderr.contains(EMPTY_MARKER) || stdout.contains(EMPTY_MARKER) {
        return (CheckStatus::Warning, "no resources found".to_string(), markers);
    }

    (CheckStatus::Healthy, "resource query succeeded".to_string(), markers)
}

/// Markers present in `text`, case-insensitive, in [`FAILURE_MARKERS`] order.
pub fn find_failure_markers(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    FAILURE_MARKERS
        .iter()
        .copied()
        .filter(|marker| lowered.contains(&marker.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::executor::execute;
    use pulse_core::CheckType;

    fn resource_check(target: &str) -> CheckDefinition {
        CheckDefinition::new("pods", CheckType::Resource, target).with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn markers_match_case_insensitively() {
        let out = "web-1   0/1   crashloopbackoff   7   3m\nweb-2   1/1   Running   0   3m";
        assert_eq!(find_failure_markers(out), vec!["CrashLoopBackOff"]);
        assert!(find_failure_markers("web-1 1/1 Running").is_empty());
    }

    #[test]
    fn classify_running_pods() {
        let (status, _, markers) = classify_output("NAME READY STATUS\nweb-1 1/1 Running\n", "");
        assert_eq!(status, CheckStatus::Healthy);
        assert!(markers.is_empty());
    }

    #[test]
    fn classify_failing_pods() {
        let (status, message, markers) =
            classify_output("web-1 0/1 ImagePullBackOff\njob-2 0/1 Error\n", "");
        assert_eq!(status, CheckStatus::Unhealthy);
        assert_eq!(markers, vec!["ImagePullBackOff", "Error"]);
        assert!(message.contains("ImagePullBackOff"));
    }

    #[test]
    fn classify_empty_namespace() {
        let (status, _, _) = classify_output("", "No resources found in default namespace.\n");
        assert_eq!(status, CheckStatus::Warning);
    }

    // `echo` stands in for the query tool: it prints `get <target>`.
    #[tokio::test]
    async fn healthy_query_output() {
        let executor = ResourceExecutor::new("echo");
        let result = execute(&executor, &resource_check("pods web-1 Running")).await;
        assert_eq!(result.status, CheckStatus::Healthy);
        assert_eq!(result.details["resource_lines"], 1);
    }

    #[tokio::test]
    async fn failure_marker_in_output() {
        let executor = ResourceExecutor::new("echo");
        let result = execute(&executor, &resource_check("pods web-1 CrashLoopBackOff")).await;
        assert_eq!(result.status, CheckStatus::Unhealthy);
        assert_eq!(result.details["failure_markers"][0], "CrashLoopBackOff");
    }

    #[tokio::test]
    async fn tool_failure_is_unhealthy() {
        let executor = ResourceExecutor::new("false");
        let result = execute(&executor, &resource_check("pods")).await;
        assert_eq!(result.status, CheckStatus::Unhealthy);
        assert_eq!(result.message, "false get failed");
        assert_eq!(result.details["error_kind"], "non_success_response");
    }

    #[tokio::test]
    async fn missing_tool_is_spawn_failure() {
        let executor = ResourceExecutor::new("/nonexistent/kubectl");
        let result = execute(&executor, &resource_check("pods")).await;
        assert_eq!(result.status, CheckStatus::Unhealthy);
        assert_eq!(result.details["error_kind"], "spawn");
    }
}
