//! Command check executor — runs the target through a shell.
//!
//! Exit code 0 is healthy. Only exit code and line counts are kept in the
//! result, plus a truncated first stderr line on failure.

use std::process::{Output, Stdio};

use tokio::process::Command;

use pulse_core::{CheckDefinition, HealthResult};

use super::{CheckExecutor, CheckFuture, truncate};
use crate::error::CheckError;

/// Longest stderr excerpt stored in a result.
pub(crate) const STDERR_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
}

impl CommandExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    async fn check(&self, def: &CheckDefinition) -> Result<HealthResult, CheckError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(&def.target);
        let output = run_process(cmd, &self.shell).await?;

        let code = output.status.code();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let result = if output.status.success() {
            HealthResult::healthy(&def.name, "command exited with code 0")
        } else {
            let reason = match code {
                Some(code) => format!("command exited with code {code}"),
                None => "command terminated by signal".to_string(),
            };
            let mut result = CheckError::NonSuccessResponse(reason).into_result(&def.name);
            if let Some(line) = stderr.lines().find(|l| !l.trim().is_empty()) {
                result = result.with_detail("stderr_excerpt", truncate(line.trim(), STDERR_EXCERPT_CHARS));
            }
            result
        };

        Ok(result
            .with_detail("exit_code", code)
            .with_detail("stdout_lines", stdout.lines().count())
            .with_detail("stderr_lines", stderr.lines().count()))
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl CheckExecutor for CommandExecutor {
    fn run<'a>(&'a self, def: &'a CheckDefinition) -> CheckFuture<'a> {
        Box::pin(self.check(def))
    }
}

/// Spawn a child with captured output. The child is killed if the returned
/// future is dropped, so timeouts and cancellation do not leak processes.
pub(crate) async fn run_process(mut cmd: Command, program: &str) -> Result<Output, CheckError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.output().await.map_err(|e| CheckError::Spawn {
        program: program.to_string(),
        reason: e.to_string(),
    })
}
