//! Shared types used across Pulse crates.
//!
//! `CheckDefinition` is the input side (what to probe, how often), while
//! `HealthResult` and `SystemHealth` are what the engine hands back to
//! callers. All output types serialize with snake_case field names,
//! ISO-8601 timestamps and durations as fractional seconds.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ── Check definitions ─────────────────────────────────────────────

/// The kind of probe a check runs. Selects the executor at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// HTTP GET against a URL.
    Http,
    /// TCP connect against `host:port`.
    Tcp,
    /// Read-only orchestration resource query.
    Resource,
    /// Arbitrary shell command.
    Command,
}

impl CheckType {
    pub const ALL: [CheckType; 4] = [
        CheckType::Http,
        CheckType::Tcp,
        CheckType::Resource,
        CheckType::Command,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Http => "http",
            CheckType::Tcp => "tcp",
            CheckType::Resource => "resource",
            CheckType::Command => "command",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(CheckType::Http),
            "tcp" => Ok(CheckType::Tcp),
            "resource" => Ok(CheckType::Resource),
            "command" => Ok(CheckType::Command),
            other => Err(ConfigError::UnknownCheckType(other.to_string())),
        }
    }
}

/// A configured health check. Immutable once registered; registering the
/// same name again replaces the previous definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDefinition {
    /// Unique key across the registry.
    pub name: String,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    /// Meaning depends on `check_type`: URL, `host:port`, query, or command line.
    pub target: String,
    /// Upper bound for a single attempt.
    #[serde(with = "crate::duration::secs")]
    pub timeout: Duration,
    /// Time between scheduled runs. Zero means on-demand only.
    #[serde(with = "crate::duration::secs")]
    pub interval: Duration,
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Whether an unhealthy result alone makes the system critical.
    pub required: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckDefinition {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

    /// Create a definition with default timeout and interval, no retries,
    /// and `required = false`.
    pub fn new(name: impl Into<String>, check_type: CheckType, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            check_type,
            target: target.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            interval: Self::DEFAULT_INTERVAL,
            retries: 0,
            required: false,
            metadata: HashMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Checks with a zero interval never run from the scheduler tick.
    pub fn is_on_demand(&self) -> bool {
        self.interval.is_zero()
    }
}

// ── Results ───────────────────────────────────────────────────────

/// Outcome of a single check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Healthy,
    Unhealthy,
    Warning,
    Unknown,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Healthy => "healthy",
            CheckStatus::Unhealthy => "unhealthy",
            CheckStatus::Warning => "warning",
            CheckStatus::Unknown => "unknown",
        }
    }

    /// Whether an attempt with this status counts as failed for retry and
    /// circuit-breaker purposes.
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckStatus::Unhealthy | CheckStatus::Unknown)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one check.
///
/// `duration` is left at zero by executors and filled in by the engine,
/// which times the whole call including retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub check_name: String,
    pub status: CheckStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "crate::duration::secs")]
    pub duration: Duration,
    pub message: String,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
    /// Executor invocations consumed (0 if the circuit breaker short-circuited).
    pub retry_count: u32,
}

impl HealthResult {
    pub fn new(check_name: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            status,
            timestamp: Utc::now(),
            duration: Duration::ZERO,
            message: message.into(),
            details: HashMap::new(),
            retry_count: 0,
        }
    }

    pub fn healthy(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_name, CheckStatus::Healthy, message)
    }

    pub fn unhealthy(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_name, CheckStatus::Unhealthy, message)
    }

    pub fn warning(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_name, CheckStatus::Warning, message)
    }

    pub fn unknown(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_name, CheckStatus::Unknown, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

// ── System health ─────────────────────────────────────────────────

/// Overall verdict across all cached results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Critical => "critical",
            OverallStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated snapshot of every cached check result. Recomputed on each
/// request and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall_status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    /// Latest result per check name.
    pub components: BTreeMap<String, HealthResult>,
    /// Result count per status. Statuses with no results are omitted.
    pub summary: BTreeMap<CheckStatus, usize>,
    pub recommendations: Vec<String>,
}

impl SystemHealth {
    /// Number of results with the given status.
    pub fn count(&self, status: CheckStatus) -> usize {
        self.summary.get(&status).copied().unwrap_or(0)
    }
}
