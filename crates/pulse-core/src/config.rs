//! pulse.toml configuration parser.
//!
//! ```toml
//! [engine]
//! tick_interval = "10s"
//! backoff_factor = 2.0
//! max_backoff = "10s"
//! circuit_breaker_threshold = 5
//!
//! [[check]]
//! name = "api"
//! type = "http"
//! target = "http://localhost:8080/health"
//! interval = "30s"
//! timeout = "5s"
//! retries = 2
//! required = true
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{CheckDefinition, CheckType};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckConfig>,
}

/// Raw `[engine]` table. Missing keys fall back to [`EngineConfig::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    pub tick_interval: Option<String>,
    pub backoff_factor: Option<f64>,
    pub max_backoff: Option<String>,
    pub circuit_breaker_threshold: Option<u32>,
    pub resource_tool: Option<String>,
}

/// Raw `[[check]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub check_type: String,
    pub target: String,
    pub timeout: Option<String>,
    pub interval: Option<String>,
    pub retries: Option<u32>,
    pub required: Option<bool>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Resolved engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Scheduler polling period.
    pub tick_interval: Duration,
    /// Base of the exponential backoff between retry attempts (in seconds).
    pub backoff_factor: f64,
    /// Cap on a single backoff sleep.
    pub max_backoff: Duration,
    /// Failed attempts before a check's breaker trips. 0 disables the breaker.
    pub circuit_breaker_threshold: u32,
    /// Binary used by resource checks.
    pub resource_tool: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            backoff_factor: 2.0,
            max_backoff: Duration::from_secs(10),
            circuit_breaker_threshold: 5,
            resource_tool: "kubectl".to_string(),
        }
    }
}

impl PulseConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the `[engine]` table against defaults.
    pub fn engine_config(&self) -> ConfigResult<EngineConfig> {
        let defaults = EngineConfig::default();
        let settings = &self.engine;

        let tick_interval = match &settings.tick_interval {
            Some(s) => duration_field("engine.tick_interval", s)?,
            None => defaults.tick_interval,
        };
        if tick_interval.is_zero() {
            return Err(ConfigError::InvalidEngine {
                field: "tick_interval",
                reason: "must be greater than zero".to_string(),
            });
        }

        let backoff_factor = settings.backoff_factor.unwrap_or(defaults.backoff_factor);
        if !backoff_factor.is_finite() || backoff_factor <= 0.0 {
            return Err(ConfigError::InvalidEngine {
                field: "backoff_factor",
                reason: format!("must be a positive number, got {backoff_factor}"),
            });
        }

        let max_backoff = match &settings.max_backoff {
            Some(s) => duration_field("engine.max_backoff", s)?,
            None => defaults.max_backoff,
        };

        let resource_tool = match &settings.resource_tool {
            Some(tool) if tool.trim().is_empty() => {
                return Err(ConfigError::InvalidEngine {
                    field: "resource_tool",
                    reason: "must not be empty".to_string(),
                });
            }
            Some(tool) => tool.clone(),
            None => defaults.resource_tool,
        };

        Ok(EngineConfig {
            tick_interval,
            backoff_factor,
            max_backoff,
            circuit_breaker_threshold: settings
                .circuit_breaker_threshold
                .unwrap_or(defaults.circuit_breaker_threshold),
            resource_tool,
        })
    }

    /// Validate every `[[check]]` entry and convert it into a definition.
    pub fn definitions(&self) -> ConfigResult<Vec<CheckDefinition>> {
        let mut seen = HashSet::new();
        let mut defs = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            if !seen.insert(check.name.as_str()) {
                return Err(ConfigError::DuplicateCheck(check.name.clone()));
            }
            defs.push(check.to_definition()?);
        }
        Ok(defs)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl CheckConfig {
    pub fn to_definition(&self) -> ConfigResult<CheckDefinition> {
        let invalid = |reason: &str| ConfigError::InvalidCheck {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.target.trim().is_empty() {
            return Err(invalid("target must not be empty"));
        }

        let check_type: CheckType = self.check_type.parse()?;

        let timeout = match &self.timeout {
            Some(s) => duration_field(&format!("{}.timeout", self.name), s)?,
            None => CheckDefinition::DEFAULT_TIMEOUT,
        };
        if timeout.is_zero() {
            return Err(invalid("timeout must be greater than zero"));
        }

        let interval = match &self.interval {
            Some(s) => duration_field(&format!("{}.interval", self.name), s)?,
            None => CheckDefinition::DEFAULT_INTERVAL,
        };

        Ok(CheckDefinition {
            name: self.name.clone(),
            check_type,
            target: self.target.clone(),
            timeout,
            interval,
            retries: self.retries.unwrap_or(0),
            required: self.required.unwrap_or(false),
            metadata: self.metadata.clone().unwrap_or_default(),
        })
    }
}

fn duration_field(field: &str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field: field.to_string(),
        value: value.to_string(),
    })
}
