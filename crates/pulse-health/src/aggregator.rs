//! Aggregation of cached results into a system-wide verdict.
//!
//! ```text
//! required_unhealthy > 0              → critical
//! unhealthy > 0 || warning > 0        → degraded
//! no results                          → unknown
//! otherwise                           → healthy
//! ```
//!
//! Recommendations are emitted in a fixed order: required-unhealthy count,
//! total unhealthy count, unknown count. A fully healthy system gets none.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use pulse_core::{CheckDefinition, CheckStatus, HealthResult, OverallStatus, SystemHealth};

/// Build a [`SystemHealth`] from the latest results and their definitions.
///
/// Results whose definition is missing are treated as not required.
pub fn aggregate(
    results: &HashMap<String, HealthResult>,
    definitions: &HashMap<String, CheckDefinition>,
) -> SystemHealth {
    let mut summary: BTreeMap<CheckStatus, usize> = BTreeMap::new();
    for result in results.values() {
        *summary.entry(result.status).or_default() += 1;
    }
    let count = |status: CheckStatus| summary.get(&status).copied().unwrap_or(0);

    let required_unhealthy = results
        .values()
        .filter(|r| r.status == CheckStatus::Unhealthy)
        .filter(|r| definitions.get(&r.check_name).is_some_and(|d| d.required))
        .count();
    let unhealthy = count(CheckStatus::Unhealthy);
    let warning = count(CheckStatus::Warning);
    let unknown = count(CheckStatus::Unknown);

    let overall_status = if results.is_empty() {
        OverallStatus::Unknown
    } else if required_unhealthy > 0 {
        OverallStatus::Critical
    } else if unhealthy > 0 || warning > 0 {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    };

    let mut recommendations = Vec::new();
    if required_unhealthy > 0 {
        recommendations.push(format!(
            "{required_unhealthy} required {} unhealthy - immediate attention required",
            plural(required_unhealthy, "check is", "checks are"),
        ));
    }
    if unhealthy > 0 {
        recommendations.push(format!(
            "{unhealthy} {} unhealthy - investigate failing targets",
            plural(unhealthy, "check is", "checks are"),
        ));
    }
    if unknown > 0 {
        recommendations.push(format!(
            "{unknown} {} unknown status - verify check configuration",
            plural(unknown, "check has", "checks have"),
        ));
    }

    SystemHealth {
        overall_status,
        timestamp: Utc::now(),
        components: results
            .iter()
            .map(|(name, result)| (name.clone(), result.clone()))
            .collect(),
        summary,
        recommendations,
    }
}

fn plural(n: usize, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}
