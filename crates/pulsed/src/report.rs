//! Human-readable rendering of health snapshots.

use std::fmt::Write;

use pulse_core::{CheckStatus, HealthResult, SystemHealth};

/// Widest message shown in the table before truncation.
const MESSAGE_WIDTH: usize = 48;

pub fn format_health(health: &SystemHealth) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "System health: {} ({})",
        health.overall_status.as_str().to_uppercase(),
        health.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    if health.components.is_empty() {
        out.push_str("\nNo check results yet.\n");
        return out;
    }

    let name_width = health
        .components
        .keys()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("CHECK".len());

    let _ = writeln!(
        out,
        "\n  {:<name_width$}  {:<9}  {:>9}  {:>5}  MESSAGE",
        "CHECK", "STATUS", "DURATION", "TRIES",
    );
    for result in health.components.values() {
        let _ = writeln!(out, "  {}", format_row(result, name_width));
    }

    let summary: Vec<String> = health
        .summary
        .iter()
        .map(|(status, count)| format!("{count} {status}"))
        .collect();
    let _ = writeln!(out, "\nSummary: {}", summary.join(", "));

    if !health.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for rec in &health.recommendations {
            let _ = writeln!(out, "  • {rec}");
        }
    }

    out
}

/// Single-check rendering used by `check --name`.
pub fn format_result(result: &HealthResult) -> String {
    let mut out = format!(
        "{} {}: {} ({:.0}ms, {} attempt{})\n",
        status_marker(result.status),
        result.check_name,
        result.message,
        result.duration.as_secs_f64() * 1000.0,
        result.retry_count,
        if result.retry_count == 1 { "" } else { "s" },
    );

    let mut keys: Vec<&String> = result.details.keys().collect();
    keys.sort();
    for key in keys {
        let _ = writeln!(out, "    {key}: {}", result.details[key]);
    }
    out
}

fn format_row(result: &HealthResult, name_width: usize) -> String {
    format!(
        "{:<name_width$}  {:<9}  {:>7.0}ms  {:>5}  {}",
        result.check_name,
        result.status.as_str(),
        result.duration.as_secs_f64() * 1000.0,
        result.retry_count,
        fit_column(&result.message, MESSAGE_WIDTH),
    )
}

fn status_marker(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Healthy => "✓",
        CheckStatus::Warning => "!",
        CheckStatus::Unhealthy => "✗",
        CheckStatus::Unknown => "?",
    }
}

/// Cut `s` so it occupies at most `width` columns, ellipsis included.
fn fit_column(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
