//! pulsed — the Pulse health-monitoring daemon.
//!
//! Loads checks from `pulse.toml` and either runs the scheduler until
//! Ctrl-C, runs every check once and prints the verdict, or just validates
//! the configuration.
//!
//! # Usage
//!
//! ```text
//! pulsed run --config /etc/pulse/pulse.toml --report-interval 60
//! pulsed check --config pulse.toml --json
//! pulsed check --name api
//! pulsed validate --config pulse.toml
//! ```

mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use pulse_core::{CheckStatus, OverallStatus, PulseConfig};
use pulse_health::HealthEngine;

/// Exit code for a critical system (or an unhealthy single check).
const EXIT_CRITICAL: u8 = 2;

#[derive(Parser)]
#[command(name = "pulsed", about = "Pulse health-monitoring daemon", version)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted.
    Run {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "pulse.toml")]
        config: PathBuf,

        /// Seconds between status reports in the log.
        #[arg(long, default_value = "60")]
        report_interval: u64,
    },
    /// Run every check once and print the system verdict.
    Check {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "pulse.toml")]
        config: PathBuf,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Run only this check.
        #[arg(long)]
        name: Option<String>,
    },
    /// Parse and validate the configuration file.
    Validate {
        #[arg(short, long, default_value = "pulse.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            report_interval,
        } => run(&config, Duration::from_secs(report_interval.max(1))).await?,
        Command::Check { config, json, name } => {
            if check(&config, json, name.as_deref()).await? {
                return Ok(ExitCode::from(EXIT_CRITICAL));
            }
        }
        Command::Validate { config } => validate(&config)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Logs go to stderr so `check --json` output stays machine-readable.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,pulsed=debug,pulse_health=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: &Path) -> anyhow::Result<PulseConfig> {
    PulseConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

async fn build_engine(path: &Path) -> anyhow::Result<HealthEngine> {
    let config = load_config(path)?;
    let engine = HealthEngine::from_config(&config)
        .await
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(engine)
}

async fn run(config: &Path, report_interval: Duration) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;
    info!(
        config = %config.display(),
        checks = engine.checks().await.len(),
        tick_ms = engine.config().tick_interval.as_millis() as u64,
        "pulse daemon starting"
    );

    engine.start().await;

    let mut reports = tokio::time::interval_at(
        tokio::time::Instant::now() + report_interval,
        report_interval,
    );
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = reports.tick() => log_report(&engine).await,
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
                }
                info!("shutdown signal received");
                break;
            }
        }
    }

    engine.stop().await;
    info!("pulse daemon stopped");
    Ok(())
}

async fn log_report(engine: &HealthEngine) {
    let health = engine.get_current_status().await;
    info!(
        status = %health.overall_status,
        healthy = health.count(CheckStatus::Healthy),
        warning = health.count(CheckStatus::Warning),
        unhealthy = health.count(CheckStatus::Unhealthy),
        unknown = health.count(CheckStatus::Unknown),
        "health report"
    );
    for recommendation in &health.recommendations {
        warn!(%recommendation, "health recommendation");
    }
}

/// Returns `true` when the verdict should fail the process.
async fn check(config: &Path, json: bool, name: Option<&str>) -> anyhow::Result<bool> {
    let engine = build_engine(config).await?;

    if let Some(name) = name {
        let result = engine.run_check(name).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print!("{}", report::format_result(&result));
        }
        return Ok(result.status == CheckStatus::Unhealthy);
    }

    let health = engine.run_comprehensive_check().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else {
        print!("{}", report::format_health(&health));
    }
    Ok(health.overall_status == OverallStatus::Critical)
}

fn validate(config: &Path) -> anyhow::Result<()> {
    let parsed = load_config(config)?;
    let engine = parsed.engine_config()?;
    let checks = parsed.definitions()?;

    println!("✓ {} is valid", config.display());
    println!(
        "  Engine: tick {:?}, backoff x{} (max {:?}), breaker threshold {}",
        engine.tick_interval, engine.backoff_factor, engine.max_backoff, engine.circuit_breaker_threshold,
    );
    println!("  Checks: {}", checks.len());
    for def in &checks {
        let schedule = if def.is_on_demand() {
            "on demand".to_string()
        } else {
            format!("every {:?}", def.interval)
        };
        println!(
            "    • {} [{}{}] {} ({schedule})",
            def.name,
            def.check_type,
            if def.required { ", required" } else { "" },
            def.target,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["pulsed", "check", "--json", "--name", "api"]).unwrap();
        match cli.command {
            Command::Check { config, json, name } => {
                assert_eq!(config, PathBuf::from("pulse.toml"));
                assert!(json);
                assert_eq!(name.as_deref(), Some("api"));
            }
            _ => panic!("expected check"),
        }

        let cli = Cli::try_parse_from(["pulsed", "run", "--log-format", "json", "-c", "x.toml"]).unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(
            cli.command,
            Command::Run { report_interval: 60, .. }
        ));

        assert!(Cli::try_parse_from(["pulsed", "run", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn validate_accepts_good_config() {
        let file = config_file(
            r#"
[[check]]
name = "api"
type = "http"
target = "http://localhost:8080/health"
required = true
"#,
        );
        validate(file.path()).unwrap();
    }

    #[test]
    fn validate_rejects_bad_config() {
        let file = config_file(
            r#"
[[check]]
name = "api"
type = "smtp"
target = "mail:25"
"#,
        );
        assert!(validate(file.path()).is_err());
        assert!(validate(Path::new("/nonexistent/pulse.toml")).is_err());
    }

    #[tokio::test]
    async fn check_fails_on_critical_verdict() {
        let file = config_file(
            r#"
[[check]]
name = "ok"
type = "command"
target = "true"
required = true

[[check]]
name = "broken"
type = "command"
target = "false"
"#,
        );
        assert!(!check(file.path(), true, None).await.unwrap());
        assert!(check(file.path(), false, Some("broken")).await.unwrap());
        assert!(check(file.path(), false, Some("missing")).await.is_err());

        let file = config_file(
            r#"
[[check]]
name = "broken"
type = "command"
target = "false"
required = true
"#,
        );
        assert!(check(file.path(), true, None).await.unwrap());
    }
}
