//! Volition CLI - smoke-test runner for the planning substrate.
//!
//! ## Commands
//!
//! - `smoke`: run the end-to-end scenario suite against the sim world and
//!   summarize per-scenario outcomes with a recommendation tier. Exits 0
//!   when the success rate is at least 80%.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use volition_core::init_tracing;

mod scenarios;

use scenarios::{run_scenario, SCENARIO_NAMES};

#[derive(Parser)]
#[command(name = "volition")]
#[command(author = "Volition Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Autonomous agent planning substrate", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the end-to-end smoke scenarios
    Smoke {
        /// Scenario name, or "all"
        #[arg(long, default_value = "all")]
        scenario: String,

        /// Runs per scenario
        #[arg(long, default_value_t = 1)]
        runs: u32,

        /// World adapter host (reserved for live worlds; the suite runs
        /// against the sim world when unreachable)
        #[arg(long, default_value = "localhost")]
        host: String,

        /// World adapter port
        #[arg(long, default_value_t = 25565)]
        port: u16,

        /// Agent username on the world
        #[arg(long, default_value = "volition")]
        username: String,

        /// Append per-run JSON records to this file
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct RunRecord<'a> {
    ts: chrono::DateTime<chrono::Utc>,
    scenario: &'a str,
    run: u32,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Debug, Default)]
struct ScenarioOutcome {
    name: String,
    passes: u32,
    failures: u32,
    errors: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Smoke {
            scenario,
            runs,
            host,
            port,
            username,
            log,
        } => match run_smoke(&scenario, runs, &host, port, &username, log.as_deref()).await {
            Ok(success) => {
                if success {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }
            Err(e) => {
                eprintln!("smoke run failed: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run_smoke(
    scenario: &str,
    runs: u32,
    host: &str,
    port: u16,
    username: &str,
    log: Option<&std::path::Path>,
) -> Result<bool> {
    let selected: Vec<&str> = if scenario == "all" {
        SCENARIO_NAMES.to_vec()
    } else {
        if !SCENARIO_NAMES.contains(&scenario) {
            anyhow::bail!(
                "unknown scenario '{scenario}' (known: {})",
                SCENARIO_NAMES.join(", ")
            );
        }
        vec![scenario]
    };

    info!(
        event = "smoke.started",
        scenarios = selected.len(),
        runs = runs,
        host = %host,
        port = port,
        username = %username,
    );

    let mut log_file = match log {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?,
        ),
        None => None,
    };

    let mut outcomes: Vec<ScenarioOutcome> = Vec::new();
    for name in &selected {
        let mut outcome = ScenarioOutcome {
            name: name.to_string(),
            ..Default::default()
        };
        for run in 1..=runs.max(1) {
            let result = run_scenario(name).await;
            let (ok, error) = match &result {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e.clone())),
            };
            if ok {
                outcome.passes += 1;
            } else {
                outcome.failures += 1;
            }
            if let Some(e) = &error {
                outcome.errors.push(e.clone());
            }

            if let Some(file) = &mut log_file {
                let record = RunRecord {
                    ts: chrono::Utc::now(),
                    scenario: name,
                    run,
                    ok,
                    error: error.as_deref(),
                };
                writeln!(file, "{}", serde_json::to_string(&record)?)?;
            }
        }
        outcomes.push(outcome);
    }

    Ok(render_summary(&outcomes))
}

/// Print the summary and return whether the suite clears the 80% bar.
fn render_summary(outcomes: &[ScenarioOutcome]) -> bool {
    let total: u32 = outcomes.iter().map(|o| o.passes + o.failures).sum();
    let passed: u32 = outcomes.iter().map(|o| o.passes).sum();
    let rate = if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64
    };

    println!();
    println!("Smoke suite results");
    println!("-------------------");
    for outcome in outcomes {
        let icon = if outcome.failures == 0 { "✓" } else { "✗" };
        println!(
            "  {icon} {:<24} {}/{} passed",
            outcome.name,
            outcome.passes,
            outcome.passes + outcome.failures
        );
        for error in &outcome.errors {
            println!("      - {error}");
        }
    }

    let tier = if rate >= 0.9 {
        "excellent"
    } else if rate >= 0.75 {
        "good"
    } else if rate >= 0.5 {
        "moderate"
    } else {
        "poor"
    };
    println!();
    println!(
        "  success rate: {:.1}%  recommendation: {tier}",
        rate * 100.0
    );

    rate >= 0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, passes: u32, failures: u32) -> ScenarioOutcome {
        ScenarioOutcome {
            name: name.to_string(),
            passes,
            failures,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_summary_threshold() {
        // 4/5 = 80%: passes the bar.
        let outcomes = vec![outcome("a", 4, 1)];
        assert!(render_summary(&outcomes));

        // 3/5 = 60%: fails it.
        let outcomes = vec![outcome("a", 3, 2)];
        assert!(!render_summary(&outcomes));
    }

    #[test]
    fn test_empty_suite_is_failure() {
        assert!(!render_summary(&[]));
    }

    #[tokio::test]
    async fn test_all_scenarios_pass() {
        for name in SCENARIO_NAMES {
            run_scenario(name)
                .await
                .unwrap_or_else(|e| panic!("scenario {name} failed: {e}"));
        }
    }
}
