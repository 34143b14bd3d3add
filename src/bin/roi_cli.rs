//! ROI simulator client.
//!
//! Talks to the API server and keeps a local JSON cache for scenarios saved
//! while the server (or its database) is unavailable.
//!
//! Usage:
//!   cargo run --bin roi-cli -- simulate --monthly-invoice-volume 5000
//!   cargo run --bin roi-cli -- save --scenario-name "Q3 pilot"
//!   cargo run --bin roi-cli -- list
//!   cargo run --bin roi-cli -- compare <ID_A> <ID_B>
//!   cargo run --bin roi-cli -- report --email cfo@example.com --format pdf

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roi_simulator::{
    analytics::{compare, summarize, to_csv},
    config::{load_env, DEFAULT_API_BASE, DEFAULT_LOCAL_CACHE},
    models::{Scenario, ScenarioId, SimulationInput, SimulationResult},
    report::PDF_FILENAME,
    scenarios::{
        HttpScenarioBackend, LocalScenarioCache, ScenarioReconciler, StoreError, StoreTarget,
    },
    simulation::simulate,
};

/// Invoice automation ROI simulator client
#[derive(Parser, Debug)]
#[command(name = "roi-cli")]
#[command(about = "Simulate, save and compare invoice-automation ROI scenarios")]
struct Cli {
    /// API base URL
    #[arg(long, env = "ROI_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    api_base: String,

    /// Local fallback cache file
    #[arg(long, env = "ROI_LOCAL_CACHE", default_value = DEFAULT_LOCAL_CACHE, global = true)]
    cache: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Preview a simulation without saving (computed locally)
    Simulate {
        #[command(flatten)]
        input: InputArgs,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate and save a scenario (falls back to the local cache)
    Save {
        #[command(flatten)]
        input: InputArgs,
    },

    /// List saved scenarios, server first then local-only ones
    List,

    /// Show one saved scenario
    Show { id: String },

    /// Delete a saved scenario
    Delete { id: String },

    /// Copy a scenario into the local cache as "<name> (copy)"
    Duplicate { id: String },

    /// Compare two saved scenarios side by side
    Compare { left: String, right: String },

    /// Count, average monthly savings and top scenario
    Summary,

    /// Export all scenarios as CSV
    ExportCsv {
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate an HTML or PDF report on the server
    Report {
        /// Recipient email embedded in the report
        #[arg(long)]
        email: String,

        #[arg(long, value_enum, default_value_t = ReportKind::Html)]
        format: ReportKind,

        /// Output file (defaults to roi-report.pdf / roi-report.html)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    Html,
    Pdf,
}

/// Simulation parameters; defaults describe a mid-size AP team.
#[derive(Args, Debug, Clone)]
struct InputArgs {
    #[arg(long)]
    scenario_name: Option<String>,
    #[arg(long, default_value_t = 2000.0)]
    monthly_invoice_volume: f64,
    #[arg(long, default_value_t = 3.0)]
    num_ap_staff: f64,
    #[arg(long, default_value_t = 0.1667)]
    avg_hours_per_invoice: f64,
    #[arg(long, default_value_t = 30.0)]
    hourly_wage: f64,
    /// Manual error rate in percent
    #[arg(long, default_value_t = 0.5)]
    error_rate_manual: f64,
    #[arg(long, default_value_t = 100.0)]
    error_cost: f64,
    #[arg(long, default_value_t = 36.0)]
    time_horizon_months: f64,
    #[arg(long, default_value_t = 50_000.0)]
    one_time_implementation_cost: f64,
}

impl From<InputArgs> for SimulationInput {
    fn from(args: InputArgs) -> Self {
        // clap parses "NaN" and "inf" as valid f64 values.
        SimulationInput {
            scenario_name: args.scenario_name.filter(|n| !n.trim().is_empty()),
            monthly_invoice_volume: args.monthly_invoice_volume,
            num_ap_staff: args.num_ap_staff,
            avg_hours_per_invoice: args.avg_hours_per_invoice,
            hourly_wage: args.hourly_wage,
            error_rate_manual: args.error_rate_manual,
            error_cost: args.error_cost,
            time_horizon_months: args.time_horizon_months,
            one_time_implementation_cost: args.one_time_implementation_cost,
        }
        .sanitized()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roi_simulator=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli {
        api_base,
        cache,
        command,
    } = Cli::parse();

    match command {
        Commands::Simulate { input, json } => {
            let result = simulate(&input.into());
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Commands::Report {
            email,
            format,
            output,
            input,
        } => generate_report(&api_base, &email, format, output, input).await?,
        Commands::Save { input } => {
            let input: SimulationInput = input.into();
            let violations = input.save_violations();
            if !violations.is_empty() {
                return Err(StoreError::Validation(violations.join(", ")).into());
            }
            let saved = open_reconciler(&api_base, &cache).await?.save(input).await?;
            let where_ = match saved.target {
                StoreTarget::Durable => "server",
                StoreTarget::Local => "local cache (server unavailable)",
            };
            println!("✅ Saved {} to {}", saved.scenario.id, where_);
        }
        Commands::List => {
            let scenarios = open_reconciler(&api_base, &cache).await?.list().await?;
            if scenarios.is_empty() {
                println!("No saved scenarios.");
            }
            for s in &scenarios {
                println!(
                    "{:<44} {:<28} {:>14} {}",
                    s.id.to_string(),
                    s.label(),
                    format!("${:.2}/mo", s.result.monthly_savings),
                    s.created_at.format("%Y-%m-%d %H:%M:%S"),
                );
            }
        }
        Commands::Show { id } => {
            let reconciler = open_reconciler(&api_base, &cache).await?;
            print_scenario(&reconciler.load(&ScenarioId::parse(&id)).await?);
        }
        Commands::Delete { id } => {
            let reconciler = open_reconciler(&api_base, &cache).await?;
            let removed = reconciler.remove(&ScenarioId::parse(&id)).await?;
            let from = match removed.target {
                StoreTarget::Durable => "server",
                StoreTarget::Local => "local cache",
            };
            println!("🗑️  Deleted {id} from {from}");
        }
        Commands::Duplicate { id } => {
            let reconciler = open_reconciler(&api_base, &cache).await?;
            let copy = reconciler.duplicate(&ScenarioId::parse(&id)).await?;
            println!("📄 Created {} ({})", copy.id, copy.label());
        }
        Commands::Compare { left, right } => {
            let reconciler = open_reconciler(&api_base, &cache).await?;
            let left = reconciler.load(&ScenarioId::parse(&left)).await?;
            let right = reconciler.load(&ScenarioId::parse(&right)).await?;
            print!("{}", compare(&left, &right).render_text());
        }
        Commands::Summary => {
            let scenarios = open_reconciler(&api_base, &cache).await?.list().await?;
            let summary = summarize(&scenarios);
            println!("Scenarios:             {}", summary.total);
            println!("Avg monthly savings:   ${:.2}", summary.avg_monthly_savings);
            println!("Top scenario:          {}", summary.top.as_deref().unwrap_or("—"));
        }
        Commands::ExportCsv { output } => {
            let scenarios = open_reconciler(&api_base, &cache).await?.list().await?;
            let csv = to_csv(&scenarios);
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("📁 Wrote {}", path.display());
                }
                None => print!("{csv}"),
            }
        }
    }

    Ok(())
}

async fn open_reconciler(api_base: &str, cache: &Path) -> Result<ScenarioReconciler> {
    let durable = HttpScenarioBackend::new(api_base)?;
    let local = LocalScenarioCache::open(cache)
        .await
        .with_context(|| format!("Failed to open local cache {}", cache.display()))?;
    Ok(ScenarioReconciler::new(Arc::new(durable), Arc::new(local)))
}

async fn generate_report(
    api_base: &str,
    email: &str,
    format: ReportKind,
    output: Option<PathBuf>,
    input: InputArgs,
) -> Result<()> {
    let input: SimulationInput = input.into();
    let format_name = match format {
        ReportKind::Html => "html",
        ReportKind::Pdf => "pdf",
    };
    let url = format!("{}/report/generate", api_base.trim_end_matches('/'));

    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({ "email": email, "input": input, "format": format_name }))
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    let status = response.status();
    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        bail!("Report generation failed ({status}): {message}");
    }

    let (bytes, default_name) = match format {
        ReportKind::Pdf => (response.bytes().await?.to_vec(), PDF_FILENAME),
        ReportKind::Html => {
            let body: Value = response.json().await.context("Invalid report response")?;
            let html = body
                .get("html")
                .and_then(Value::as_str)
                .context("Report response has no html")?;
            (html.as_bytes().to_vec(), "roi-report.html")
        }
    };

    let path = output.unwrap_or_else(|| PathBuf::from(default_name));
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("📄 Report written to {}", path.display());
    Ok(())
}

fn print_result(result: &SimulationResult) {
    println!("Monthly savings:     ${:.2}", result.monthly_savings);
    println!("Labor cost (manual): ${:.2}", result.labor_cost_manual);
    println!("Automation cost:     ${:.2}", result.auto_cost);
    println!("Error savings:       ${:.2}", result.error_savings);
    println!(
        "Cumulative ({:.0} mo): ${:.2}",
        result.time_horizon_months, result.cumulative_savings
    );
    println!("Net savings:         ${:.2}", result.net_savings);
    match result.payback_months {
        Some(months) => println!("Payback:             {months:.1} months"),
        None => println!("Payback:             —"),
    }
    match result.roi_percentage {
        Some(roi) => println!("ROI:                 {roi:.1}%"),
        None => println!("ROI:                 —"),
    }
}

fn print_scenario(scenario: &Scenario) {
    println!("{} ({})", scenario.label(), scenario.id);
    println!("Saved at: {}", scenario.created_at.to_rfc3339());
    println!();
    print_result(&scenario.result);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_flags_use_defaults() {
        let cli = Cli::try_parse_from([
            "roi-cli",
            "simulate",
            "--hourly-wage",
            "inf",
            "--time-horizon-months",
            "NaN",
        ])
        .unwrap();
        let Commands::Simulate { input, .. } = cli.command else {
            panic!("expected simulate");
        };

        let input: SimulationInput = input.into();
        assert!(input.is_finite());
        assert_eq!(input.hourly_wage, 0.0);
        assert_eq!(input.time_horizon_months, 36.0);
        assert_eq!(input.monthly_invoice_volume, 2000.0);
    }
}
