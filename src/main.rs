use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use worklog_metrics::batch::{analyze_batch, into_records, BatchOutcome};
use worklog_metrics::cohort::summarize_cohort;
use worklog_metrics::config::EngineConfig;
use worklog_metrics::loader::load_inputs;
use worklog_metrics::logging::init_logging;
use worklog_metrics::models::RankEntry;
use worklog_metrics::report;

#[derive(Parser)]
#[command(name = "worklog-metrics")]
#[command(about = "Per-person metrics and team rankings from work-log sheets", long_about = None)]
struct Cli {
    /// TOML file with engine settings
    #[arg(long, global = true, env = "WORKLOG_METRICS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute metrics for every sheet and print them as JSON
    Analyze {
        /// CSV files, directories of CSV files, or JSON workbooks
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Fail when any sheet cannot be analyzed
        #[arg(long)]
        strict: bool,
    },
    /// Print the team rankings
    Rank {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a team report
    Report {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Html,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

async fn run_batch(inputs: &[PathBuf], config: &Arc<EngineConfig>) -> anyhow::Result<BatchOutcome> {
    let sheets = load_inputs(inputs).context("failed to load input sheets")?;
    info!(sheets = sheets.len(), "inputs loaded");
    Ok(analyze_batch(sheets, config.clone()).await)
}

fn print_ranking(title: &str, entries: &[RankEntry], limit: usize, unit: fn(f64) -> String) {
    println!("{title}:");
    if entries.is_empty() {
        println!("  no data");
        return;
    }
    for (position, entry) in entries.iter().take(limit).enumerate() {
        println!("  {}. {} {}", position + 1, entry.name, unit(entry.value));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Arc::new(load_config(cli.config.as_deref())?);

    match cli.command {
        Commands::Analyze {
            inputs,
            out,
            strict,
        } => {
            let outcome = run_batch(&inputs, &config).await?;
            let json = serde_json::to_string_pretty(&outcome)?;
            if strict {
                into_records(outcome)?;
            }
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Metrics written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Rank { inputs, limit } => {
            let outcome = run_batch(&inputs, &config).await?;
            let cohort = summarize_cohort(&outcome.records, &config);
            for note in report::batch_notes(&outcome) {
                eprintln!("{note}");
            }

            if cohort.people == 0 {
                println!("No sheets produced metrics.");
                return Ok(());
            }

            print_ranking("Efficiency", &cohort.efficiency_ranking, limit, |v| {
                format!("{:.1}%", v * 100.0)
            });
            print_ranking("Resolution time", &cohort.resolution_ranking, limit, |v| {
                format!("{v:.1} days")
            });
            print_ranking("Volume", &cohort.volume_ranking, limit, |v| {
                format!("{v:.0} records")
            });
        }
        Commands::Report {
            inputs,
            format,
            out,
        } => {
            let outcome = run_batch(&inputs, &config).await?;
            let cohort = summarize_cohort(&outcome.records, &config);
            let report = match format {
                ReportFormat::Markdown => report::build_report(&outcome, &cohort),
                ReportFormat::Html => report::build_html_report(&outcome, &cohort),
            };
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
