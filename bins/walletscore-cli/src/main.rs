//! walletscore — command-line front end for wallet credit scoring.
//!
//! `collect` builds a feature table from exported wallet activity, `run`
//! executes the scoring pipeline over it, and `crosscheck` compares the
//! resulting bands with a rule-based heuristic.

mod io;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use walletscore_core::band::ScoreBand;
use walletscore_core::table::{FeatureTable, LabeledTable};
use walletscore_features::{AggregatorConfig, FeatureAggregator, FeatureCollector, JsonDirSource};
use walletscore_pipeline::{cross_check, CrossCheckReport, PipelineConfig, ScoringPipeline};

/// Calibrated on-chain credit scores from unlabeled wallet activity.
#[derive(Parser, Debug)]
#[command(name = "walletscore", version, about)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Aggregate features for a list of wallets.
    Collect(CollectArgs),
    /// Score a feature table.
    Run(RunArgs),
    /// Compare pipeline bands with the rule-based heuristic.
    Crosscheck(CrosscheckArgs),
}

#[derive(Args, Debug)]
struct CollectArgs {
    /// File with one wallet address per line.
    #[arg(long)]
    wallets: PathBuf,

    /// Directory of `<wallet>.json` activity documents.
    #[arg(long)]
    activity_dir: PathBuf,

    /// Output feature table (default: <data dir>/walletscore/features.json).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Aggregation clock, RFC 3339 (default: now).
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,

    /// Wallets processed concurrently.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Delay after each wallet, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Feature table produced by `collect`.
    #[arg(long)]
    input: PathBuf,

    /// Pipeline configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory (default: <data dir>/walletscore).
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CrosscheckArgs {
    /// Labeled table written by `run`.
    #[arg(long)]
    labeled: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Collect(args) => collect(args).await,
        Commands::Run(args) => run(args),
        Commands::Crosscheck(args) => crosscheck(args),
    }
}

async fn collect(args: CollectArgs) -> Result<()> {
    let wallets = io::read_wallet_list(&args.wallets)?;
    if wallets.is_empty() {
        bail!("No wallets listed in {}", args.wallets.display());
    }
    if !args.activity_dir.is_dir() {
        bail!("Activity directory not found: {}", args.activity_dir.display());
    }

    let as_of = args.as_of.unwrap_or_else(Utc::now);
    let config = AggregatorConfig {
        concurrency: args.concurrency,
        request_delay: Duration::from_millis(args.delay_ms),
    };
    let source = Arc::new(JsonDirSource::new(&args.activity_dir));
    let activity_dir = source.dir().display().to_string();
    let collector = FeatureCollector::new(FeatureAggregator::new(source), config);
    info!(
        wallets = wallets.len(),
        %activity_dir,
        concurrency = collector.config().concurrency,
        "collecting features"
    );

    let report = collector.collect(&wallets, as_of).await;
    for (wallet, e) in &report.skipped {
        warn!(%wallet, error = %e, "wallet skipped");
    }
    if report.table.is_empty() {
        bail!("No wallet could be aggregated ({} skipped)", report.skipped.len());
    }

    let out = args
        .out
        .unwrap_or_else(|| io::default_data_dir().join("features.json"));
    io::write_json(&out, &report.table)?;
    println!(
        "Collected {} wallets ({} skipped) -> {}",
        report.table.len(),
        report.skipped.len(),
        out.display()
    );
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let config = PipelineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let raw: FeatureTable = io::read_json(&args.input)?;
    info!(rows = raw.len(), input = %args.input.display(), "loaded feature table");

    let pipeline = ScoringPipeline::new(config)?;
    let output = pipeline.run(raw).context("Pipeline failed")?;

    let out_dir = args.out_dir.unwrap_or_else(io::default_data_dir);
    io::write_json(&out_dir.join("labeled.json"), &output.scoring.labeled)?;
    io::write_json(&out_dir.join("cluster_mapping.json"), &output.ranking)?;
    if let Some(balanced) = &output.balanced {
        io::write_json(&out_dir.join("balanced.json"), balanced)?;
    }

    println!("Cluster mapping:");
    for c in output.ranking.clusters() {
        println!(
            "  cluster {} -> {:<22} members={:<5} risk={:.3}",
            c.cluster,
            c.band.label(),
            c.members,
            c.risk_score
        );
    }
    if !output.scoring.degenerate_clusters.is_empty() {
        println!("Degenerate clusters: {:?}", output.scoring.degenerate_clusters);
    }
    println!("Outputs written to {}", out_dir.display());
    Ok(())
}

fn crosscheck(args: CrosscheckArgs) -> Result<()> {
    let labeled: LabeledTable = io::read_json(&args.labeled)?;
    let report = cross_check(&labeled);
    print!("{}", render_report(&report));
    Ok(())
}

fn render_report(report: &CrossCheckReport) -> String {
    let mut out = format!(
        "Agreement: {}/{} real wallets ({:.2}%)\n",
        report.agreeing, report.compared, report.agreement_pct
    );
    out.push_str("heuristic \\ pipeline");
    for band in ScoreBand::ALL {
        out.push_str(&format!(" {:>12}", short_name(band)));
    }
    out.push('\n');
    for band in ScoreBand::ALL {
        out.push_str(&format!("{:<20}", short_name(band)));
        for count in report.confusion[band.rank()] {
            out.push_str(&format!(" {count:>12}"));
        }
        out.push('\n');
    }
    out
}

fn short_name(band: ScoreBand) -> &'static str {
    match band {
        ScoreBand::Exceptional => "Exceptional",
        ScoreBand::VeryGood => "Very Good",
        ScoreBand::Good => "Good",
        ScoreBand::Fair => "Fair",
        ScoreBand::Poor => "Poor",
    }
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` takes precedence over `level_str`. Pass `format = "json"`
/// for structured output; any other value gives human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
