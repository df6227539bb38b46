use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ofstats_config::RuntimeConfig;
use ofstats_core::{DeviceId, StatCategory};

/// Paginated OpenFlow statistics collection
#[derive(Parser)]
#[command(name = "ofstats")]
#[command(version)]
#[command(about = "Collect paginated OpenFlow statistics into a reconciled store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a capture of reply frames through one collection
    Replay(ReplayArgs),
}

#[derive(Args)]
struct ReplayArgs {
    /// Device the capture was taken from, e.g. openflow:1
    #[arg(short, long, value_name = "NODE")]
    device: DeviceId,

    /// Statistics category: flow, port or table
    #[arg(long, value_name = "CATEGORY", default_value = "flow")]
    category: StatCategory,

    /// Print the stored records for the device and category afterwards
    #[arg(long)]
    dump: bool,

    /// File of back-to-back OpenFlow frames
    capture: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // CLI overrides take priority over file and environment
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    ofstats::init_tracing(&config.log);

    match cli.command {
        Commands::Replay(args) => run_replay(&config, args).await,
    }
}

async fn run_replay(config: &RuntimeConfig, args: ReplayArgs) -> Result<()> {
    let data = tokio::fs::read(&args.capture)
        .await
        .with_context(|| format!("Failed to read capture {}", args.capture.display()))?;
    let messages = ofstats::read_capture(&data)?;
    tracing::info!(
        capture = %args.capture.display(),
        messages = messages.len(),
        device = %args.device,
        category = args.category.as_str(),
        "Replaying capture"
    );

    let report = ofstats::replay(config, messages, args.device, args.category, args.dump).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to encode report")?
    );
    Ok(())
}
