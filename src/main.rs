//! Mud Density Aggregator CLI
//!
//! Runs one scheduled aggregation window and inspects local state.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use mud_density_aggregator::{
    config::Config,
    core::{Outcome, ScheduleWindow, WindowAggregator},
    publisher::EchoPublisher,
    watermark::{FileWatermarkStore, MemoryWatermarkStore, WatermarkStore, WATERMARK_KEY},
    BlockingApiClient, RunLedger, VERSION,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mud-density")]
#[command(version = VERSION)]
#[command(about = "Average drilling mud density over scheduled windows", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a single schedule window
    Run(RunArgs),

    /// Show the stored watermark for an asset
    Watermark {
        #[arg(long)]
        company_id: i64,

        #[arg(long)]
        asset_id: i64,
    },

    /// Show cumulative run statistics
    Status,

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Scheduler event JSON file ({company_id, asset_id, schedule_start, interval})
    #[arg(long, conflicts_with_all = ["company_id", "asset_id", "schedule_start", "interval"])]
    event: Option<PathBuf>,

    #[arg(long)]
    company_id: Option<i64>,

    #[arg(long)]
    asset_id: Option<i64>,

    /// Window start (unix seconds)
    #[arg(long)]
    schedule_start: Option<i64>,

    /// Window length in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Override the API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Override the API key
    #[arg(long, env = "MUD_DENSITY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the summary instead of posting it; the stored watermark is not touched
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_level);

    let result = match cli.command {
        Commands::Run(args) => cmd_run(config, args),
        Commands::Watermark {
            company_id,
            asset_id,
        } => cmd_watermark(&config, company_id, asset_id),
        Commands::Status => {
            cmd_status(&config);
            Ok(())
        }
        Commands::Config { init } => cmd_config(&config, cli.config.as_ref(), init),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("Failed to load configuration")
}

/// Log to stderr; `RUST_LOG` takes precedence over the configured level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(mut config: Config, args: RunArgs) -> anyhow::Result<()> {
    let window = window_from_args(&args)?;

    if let Some(url) = args.api_url {
        config.api_url = url;
    }
    if let Some(key) = args.api_key {
        config.api_key = key;
    }
    if config.api_key.is_empty() {
        tracing::warn!("No API key configured; requests will likely be rejected");
    }

    config
        .ensure_directories()
        .context("Failed to create data directory")?;

    let client = BlockingApiClient::from_config(&config).context("Failed to create API client")?;
    let aggregator = WindowAggregator::from_config(&config);
    let ledger = RunLedger::with_persistence(config.ledger_path());

    tracing::info!(
        %window,
        api_url = %client.config().base_url,
        source = %aggregator.source(),
        output = %aggregator.output(),
        "Starting aggregation"
    );

    let result = if args.dry_run {
        // Seed from the real store so the skip check behaves as it would live.
        let stored = FileWatermarkStore::new(
            config.watermark_path(),
            window.company_id,
            window.asset_id,
        )
        .get(WATERMARK_KEY)?;
        let mut watermarks = match stored {
            Some(value) => MemoryWatermarkStore::with_value(WATERMARK_KEY, value),
            None => MemoryWatermarkStore::new(),
        };
        aggregator.run(&window, &client, &mut watermarks, &EchoPublisher)
    } else {
        let mut watermarks = FileWatermarkStore::new(
            config.watermark_path(),
            window.company_id,
            window.asset_id,
        );
        aggregator.run(&window, &client, &mut watermarks, &client)
    };

    match &result {
        Ok(outcome) => ledger.record_outcome(outcome),
        Err(_) => ledger.record_failure(),
    }
    if !args.dry_run {
        if let Err(e) = ledger.save() {
            tracing::warn!("Failed to save run ledger: {}", e);
        }
    }

    match result? {
        Outcome::Published(output) => {
            println!(
                "Published mean mud density {:.4} at {} for {}",
                output.data.mean_mud_density, output.timestamp, window
            );
        }
        Outcome::EmptyWindow => println!("No records in {window}"),
        Outcome::AlreadyExported { watermark } => {
            println!("{window} already exported (watermark {watermark})")
        }
    }
    Ok(())
}

fn window_from_args(args: &RunArgs) -> anyhow::Result<ScheduleWindow> {
    if let Some(ref path) = args.event {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {path:?}"))?;
        return ScheduleWindow::from_json(&content)
            .with_context(|| format!("Invalid scheduler event in {path:?}"));
    }

    match (
        args.company_id,
        args.asset_id,
        args.schedule_start,
        args.interval,
    ) {
        (Some(company_id), Some(asset_id), Some(start), Some(interval)) => {
            Ok(ScheduleWindow::new(company_id, asset_id, start, interval))
        }
        _ => bail!(
            "Either --event or all of --company-id, --asset-id, --schedule-start and --interval are required"
        ),
    }
}

fn cmd_watermark(config: &Config, company_id: i64, asset_id: i64) -> anyhow::Result<()> {
    let store = FileWatermarkStore::new(config.watermark_path(), company_id, asset_id);
    match store.get(WATERMARK_KEY)? {
        Some(value) => println!("{value}"),
        None => println!(
            "No watermark stored for company {company_id}, asset {asset_id} in {:?}",
            store.path()
        ),
    }
    Ok(())
}

fn cmd_status(config: &Config) {
    println!("Mud Density Aggregator Status");
    println!("=============================");
    println!();
    println!("Source dataset: {}", config.source);
    println!("Output dataset: {}", config.output);
    println!("Data directory: {:?}", config.data_path);
    println!();

    if config.ledger_path().exists() {
        let ledger = RunLedger::with_persistence(config.ledger_path());
        println!("{}", ledger.summary());
    } else {
        println!("No previous runs recorded.");
    }
}

fn cmd_config(config: &Config, path: Option<&PathBuf>, init: bool) -> anyhow::Result<()> {
    if init {
        let saved = match path {
            Some(path) => config.save_to(path),
            None => config.save(),
        };
        saved.context("Failed to write configuration")?;
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!(
        "Config file: {:?}",
        path.cloned().unwrap_or_else(Config::config_path)
    );
    println!("Watermarks: {:?}", config.watermark_path());
    println!("Run ledger: {:?}", config.ledger_path());
    println!();

    let mut shown = config.clone();
    if !shown.api_key.is_empty() {
        shown.api_key = "********".to_string();
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}
