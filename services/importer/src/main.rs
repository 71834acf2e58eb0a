//! Met Office climate series importer.
//!
//! Two modes:
//! - `import`: batch import of parameter/region pairs, one status line per pair
//! - `serve`: HTTP API for on-demand imports and read access to stored data

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use climate_store::{ClimateStore, SqliteStore};
use importer::{
    metrics, run_batch, run_server, BatchSelection, ImporterConfig, Importer, MetOfficeFetcher,
    ServerState,
};

/// Retry policy of the batch command; the file's `source` settings govern the API.
const BATCH_MAX_RETRIES: &str = "5";
const BATCH_RETRY_DELAY_SECS: &str = "2";

#[derive(Parser, Debug)]
#[command(name = "importer")]
#[command(about = "Import Met Office regional climate series")]
struct Args {
    /// Configuration file (YAML)
    #[arg(long, env = "IMPORTER_CONFIG", default_value = "config/importer.yaml", global = true)]
    config: PathBuf,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "data/climate.db", global = true)]
    database: PathBuf,

    /// Override the upstream base URL
    #[arg(long, env = "METOFFICE_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import series into the database
    Import(ImportArgs),
    /// Run the HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, env = "IMPORTER_PORT", default_value = "8080")]
        port: u16,
    },
}

#[derive(ClapArgs, Debug)]
struct ImportArgs {
    /// Parameter code (e.g. Tmax)
    #[arg(long)]
    parameter: Option<String>,

    /// Region code (e.g. UK)
    #[arg(long)]
    region: Option<String>,

    /// Import all configured regions
    #[arg(long)]
    all_regions: bool,

    /// Import all configured parameters
    #[arg(long)]
    all_parameters: bool,

    /// Stop at the first failed pair
    #[arg(long)]
    fail_fast: bool,

    /// Attempts per file
    #[arg(long, default_value = BATCH_MAX_RETRIES)]
    max_retries: u32,

    /// Base retry delay in seconds (doubles each retry)
    #[arg(long, default_value = BATCH_RETRY_DELAY_SECS)]
    retry_delay_secs: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries the batch status lines
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ImporterConfig::load_or_default(&args.config)?;
    if let Some(base_url) = &args.base_url {
        config.source.base_url = base_url.clone();
    }

    let store: Arc<dyn ClimateStore> = Arc::new(SqliteStore::open(&args.database).await?);

    match args.command {
        Command::Import(import_args) => run_import(config, store, import_args).await,
        Command::Serve { port } => {
            let prometheus = metrics::install_prometheus()?;
            info!("Prometheus metrics exporter initialized");

            let fetcher = MetOfficeFetcher::new(config.source.fetch_config()?)?;
            let state = Arc::new(ServerState {
                importer: Importer::new(fetcher, store),
                prometheus: Some(prometheus),
            });

            run_server(state, port).await
        }
    }
}

async fn run_import(
    mut config: ImporterConfig,
    store: Arc<dyn ClimateStore>,
    args: ImportArgs,
) -> Result<()> {
    let selection = BatchSelection {
        parameter: args.parameter,
        region: args.region,
        all_parameters: args.all_parameters,
        all_regions: args.all_regions,
    };

    if selection == BatchSelection::default() {
        println!("No specific parameter or region provided. Importing all available data...");
    }

    let continue_on_error = selection.continue_on_error() && !args.fail_fast;
    let pairs = selection.resolve(&config.parameters, &config.regions);

    config.source.max_retries = args.max_retries;
    config.source.retry_delay_secs = args.retry_delay_secs;
    let fetcher = MetOfficeFetcher::new(config.source.fetch_config()?)?;
    let importer = Importer::new(fetcher, store);

    let report = run_batch(&importer, &pairs, continue_on_error, |outcome| {
        println!("{}", outcome)
    })
    .await?;

    println!(
        "Import completed. Total records imported: {}",
        report.total_records
    );

    Ok(())
}
