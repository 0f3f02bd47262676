//! TW Screener - momentum scan over TWSE/TPEx listed equities.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tw_common::config::Config;
use tw_common::logging::init_logging;
use tw_common::validation::Validate;

use tw_screener::data::Board;
use tw_screener::screener::{
    ProgressCallback, ReportFormat, ScanRequest, ScreenerConfig, ScreenerEngine, ScreenerReport,
};
use tw_screener::universe::{IsinListingUniverse, UniverseProvider};
use tw_screener::ScreenerService;

#[derive(Parser, Debug)]
#[command(name = "tw-screener", version, about = "Momentum screener for TWSE/TPEx equities")]
struct Cli {
    /// Config file (default: ~/.tw-screener/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one scan and print the ranked matches
    Scan {
        /// Scan these identifiers instead of the full universe (e.g. 2330.TW)
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<String>>,

        /// Scan only the first N instruments of the universe
        #[arg(long)]
        limit: Option<usize>,

        /// Worker pool size
        #[arg(long)]
        concurrency: Option<usize>,

        /// Output format (text, markdown, json)
        #[arg(long, default_value = "text")]
        format: ReportFormat,
    },

    /// Print the instrument universe
    Universe {
        /// Only one board (main, alternate)
        #[arg(long)]
        board: Option<String>,
    },

    /// Start the HTTP service
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with_env(cli.config.as_deref())?;
    config.validate().context("Invalid configuration")?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("TW Screener v{}", env!("CARGO_PKG_VERSION"));

    let screener_config = ScreenerConfig::from_config(&config);

    match cli.command {
        Commands::Scan {
            symbols,
            limit,
            concurrency,
            format,
        } => {
            let engine = ScreenerEngine::from_config(screener_config);
            let request = ScanRequest {
                symbols,
                limit,
                concurrency,
            };
            run_scan(&engine, &request, format).await
        }
        Commands::Universe { board } => list_universe(&screener_config, board.as_deref()).await,
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let service = ScreenerService::new(ScreenerEngine::from_config(screener_config));
            cancel_on_ctrl_c(service.shutdown_token());
            service.start(&host, port).await
        }
    }
}

async fn run_scan(engine: &ScreenerEngine, request: &ScanRequest, format: ReportFormat) -> Result<()> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let report = engine
        .execute(request, Some(progress_logger()), &cancel)
        .await
        .context("Scan failed")?;

    println!("{}", ScreenerReport::new(&report).generate(format));
    Ok(())
}

async fn list_universe(config: &ScreenerConfig, board: Option<&str>) -> Result<()> {
    let boards = match board {
        Some(name) => {
            vec![Board::parse(name).with_context(|| format!("Unknown board: {}", name))?]
        }
        None => Board::ALL.to_vec(),
    };

    let universe = match &config.listing_base_url {
        Some(url) => IsinListingUniverse::with_base_url(url.clone()),
        None => IsinListingUniverse::new(),
    }
    .with_boards(boards);

    let ids = universe
        .list_instruments()
        .await
        .context("Failed to load instrument universe")?;
    for id in &ids {
        println!("{}", id);
    }
    tracing::info!(count = ids.len(), "Universe listed");
    Ok(())
}

/// Log progress at every 10% step.
fn progress_logger() -> ProgressCallback {
    let last_step = Arc::new(AtomicUsize::new(0));
    Arc::new(move |p| {
        let step = (p.percent() / 10.0) as usize;
        if step > last_step.fetch_max(step, Ordering::Relaxed) {
            tracing::info!(
                completed = p.completed,
                total = p.total,
                matched = p.matched,
                "Scan progress {:.0}%",
                p.percent()
            );
        }
    })
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping");
            token.cancel();
        }
    });
}
