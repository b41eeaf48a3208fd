use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use perp_orderbook_reader::metrics::install_prometheus_recorder;
use perp_orderbook_reader::orderbook::BookStats;
use perp_orderbook_reader::utils::time::Clock;
use perp_orderbook_reader::{
    Book, BookMetrics, BookSide, BookSnapshot, InspectorConfig, LotConverter, ReaderConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

/// Decode a pair of book-side account dumps and print the book
#[derive(Debug, Parser)]
#[command(name = "book_inspector", version)]
struct Args {
    /// Raw bids account buffer
    #[arg(long)]
    bids: PathBuf,

    /// Raw asks account buffer
    #[arg(long)]
    asks: PathBuf,

    /// Oracle price in UI units; pegged orders are skipped without it
    #[arg(long)]
    oracle_price: Option<f64>,

    /// Price levels per side
    #[arg(long, default_value_t = 20)]
    depth: usize,

    /// JSON file with reader and market settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Unix time the buffers were fetched at, defaults to the wall clock
    #[arg(long)]
    now: Option<u64>,

    /// Overrides the configured max book delay, in seconds
    #[arg(long)]
    max_book_delay: Option<u64>,

    /// Leave out expired and peg-crossed orders
    #[arg(long)]
    valid_only: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Print Prometheus metrics after the book
    #[arg(long)]
    metrics: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    market: String,
    snapshot: BookSnapshot,
    stats: BookStats,
    funding_rate: Option<f64>,
}

fn read_side(
    metrics: &BookMetrics,
    path: &Path,
    unix_now: u64,
    lots: LotConverter,
    config: &ReaderConfig,
) -> Result<BookSide, Box<dyn std::error::Error>> {
    let data = fs::read(path)?;
    info!("Read {} bytes from {}", data.len(), path.display());

    let side = metrics.time_decode(|| {
        BookSide::decode(&data, config.clock_at(unix_now), lots, config)
    })?;
    Ok(side)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => InspectorConfig::from_file(path)?,
        None => InspectorConfig::default(),
    };
    if let Some(delay) = args.max_book_delay {
        config.reader.max_book_delay_secs = delay;
    }

    let prometheus = if args.metrics {
        Some(install_prometheus_recorder()?)
    } else {
        None
    };
    let metrics = BookMetrics::new();

    let unix_now = args.now.unwrap_or_else(Clock::unix_seconds);
    let lots = config.market.lot_converter();

    let bids = read_side(&metrics, &args.bids, unix_now, lots, &config.reader)?;
    let asks = read_side(&metrics, &args.asks, unix_now, lots, &config.reader)?;
    let book = Book::new(bids, asks)?;

    let oracle = args.oracle_price.map(|price| lots.ui_price_to_lots(price));
    info!("Inspecting {} with oracle {:?} lots", config.market.name, oracle);

    let snapshot = metrics.time_query(|| {
        if args.valid_only {
            book.valid_snapshot(args.depth, oracle)
        } else {
            book.snapshot(args.depth, oracle)
        }
    });
    let funding_rate = oracle.map(|index| book.instantaneous_funding_rate(&config.market, index));
    metrics.record_book(&book, oracle);

    match args.format {
        OutputFormat::Json => {
            let report = Report {
                market: config.market.name.clone(),
                snapshot,
                stats: book.stats(oracle),
                funding_rate,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{} @ {}", config.market.name, book.now());
            print!("{}", book.ladder(oracle));
            if let Some(rate) = funding_rate {
                println!("funding rate {:.6}", rate);
            }
        }
    }

    if let Some(handle) = prometheus {
        print!("{}", handle.render());
    }

    let stats = metrics.get_latency_stats();
    info!(
        "Decoded {} sides, avg decode {:.2}us, max {:.2}us",
        metrics.get_sides_decoded(),
        stats.decode.avg_micros(),
        stats.decode.max_micros()
    );

    Ok(())
}
