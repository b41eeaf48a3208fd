use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::orderbook::book::Book;
use crate::orderbook::book_side::BookSide;
use crate::orderbook::error::BookResult;
use crate::orderbook::types::{OrderTreeKind, PriceLots, Side};
use crate::utils::time::LatencyTimer;

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Bid => "bid",
        Side::Ask => "ask",
    }
}

/// Metrics for decoding and querying book sides
#[derive(Debug)]
pub struct BookMetrics {
    decode_latency: LatencyTracker,
    query_latency: LatencyTracker,

    sides_decoded: AtomicU64,
    decode_failures: AtomicU64,
}

impl BookMetrics {
    pub fn new() -> Self {
        // Register metric descriptions
        describe_histogram!(
            "book_reader_operation_duration_seconds",
            "Duration of book side decodes and queries"
        );
        describe_counter!("book_reader_sides_decoded_total", "Book sides decoded");
        describe_counter!(
            "book_reader_decode_failures_total",
            "Book side buffers rejected as malformed"
        );
        describe_gauge!("book_reader_orders_current", "Orders resting per side and tree");
        describe_gauge!("book_reader_best_price_lots", "Best valid price per side");
        describe_gauge!("book_reader_expired_orders", "Expired orders still on the book");
        describe_gauge!("book_reader_invalid_orders", "Pegged orders past their peg limit");
        describe_gauge!("book_reader_spread_lots", "Best ask minus best bid");

        Self {
            decode_latency: LatencyTracker::new("decode"),
            query_latency: LatencyTracker::new("query"),
            sides_decoded: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
        }
    }

    /// Time a decode and count its outcome
    pub fn time_decode<F>(&self, f: F) -> BookResult<BookSide>
    where
        F: FnOnce() -> BookResult<BookSide>,
    {
        let result = self.decode_latency.time(f);
        match &result {
            Ok(side) => {
                self.sides_decoded.fetch_add(1, Ordering::Relaxed);
                counter!("book_reader_sides_decoded_total", "side" => side_label(side.side()))
                    .increment(1);
            }
            Err(err) => {
                self.decode_failures.fetch_add(1, Ordering::Relaxed);
                counter!("book_reader_decode_failures_total").increment(1);
                warn!("Book side decode failed: {}", err);
            }
        }
        result
    }

    pub fn time_query<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.query_latency.time(f)
    }

    /// Publish per-side gauges for one oracle price
    pub fn record_book(&self, book: &Book, oracle_price_lots: Option<PriceLots>) {
        for side in [book.bids(), book.asks()] {
            let label = side_label(side.side());
            gauge!("book_reader_orders_current", "side" => label, "tree" => "fixed")
                .set(f64::from(side.leaf_count(OrderTreeKind::Fixed)));
            gauge!("book_reader_orders_current", "side" => label, "tree" => "oracle_pegged")
                .set(f64::from(side.leaf_count(OrderTreeKind::OraclePegged)));
        }

        if let Some(bid) = book.best_bid(oracle_price_lots) {
            gauge!("book_reader_best_price_lots", "side" => "bid").set(bid.price_lots as f64);
        }
        if let Some(ask) = book.best_ask(oracle_price_lots) {
            gauge!("book_reader_best_price_lots", "side" => "ask").set(ask.price_lots as f64);
        }
        if let Some(spread) = book.spread_lots(oracle_price_lots) {
            gauge!("book_reader_spread_lots").set(spread as f64);
        }

        let stats = book.stats(oracle_price_lots);
        gauge!("book_reader_expired_orders").set(stats.expired_orders as f64);
        gauge!("book_reader_invalid_orders").set(stats.invalid_orders as f64);
    }

    pub fn get_sides_decoded(&self) -> u64 {
        self.sides_decoded.load(Ordering::Relaxed)
    }

    pub fn get_decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        LatencyStats {
            decode: self.decode_latency.get_stats(),
            query: self.query_latency.get_stats(),
        }
    }
}

impl Default for BookMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the Prometheus recorder; the returned handle renders the exposition text
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("Prometheus recorder installed");
    Ok(handle)
}

/// Latency tracker for individual operations
#[derive(Debug)]
struct LatencyTracker {
    operation: &'static str,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let timer = LatencyTimer::start();
        let result = f();
        self.record_latency(timer.stop());
        result
    }

    fn record_latency(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        histogram!("book_reader_operation_duration_seconds", "operation" => self.operation)
            .record(duration.as_secs_f64());
    }

    fn get_stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        let min = self.min_nanos.load(Ordering::Relaxed);
        let max = self.max_nanos.load(Ordering::Relaxed);

        let avg = if samples > 0 { total / samples } else { 0 };

        OperationLatencyStats {
            operation: self.operation.to_string(),
            samples,
            avg_nanos: avg,
            min_nanos: if min == u64::MAX { 0 } else { min },
            max_nanos: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub decode: OperationLatencyStats,
    pub query: OperationLatencyStats,
}

#[derive(Debug, Clone)]
pub struct OperationLatencyStats {
    pub operation: String,
    pub samples: u64,
    pub avg_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    pub fn avg_micros(&self) -> f64 {
        self.avg_nanos as f64 / 1_000.0
    }

    pub fn max_micros(&self) -> f64 {
        self.max_nanos as f64 / 1_000.0
    }
}
