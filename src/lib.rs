//! Perp Order Book Reader
//!
//! Read-side decoder and query engine for the book-side accounts of an
//! on-ledger perpetual futures market. A book side is a fixed-capacity arena
//! of 1024 nodes holding two binary trees: fixed-price orders keyed by price,
//! and oracle pegged orders keyed by an offset from the oracle price.
//!
//! # Features
//!
//! - **Byte-exact decoding**: raw account buffers become a tagged node arena, never mutated
//! - **Validated trees**: dangling handles, unknown tags and cycles are rejected up front
//! - **Price-Time Priority**: both trees are walked lazily and merged without sorting
//! - **Validity filters**: expired and peg-crossed orders can be skipped on the fly
//! - **Depth queries**: L2 levels, impact prices, funding rate and level diffs
//! - **Monitoring**: decode latency and book gauges through the `metrics` facade
//!
//! # Quick Start
//!
//! ```rust
//! use perp_orderbook_reader::fixtures::{BookSideBuilder, LeafSpec};
//! use perp_orderbook_reader::{BookClock, BookSide, LotConverter, ReaderConfig, Side};
//!
//! // Any book-side account buffer; here a synthetic one
//! let data = BookSideBuilder::new(Side::Ask)
//!     .leaf(LeafSpec::fixed(101, 1, 5))
//!     .leaf(LeafSpec::pegged(-2, -1, 2, 3))
//!     .build()?;
//!
//! let asks = BookSide::decode(
//!     &data,
//!     BookClock::at(1_700_000_000),
//!     LotConverter::identity(),
//!     &ReaderConfig::default(),
//! )?;
//!
//! // Pegged orders are priced against the oracle on every query
//! let best = asks.best(Some(100)).unwrap();
//! assert_eq!(best.price_lots, 98);
//! assert_eq!(asks.impact_price_lots(6, Some(100)), Some(101));
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! Queries are a pull pipeline over one immutable [`BookSide`]:
//!
//! 1. **Decode**: `orderbook::account` parses the header and node slots
//! 2. **Traverse**: `orderbook::tree` walks each tree with an explicit stack
//! 3. **Materialize**: `orderbook::order` prices leaves for the side and oracle
//! 4. **Merge**: `orderbook::book_side` interleaves both trees in priority order

pub mod config;
pub mod fixtures;
pub mod metrics;
pub mod orderbook;
pub mod utils;

// Re-export commonly used types
pub use config::{ConfigError, InspectorConfig, MarketConfig, ReaderConfig};
pub use orderbook::{
    error::{BookError, BookResult},
    types::{BookOrder, BookSnapshot, L2Level, OrderTreeKind, OrderType, OwnerKey, PriceLots, Side},
    Book, BookSide,
};
pub use utils::{time::BookClock, LotConverter};

pub use metrics::BookMetrics;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::fixtures::{BookSideBuilder, LeafSpec, DEFAULT_TIMESTAMP};
    use std::sync::Arc;
    use std::thread;

    fn decode(builder: BookSideBuilder) -> BookSide {
        BookSide::decode(
            &builder.build().unwrap(),
            BookClock::at(DEFAULT_TIMESTAMP),
            LotConverter::identity(),
            &ReaderConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_basic_reading_workflow() {
        let bids = decode(
            BookSideBuilder::new(Side::Bid)
                .leaf(LeafSpec::fixed(99, 1, 10))
                .leaf(LeafSpec::pegged(-1, -1, 2, 4)),
        );
        let asks = decode(BookSideBuilder::new(Side::Ask).leaf(LeafSpec::fixed(102, 1, 7)));
        let book = Book::new(bids, asks).unwrap();

        // Pegged bid lands on 99 too but was placed later
        let bids: Vec<BookOrder> = book.bids().items(Some(100)).collect();
        assert_eq!(bids.len(), 2);
        assert!(!bids[0].is_oracle_pegged);
        assert_eq!(bids[1].price_lots, 99);
        assert_eq!(bids[1].seq_num, 2);
        assert_eq!(book.best_bid(Some(100)).unwrap().seq_num, 1);

        let levels = book.bids().l2(5, Some(100));
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].size_lots, 14);
        assert_eq!(levels[0].order_count, 2);

        assert_eq!(book.spread_lots(Some(100)), Some(3));
    }

    #[test]
    fn test_concurrent_readers() {
        let asks = Arc::new(decode(
            BookSideBuilder::new(Side::Ask)
                .leaves((0..100).map(|i| LeafSpec::fixed(1_000 + i, i as u64, 1))),
        ));
        let mut handles = vec![];

        // Readers share one decoded side without locks
        for thread_id in 0..4 {
            let asks_clone = Arc::clone(&asks);
            let handle = thread::spawn(move || {
                let oracle = 1_000 + thread_id;
                let levels = asks_clone.l2(10, Some(oracle));
                let total: usize = asks_clone.items(Some(oracle)).count();
                (levels.len(), total)
            });
            handles.push(handle);
        }

        for handle in handles {
            assert_eq!(handle.join().unwrap(), (10, 100));
        }
    }
}
