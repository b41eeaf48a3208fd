use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{debug, warn};

use crate::config::MarketConfig;
use crate::orderbook::book_side::BookSide;
use crate::orderbook::error::{BookError, BookResult};
use crate::orderbook::types::{BookOrder, BookSnapshot, PriceLots, Side};
use crate::utils::format_price;
use crate::utils::time::to_utc;

const LADDER_DECIMALS: usize = 4;

/// Both sides of one market, decoded from the same fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    bids: BookSide,
    asks: BookSide,
}

impl Book {
    pub fn new(bids: BookSide, asks: BookSide) -> BookResult<Self> {
        if bids.side() != Side::Bid {
            return Err(BookError::SideMismatch {
                expected: Side::Bid,
                actual: bids.side(),
            });
        }
        if asks.side() != Side::Ask {
            return Err(BookError::SideMismatch {
                expected: Side::Ask,
                actual: asks.side(),
            });
        }

        Ok(Self { bids, asks })
    }

    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Later of the two sides' `now`
    pub fn now(&self) -> u64 {
        self.bids.now().max(self.asks.now())
    }

    /// Best valid bid
    pub fn best_bid(&self, oracle_price_lots: Option<PriceLots>) -> Option<BookOrder> {
        self.bids.items_valid(oracle_price_lots).next()
    }

    /// Best valid ask
    pub fn best_ask(&self, oracle_price_lots: Option<PriceLots>) -> Option<BookOrder> {
        self.asks.items_valid(oracle_price_lots).next()
    }

    pub fn spread_lots(&self, oracle_price_lots: Option<PriceLots>) -> Option<PriceLots> {
        let bid = self.best_bid(oracle_price_lots)?;
        let ask = self.best_ask(oracle_price_lots)?;
        ask.price_lots.checked_sub(bid.price_lots)
    }

    pub fn mid_price_ui(&self, oracle_price_lots: Option<PriceLots>) -> Option<f64> {
        let bid = self.best_bid(oracle_price_lots)?;
        let ask = self.best_ask(oracle_price_lots)?;
        Some((bid.price + ask.price) / 2.0)
    }

    /// Aggregated depth of both sides
    pub fn snapshot(&self, depth: usize, oracle_price_lots: Option<PriceLots>) -> BookSnapshot {
        let now = self.now();
        BookSnapshot {
            now,
            captured_at: to_utc(now),
            oracle_price_lots,
            bids: self.bids.l2(depth, oracle_price_lots),
            asks: self.asks.l2(depth, oracle_price_lots),
            spread_lots: self.spread_lots(oracle_price_lots),
        }
    }

    /// Aggregated depth of both sides, valid orders only
    pub fn valid_snapshot(&self, depth: usize, oracle_price_lots: Option<PriceLots>) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids.l2_valid(depth, oracle_price_lots),
            asks: self.asks.l2_valid(depth, oracle_price_lots),
            ..self.snapshot(0, oracle_price_lots)
        }
    }

    pub fn stats(&self, oracle_price_lots: Option<PriceLots>) -> BookStats {
        let mut stats = BookStats {
            bid_orders: self.bids.len(),
            ask_orders: self.asks.len(),
            ..BookStats::default()
        };

        for order in self
            .bids
            .items(oracle_price_lots)
            .chain(self.asks.items(oracle_price_lots))
        {
            if order.is_expired {
                stats.expired_orders += 1;
            }
            if order.oracle_pegged.is_some_and(|pegged| pegged.is_invalid) {
                stats.invalid_orders += 1;
            }
        }

        stats
    }

    /// Funding rate implied by the impact prices of both sides against the index.
    ///
    /// Clamped to the market's bounds; a book with only bids at impact size
    /// pays the maximum, only asks the minimum, and an empty book pays nothing.
    pub fn instantaneous_funding_rate(&self, market: &MarketConfig, index_price_lots: PriceLots) -> f64 {
        let oracle = Some(index_price_lots);
        let bid = self.bids.impact_price_lots(market.impact_quantity, oracle);
        let ask = self.asks.impact_price_lots(market.impact_quantity, oracle);

        let rate = match (bid, ask) {
            (Some(bid), Some(ask)) => {
                if index_price_lots <= 0 {
                    warn!(
                        "Index price {} lots is not positive, no funding for {}",
                        index_price_lots, market.name
                    );
                    return 0.0;
                }
                let mid = (bid as f64 + ask as f64) / 2.0;
                (mid / index_price_lots as f64 - 1.0)
                    .max(market.min_funding)
                    .min(market.max_funding)
            }
            (Some(_), None) => market.max_funding,
            (None, Some(_)) => market.min_funding,
            (None, None) => 0.0,
        };

        debug!(
            "Funding for {}: bid impact {:?}, ask impact {:?}, rate {}",
            market.name, bid, ask, rate
        );

        rate
    }

    /// Text ladder, asks above bids, worst ask first
    pub fn ladder(&self, oracle_price_lots: Option<PriceLots>) -> String {
        let asks: Vec<BookOrder> = self.asks.items(oracle_price_lots).collect();
        let mut out = String::new();

        for order in asks.iter().rev() {
            ladder_line(&mut out, order);
        }
        match self.spread_lots(oracle_price_lots) {
            Some(spread) => {
                let _ = writeln!(out, "---------- spread {} lots ----------", spread);
            }
            None => out.push_str("------------------------------------\n"),
        }
        for order in self.bids.items(oracle_price_lots) {
            ladder_line(&mut out, &order);
        }

        out
    }
}

fn ladder_line(out: &mut String, order: &BookOrder) {
    let _ = write!(
        out,
        "{} {:>14} {:>14}  seq {}",
        order.side,
        format_price(order.price, LADDER_DECIMALS),
        format_price(order.size, LADDER_DECIMALS),
        order.seq_num
    );
    if let Some(pegged) = &order.oracle_pegged {
        let _ = write!(
            out,
            "  peg {:+} limit {}",
            pegged.price_offset_lots, pegged.peg_limit
        );
        if pegged.is_invalid {
            out.push_str(" INVALID");
        }
    }
    if order.is_expired {
        out.push_str(" EXPIRED");
    }
    out.push('\n');
}

/// Order counts across both sides for one oracle price
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStats {
    pub bid_orders: usize,
    pub ask_orders: usize,
    pub expired_orders: usize,
    pub invalid_orders: usize,
}
