//! One decoded side of the book and the queries over it.
//!
//! A [`BookSide`] is built once per fetched buffer and never changes. Every
//! query pulls lazily from the two order trees and merges them in price-time
//! priority, so nothing is sorted or buffered.

use std::iter::Peekable;

use tracing::{debug, info};

use crate::config::ReaderConfig;
use crate::orderbook::account::{BookSideAccount, OrderTreeRoot};
use crate::orderbook::error::BookResult;
use crate::orderbook::nodes::Node;
use crate::orderbook::order::OrderMaterializer;
use crate::orderbook::price_level::aggregate_levels;
use crate::orderbook::tree::{walk_checked, OrderTreeIter, TreeStats};
use crate::orderbook::types::{BaseLots, BookOrder, L2Level, OrderTreeKind, OwnerKey, PriceLots, Side};
use crate::utils::time::BookClock;
use crate::utils::LotConverter;

#[derive(Debug, Clone, PartialEq)]
pub struct BookSide {
    side: Side,
    roots: [OrderTreeRoot; 2],
    nodes: Vec<Node>,
    bump_index: u32,
    free_list_len: u32,
    free_list_head: u32,
    now: u64,
    lots: LotConverter,
    stats: [TreeStats; 2],
}

impl BookSide {
    /// Decode and validate a raw book-side buffer
    pub fn decode(
        data: &[u8],
        clock: BookClock,
        lots: LotConverter,
        config: &ReaderConfig,
    ) -> BookResult<Self> {
        let account = BookSideAccount::decode(data, config.verify_discriminator)?;
        Self::from_account(account, clock, lots, config)
    }

    /// Validate both trees of an already parsed account and fix `now`
    pub fn from_account(
        account: BookSideAccount,
        clock: BookClock,
        lots: LotConverter,
        config: &ReaderConfig,
    ) -> BookResult<Self> {
        let mut stats = [TreeStats::default(); 2];
        for tree in [OrderTreeKind::Fixed, OrderTreeKind::OraclePegged] {
            stats[tree.root_index()] = walk_checked(
                &account.nodes,
                account.root(tree),
                tree,
                config.verify_leaf_counts,
            )?;
        }

        let max_timestamp = stats.iter().filter_map(|s| s.max_timestamp).max();
        let now = clock.book_now(max_timestamp);

        info!(
            "Loaded {} book side: {} fixed, {} oracle pegged orders, now {}",
            account.side, stats[0].leaf_count, stats[1].leaf_count, now
        );

        Ok(Self {
            side: account.side,
            roots: account.roots,
            nodes: account.nodes,
            bump_index: account.bump_index,
            free_list_len: account.free_list_len,
            free_list_head: account.free_list_head,
            now,
            lots,
            stats,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Book-wide timestamp used to decide expiry
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn lots(&self) -> &LotConverter {
        &self.lots
    }

    pub fn root(&self, tree: OrderTreeKind) -> &OrderTreeRoot {
        &self.roots[tree.root_index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn bump_index(&self) -> u32 {
        self.bump_index
    }

    pub fn free_list_len(&self) -> u32 {
        self.free_list_len
    }

    pub fn free_list_head(&self) -> u32 {
        self.free_list_head
    }

    pub fn tree_stats(&self, tree: OrderTreeKind) -> &TreeStats {
        &self.stats[tree.root_index()]
    }

    pub fn leaf_count(&self, tree: OrderTreeKind) -> u32 {
        self.stats[tree.root_index()].leaf_count
    }

    /// Orders resting in both trees
    pub fn len(&self) -> usize {
        self.stats.iter().map(|s| s.leaf_count as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn materializer(&self) -> OrderMaterializer {
        OrderMaterializer::new(self.side, self.now, self.lots)
    }

    /// Fixed-price orders in price priority
    pub fn fixed_items(&self) -> FixedOrders<'_> {
        FixedOrders {
            leaves: OrderTreeIter::new(&self.nodes, self.root(OrderTreeKind::Fixed), self.side),
            materializer: self.materializer(),
        }
    }

    /// Oracle pegged orders priced against `oracle_price_lots`, in price priority
    pub fn oracle_pegged_items(&self, oracle_price_lots: PriceLots) -> PeggedOrders<'_> {
        PeggedOrders {
            leaves: Some(OrderTreeIter::new(
                &self.nodes,
                self.root(OrderTreeKind::OraclePegged),
                self.side,
            )),
            materializer: self.materializer(),
            oracle_price_lots,
        }
    }

    /// All orders in price-time priority.
    ///
    /// Without an oracle price the pegged tree is not walked and only fixed
    /// orders are produced.
    pub fn items(&self, oracle_price_lots: Option<PriceLots>) -> BookSideItems<'_> {
        let pegged = match oracle_price_lots {
            Some(oracle) => self.oracle_pegged_items(oracle),
            None => {
                if !self.root(OrderTreeKind::OraclePegged).is_empty() {
                    debug!(
                        "No oracle price, deferring {} pegged {} orders",
                        self.leaf_count(OrderTreeKind::OraclePegged),
                        self.side
                    );
                }
                PeggedOrders {
                    leaves: None,
                    materializer: self.materializer(),
                    oracle_price_lots: 0,
                }
            }
        };

        BookSideItems {
            side: self.side,
            fixed: self.fixed_items().peekable(),
            pegged: pegged.peekable(),
        }
    }

    /// Orders that are neither expired nor past their peg limit
    pub fn items_valid(
        &self,
        oracle_price_lots: Option<PriceLots>,
    ) -> impl Iterator<Item = BookOrder> + '_ {
        self.items(oracle_price_lots).filter(BookOrder::is_valid)
    }

    pub fn best(&self, oracle_price_lots: Option<PriceLots>) -> Option<BookOrder> {
        self.items(oracle_price_lots).next()
    }

    /// Price of the order at which cumulative size first reaches `base_lots`
    pub fn impact_price_lots(
        &self,
        base_lots: BaseLots,
        oracle_price_lots: Option<PriceLots>,
    ) -> Option<PriceLots> {
        let mut accumulated: BaseLots = 0;
        for order in self.items(oracle_price_lots) {
            accumulated = accumulated.saturating_add(order.size_lots);
            if accumulated >= base_lots {
                return Some(order.price_lots);
            }
        }
        None
    }

    /// Same walk as [`Self::impact_price_lots`] in UI units
    pub fn impact_price_ui(&self, base_size: f64, oracle_price_lots: Option<PriceLots>) -> Option<f64> {
        let mut accumulated = 0.0;
        for order in self.items(oracle_price_lots) {
            accumulated += order.size;
            if accumulated >= base_size {
                return Some(order.price);
            }
        }
        None
    }

    /// Aggregated depth, at most `depth` price levels
    pub fn l2(&self, depth: usize, oracle_price_lots: Option<PriceLots>) -> Vec<L2Level> {
        aggregate_levels(self.items(oracle_price_lots), depth, &self.lots)
    }

    /// Aggregated depth over valid orders only
    pub fn l2_valid(&self, depth: usize, oracle_price_lots: Option<PriceLots>) -> Vec<L2Level> {
        aggregate_levels(self.items_valid(oracle_price_lots), depth, &self.lots)
    }

    pub fn orders_for_owner<'a>(
        &'a self,
        owner: &'a OwnerKey,
        oracle_price_lots: Option<PriceLots>,
    ) -> impl Iterator<Item = BookOrder> + 'a {
        self.items(oracle_price_lots)
            .filter(move |order| &order.owner == owner)
    }
}

/// Fixed-price orders of one side
#[derive(Debug, Clone)]
pub struct FixedOrders<'a> {
    leaves: OrderTreeIter<'a>,
    materializer: OrderMaterializer,
}

impl<'a> Iterator for FixedOrders<'a> {
    type Item = BookOrder;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, leaf) = self.leaves.next()?;
        Some(self.materializer.fixed(leaf))
    }
}

/// Oracle pegged orders of one side. Empty when no oracle price was given.
#[derive(Debug, Clone)]
pub struct PeggedOrders<'a> {
    leaves: Option<OrderTreeIter<'a>>,
    materializer: OrderMaterializer,
    oracle_price_lots: PriceLots,
}

impl<'a> Iterator for PeggedOrders<'a> {
    type Item = BookOrder;

    fn next(&mut self) -> Option<Self::Item> {
        let leaves = self.leaves.as_mut()?;
        for (_, leaf) in leaves.by_ref() {
            if let Some(order) = self.materializer.oracle_pegged(leaf, self.oracle_price_lots) {
                return Some(order);
            }
        }
        None
    }
}

/// Two-way merge of the fixed and pegged sequences of one side
pub struct BookSideItems<'a> {
    side: Side,
    fixed: Peekable<FixedOrders<'a>>,
    pegged: Peekable<PeggedOrders<'a>>,
}

/// Better price first, earlier placement on equal price
#[inline]
fn precedes(side: Side, a: &BookOrder, b: &BookOrder) -> bool {
    side.is_price_better(a.price_lots, b.price_lots)
        || (a.price_lots == b.price_lots && a.seq_num < b.seq_num)
}

impl<'a> Iterator for BookSideItems<'a> {
    type Item = BookOrder;

    fn next(&mut self) -> Option<Self::Item> {
        let take_pegged = match (self.fixed.peek(), self.pegged.peek()) {
            (Some(fixed), Some(pegged)) => precedes(self.side, pegged, fixed),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => return None,
        };

        if take_pegged {
            self.pegged.next()
        } else {
            self.fixed.next()
        }
    }
}
