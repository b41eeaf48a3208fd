use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::orderbook::types::{BaseLots, BookOrder, L2Level, PriceLots};
use crate::utils::LotConverter;

/// Collapse an ordered stream of orders into at most `depth` price levels.
///
/// Orders must already be in price priority; only consecutive orders at the
/// same exact price are merged. Stops pulling as soon as the order after the
/// last wanted level is seen.
pub fn aggregate_levels<I>(orders: I, depth: usize, lots: &LotConverter) -> Vec<L2Level>
where
    I: IntoIterator<Item = BookOrder>,
{
    let mut levels: Vec<L2Level> = Vec::with_capacity(depth.min(64));

    for order in orders {
        if let Some(level) = levels.last_mut() {
            if level.price_lots == order.price_lots {
                level.size_lots += order.size_lots;
                level.size = lots.base_lots_to_ui(level.size_lots);
                level.order_count += 1;
                continue;
            }
        }

        if levels.len() >= depth {
            break;
        }

        levels.push(L2Level {
            price_lots: order.price_lots,
            size_lots: order.size_lots,
            price: lots.price_lots_to_ui(order.price_lots),
            size: lots.base_lots_to_ui(order.size_lots),
            order_count: 1,
        });
    }

    levels
}

/// Change to one price level between two depth snapshots.
/// A `size_lots` of zero means the level is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub price_lots: PriceLots,
    pub size_lots: BaseLots,
    pub price: f64,
    pub size: f64,
}

impl LevelUpdate {
    pub fn is_removal(&self) -> bool {
        self.size_lots == 0
    }

    fn removed(level: &L2Level) -> Self {
        Self {
            price_lots: level.price_lots,
            size_lots: 0,
            price: level.price,
            size: 0.0,
        }
    }

    fn from_level(level: &L2Level) -> Self {
        Self {
            price_lots: level.price_lots,
            size_lots: level.size_lots,
            price: level.price,
            size: level.size,
        }
    }
}

/// Updates that turn `previous` into `current`: removals first, in the
/// order they appeared, then new or resized levels in `current` order.
pub fn diff_levels(previous: &[L2Level], current: &[L2Level]) -> Vec<LevelUpdate> {
    let before: HashMap<PriceLots, BaseLots> = previous
        .iter()
        .map(|level| (level.price_lots, level.size_lots))
        .collect();
    let after: HashMap<PriceLots, BaseLots> = current
        .iter()
        .map(|level| (level.price_lots, level.size_lots))
        .collect();

    let removed = previous
        .iter()
        .filter(|level| !after.contains_key(&level.price_lots))
        .map(LevelUpdate::removed);

    let changed = current
        .iter()
        .filter(|level| before.get(&level.price_lots) != Some(&level.size_lots))
        .map(LevelUpdate::from_level);

    removed.chain(changed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::{OrderType, OwnerKey, Side, NEVER_EXPIRES};

    fn order(price_lots: PriceLots, size_lots: BaseLots, seq_num: u64) -> BookOrder {
        BookOrder {
            seq_num,
            order_id: (u128::from(price_lots as u64) << 64) | u128::from(seq_num),
            owner: OwnerKey::default(),
            owner_slot: 0,
            client_order_id: 0,
            price: price_lots as f64,
            price_lots,
            size: size_lots as f64,
            size_lots,
            side: Side::Ask,
            timestamp: 0,
            expiry_timestamp: NEVER_EXPIRES,
            is_expired: false,
            is_oracle_pegged: false,
            order_type: OrderType::Limit,
            oracle_pegged: None,
        }
    }

    fn level(price_lots: PriceLots, size_lots: BaseLots) -> L2Level {
        L2Level {
            price_lots,
            size_lots,
            price: price_lots as f64,
            size: size_lots as f64,
            order_count: 1,
        }
    }

    #[test]
    fn test_aggregate_merges_equal_prices() {
        let orders = vec![order(100, 5, 1), order(100, 7, 2), order(101, 1, 3)];
        let levels = aggregate_levels(orders, 10, &LotConverter::identity());

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price_lots, 100);
        assert_eq!(levels[0].size_lots, 12);
        assert_eq!(levels[0].order_count, 2);
        assert_eq!(levels[1].size_lots, 1);
    }

    #[test]
    fn test_aggregate_respects_depth() {
        let orders = vec![order(100, 1, 1), order(101, 1, 2), order(101, 4, 3), order(102, 1, 4)];
        let levels = aggregate_levels(orders, 2, &LotConverter::identity());

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1].price_lots, 101);
        assert_eq!(levels[1].size_lots, 5);

        assert!(aggregate_levels(vec![order(100, 1, 1)], 0, &LotConverter::identity()).is_empty());
    }

    #[test]
    fn test_aggregate_scales_to_ui() {
        let lots = LotConverter::new(0.5, 0.1);
        let levels = aggregate_levels(vec![order(10, 3, 1), order(10, 2, 2)], 1, &lots);

        assert!((levels[0].price - 5.0).abs() < 1e-12);
        assert!((levels[0].size - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_diff_levels() {
        let previous = vec![level(100, 5), level(101, 3), level(102, 1)];
        let current = vec![level(100, 5), level(101, 4), level(103, 2)];

        let updates = diff_levels(&previous, &current);
        assert_eq!(updates.len(), 3);

        assert_eq!(updates[0].price_lots, 102);
        assert!(updates[0].is_removal());
        assert_eq!(updates[1].price_lots, 101);
        assert_eq!(updates[1].size_lots, 4);
        assert_eq!(updates[2].price_lots, 103);
        assert!(!updates[2].is_removal());
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let levels = vec![level(100, 5), level(99, 1)];
        assert!(diff_levels(&levels, &levels).is_empty());
        assert_eq!(diff_levels(&[], &levels).len(), 2);
        assert!(diff_levels(&levels, &[]).iter().all(LevelUpdate::is_removal));
    }
}
