use tracing::warn;

use crate::orderbook::nodes::LeafNode;
use crate::orderbook::types::{BookOrder, OraclePeggedProperties, PriceLots, Side};
use crate::utils::LotConverter;

/// Pegged keys store `offset + 2^63` so that negative offsets sort below positive ones
const PEG_OFFSET_BIAS: u64 = 1 << 63;

/// Peg limit value meaning "no limit"
pub const NO_PEG_LIMIT: i64 = -1;

/// Price of a fixed-price leaf
#[inline]
pub fn fixed_price_lots(leaf: &LeafNode) -> PriceLots {
    leaf.price_data() as i64
}

/// Signed offset from the oracle price of a pegged leaf
#[inline]
pub fn peg_offset_lots(leaf: &LeafNode) -> PriceLots {
    leaf.price_data().wrapping_sub(PEG_OFFSET_BIAS) as i64
}

/// Encode a signed peg offset the way the ledger stores it in the key
#[inline]
pub fn peg_offset_to_price_data(offset: PriceLots) -> u64 {
    (offset as u64).wrapping_add(PEG_OFFSET_BIAS)
}

/// Placement sequence where lower always means earlier, whatever the side.
/// Bid keys store the sequence inverted so that earlier bids sort higher.
#[inline]
pub fn seq_num(side: Side, leaf: &LeafNode) -> u64 {
    match side {
        Side::Bid => u64::MAX - leaf.sequence_bits(),
        Side::Ask => leaf.sequence_bits(),
    }
}

/// Whether the oracle has pushed a pegged order past its limit
#[inline]
pub fn is_peg_invalid(side: Side, price_lots: PriceLots, peg_limit: PriceLots) -> bool {
    match side {
        Side::Bid => price_lots > peg_limit && peg_limit != NO_PEG_LIMIT,
        Side::Ask => peg_limit > price_lots,
    }
}

/// Turns decoded leaves of one book side into priced orders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderMaterializer {
    pub side: Side,
    /// Book-wide timestamp used for expiry
    pub now: u64,
    pub lots: LotConverter,
}

impl OrderMaterializer {
    pub fn new(side: Side, now: u64, lots: LotConverter) -> Self {
        Self { side, now, lots }
    }

    pub fn fixed(&self, leaf: &LeafNode) -> BookOrder {
        self.build(leaf, fixed_price_lots(leaf), None)
    }

    /// Price a pegged leaf against the oracle. Returns None when the sum
    /// does not fit in the price range.
    pub fn oracle_pegged(&self, leaf: &LeafNode, oracle_price_lots: PriceLots) -> Option<BookOrder> {
        let price_offset_lots = peg_offset_lots(leaf);
        let Some(price_lots) = oracle_price_lots.checked_add(price_offset_lots) else {
            warn!(
                "Skipping pegged {} order {}: oracle {} + offset {} overflows",
                self.side, leaf.key, oracle_price_lots, price_offset_lots
            );
            return None;
        };

        let properties = OraclePeggedProperties {
            price_offset_lots,
            ui_price_offset: self.lots.price_lots_to_ui(price_offset_lots),
            peg_limit: leaf.peg_limit,
            ui_peg_limit: self.lots.price_lots_to_ui(leaf.peg_limit),
            is_invalid: is_peg_invalid(self.side, price_lots, leaf.peg_limit),
        };

        Some(self.build(leaf, price_lots, Some(properties)))
    }

    fn build(
        &self,
        leaf: &LeafNode,
        price_lots: PriceLots,
        oracle_pegged: Option<OraclePeggedProperties>,
    ) -> BookOrder {
        BookOrder {
            seq_num: seq_num(self.side, leaf),
            order_id: leaf.key,
            owner: leaf.owner,
            owner_slot: leaf.owner_slot,
            client_order_id: leaf.client_order_id,
            price: self.lots.price_lots_to_ui(price_lots),
            price_lots,
            size: self.lots.base_lots_to_ui(leaf.quantity),
            size_lots: leaf.quantity,
            side: self.side,
            timestamp: leaf.timestamp,
            expiry_timestamp: leaf.expiry(),
            is_expired: leaf.is_expired(self.now),
            is_oracle_pegged: oracle_pegged.is_some(),
            order_type: leaf.order_type,
            oracle_pegged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::{OrderType, OwnerKey, NEVER_EXPIRES};

    fn leaf(price_data: u64, sequence_bits: u64) -> LeafNode {
        LeafNode {
            owner_slot: 1,
            order_type: OrderType::Limit,
            time_in_force: 0,
            key: (u128::from(price_data) << 64) | u128::from(sequence_bits),
            owner: OwnerKey([2; 32]),
            quantity: 10,
            timestamp: 1_000,
            peg_limit: NO_PEG_LIMIT,
            client_order_id: 5,
        }
    }

    #[test]
    fn test_fixed_price_and_seq_num() {
        let ask = OrderMaterializer::new(Side::Ask, 1_000, LotConverter::identity());
        let order = ask.fixed(&leaf(105, 3));
        assert_eq!(order.price_lots, 105);
        assert_eq!(order.seq_num, 3);
        assert_eq!(order.order_id, (105u128 << 64) | 3);
        assert!(!order.is_oracle_pegged);
        assert_eq!(order.expiry_timestamp, NEVER_EXPIRES);

        let bid = OrderMaterializer::new(Side::Bid, 1_000, LotConverter::identity());
        let order = bid.fixed(&leaf(105, u64::MAX - 3));
        assert_eq!(order.seq_num, 3);
        assert_eq!(order.side, Side::Bid);
    }

    #[test]
    fn test_peg_offset_encoding() {
        for offset in [-250i64, -1, 0, 1, 17, i64::MAX, i64::MIN] {
            let encoded = leaf(peg_offset_to_price_data(offset), 0);
            assert_eq!(peg_offset_lots(&encoded), offset);
        }
        assert!(peg_offset_to_price_data(-1) < peg_offset_to_price_data(0));
    }

    #[test]
    fn test_oracle_pegged_pricing() {
        let ask = OrderMaterializer::new(Side::Ask, 1_000, LotConverter::identity());
        let pegged = leaf(peg_offset_to_price_data(-5), 1);

        let order = ask.oracle_pegged(&pegged, 100).unwrap();
        assert_eq!(order.price_lots, 95);
        assert!(order.is_oracle_pegged);
        let properties = order.oracle_pegged.unwrap();
        assert_eq!(properties.price_offset_lots, -5);
        assert!(!properties.is_invalid);
    }

    #[test]
    fn test_ask_peg_limit_crossed() {
        let ask = OrderMaterializer::new(Side::Ask, 1_000, LotConverter::identity());
        let mut pegged = leaf(peg_offset_to_price_data(-5), 1);
        pegged.peg_limit = 96;

        let order = ask.oracle_pegged(&pegged, 100).unwrap();
        assert_eq!(order.price_lots, 95);
        assert!(order.oracle_pegged.unwrap().is_invalid);
        assert!(!order.is_valid());
    }

    #[test]
    fn test_bid_peg_limit_rules() {
        assert!(is_peg_invalid(Side::Bid, 101, 100));
        assert!(!is_peg_invalid(Side::Bid, 100, 100));
        assert!(!is_peg_invalid(Side::Bid, 1_000_000, NO_PEG_LIMIT));
        assert!(is_peg_invalid(Side::Ask, 95, 96));
        assert!(!is_peg_invalid(Side::Ask, 96, 96));
    }

    #[test]
    fn test_pegged_overflow_is_skipped() {
        let bid = OrderMaterializer::new(Side::Bid, 1_000, LotConverter::identity());
        let pegged = leaf(peg_offset_to_price_data(10), 1);
        assert!(bid.oracle_pegged(&pegged, i64::MAX).is_none());
    }

    #[test]
    fn test_expiry_against_now() {
        let mut tif = leaf(100, 1);
        tif.time_in_force = 60;

        let at_expiry = OrderMaterializer::new(Side::Ask, 1_060, LotConverter::identity());
        assert!(!at_expiry.fixed(&tif).is_expired);

        let after = OrderMaterializer::new(Side::Ask, 1_061, LotConverter::identity());
        let order = after.fixed(&tif);
        assert!(order.is_expired);
        assert_eq!(order.expiry_timestamp, 1_060);
    }

    #[test]
    fn test_ui_scaling() {
        let lots = LotConverter::new(0.01, 0.001);
        let ask = OrderMaterializer::new(Side::Ask, 1_000, lots);
        let order = ask.fixed(&leaf(12_550, 1));
        assert!((order.price - 125.5).abs() < 1e-9);
        assert!((order.size - 0.01).abs() < 1e-12);
    }
}
