use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::time::to_utc;

pub type PriceLots = i64; // Price in quote lots per base lot
pub type BaseLots = i64;
pub type NodeHandle = u32; // Index into the node arena

/// Expiry timestamp of an order placed without a time in force
pub const NEVER_EXPIRES: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Map the `order_tree_type` header byte to a side
    pub fn from_tree_type(value: u8) -> Option<Self> {
        match value {
            0 => Some(Side::Bid),
            1 => Some(Side::Ask),
            _ => None,
        }
    }

    pub fn tree_type(self) -> u8 {
        match self {
            Side::Bid => 0,
            Side::Ask => 1,
        }
    }

    /// Returns true if `a` is a strictly better price than `b` on this side
    pub fn is_price_better(self, a: PriceLots, b: PriceLots) -> bool {
        match self {
            Side::Bid => a > b,
            Side::Ask => a < b,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Ask => write!(f, "ASK"),
        }
    }
}

/// The two order trees stored in every book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderTreeKind {
    Fixed,
    OraclePegged,
}

impl OrderTreeKind {
    /// Position of this tree's root in the account header
    pub fn root_index(self) -> usize {
        match self {
            OrderTreeKind::Fixed => 0,
            OrderTreeKind::OraclePegged => 1,
        }
    }
}

impl fmt::Display for OrderTreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderTreeKind::Fixed => write!(f, "fixed"),
            OrderTreeKind::OraclePegged => write!(f, "oracle_pegged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    ImmediateOrCancel, // IOC
    PostOnly,
    Market,
    PostOnlySlide,
}

impl TryFrom<u8> for OrderType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OrderType::Limit),
            1 => Ok(OrderType::ImmediateOrCancel),
            2 => Ok(OrderType::PostOnly),
            3 => Ok(OrderType::Market),
            4 => Ok(OrderType::PostOnlySlide),
            other => Err(other),
        }
    }
}

impl From<OrderType> for u8 {
    fn from(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Limit => 0,
            OrderType::ImmediateOrCancel => 1,
            OrderType::PostOnly => 2,
            OrderType::Market => 3,
            OrderType::PostOnlySlide => 4,
        }
    }
}

/// 32-byte identity of the account owning an order
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OwnerKey(pub [u8; 32]);

impl OwnerKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerKey({})", self)
    }
}

/// Extra state carried by orders priced relative to the oracle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OraclePeggedProperties {
    pub price_offset_lots: PriceLots,
    pub ui_price_offset: f64,
    /// -1 means no limit
    pub peg_limit: PriceLots,
    pub ui_peg_limit: f64,
    /// The oracle moved the order's price beyond its peg limit
    pub is_invalid: bool,
}

/// A resting order, fully priced for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookOrder {
    /// Side-normalized placement sequence: lower means placed earlier
    pub seq_num: u64,
    /// Raw 128-bit tree key
    pub order_id: u128,
    pub owner: OwnerKey,
    pub owner_slot: u8,
    pub client_order_id: u64,
    pub price: f64,
    pub price_lots: PriceLots,
    pub size: f64,
    pub size_lots: BaseLots,
    pub side: Side,
    pub timestamp: u64,
    pub expiry_timestamp: u64,
    pub is_expired: bool,
    pub is_oracle_pegged: bool,
    pub order_type: OrderType,
    pub oracle_pegged: Option<OraclePeggedProperties>,
}

impl BookOrder {
    /// Not expired and, if pegged, still inside its peg limit
    pub fn is_valid(&self) -> bool {
        !self.is_expired
            && self
                .oracle_pegged
                .map_or(true, |pegged| !pegged.is_invalid)
    }

    /// Expiry timestamp, or None for orders without a time in force
    pub fn expires(&self) -> Option<u64> {
        (self.expiry_timestamp != NEVER_EXPIRES).then_some(self.expiry_timestamp)
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        to_utc(self.timestamp)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires().and_then(to_utc)
    }
}

/// Aggregated size resting at one price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L2Level {
    pub price_lots: PriceLots,
    pub size_lots: BaseLots,
    pub price: f64,
    pub size: f64,
    pub order_count: u32,
}

/// Depth view of both sides at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub now: u64,
    pub captured_at: Option<DateTime<Utc>>,
    pub oracle_price_lots: Option<PriceLots>,
    pub bids: Vec<L2Level>,
    pub asks: Vec<L2Level>,
    pub spread_lots: Option<PriceLots>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> BookOrder {
        BookOrder {
            seq_num: 7,
            order_id: (100u128 << 64) | 7,
            owner: OwnerKey([1; 32]),
            owner_slot: 0,
            client_order_id: 42,
            price: 100.0,
            price_lots: 100,
            size: 5.0,
            size_lots: 5,
            side: Side::Ask,
            timestamp: 1_700_000_000,
            expiry_timestamp: NEVER_EXPIRES,
            is_expired: false,
            is_oracle_pegged: false,
            order_type: OrderType::Limit,
            oracle_pegged: None,
        }
    }

    #[test]
    fn test_side_price_priority() {
        assert!(Side::Bid.is_price_better(105, 100));
        assert!(!Side::Bid.is_price_better(100, 100));
        assert!(Side::Ask.is_price_better(100, 105));
        assert_eq!(Side::Bid.opposite(), Side::Ask);
    }

    #[test]
    fn test_tree_type_roundtrip() {
        assert_eq!(Side::from_tree_type(0), Some(Side::Bid));
        assert_eq!(Side::from_tree_type(1), Some(Side::Ask));
        assert_eq!(Side::from_tree_type(2), None);
        assert_eq!(Side::Ask.tree_type(), 1);
    }

    #[test]
    fn test_order_type_bytes() {
        assert_eq!(OrderType::try_from(4), Ok(OrderType::PostOnlySlide));
        assert_eq!(OrderType::try_from(9), Err(9));
        assert_eq!(u8::from(OrderType::ImmediateOrCancel), 1);
    }

    #[test]
    fn test_owner_key_display() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let rendered = OwnerKey(bytes).to_string();
        assert_eq!(rendered.len(), 64);
        assert!(rendered.starts_with("ab00"));
    }

    #[test]
    fn test_order_validity() {
        let mut order = sample_order();
        assert!(order.is_valid());
        assert_eq!(order.expires(), None);
        assert!(order.placed_at().is_some());

        order.is_oracle_pegged = true;
        order.oracle_pegged = Some(OraclePeggedProperties {
            price_offset_lots: -3,
            ui_price_offset: -3.0,
            peg_limit: 90,
            ui_peg_limit: 90.0,
            is_invalid: true,
        });
        assert!(!order.is_valid());

        let mut expired = sample_order();
        expired.is_expired = true;
        assert!(!expired.is_valid());
    }

    #[test]
    fn test_order_serialization() {
        let order = sample_order();
        let serialized = serde_json::to_string(&order).unwrap();
        let deserialized: BookOrder = serde_json::from_str(&serialized).unwrap();
        assert_eq!(order, deserialized);
    }
}
