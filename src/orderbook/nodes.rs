//! Tagged node model for the book-side arena.
//!
//! Every arena slot is `NODE_SIZE` bytes. Byte 0 is the tag; the remaining
//! bytes are interpreted according to it. Inner nodes have exactly two
//! children whose keys share the top `prefix_len` bits; the child at index 0
//! holds the lower keys.

use byteorder::{ByteOrder, LittleEndian};

use crate::orderbook::error::{BookError, BookResult};
use crate::orderbook::types::{NodeHandle, OrderType, OwnerKey, NEVER_EXPIRES};

pub const NODE_SIZE: usize = 88;

// Inner node field offsets
const INNER_PREFIX_LEN: usize = 4;
const INNER_KEY: usize = 8;
const INNER_CHILDREN: usize = 24;
const INNER_CHILD_EARLIEST_EXPIRY: usize = 32;

// Leaf node field offsets
const LEAF_OWNER_SLOT: usize = 1;
const LEAF_ORDER_TYPE: usize = 2;
const LEAF_TIME_IN_FORCE: usize = 4;
const LEAF_KEY: usize = 8;
const LEAF_OWNER: usize = 24;
const LEAF_QUANTITY: usize = 56;
const LEAF_TIMESTAMP: usize = 64;
const LEAF_PEG_LIMIT: usize = 72;
const LEAF_CLIENT_ORDER_ID: usize = 80;

// Free node field offsets
const FREE_NEXT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeTag {
    Uninitialized = 0,
    Inner = 1,
    Leaf = 2,
    Free = 3,
    LastFree = 4,
}

impl TryFrom<u8> for NodeTag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeTag::Uninitialized),
            1 => Ok(NodeTag::Inner),
            2 => Ok(NodeTag::Leaf),
            3 => Ok(NodeTag::Free),
            4 => Ok(NodeTag::LastFree),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerNode {
    /// Number of highest key bits shared by everything below this node
    pub prefix_len: u32,
    pub key: u128,
    pub children: [NodeHandle; 2],
    pub child_earliest_expiry: [u64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafNode {
    pub owner_slot: u8,
    pub order_type: OrderType,
    /// Seconds after `timestamp` at which the order expires, 0 for never
    pub time_in_force: u16,
    pub key: u128,
    pub owner: OwnerKey,
    pub quantity: i64,
    pub timestamp: u64,
    /// Only meaningful for oracle pegged orders, -1 for no limit
    pub peg_limit: i64,
    pub client_order_id: u64,
}

impl LeafNode {
    /// Upper key half: a price for fixed orders, a biased offset for pegged ones
    #[inline]
    pub fn price_data(&self) -> u64 {
        (self.key >> 64) as u64
    }

    /// Lower key half, the placement sequence as stored in the tree
    #[inline]
    pub fn sequence_bits(&self) -> u64 {
        self.key as u64
    }

    /// Time at which this order expires, `NEVER_EXPIRES` if it has no time in force
    #[inline]
    pub fn expiry(&self) -> u64 {
        if self.time_in_force == 0 {
            NEVER_EXPIRES
        } else {
            self.timestamp.saturating_add(u64::from(self.time_in_force))
        }
    }

    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expiry()
    }
}

/// One decoded arena slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Empty,
    Inner(InnerNode),
    Leaf(LeafNode),
    Free { next: NodeHandle, last: bool },
    Unknown(u8),
}

impl Node {
    /// Decode one slot. `slot` must be exactly `NODE_SIZE` bytes, tag included.
    pub fn decode(handle: NodeHandle, slot: &[u8]) -> BookResult<Self> {
        debug_assert_eq!(slot.len(), NODE_SIZE);

        let tag = match NodeTag::try_from(slot[0]) {
            Ok(tag) => tag,
            Err(other) => return Ok(Node::Unknown(other)),
        };

        let node = match tag {
            NodeTag::Uninitialized => Node::Empty,
            NodeTag::Inner => Node::Inner(InnerNode {
                prefix_len: LittleEndian::read_u32(&slot[INNER_PREFIX_LEN..]),
                key: LittleEndian::read_u128(&slot[INNER_KEY..]),
                children: [
                    LittleEndian::read_u32(&slot[INNER_CHILDREN..]),
                    LittleEndian::read_u32(&slot[INNER_CHILDREN + 4..]),
                ],
                child_earliest_expiry: [
                    LittleEndian::read_u64(&slot[INNER_CHILD_EARLIEST_EXPIRY..]),
                    LittleEndian::read_u64(&slot[INNER_CHILD_EARLIEST_EXPIRY + 8..]),
                ],
            }),
            NodeTag::Leaf => {
                let order_type = OrderType::try_from(slot[LEAF_ORDER_TYPE])
                    .map_err(|value| BookError::InvalidOrderType { handle, value })?;

                let mut owner = [0u8; 32];
                owner.copy_from_slice(&slot[LEAF_OWNER..LEAF_OWNER + 32]);

                Node::Leaf(LeafNode {
                    owner_slot: slot[LEAF_OWNER_SLOT],
                    order_type,
                    time_in_force: LittleEndian::read_u16(&slot[LEAF_TIME_IN_FORCE..]),
                    key: LittleEndian::read_u128(&slot[LEAF_KEY..]),
                    owner: OwnerKey(owner),
                    quantity: LittleEndian::read_i64(&slot[LEAF_QUANTITY..]),
                    timestamp: LittleEndian::read_u64(&slot[LEAF_TIMESTAMP..]),
                    peg_limit: LittleEndian::read_i64(&slot[LEAF_PEG_LIMIT..]),
                    client_order_id: LittleEndian::read_u64(&slot[LEAF_CLIENT_ORDER_ID..]),
                })
            }
            NodeTag::Free | NodeTag::LastFree => Node::Free {
                next: LittleEndian::read_u32(&slot[FREE_NEXT..]),
                last: tag == NodeTag::LastFree,
            },
        };

        Ok(node)
    }

    /// Write this node into a zeroed slot using the ledger layout
    pub fn encode(&self, slot: &mut [u8]) {
        debug_assert_eq!(slot.len(), NODE_SIZE);
        slot.fill(0);

        match self {
            Node::Empty => {}
            Node::Inner(inner) => {
                slot[0] = NodeTag::Inner as u8;
                LittleEndian::write_u32(&mut slot[INNER_PREFIX_LEN..], inner.prefix_len);
                LittleEndian::write_u128(&mut slot[INNER_KEY..], inner.key);
                LittleEndian::write_u32(&mut slot[INNER_CHILDREN..], inner.children[0]);
                LittleEndian::write_u32(&mut slot[INNER_CHILDREN + 4..], inner.children[1]);
                LittleEndian::write_u64(
                    &mut slot[INNER_CHILD_EARLIEST_EXPIRY..],
                    inner.child_earliest_expiry[0],
                );
                LittleEndian::write_u64(
                    &mut slot[INNER_CHILD_EARLIEST_EXPIRY + 8..],
                    inner.child_earliest_expiry[1],
                );
            }
            Node::Leaf(leaf) => {
                slot[0] = NodeTag::Leaf as u8;
                slot[LEAF_OWNER_SLOT] = leaf.owner_slot;
                slot[LEAF_ORDER_TYPE] = leaf.order_type.into();
                LittleEndian::write_u16(&mut slot[LEAF_TIME_IN_FORCE..], leaf.time_in_force);
                LittleEndian::write_u128(&mut slot[LEAF_KEY..], leaf.key);
                slot[LEAF_OWNER..LEAF_OWNER + 32].copy_from_slice(leaf.owner.as_bytes());
                LittleEndian::write_i64(&mut slot[LEAF_QUANTITY..], leaf.quantity);
                LittleEndian::write_u64(&mut slot[LEAF_TIMESTAMP..], leaf.timestamp);
                LittleEndian::write_i64(&mut slot[LEAF_PEG_LIMIT..], leaf.peg_limit);
                LittleEndian::write_u64(&mut slot[LEAF_CLIENT_ORDER_ID..], leaf.client_order_id);
            }
            Node::Free { next, last } => {
                slot[0] = if *last {
                    NodeTag::LastFree as u8
                } else {
                    NodeTag::Free as u8
                };
                LittleEndian::write_u32(&mut slot[FREE_NEXT..], *next);
            }
            Node::Unknown(tag) => slot[0] = *tag,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Node::Empty => NodeTag::Uninitialized as u8,
            Node::Inner(_) => NodeTag::Inner as u8,
            Node::Leaf(_) => NodeTag::Leaf as u8,
            Node::Free { last: false, .. } => NodeTag::Free as u8,
            Node::Free { last: true, .. } => NodeTag::LastFree as u8,
            Node::Unknown(tag) => *tag,
        }
    }

    #[inline]
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    #[inline]
    pub fn as_inner(&self) -> Option<&InnerNode> {
        match self {
            Node::Inner(inner) => Some(inner),
            _ => None,
        }
    }
}
