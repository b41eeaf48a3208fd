//! Synthetic book-side accounts for tests, benchmarks and local tooling.
//!
//! The builder lays leaves out the way the ledger program would: every tree
//! is a binary tree over sorted 128-bit keys, lower keys under child 0, and
//! bid keys carry the inverted placement sequence in their low half.

use crate::orderbook::account::{BookSideAccount, OrderTreeRoot, MAX_ORDERTREE_NODES};
use crate::orderbook::error::{BookError, BookResult};
use crate::orderbook::nodes::{InnerNode, LeafNode, Node};
use crate::orderbook::order::{peg_offset_to_price_data, NO_PEG_LIMIT};
use crate::orderbook::types::{
    BaseLots, NodeHandle, OrderTreeKind, OrderType, OwnerKey, PriceLots, Side,
};

pub const DEFAULT_TIMESTAMP: u64 = 1_700_000_000;

/// One order to place into a synthetic book side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSpec {
    pub tree: OrderTreeKind,
    /// Fixed price, or the signed oracle offset for pegged orders
    pub price_lots: PriceLots,
    /// Placement sequence, lower is earlier
    pub seq: u64,
    pub quantity: BaseLots,
    pub timestamp: u64,
    pub time_in_force: u16,
    pub peg_limit: PriceLots,
    pub owner: OwnerKey,
    pub owner_slot: u8,
    pub order_type: OrderType,
    pub client_order_id: u64,
}

impl LeafSpec {
    pub fn fixed(price_lots: PriceLots, seq: u64, quantity: BaseLots) -> Self {
        Self {
            tree: OrderTreeKind::Fixed,
            price_lots,
            seq,
            quantity,
            timestamp: DEFAULT_TIMESTAMP,
            time_in_force: 0,
            peg_limit: NO_PEG_LIMIT,
            owner: OwnerKey::default(),
            owner_slot: 0,
            order_type: OrderType::Limit,
            client_order_id: seq,
        }
    }

    pub fn pegged(offset_lots: PriceLots, peg_limit: PriceLots, seq: u64, quantity: BaseLots) -> Self {
        Self {
            tree: OrderTreeKind::OraclePegged,
            price_lots: offset_lots,
            peg_limit,
            ..Self::fixed(0, seq, quantity)
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_time_in_force(mut self, time_in_force: u16) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    pub fn with_owner(mut self, owner: OwnerKey, owner_slot: u8) -> Self {
        self.owner = owner;
        self.owner_slot = owner_slot;
        self
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    pub fn with_client_order_id(mut self, client_order_id: u64) -> Self {
        self.client_order_id = client_order_id;
        self
    }

    /// Tree key as the ledger would store it on `side`
    pub fn key(&self, side: Side) -> u128 {
        let price_data = match self.tree {
            OrderTreeKind::Fixed => self.price_lots as u64,
            OrderTreeKind::OraclePegged => peg_offset_to_price_data(self.price_lots),
        };
        let sequence_bits = match side {
            Side::Bid => u64::MAX - self.seq,
            Side::Ask => self.seq,
        };
        (u128::from(price_data) << 64) | u128::from(sequence_bits)
    }

    fn to_leaf(&self, side: Side) -> LeafNode {
        LeafNode {
            owner_slot: self.owner_slot,
            order_type: self.order_type,
            time_in_force: self.time_in_force,
            key: self.key(side),
            owner: self.owner,
            quantity: self.quantity,
            timestamp: self.timestamp,
            peg_limit: self.peg_limit,
            client_order_id: self.client_order_id,
        }
    }
}

/// Builds byte-exact book-side buffers. Keys must be unique per tree.
#[derive(Debug, Clone)]
pub struct BookSideBuilder {
    side: Side,
    leaves: Vec<LeafSpec>,
}

impl BookSideBuilder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            leaves: Vec::new(),
        }
    }

    pub fn leaf(mut self, spec: LeafSpec) -> Self {
        self.leaves.push(spec);
        self
    }

    pub fn leaves(mut self, specs: impl IntoIterator<Item = LeafSpec>) -> Self {
        self.leaves.extend(specs);
        self
    }

    pub fn build_account(&self) -> BookResult<BookSideAccount> {
        let mut arena = Arena::default();
        let mut roots = [OrderTreeRoot::default(); 2];

        for tree in [OrderTreeKind::Fixed, OrderTreeKind::OraclePegged] {
            let mut leaves: Vec<LeafNode> = self
                .leaves
                .iter()
                .filter(|spec| spec.tree == tree)
                .map(|spec| spec.to_leaf(self.side))
                .collect();
            leaves.sort_by_key(|leaf| leaf.key);

            if !leaves.is_empty() {
                let (handle, _) = arena.build_subtree(&leaves)?;
                roots[tree.root_index()] = OrderTreeRoot {
                    maybe_node: handle,
                    leaf_count: leaves.len() as u32,
                };
            }
        }

        let bump_index = arena.nodes.len() as u32;
        let mut nodes = arena.nodes;
        nodes.resize(MAX_ORDERTREE_NODES, Node::Empty);

        Ok(BookSideAccount {
            roots,
            side: self.side,
            bump_index,
            free_list_len: 0,
            free_list_head: 0,
            nodes,
        })
    }

    /// Encoded account buffer
    pub fn build(&self) -> BookResult<Vec<u8>> {
        Ok(self.build_account()?.encode())
    }
}

#[derive(Default)]
struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    fn alloc(&mut self, node: Node) -> BookResult<NodeHandle> {
        let handle = self.nodes.len() as NodeHandle;
        if self.nodes.len() >= MAX_ORDERTREE_NODES {
            return Err(BookError::NodeOutOfBounds { handle });
        }
        self.nodes.push(node);
        Ok(handle)
    }

    /// Returns the subtree handle and its earliest expiry. `leaves` is non-empty.
    fn build_subtree(&mut self, leaves: &[LeafNode]) -> BookResult<(NodeHandle, u64)> {
        if let [leaf] = leaves {
            return Ok((self.alloc(Node::Leaf(*leaf))?, leaf.expiry()));
        }

        let (lower, upper) = leaves.split_at(leaves.len() / 2);
        let first = lower[0].key;
        let last = upper[upper.len() - 1].key;

        let (left, left_expiry) = self.build_subtree(lower)?;
        let (right, right_expiry) = self.build_subtree(upper)?;

        let handle = self.alloc(Node::Inner(InnerNode {
            prefix_len: (first ^ last).leading_zeros(),
            key: first,
            children: [left, right],
            child_earliest_expiry: [left_expiry, right_expiry],
        }))?;
        Ok((handle, left_expiry.min(right_expiry)))
    }
}
