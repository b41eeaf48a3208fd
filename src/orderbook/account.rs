//! Decoder for the raw book-side account buffer.
//!
//! Layout, little endian, offsets from the start of the buffer:
//!
//! | bytes            | field                                  |
//! |------------------|----------------------------------------|
//! | `[0, 8)`         | account discriminator                  |
//! | `[8, 16)`        | fixed tree root                        |
//! | `[16, 24)`       | oracle pegged tree root                |
//! | `[24, 312)`      | reserved roots and padding             |
//! | `312`            | order tree type (0 bids, 1 asks)       |
//! | `[316, 328)`     | bump index, free list len, free list head |
//! | `[328, 840)`     | reserved                               |
//! | `[840, 90 952)`  | 1024 node slots of 88 bytes            |

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::orderbook::error::{BookError, BookResult};
use crate::orderbook::nodes::{Node, NODE_SIZE};
use crate::orderbook::types::{NodeHandle, OrderTreeKind, Side};

pub const MAX_ORDERTREE_NODES: usize = 1024;

/// Anchor account discriminator of the book-side account
pub const BOOK_SIDE_DISCRIMINATOR: [u8; 8] = [0x48, 0x2c, 0xe1, 0x8d, 0xb2, 0x82, 0x61, 0x39];

pub const DISCRIMINATOR_LEN: usize = 8;
pub const ROOTS_OFFSET: usize = 8;
pub const ROOT_SIZE: usize = 8;
pub const ORDER_TREE_TYPE_OFFSET: usize = 312;
pub const BUMP_INDEX_OFFSET: usize = 316;
pub const FREE_LIST_LEN_OFFSET: usize = 320;
pub const FREE_LIST_HEAD_OFFSET: usize = 324;
pub const NODES_OFFSET: usize = 840;
pub const BOOK_SIDE_LEN: usize = NODES_OFFSET + MAX_ORDERTREE_NODES * NODE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderTreeRoot {
    /// Only dereferenced when `leaf_count` is non-zero
    pub maybe_node: NodeHandle,
    pub leaf_count: u32,
}

impl OrderTreeRoot {
    pub fn node(&self) -> Option<NodeHandle> {
        (self.leaf_count != 0).then_some(self.maybe_node)
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    fn read(data: &[u8]) -> Self {
        Self {
            maybe_node: LittleEndian::read_u32(&data[0..4]),
            leaf_count: LittleEndian::read_u32(&data[4..8]),
        }
    }
}

/// Structural view of one book-side account, before tree validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSideAccount {
    pub roots: [OrderTreeRoot; 2],
    pub side: Side,
    pub bump_index: u32,
    pub free_list_len: u32,
    pub free_list_head: NodeHandle,
    pub nodes: Vec<Node>,
}

impl BookSideAccount {
    /// Parse a raw account buffer. The buffer is never modified.
    pub fn decode(data: &[u8], verify_discriminator: bool) -> BookResult<Self> {
        if data.len() != BOOK_SIDE_LEN {
            return Err(BookError::InvalidLength {
                expected: BOOK_SIDE_LEN,
                actual: data.len(),
            });
        }

        if verify_discriminator && data[..DISCRIMINATOR_LEN] != BOOK_SIDE_DISCRIMINATOR {
            return Err(BookError::InvalidDiscriminator);
        }

        let roots = [
            OrderTreeRoot::read(&data[ROOTS_OFFSET..ROOTS_OFFSET + ROOT_SIZE]),
            OrderTreeRoot::read(&data[ROOTS_OFFSET + ROOT_SIZE..ROOTS_OFFSET + 2 * ROOT_SIZE]),
        ];

        let tree_type = data[ORDER_TREE_TYPE_OFFSET];
        let side =
            Side::from_tree_type(tree_type).ok_or(BookError::InvalidOrderTreeType(tree_type))?;

        let nodes = data[NODES_OFFSET..]
            .chunks_exact(NODE_SIZE)
            .enumerate()
            .map(|(index, slot)| Node::decode(index as NodeHandle, slot))
            .collect::<BookResult<Vec<_>>>()?;

        let account = Self {
            roots,
            side,
            bump_index: LittleEndian::read_u32(&data[BUMP_INDEX_OFFSET..]),
            free_list_len: LittleEndian::read_u32(&data[FREE_LIST_LEN_OFFSET..]),
            free_list_head: LittleEndian::read_u32(&data[FREE_LIST_HEAD_OFFSET..]),
            nodes,
        };

        debug!(
            "Decoded {} book side account: fixed leaves {}, pegged leaves {}, bump index {}",
            account.side,
            account.roots[0].leaf_count,
            account.roots[1].leaf_count,
            account.bump_index
        );

        Ok(account)
    }

    pub fn root(&self, tree: OrderTreeKind) -> &OrderTreeRoot {
        &self.roots[tree.root_index()]
    }

    /// Write the account back into the ledger layout
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; BOOK_SIDE_LEN];
        data[..DISCRIMINATOR_LEN].copy_from_slice(&BOOK_SIDE_DISCRIMINATOR);

        for (i, root) in self.roots.iter().enumerate() {
            let offset = ROOTS_OFFSET + i * ROOT_SIZE;
            LittleEndian::write_u32(&mut data[offset..], root.maybe_node);
            LittleEndian::write_u32(&mut data[offset + 4..], root.leaf_count);
        }

        data[ORDER_TREE_TYPE_OFFSET] = self.side.tree_type();
        LittleEndian::write_u32(&mut data[BUMP_INDEX_OFFSET..], self.bump_index);
        LittleEndian::write_u32(&mut data[FREE_LIST_LEN_OFFSET..], self.free_list_len);
        LittleEndian::write_u32(&mut data[FREE_LIST_HEAD_OFFSET..], self.free_list_head);

        for (node, slot) in self
            .nodes
            .iter()
            .zip(data[NODES_OFFSET..].chunks_exact_mut(NODE_SIZE))
        {
            node.encode(slot);
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::nodes::{InnerNode, LeafNode};
    use crate::orderbook::types::{OrderType, OwnerKey};

    fn empty_account(side: Side) -> BookSideAccount {
        BookSideAccount {
            roots: [OrderTreeRoot::default(); 2],
            side,
            bump_index: 0,
            free_list_len: 0,
            free_list_head: 0,
            nodes: vec![Node::Empty; MAX_ORDERTREE_NODES],
        }
    }

    fn leaf(price: u64, seq: u64) -> Node {
        Node::Leaf(LeafNode {
            owner_slot: 0,
            order_type: OrderType::Limit,
            time_in_force: 0,
            key: (u128::from(price) << 64) | u128::from(seq),
            owner: OwnerKey::default(),
            quantity: 1,
            timestamp: 10,
            peg_limit: -1,
            client_order_id: 0,
        })
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(BOOK_SIDE_LEN, 90_952);
        assert_eq!(NODES_OFFSET, ORDER_TREE_TYPE_OFFSET + 16 + 512);
    }

    #[test]
    fn test_decode_header_fields() {
        let mut account = empty_account(Side::Ask);
        account.roots[0] = OrderTreeRoot {
            maybe_node: 2,
            leaf_count: 2,
        };
        account.bump_index = 3;
        account.free_list_len = 1;
        account.free_list_head = 7;
        account.nodes[0] = leaf(100, 1);
        account.nodes[1] = leaf(101, 2);
        account.nodes[2] = Node::Inner(InnerNode {
            prefix_len: 63,
            key: 100u128 << 64,
            children: [0, 1],
            child_earliest_expiry: [u64::MAX; 2],
        });

        let data = account.encode();
        assert_eq!(data.len(), BOOK_SIDE_LEN);
        assert_eq!(&data[8..12], &2u32.to_le_bytes());
        assert_eq!(data[312], 1);
        assert_eq!(&data[316..320], &3u32.to_le_bytes());

        let decoded = BookSideAccount::decode(&data, true).unwrap();
        assert_eq!(decoded, account);
        assert_eq!(decoded.root(OrderTreeKind::Fixed).node(), Some(2));
        assert_eq!(decoded.root(OrderTreeKind::OraclePegged).node(), None);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let data = vec![0u8; BOOK_SIDE_LEN - 1];
        assert_eq!(
            BookSideAccount::decode(&data, false),
            Err(BookError::InvalidLength {
                expected: BOOK_SIDE_LEN,
                actual: BOOK_SIDE_LEN - 1
            })
        );
    }

    #[test]
    fn test_discriminator_check() {
        let mut data = empty_account(Side::Bid).encode();
        data[0] ^= 0xff;

        assert_eq!(
            BookSideAccount::decode(&data, true),
            Err(BookError::InvalidDiscriminator)
        );
        assert!(BookSideAccount::decode(&data, false).is_ok());
    }

    #[test]
    fn test_decode_rejects_unknown_tree_type() {
        let mut data = empty_account(Side::Bid).encode();
        data[ORDER_TREE_TYPE_OFFSET] = 5;

        assert_eq!(
            BookSideAccount::decode(&data, true),
            Err(BookError::InvalidOrderTreeType(5))
        );
    }

    #[test]
    fn test_decode_does_not_touch_input() {
        let data = empty_account(Side::Bid).encode();
        let copy = data.clone();
        let _ = BookSideAccount::decode(&data, true).unwrap();
        assert_eq!(data, copy);
    }
}
