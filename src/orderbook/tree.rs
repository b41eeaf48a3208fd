//! Stack-based walks over one order tree of the arena.
//!
//! Trees can be deeper than is safe to recurse into, so both the lazy
//! iterator and the validating walk keep their own stack of handles.

use tracing::warn;

use crate::orderbook::account::OrderTreeRoot;
use crate::orderbook::error::{BookError, BookResult};
use crate::orderbook::nodes::{LeafNode, Node};
use crate::orderbook::types::{NodeHandle, OrderTreeKind, Side};

/// Child visited first and second for a side: bids walk high keys first
#[inline]
fn child_order(side: Side) -> (usize, usize) {
    match side {
        Side::Bid => (1, 0),
        Side::Ask => (0, 1),
    }
}

/// Iterates the leaves of one tree in price priority for its side
///
/// Assumes a tree accepted by [`walk_checked`]; handles that do not lead to
/// an inner node or a leaf are skipped.
#[derive(Debug, Clone)]
pub struct OrderTreeIter<'a> {
    nodes: &'a [Node],
    stack: Vec<NodeHandle>,
    left: usize,
    right: usize,
}

impl<'a> OrderTreeIter<'a> {
    pub fn new(nodes: &'a [Node], root: &OrderTreeRoot, side: Side) -> Self {
        let (left, right) = child_order(side);
        let stack = root.node().into_iter().collect();

        Self {
            nodes,
            stack,
            left,
            right,
        }
    }
}

impl<'a> Iterator for OrderTreeIter<'a> {
    type Item = (NodeHandle, &'a LeafNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(handle) = self.stack.pop() {
            match self.nodes.get(handle as usize) {
                Some(Node::Inner(inner)) => {
                    // Favoured child goes on top so it is popped first
                    self.stack.push(inner.children[self.right]);
                    self.stack.push(inner.children[self.left]);
                }
                Some(Node::Leaf(leaf)) => return Some((handle, leaf)),
                _ => {}
            }
        }
        None
    }
}

/// What a validating walk learned about one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub leaf_count: u32,
    pub inner_count: u32,
    pub max_depth: u32,
    /// Highest placement timestamp among the reached leaves
    pub max_timestamp: Option<u64>,
}

/// Walk every node reachable from `root`, rejecting anything a well-formed
/// tree cannot contain
pub fn walk_checked(
    nodes: &[Node],
    root: &OrderTreeRoot,
    tree: OrderTreeKind,
    verify_leaf_count: bool,
) -> BookResult<TreeStats> {
    let mut stats = TreeStats::default();
    let Some(start) = root.node() else {
        return Ok(stats);
    };

    let mut stack: Vec<(NodeHandle, u32)> = vec![(start, 1)];
    let mut visited = 0usize;

    while let Some((handle, depth)) = stack.pop() {
        visited += 1;
        if visited > nodes.len() {
            warn!("Walk of {} tree exceeded arena size", tree);
            return Err(BookError::CyclicTree { tree });
        }

        let node = nodes
            .get(handle as usize)
            .ok_or(BookError::NodeOutOfBounds { handle })?;

        stats.max_depth = stats.max_depth.max(depth);

        match node {
            Node::Inner(inner) => {
                stats.inner_count += 1;
                stack.push((inner.children[1], depth + 1));
                stack.push((inner.children[0], depth + 1));
            }
            Node::Leaf(leaf) => {
                stats.leaf_count += 1;
                stats.max_timestamp = Some(
                    stats
                        .max_timestamp
                        .map_or(leaf.timestamp, |ts| ts.max(leaf.timestamp)),
                );
            }
            Node::Empty | Node::Free { .. } => {
                return Err(BookError::DanglingNode {
                    handle,
                    tag: node.tag(),
                });
            }
            Node::Unknown(tag) => {
                return Err(BookError::UnknownNodeTag { handle, tag: *tag });
            }
        }
    }

    if verify_leaf_count && stats.leaf_count != root.leaf_count {
        return Err(BookError::LeafCountMismatch {
            tree,
            expected: root.leaf_count,
            actual: stats.leaf_count,
        });
    }

    Ok(stats)
}
