use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::types::{NodeHandle, OrderTreeKind, Side};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookError {
    /// Buffer is not exactly one book-side account long
    InvalidLength { expected: usize, actual: usize },

    /// Leading bytes are not the book-side account discriminator
    InvalidDiscriminator,

    /// Header byte names neither the bid nor the ask tree
    InvalidOrderTreeType(u8),

    /// Leaf slot carries an order type outside the known set
    InvalidOrderType { handle: NodeHandle, value: u8 },

    /// Reachable slot carries a tag that is neither inner nor leaf
    UnknownNodeTag { handle: NodeHandle, tag: u8 },

    /// Root or child handle points past the end of the arena
    NodeOutOfBounds { handle: NodeHandle },

    /// Reachable handle points at an empty or free slot
    DanglingNode { handle: NodeHandle, tag: u8 },

    /// Walking a tree visited more nodes than the arena holds
    CyclicTree { tree: OrderTreeKind },

    /// Root leaf count differs from the leaves reachable from it
    LeafCountMismatch {
        tree: OrderTreeKind,
        expected: u32,
        actual: u32,
    },

    /// Book side decoded for the other side of the book
    SideMismatch { expected: Side, actual: Side },
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::InvalidLength { expected, actual } => {
                write!(f, "Invalid account length: expected {} bytes, got {}", expected, actual)
            }
            BookError::InvalidDiscriminator => write!(f, "Invalid book side discriminator"),
            BookError::InvalidOrderTreeType(value) => {
                write!(f, "Invalid order tree type: {}", value)
            }
            BookError::InvalidOrderType { handle, value } => {
                write!(f, "Invalid order type {} in leaf {}", value, handle)
            }
            BookError::UnknownNodeTag { handle, tag } => {
                write!(f, "Unknown tag {} on reachable node {}", tag, handle)
            }
            BookError::NodeOutOfBounds { handle } => {
                write!(f, "Node handle {} is outside the arena", handle)
            }
            BookError::DanglingNode { handle, tag } => {
                write!(f, "Node {} is not in use (tag {})", handle, tag)
            }
            BookError::CyclicTree { tree } => write!(f, "Cycle detected in {} tree", tree),
            BookError::LeafCountMismatch {
                tree,
                expected,
                actual,
            } => write!(
                f,
                "Leaf count mismatch in {} tree: root says {}, found {}",
                tree, expected, actual
            ),
            BookError::SideMismatch { expected, actual } => {
                write!(f, "Side mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for BookError {}

/// Result type for book-side decoding and queries
pub type BookResult<T> = Result<T, BookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BookError::InvalidLength {
                expected: 90952,
                actual: 12
            }
            .to_string(),
            "Invalid account length: expected 90952 bytes, got 12"
        );
        assert_eq!(
            BookError::InvalidDiscriminator.to_string(),
            "Invalid book side discriminator"
        );
        assert_eq!(
            BookError::LeafCountMismatch {
                tree: OrderTreeKind::OraclePegged,
                expected: 3,
                actual: 2
            }
            .to_string(),
            "Leaf count mismatch in oracle_pegged tree: root says 3, found 2"
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = BookError::DanglingNode { handle: 17, tag: 0 };
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: BookError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
