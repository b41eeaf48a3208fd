//! Read-side view of an on-ledger perp order book
//!
//! This module decodes book-side account buffers into an arena of tagged
//! nodes and answers price-time ordered queries over them.

pub mod account;
pub mod book;
pub mod book_side;
pub mod error;
pub mod nodes;
pub mod order;
pub mod price_level;
pub mod tree;
pub mod types;

// Re-export main types for convenience
pub use account::{BookSideAccount, OrderTreeRoot, BOOK_SIDE_LEN};
pub use book::{Book, BookStats};
pub use book_side::{BookSide, BookSideItems};
pub use error::{BookError, BookResult};
pub use nodes::{InnerNode, LeafNode, Node};
pub use price_level::{diff_levels, LevelUpdate};
pub use types::{
    BookOrder, BookSnapshot, L2Level, NodeHandle, OraclePeggedProperties, OrderTreeKind,
    OrderType, OwnerKey, PriceLots, Side,
};
