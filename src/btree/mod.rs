//! The on-disk B-tree core: page decoding, page navigation, in-order
//! cursors, and relational find.

pub mod cursor;
pub mod find;
pub mod navigator;
pub mod page;

pub use cursor::Cursor;
pub use find::Rel;
pub use navigator::{Meta, Navigator};
pub use page::{Act, IndexEntry, LayoutVariant, LeafEntry, Page};
