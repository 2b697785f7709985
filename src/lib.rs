//! Read-only access to IDA-style B-tree database files: container
//! generations v0 through v6, page layouts v1.5/v1.6/v2.0.
//!
//! The primary entry point is [`Database`], opened either over a single
//! bundle file or a directory of sibling section files.

pub mod btree;
pub mod container;
pub mod database;
pub mod error;
pub mod overlay;
pub mod sections;

pub use container::AddressWidth;
pub use database::{Database, Options};
pub use error::{IdbError, Result};
pub use overlay::NodeStore;
