//! External collaborator readers for the non-B-tree sections: `id1`
//! (flags), `nam` (names), and the opaque `seg`/`til`/`id2` blobs.
//!
//! Per spec.md section 4.8 these sit outside the B-tree core's scope; we
//! still implement their wire formats honestly (`idblib.py` documents them
//! precisely) rather than leaving pure stubs.

pub mod flags;
pub mod names;
pub mod opaque;

pub use flags::FlagReader;
pub use names::NameList;
pub use opaque::OpaqueSection;
