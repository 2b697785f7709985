//! Error kinds for reading an IDA-style database.
//!
//! Mirrors the status-vs-option split the teacher engine uses: corruption
//! and format mismatches are [`IdbError`] variants, while a miss on an
//! exact-match lookup is modeled as `Option::None`, never an error.

use thiserror::Error;

/// Errors surfaced while parsing a container, a page, or a composite key.
#[derive(Error, Debug)]
pub enum IdbError {
    /// Container or section signature did not match any known literal.
    #[error("bad magic: {0}")]
    BadMagic(String),

    /// Version field was outside the supported range.
    #[error("unsupported format version: {0}")]
    BadVersion(u16),

    /// Section encoding byte was neither raw (0x00) nor compressed (0x02).
    #[error("unsupported section encoding: 0x{0:02x}")]
    UnsupportedEncoding(u8),

    /// A seek landed outside the window's `[0, end-start]` range.
    #[error("seek to {offset} is outside the section window")]
    BadOffset { offset: i64 },

    /// A read could not be satisfied within the window's remaining bytes.
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },

    /// A page's entry table, record offsets, or key ordering is invalid.
    #[error("corrupt page: {0}")]
    BadPage(String),

    /// `int()` was applied to a value of unsupported length.
    #[error("cannot decode a {0}-byte value as an integer")]
    BadInt(usize),

    /// Compressed-section decoding is a documented stub (spec §9).
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Passthrough I/O failure from the underlying file(s).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IdbError>;
