//! `seg`/`til`/`id2` readers, grounded on `idblib.SEGFile`/`TILFile`/
//! `ID2File`: the original does nothing beyond opening the file, so this
//! crate validates what magic exists and otherwise exposes the raw window.

use crate::container::{SectionWindow, Whence};
use crate::error::{IdbError, Result};

const TIL_MAGIC: &[u8] = b"IDATIL";
const ID2_MAGIC: &[u8] = b"IDAS\x1d\xa5\x55\x55";

/// Which opaque section this reader was opened over, so the right magic
/// (if any) gets checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    Segments,
    Types,
    Packed,
}

/// A section with no parsed structure of its own: `seg` never had a
/// documented format in the original, `til` and `id2` carry only a magic
/// worth validating.
pub struct OpaqueSection {
    pub kind: OpaqueKind,
    window: SectionWindow,
}

impl OpaqueSection {
    pub fn open(mut window: SectionWindow, kind: OpaqueKind) -> Result<Self> {
        let expected = match kind {
            OpaqueKind::Segments => None,
            OpaqueKind::Types => Some(TIL_MAGIC),
            OpaqueKind::Packed => Some(ID2_MAGIC),
        };
        if let Some(magic) = expected {
            window.seek(0, Whence::Set)?;
            let head = window.read(magic.len())?;
            if head != magic {
                return Err(IdbError::BadMagic(format!("{:?}", head)));
            }
            window.seek(0, Whence::Set)?;
        }
        Ok(OpaqueSection { kind, window })
    }

    pub fn window(&mut self) -> &mut SectionWindow {
        &mut self.window
    }

    pub fn len(&self) -> u64 {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
