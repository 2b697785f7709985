//! Container generations: a single bundle file, or a directory of sibling
//! files, each exposing the same six logical sections.

pub mod header;
pub mod section;

pub use header::{AddressWidth, ContainerHeader, Encoding, Section, SECTION_NAMES};
pub use section::{SectionWindow, SharedSource, Source, Whence};

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;

pub const ID0: usize = 0;
pub const ID1: usize = 1;
pub const NAM: usize = 2;
pub const SEG: usize = 3;
pub const TIL: usize = 4;
pub const ID2: usize = 5;

/// Either container generation: a bundle file with a header, or a
/// directory of sibling files with one real file per section
/// (`idblib.RecoverIDBFile`).
pub enum Container {
    Bundle { header: ContainerHeader, source: SharedSource },
    Siblings { address_width: AddressWidth, files: [Option<SharedSource>; 6] },
}

impl Container {
    pub fn open_bundle(source: SharedSource) -> Result<Self> {
        let mut hdr = vec![0u8; 256];
        {
            let mut s = source.borrow_mut();
            s.seek(SeekFrom::Start(0))?;
            s.read_exact(&mut hdr)?;
        }
        let header = ContainerHeader::parse(&hdr)?;
        Ok(Container::Bundle { header, source })
    }

    pub fn open_siblings(address_width: AddressWidth, files: [Option<SharedSource>; 6]) -> Self {
        Container::Siblings { address_width, files }
    }

    pub fn address_width(&self) -> AddressWidth {
        match self {
            Container::Bundle { header, .. } => header.address_width,
            Container::Siblings { address_width, .. } => *address_width,
        }
    }

    /// Opens section `index` (see [`ID0`]..[`ID2`]), regardless of which
    /// container generation backs this instance.
    pub fn section(&self, index: usize) -> Result<Option<Section>> {
        match self {
            Container::Bundle { header, source } => header.open_section(index, source.clone()),
            Container::Siblings { files, .. } => match &files[index] {
                None => Ok(None),
                Some(source) => {
                    let len = {
                        let mut s = source.borrow_mut();
                        s.seek(SeekFrom::End(0))?
                    };
                    Ok(Some(Section {
                        encoding: Encoding::Raw,
                        window: SectionWindow::new(source.clone(), 0, len),
                    }))
                }
            },
        }
    }
}
