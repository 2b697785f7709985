//! Top-level handle tying a [`Container`] to its B-tree navigator and
//! section readers.

use std::cell::RefCell;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;

use tracing::{info, instrument};

use crate::btree::Navigator;
use crate::container::{self, AddressWidth, Container, SharedSource};
use crate::error::Result;
use crate::overlay::NodeStore;
use crate::sections::opaque::OpaqueKind;
use crate::sections::{FlagReader, NameList, OpaqueSection};

/// Tunables for opening a database. Only the page cache is configurable
/// today; this is a builder rather than a config file because the crate is
/// an embedded library, not a standalone service.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    page_cache_size: Option<usize>,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    /// Bounds the number of decoded `id0` pages kept in memory. `None`
    /// (the default) disables the cache entirely.
    pub fn page_cache_size(mut self, size: usize) -> Self {
        self.page_cache_size = Some(size);
        self
    }
}

/// A read-only handle on an IDA-style database, in either container
/// generation.
pub struct Database {
    container: Container,
    navigator: Navigator,
}

impl Database {
    /// Opens a single-file bundle (any container generation, any page
    /// layout).
    #[instrument(skip(path))]
    pub fn open_bundle(path: impl AsRef<Path>, options: Options) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let source: SharedSource = Rc::new(RefCell::new(file));
        info!(path = %path.as_ref().display(), "opening bundle container");
        let container = Container::open_bundle(source)?;
        Self::from_container(container, options)
    }

    /// Opens a directory of sibling files (`id0`, `id1`, `nam`, `seg`,
    /// `til`, `id2`), matching `idblib.RecoverIDBFile`.
    #[instrument(skip(dir))]
    pub fn open_siblings(dir: impl AsRef<Path>, address_width: AddressWidth, options: Options) -> Result<Self> {
        let mut files: [Option<SharedSource>; 6] = Default::default();
        for (i, name) in container::SECTION_NAMES.iter().enumerate() {
            let path = dir.as_ref().join(name);
            if path.exists() {
                let file = File::open(&path)?;
                files[i] = Some(Rc::new(RefCell::new(file)));
            }
        }
        info!(dir = %dir.as_ref().display(), "opening sibling-file container");
        let container = Container::open_siblings(address_width, files);
        Self::from_container(container, options)
    }

    fn from_container(container: Container, options: Options) -> Result<Self> {
        let id0 = container.section(container::ID0)?.ok_or_else(|| {
            crate::error::IdbError::BadPage("id0 section (the primary B-tree) is absent".into())
        })?;
        if id0.encoding != container::Encoding::Raw {
            return Err(crate::error::IdbError::NotImplemented("compressed id0 section decoding"));
        }
        let navigator = Navigator::open(id0.window, options.page_cache_size)?;
        Ok(Database { container, navigator })
    }

    /// Direct access to the decoded B-tree, for callers who want relational
    /// find or raw cursors rather than the typed node overlay.
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Typed key/value access to the `id0` node-attribute store.
    pub fn nodes(&self) -> NodeStore<'_> {
        NodeStore::new(&self.navigator, self.container.address_width())
    }

    /// The `id1` byte-flag reader, if the container carries that section.
    pub fn flags(&self) -> Result<Option<FlagReader>> {
        match self.container.section(container::ID1)? {
            Some(section) => Ok(Some(FlagReader::open(section.window, self.container.address_width())?)),
            None => Ok(None),
        }
    }

    /// The `nam` named-address list, if present.
    pub fn names(&self) -> Result<Option<NameList>> {
        match self.container.section(container::NAM)? {
            Some(section) => Ok(Some(NameList::open(section.window, self.container.address_width())?)),
            None => Ok(None),
        }
    }

    /// The opaque `seg` segment-table section, if present.
    pub fn segments(&self) -> Result<Option<OpaqueSection>> {
        match self.container.section(container::SEG)? {
            Some(section) => Ok(Some(OpaqueSection::open(section.window, OpaqueKind::Segments)?)),
            None => Ok(None),
        }
    }

    /// The opaque `til` type-library section, if present.
    pub fn types(&self) -> Result<Option<OpaqueSection>> {
        match self.container.section(container::TIL)? {
            Some(section) => Ok(Some(OpaqueSection::open(section.window, OpaqueKind::Types)?)),
            None => Ok(None),
        }
    }

    /// The opaque `id2` packed-data section, if present.
    pub fn packed(&self) -> Result<Option<OpaqueSection>> {
        match self.container.section(container::ID2)? {
            Some(section) => Ok(Some(OpaqueSection::open(section.window, OpaqueKind::Packed)?)),
            None => Ok(None),
        }
    }
}
