//! Page navigator (C4), grounded on `idblib.BTree.__init__`'s meta-header
//! dispatch and its page-cache wrapping of `FileSection.seek`/`read`.

use std::cell::RefCell;

use byteorder::{LittleEndian, ReadBytesExt};
use lru::LruCache;
use std::io::Cursor as ByteCursor;
use std::num::NonZeroUsize;

use crate::container::{SectionWindow, Whence};
use crate::error::{IdbError, Result};

use super::page::{decode, LayoutVariant, Page};

const V15_LITERAL: &[u8] = b"B-tree v 1.5 (C) Pol 1990";
const V16_LITERAL: &[u8] = b"B-tree v 1.6 (C) Pol 1990";
const V20_LITERAL: &[u8] = b"B-tree v2";

/// Decoded fixed 64-byte B-tree meta-header (page 0). `firstfree`, the
/// head of the free-page list, is part of the original layout but has no
/// read-only use here and isn't kept.
#[derive(Debug, Clone, Copy)]
pub struct Meta {
    pub page_size: u16,
    pub root_page: u32,
    pub record_count: u32,
    pub page_count: u32,
    pub layout: LayoutVariant,
}

/// Sequential reader over a section's fixed-size pages, with an optional
/// LRU cache of already-decoded pages.
///
/// The teacher keeps a bare `HashMap` cache inline on its page-table
/// struct; we follow the same "cache lives on the thing that reads pages"
/// shape but swap in a bounded `lru::LruCache` so long cursor walks over a
/// huge tree don't grow unbounded memory.
pub struct Navigator {
    window: RefCell<SectionWindow>,
    meta: Meta,
    cache: RefCell<Option<LruCache<u32, Page>>>,
}

impl Navigator {
    /// Reads the 64-byte meta-header at the front of `window` and detects
    /// the page layout from the version literal embedded at offset 13
    /// (v1.5) or offset 19 (v1.6/v2.0), per `idblib.BTree.__init__`.
    pub fn open(mut window: SectionWindow, page_cache_size: Option<usize>) -> Result<Self> {
        window.seek(0, Whence::Set)?;
        let head = window.read_exact(64)?;

        let layout = detect_layout(&head)?;
        let meta = match layout {
            LayoutVariant::V15 => {
                // "<HHHLH>": firstfree, pagesize, firstindex, reccount, pagecount
                let mut c = ByteCursor::new(&head);
                let _firstfree = c.read_u16::<LittleEndian>()?;
                let page_size = c.read_u16::<LittleEndian>()?;
                let root_page = c.read_u16::<LittleEndian>()? as u32;
                let record_count = c.read_u32::<LittleEndian>()?;
                let page_count = c.read_u16::<LittleEndian>()? as u32;
                Meta { page_size, root_page, record_count, page_count, layout }
            }
            LayoutVariant::V16 | LayoutVariant::V20 => {
                // "<LHLLL>": firstfree, pagesize, firstindex, reccount, pagecount
                let mut c = ByteCursor::new(&head);
                let _firstfree = c.read_u32::<LittleEndian>()?;
                let page_size = c.read_u16::<LittleEndian>()?;
                let root_page = c.read_u32::<LittleEndian>()?;
                let record_count = c.read_u32::<LittleEndian>()?;
                let page_count = c.read_u32::<LittleEndian>()?;
                Meta { page_size, root_page, record_count, page_count, layout }
            }
        };

        let cache = page_cache_size.and_then(NonZeroUsize::new).map(LruCache::new);

        Ok(Navigator { window: RefCell::new(window), meta, cache: RefCell::new(cache) })
    }

    pub fn meta(&self) -> Meta {
        self.meta
    }

    pub fn root_page(&self) -> u32 {
        self.meta.root_page
    }

    /// Reads and decodes page `number`, through the cache if one is
    /// configured.
    pub fn read_page(&self, number: u32) -> Result<Page> {
        if let Some(cache) = self.cache.borrow_mut().as_mut() {
            if let Some(hit) = cache.get(&number) {
                return Ok(hit.clone());
            }
        }

        let page_size = self.meta.page_size as usize;
        let offset = page_size as u64 * number as u64;
        let mut window = self.window.borrow_mut();
        window.seek(offset as i64, Whence::Set)?;
        let data = window.read_exact(page_size)?;
        drop(window);

        let page = decode(&data, self.meta.layout, number)?;

        if let Some(cache) = self.cache.borrow_mut().as_mut() {
            cache.put(number, page.clone());
        }

        Ok(page)
    }
}

/// The version literal lives at a fixed offset depending on which 64-byte
/// meta-header shape is in play; v2.0's header is the same width as v1.6's
/// but carries its own distinct, shorter literal at the same offset.
fn detect_layout(head: &[u8]) -> Result<LayoutVariant> {
    if head[13..].starts_with(V15_LITERAL) {
        return Ok(LayoutVariant::V15);
    }
    if head[19..].starts_with(V16_LITERAL) {
        return Ok(LayoutVariant::V16);
    }
    if head[19..].starts_with(V20_LITERAL) {
        return Ok(LayoutVariant::V20);
    }
    Err(IdbError::BadVersion(0))
}
