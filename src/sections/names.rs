//! `nam` named-address list, grounded on `idblib.NAMFile`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Cursor as ByteCursor;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::warn;

use crate::container::{AddressWidth, SectionWindow, Whence};
use crate::error::{IdbError, Result};

fn read_word(data: &[u8], ofs: usize, wide: bool) -> Result<u64> {
    let mut c = ByteCursor::new(&data[ofs..]);
    Ok(if wide { c.read_u64::<LittleEndian>()? } else { c.read_u32::<LittleEndian>()? as u64 })
}

/// Lazily paginated list of addresses carrying a user-assigned name.
pub struct NameList {
    window: RefCell<SectionWindow>,
    wide: bool,
    word_size: u64,
    page_size: u64,
    name_count: u64,
}

impl NameList {
    pub fn open(mut window: SectionWindow, address_width: AddressWidth) -> Result<Self> {
        let wide = address_width == AddressWidth::Bits64;
        let word_size = if wide { 8 } else { 4 };

        window.seek(0, Whence::Set)?;
        let head = window.read_exact(64)?;
        let magic = &head[0..4];

        let (mut name_count, page_size);
        if magic == b"Va4\0" || magic == b"Va1\0" || magic == b"Va0\0" {
            let always1 = ByteCursor::new(&head[4..6]).read_u16::<LittleEndian>()?;
            if always1 != 1 {
                warn!(always1, "nam: expected sentinel 1, got a different value");
            }
            let always0 = read_word(&head, 8, wide)?;
            if always0 != 0 {
                warn!(always0, "nam: expected sentinel 0, got a different value");
            }
            name_count = read_word(&head, 8 + word_size as usize, wide)?;
            page_size = ByteCursor::new(&head[8 + 2 * word_size as usize..]).read_u32::<LittleEndian>()? as u64;
        } else if magic == b"VA*\0" {
            let always3 = ByteCursor::new(&head[4..8]).read_u32::<LittleEndian>()?;
            if always3 != 3 {
                warn!(always3, "nam: expected sentinel 3, got a different value");
            }
            let always1 = ByteCursor::new(&head[8..12]).read_u32::<LittleEndian>()?;
            if always1 != 1 {
                warn!(always1, "nam: expected sentinel 1, got a different value");
            }
            let always2k = ByteCursor::new(&head[12..16]).read_u32::<LittleEndian>()?;
            if always2k != 0x800 {
                warn!(always2k, "nam: expected sentinel 0x800, got a different value");
            }
            let always0 = read_word(&head, 20, wide)?;
            if always0 != 0 {
                warn!(always0, "nam: expected sentinel 0, got a different value");
            }
            name_count = ByteCursor::new(&head[20 + word_size as usize..]).read_u32::<LittleEndian>()? as u64;
            page_size = 0x2000;
        } else {
            return Err(IdbError::BadMagic(format!("{:?}", magic)));
        }

        // Undocumented in the original beyond a bare division; preserved as
        // a documented quirk rather than "fixed" (open question 2).
        if wide {
            name_count /= 2;
        }

        Ok(NameList { window: RefCell::new(window), wide, word_size, page_size, name_count })
    }

    pub fn len(&self) -> u64 {
        self.name_count
    }

    pub fn is_empty(&self) -> bool {
        self.name_count == 0
    }

    pub fn iter(&self) -> NameIter<'_> {
        NameIter { list: self, remaining: self.name_count, pages_read: 0, buf: VecDeque::new() }
    }
}

pub struct NameIter<'a> {
    list: &'a NameList,
    remaining: u64,
    pages_read: u64,
    buf: VecDeque<u64>,
}

impl<'a> Iterator for NameIter<'a> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if self.buf.is_empty() {
            let page_ofs = self.list.page_size * (1 + self.pages_read);
            let mut window = self.list.window.borrow_mut();
            if let Err(e) = window.seek(page_ofs as i64, Whence::Set) {
                return Some(Err(e));
            }
            let data = match window.read(self.list.page_size as usize) {
                Ok(d) => d,
                Err(e) => return Some(Err(e)),
            };
            drop(window);
            if data.is_empty() {
                self.remaining = 0;
                return None;
            }
            let per_page = (data.len() as u64 / self.list.word_size).min(self.remaining);
            for i in 0..per_page {
                match read_word(&data, (i * self.list.word_size) as usize, self.list.wide) {
                    Ok(v) => self.buf.push_back(v),
                    Err(e) => return Some(Err(e)),
                }
            }
            self.pages_read += 1;
        }
        let value = self.buf.pop_front()?;
        self.remaining -= 1;
        Some(Ok(value))
    }
}
