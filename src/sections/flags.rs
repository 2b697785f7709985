//! `id1` segment/flag table, grounded on `idblib.ID1File`.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor as ByteCursor;
use tracing::warn;

use crate::container::{AddressWidth, SectionWindow, Whence};
use crate::error::{IdbError, Result};

#[derive(Debug, Clone, Copy)]
struct SegInfo {
    start_ea: u64,
    end_ea: u64,
    offset: u64,
}

/// Reads 32-bit flag words out of the `id1` section's per-segment tables.
pub struct FlagReader {
    window: std::cell::RefCell<SectionWindow>,
    segments: Vec<SegInfo>,
}

fn read_word(data: &[u8], ofs: usize, wide: bool) -> Result<u64> {
    let mut c = ByteCursor::new(&data[ofs..]);
    Ok(if wide { c.read_u64::<LittleEndian>()? } else { c.read_u32::<LittleEndian>()? as u64 })
}

impl FlagReader {
    pub fn open(mut window: SectionWindow, address_width: AddressWidth) -> Result<Self> {
        let wide = address_width == AddressWidth::Bits64;
        let word_size = if wide { 8 } else { 4 };

        window.seek(0, Whence::Set)?;
        let head = window.read_exact(32)?;
        let magic = &head[0..4];

        let mut segments = Vec::new();

        if magic == b"Va4\0" || magic == b"Va3\0" || magic == b"Va0\0" {
            let nsegments = ByteCursor::new(&head[4..6]).read_u16::<LittleEndian>()? as usize;
            let seglistofs = 8usize;
            let entry_size = 3 * word_size;
            window.seek(seglistofs as i64, Whence::Set)?;
            let segdata = window.read_exact(nsegments * entry_size)?;
            for i in 0..nsegments {
                let base = i * entry_size;
                let start_ea = read_word(&segdata, base, wide)?;
                let end_ea = read_word(&segdata, base + word_size, wide)?;
                let offset = read_word(&segdata, base + 2 * word_size, wide)?;
                segments.push(SegInfo { start_ea, end_ea, offset });
            }
        } else if magic == b"VA*\0" {
            let always3 = ByteCursor::new(&head[4..8]).read_u32::<LittleEndian>()?;
            if always3 != 3 {
                warn!(always3, "id1: expected sentinel 3, got a different value");
            }
            let nsegments = ByteCursor::new(&head[8..12]).read_u32::<LittleEndian>()? as usize;
            let always2k = ByteCursor::new(&head[12..16]).read_u32::<LittleEndian>()?;
            if always2k != 0x800 {
                warn!(always2k, "id1: expected sentinel 0x800, got a different value");
            }
            let seglistofs = 20usize;
            let entry_size = 2 * word_size;
            window.seek(seglistofs as i64, Whence::Set)?;
            let segdata = window.read_exact(nsegments * entry_size)?;
            let mut id1ofs = 0x2000u64;
            for i in 0..nsegments {
                let base = i * entry_size;
                let start_ea = read_word(&segdata, base, wide)?;
                let end_ea = read_word(&segdata, base + word_size, wide)?;
                segments.push(SegInfo { start_ea, end_ea, offset: id1ofs });
                id1ofs += 4 * (end_ea - start_ea);
            }
        } else {
            return Err(IdbError::BadMagic(format!("{:?}", magic)));
        }

        Ok(FlagReader { window: std::cell::RefCell::new(window), segments })
    }

    fn find_segment(&self, ea: u64) -> Option<&SegInfo> {
        self.segments.iter().find(|s| s.start_ea <= ea && ea < s.end_ea)
    }

    /// The flag word for `ea`, or `None` if it falls outside every known
    /// segment.
    pub fn flags(&self, ea: u64) -> Result<Option<u32>> {
        let Some(seg) = self.find_segment(ea) else { return Ok(None) };
        let offset = seg.offset + 4 * (ea - seg.start_ea);
        let mut window = self.window.borrow_mut();
        window.seek(offset as i64, Whence::Set)?;
        let bytes = window.read_exact(4)?;
        Ok(Some(u32::from_le_bytes(bytes.try_into().unwrap())))
    }

    pub fn first_segment_start(&self) -> Option<u64> {
        self.segments.first().map(|s| s.start_ea)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::SharedSource;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn window(data: Vec<u8>) -> SectionWindow {
        let len = data.len() as u64;
        let source: SharedSource = Rc::new(RefCell::new(Cursor::new(data)));
        SectionWindow::new(source, 0, len)
    }

    #[test]
    fn old_layout_reads_flags_for_32bit_segment() {
        let mut data = vec![0u8; 8 + 1 * 3 * 4 + 4];
        data[0..4].copy_from_slice(b"Va4\0");
        data[4..6].copy_from_slice(&1u16.to_le_bytes());
        let seg_ofs = 8usize;
        data[seg_ofs..seg_ofs + 4].copy_from_slice(&0x1000u32.to_le_bytes()); // startea
        data[seg_ofs + 4..seg_ofs + 8].copy_from_slice(&0x1010u32.to_le_bytes()); // endea
        let flags_ofs = seg_ofs + 12;
        data[seg_ofs + 8..seg_ofs + 12].copy_from_slice(&(flags_ofs as u32).to_le_bytes());
        data.resize(flags_ofs + 8, 0);
        data[flags_ofs..flags_ofs + 4].copy_from_slice(&0xCAFEBABEu32.to_le_bytes());

        let reader = FlagReader::open(window(data), AddressWidth::Bits32).unwrap();
        assert_eq!(reader.flags(0x1000).unwrap(), Some(0xCAFEBABE));
        assert_eq!(reader.flags(0x2000).unwrap(), None);
    }

    #[test]
    fn new_layout_derives_offsets_from_segment_sizes() {
        let mut data = vec![0u8; 20 + 1 * 2 * 4];
        data[0..4].copy_from_slice(b"VA*\0");
        data[8..12].copy_from_slice(&1u32.to_le_bytes()); // nsegments
        let seg_ofs = 20usize;
        data[seg_ofs..seg_ofs + 4].copy_from_slice(&0x1000u32.to_le_bytes());
        data[seg_ofs + 4..seg_ofs + 8].copy_from_slice(&0x1002u32.to_le_bytes());
        data.resize(0x2000 + 8, 0);
        data[0x2000..0x2004].copy_from_slice(&0x11223344u32.to_le_bytes());

        let reader = FlagReader::open(window(data), AddressWidth::Bits32).unwrap();
        assert_eq!(reader.flags(0x1000).unwrap(), Some(0x11223344));
    }

    #[test]
    fn unknown_magic_is_rejected() {
        let data = vec![0u8; 32];
        assert!(matches!(FlagReader::open(window(data), AddressWidth::Bits32), Err(IdbError::BadMagic(_))));
    }
}
