//! Seekable byte windows over a shared source (C1).
//!
//! Mirrors `idblib.FileSection`: a window remembers its own logical cursor
//! and re-seeks the parent before every read, so several windows opened
//! over the same parent source can be used in turn without clobbering each
//! other - as long as all use happens on one thread (see the crate's
//! concurrency notes in `lib.rs`).

use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;

use crate::error::{IdbError, Result};

/// Anything a [`SectionWindow`] can be opened over: a bundle file, or one
/// of the sibling files when the database is unpacked into a directory.
pub trait Source: Read + Seek {}
impl<T: Read + Seek> Source for T {}

/// A source shared by every window opened over the same underlying file.
pub type SharedSource = Rc<RefCell<dyn Source>>;

/// `seek` origins, matching the three whence values in spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// A `[start, end)` sub-range of a shared, seekable byte source.
pub struct SectionWindow {
    source: SharedSource,
    start: u64,
    end: u64,
    pos: u64,
}

impl SectionWindow {
    pub fn new(source: SharedSource, start: u64, end: u64) -> Self {
        SectionWindow { source, start, end, pos: 0 }
    }

    /// Length of the window in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Reads up to `want` bytes, clamped to the window's remaining bytes.
    /// A short or empty read at the edge of the window is a valid outcome,
    /// never an error - callers that need an exact count use `read_exact`.
    pub fn read(&mut self, want: usize) -> Result<Vec<u8>> {
        let remaining = self.len() - self.pos;
        let capped = (want as u64).min(remaining);
        if capped == 0 {
            return Ok(Vec::new());
        }
        let mut source = self.source.borrow_mut();
        source.seek(SeekFrom::Start(self.start + self.pos))?;
        let mut buf = vec![0u8; capped as usize];
        let mut got = 0usize;
        while got < buf.len() {
            let n = source.read(&mut buf[got..])?;
            if n == 0 {
                break;
            }
            got += n;
        }
        buf.truncate(got);
        drop(source);
        self.pos += got as u64;
        Ok(buf)
    }

    /// Reads exactly `want` bytes, failing with [`IdbError::ShortRead`] if
    /// the window runs out first. The B-tree core uses this almost
    /// everywhere; the clamped `read` exists for the S1 windowing contract.
    pub fn read_exact(&mut self, want: usize) -> Result<Vec<u8>> {
        let buf = self.read(want)?;
        if buf.len() != want {
            return Err(IdbError::ShortRead { wanted: want, got: buf.len() });
        }
        Ok(buf)
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<()> {
        let target = match whence {
            Whence::Set => offset,
            Whence::Cur => self.pos as i64 + offset,
            Whence::End => self.len() as i64 + offset,
        };
        if target < 0 || target as u64 > self.len() {
            return Err(IdbError::BadOffset { offset: target });
        }
        self.pos = target as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn window(data: &'static [u8], start: u64, end: u64) -> SectionWindow {
        let source: SharedSource = Rc::new(RefCell::new(Cursor::new(data.to_vec())));
        SectionWindow::new(source, start, end)
    }

    // S1 - section windowing, literal input from spec.md section 8.
    #[test]
    fn section_windowing_scenario() {
        let mut w = window(b"0123456789abcdef", 3, 11);
        assert_eq!(w.read(3).unwrap(), b"345");
        assert_eq!(w.read(8).unwrap(), b"6789a");
        assert_eq!(w.read(8).unwrap(), b"");

        w.seek(-1, Whence::End).unwrap();
        assert_eq!(w.read(8).unwrap(), b"a");

        w.seek(3, Whence::Set).unwrap();
        assert_eq!(w.read(2).unwrap(), b"67");

        w.seek(-2, Whence::Cur).unwrap();
        assert_eq!(w.read(2).unwrap(), b"67");

        w.seek(2, Whence::Cur).unwrap();
        assert_eq!(w.read(2).unwrap(), b"a");

        assert!(matches!(w.seek(9, Whence::Set), Err(IdbError::BadOffset { offset: 9 })));
    }

    #[test]
    fn tell_reflects_logical_cursor_not_parent_cursor() {
        let mut w = window(b"0123456789", 2, 8);
        assert_eq!(w.tell(), 0);
        w.read(4).unwrap();
        assert_eq!(w.tell(), 4);
        w.seek(0, Whence::End).unwrap();
        assert_eq!(w.tell(), 6);
    }

    #[test]
    fn multiple_windows_over_one_parent_do_not_interfere() {
        let source: SharedSource = Rc::new(RefCell::new(Cursor::new(b"0123456789".to_vec())));
        let mut a = SectionWindow::new(source.clone(), 0, 5);
        let mut b = SectionWindow::new(source, 5, 10);
        assert_eq!(a.read(2).unwrap(), b"01");
        assert_eq!(b.read(2).unwrap(), b"56");
        assert_eq!(a.read(3).unwrap(), b"234");
    }

    // Invariant 1 - window safety: tell() always stays within [0, len] after
    // any mix of reads and seeks, and an out-of-range seek is rejected
    // rather than silently clamped.
    proptest::proptest! {
        #[test]
        fn tell_stays_in_range_under_arbitrary_reads_and_seeks(
            data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..64),
            start in 0u64..16,
            ops in proptest::collection::vec(
                proptest::prop_oneof![
                    (0usize..32).prop_map(Op::Read),
                    (-40i64..40).prop_map(Op::SeekSet),
                    (-40i64..40).prop_map(Op::SeekCur),
                    (-40i64..40).prop_map(Op::SeekEnd),
                ],
                0..32,
            ),
        ) {
            let start = start.min(data.len() as u64);
            let end = data.len() as u64;
            let mut w = window_owned(data, start, end);
            for op in ops {
                match op {
                    Op::Read(n) => { let _ = w.read(n); }
                    Op::SeekSet(o) => { let _ = w.seek(o, Whence::Set); }
                    Op::SeekCur(o) => { let _ = w.seek(o, Whence::Cur); }
                    Op::SeekEnd(o) => { let _ = w.seek(o, Whence::End); }
                }
                proptest::prop_assert!(w.tell() <= w.len());
            }
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Read(usize),
        SeekSet(i64),
        SeekCur(i64),
        SeekEnd(i64),
    }

    fn window_owned(data: Vec<u8>, start: u64, end: u64) -> SectionWindow {
        let source: SharedSource = Rc::new(RefCell::new(Cursor::new(data)));
        SectionWindow::new(source, start, end)
    }
}
