//! In-order cursor (C5), a line-for-line port of `idblib.BTree.Cursor`.
//!
//! The stack holds `(page, ix)` pairs exactly as the original does; `ix`
//! is `-1` when the frame sits at an index page's `preceding` pointer
//! rather than at one of its entries. Keeping the raw signed index instead
//! of an enum mirrors the original's arithmetic (`ix -= 1`, `ix += 1`)
//! closely enough that the ascend/descend loops below translate directly.

use crate::error::Result;

use super::navigator::Navigator;
use super::page::Page;

struct Frame {
    page: Page,
    ix: i32,
}

pub struct Cursor<'a> {
    navigator: &'a Navigator,
    stack: Vec<Frame>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(navigator: &'a Navigator) -> Self {
        Cursor { navigator, stack: Vec::new() }
    }

    /// Pushes a `(page, ix)` frame, `ix = -1` meaning the `preceding`
    /// pointer. Used while descending in [`super::find`].
    pub(crate) fn push_frame(&mut self, page: Page, ix: i32) {
        self.stack.push(Frame { page, ix });
    }

    pub fn eof(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn key(&self) -> &[u8] {
        let top = self.stack.last().expect("key() called on an exhausted cursor");
        top.page.key(top.ix as usize)
    }

    pub fn value(&self) -> &[u8] {
        let top = self.stack.last().expect("value() called on an exhausted cursor");
        top.page.value(top.ix as usize)
    }

    pub fn next(&mut self) -> Result<()> {
        let Some(Frame { mut page, mut ix }) = self.stack.pop() else { return Ok(()) };
        if page.is_leaf() {
            ix += 1;
            while !self.stack.is_empty() && ix as usize == page.entry_count() {
                let frame = self.stack.pop().unwrap();
                page = frame.page;
                ix = frame.ix + 1;
            }
            if (ix as usize) < page.entry_count() {
                self.stack.push(Frame { page, ix });
            }
        } else {
            let child_number = page.child(ix);
            self.stack.push(Frame { page, ix });
            let mut next_page = self.navigator.read_page(child_number)?;
            while next_page.is_index() {
                let next_ix = -1;
                let child_number = next_page.child(next_ix);
                self.stack.push(Frame { page: next_page, ix: next_ix });
                next_page = self.navigator.read_page(child_number)?;
            }
            self.stack.push(Frame { page: next_page, ix: 0 });
        }
        Ok(())
    }

    pub fn prev(&mut self) -> Result<()> {
        let Some(Frame { mut page, mut ix }) = self.stack.pop() else { return Ok(()) };
        ix -= 1;
        if page.is_leaf() {
            while !self.stack.is_empty() && ix < 0 {
                let frame = self.stack.pop().unwrap();
                page = frame.page;
                ix = frame.ix;
            }
            if ix >= 0 {
                self.stack.push(Frame { page, ix });
            }
        } else {
            let child_number = page.child(ix);
            self.stack.push(Frame { page, ix });
            let mut next_page = self.navigator.read_page(child_number)?;
            loop {
                let next_ix = next_page.entry_count() as i32 - 1;
                let is_index = next_page.is_index();
                self.stack.push(Frame { page: next_page, ix: next_ix });
                if !is_index {
                    break;
                }
                let frame = self.stack.last().unwrap();
                next_page = self.navigator.read_page(frame.page.child(frame.ix))?;
            }
        }
        Ok(())
    }
}
