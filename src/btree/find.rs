//! Relational find (C6), porting `idblib.BTree.find`'s descent-and-nudge
//! loop: descend to the key's floor position page by page, then reconcile
//! the final classification against the requested relation.

use crate::error::Result;

use super::cursor::Cursor;
use super::navigator::Navigator;
use super::page::Act;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rel {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Navigator {
    /// Finds the entry related to `key` by `rel`, returning a cursor
    /// positioned on it, or `None` if no such entry exists.
    pub fn find(&self, rel: Rel, key: &[u8]) -> Result<Option<Cursor<'_>>> {
        let root = self.read_page(self.root_page())?;
        let mut cursor = Cursor::new(self);
        let mut page = root;
        let hit = loop {
            let (act, i) = page.find(key);
            match act {
                Act::Recurse => {
                    cursor.push_frame(page.clone(), i);
                    let child_number = page.child(i);
                    page = self.read_page(child_number)?;
                }
                Act::Eq | Act::Lt => {
                    cursor.push_frame(page.clone(), i);
                    break act;
                }
                Act::Gt => {
                    cursor.push_frame(page.clone(), 0);
                    break Act::Gt;
                }
            }
        };

        // Classification-to-action table (spec section 4.6): reconcile what
        // we actually landed on against what the caller asked for.
        match (rel, hit) {
            (Rel::Eq, Act::Eq) => {}
            (Rel::Eq, Act::Lt) | (Rel::Eq, Act::Gt) => return Ok(None),
            (Rel::Le, Act::Eq) | (Rel::Le, Act::Lt) => {}
            (Rel::Le, Act::Gt) => cursor.prev()?,
            (Rel::Lt, Act::Eq) | (Rel::Lt, Act::Gt) => cursor.prev()?,
            (Rel::Lt, Act::Lt) => {}
            (Rel::Ge, Act::Eq) | (Rel::Ge, Act::Gt) => {}
            (Rel::Ge, Act::Lt) => cursor.next()?,
            (Rel::Gt, Act::Eq) | (Rel::Gt, Act::Lt) => cursor.next()?,
            (Rel::Gt, Act::Gt) => {}
            _ => unreachable!("Act::Recurse never reaches the reconciliation table"),
        }

        if cursor.eof() {
            return Ok(None);
        }
        Ok(Some(cursor))
    }
}
