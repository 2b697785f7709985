//! Composite-key node overlay (C7), grounded on `idblib.ID0File`'s
//! `makekey`/`node_by_name`/`blob` helpers layered on top of the B-tree.

use crate::btree::{Navigator, Rel};
use crate::container::AddressWidth;
use crate::error::{IdbError, Result};

const COMPOSITE_PREFIX: u8 = 0x2E;
const NAME_TAG: u8 = b'N';

/// The second field of a composite key: either a node's display name (the
/// `'N'`-tagged lookup) or a node id (every other tag).
pub enum KeyOperand<'a> {
    Name(&'a str),
    NodeId(u64),
}

fn width_bytes(address_width: AddressWidth, value: u64) -> Vec<u8> {
    match address_width {
        AddressWidth::Bits32 => (value as u32).to_be_bytes().to_vec(),
        AddressWidth::Bits64 => value.to_be_bytes().to_vec(),
    }
}

/// Builds `0x2E || tag || name_or_id || sub_key`, per the original's
/// `makekey`. Not used for the `'N'` tag, which has its own unprefixed
/// shape - see [`name_key`].
pub fn composite_key(tag: u8, operand: KeyOperand<'_>, sub_key: u64, address_width: AddressWidth) -> Vec<u8> {
    let mut key = Vec::new();
    key.push(COMPOSITE_PREFIX);
    key.push(tag);
    match operand {
        KeyOperand::Name(name) => key.extend_from_slice(name.as_bytes()),
        KeyOperand::NodeId(id) => key.extend_from_slice(&width_bytes(address_width, id)),
    }
    key.extend_from_slice(&width_bytes(address_width, sub_key));
    key
}

/// Builds the special-cased name-to-node-id lookup key: `'N' || name`, with
/// none of the `0x2E` composite-key machinery.
pub fn name_key(name: &str) -> Vec<u8> {
    let mut key = vec![NAME_TAG];
    key.extend_from_slice(name.as_bytes());
    key
}

/// Increments the last byte of `key` with wrapping, no carry into earlier
/// bytes. A documented limitation inherited from the original: a key whose
/// last byte is `0xFF` produces a "next" key that is not actually the
/// successor, so [`NodeStore::blob`] can undercount at that boundary.
pub fn next_key(key: &[u8]) -> Vec<u8> {
    let mut next = key.to_vec();
    if let Some(last) = next.last_mut() {
        *last = last.wrapping_add(1);
    }
    next
}

/// Decodes a little-endian integer whose width is inferred from the byte
/// length of the value itself (1, 2, 4, or 8 bytes).
pub fn decode_int(bytes: &[u8]) -> Result<u64> {
    Ok(match bytes.len() {
        1 => bytes[0] as u64,
        2 => u16::from_le_bytes(bytes.try_into().unwrap()) as u64,
        4 => u32::from_le_bytes(bytes.try_into().unwrap()) as u64,
        8 => u64::from_le_bytes(bytes.try_into().unwrap()),
        other => return Err(IdbError::BadInt(other)),
    })
}

/// Typed access to the node-attribute store layered on the `id0` B-tree.
pub struct NodeStore<'a> {
    navigator: &'a Navigator,
    address_width: AddressWidth,
}

impl<'a> NodeStore<'a> {
    pub fn new(navigator: &'a Navigator, address_width: AddressWidth) -> Self {
        NodeStore { navigator, address_width }
    }

    pub fn address_width(&self) -> AddressWidth {
        self.address_width
    }

    /// Raw value bytes for an exact key match.
    pub fn bytes(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.navigator.find(Rel::Eq, key)? {
            Some(cursor) => Ok(Some(cursor.value().to_vec())),
            None => Ok(None),
        }
    }

    /// The value at `key`, decoded as a little-endian integer.
    pub fn int(&self, key: &[u8]) -> Result<Option<u64>> {
        match self.bytes(key)? {
            Some(v) => Ok(Some(decode_int(&v)?)),
            None => Ok(None),
        }
    }

    /// The value at `key`, treated as a NUL-padded string: every trailing
    /// zero byte is stripped, then the remainder is decoded as UTF-8
    /// (lossily - the store predates any UTF-8 guarantee).
    pub fn string(&self, key: &[u8]) -> Result<Option<String>> {
        match self.bytes(key)? {
            Some(mut v) => {
                while v.last() == Some(&0) {
                    v.pop();
                }
                Ok(Some(String::from_utf8_lossy(&v).into_owned()))
            }
            None => Ok(None),
        }
    }

    /// Concatenates the values of every entry in `[start_key,
    /// next_key(start_key))`, in key order.
    pub fn blob(&self, start_key: &[u8]) -> Result<Vec<u8>> {
        let end_key = next_key(start_key);
        let mut out = Vec::new();
        let Some(mut cursor) = self.navigator.find(Rel::Ge, start_key)? else {
            return Ok(out);
        };
        while !cursor.eof() && cursor.key() < end_key.as_slice() {
            out.extend_from_slice(cursor.value());
            cursor.next()?;
        }
        Ok(out)
    }

    /// Resolves a node's display name to its id, via the `'N'`-tagged
    /// lookup key. The stored value is a little-endian node id.
    pub fn node_by_name(&self, name: &str) -> Result<Option<u64>> {
        self.int(&name_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::navigator::Navigator;
    use crate::container::{SectionWindow, SharedSource};
    use std::cell::RefCell;
    use std::io::Cursor as IoCursor;
    use std::rc::Rc;

    fn record(key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(key.len() as u16).to_le_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    /// Builds a single-leaf-page v1.6 section holding exactly the given
    /// (key, value) pairs, already in ascending order.
    fn single_leaf_store(entries: &[(&[u8], &[u8])]) -> NodeStore<'static> {
        let page_size = 256usize;
        let mut meta = vec![0u8; page_size];
        // "<LHLLL>": firstfree(u32)@0, pagesize(u16)@4, firstindex(u32)@6,
        // reccount(u32)@10, pagecount(u32)@14.
        meta[4..6].copy_from_slice(&(page_size as u16).to_le_bytes());
        meta[6..10].copy_from_slice(&1u32.to_le_bytes()); // root_page = 1
        meta[10..14].copy_from_slice(&(entries.len() as u32).to_le_bytes());
        meta[14..18].copy_from_slice(&2u32.to_le_bytes()); // page_count
        meta[19..19 + b"B-tree v 1.6 (C) Pol 1990".len()].copy_from_slice(b"B-tree v 1.6 (C) Pol 1990");

        let mut leaf = vec![0u8; page_size];
        leaf[4..6].copy_from_slice(&(entries.len() as u16).to_le_bytes());
        let mut cursor = 6 + 6 * entries.len() + 6;
        let mut running: Vec<u8> = Vec::new();
        for (i, (key, value)) in entries.iter().enumerate() {
            let slot_ofs = 6 * (1 + i);
            leaf[slot_ofs] = 0; // indent 0: store full keys, no compression needed for this fixture
            leaf[slot_ofs + 2..slot_ofs + 4].copy_from_slice(&0u16.to_le_bytes());
            leaf[slot_ofs + 4..slot_ofs + 6].copy_from_slice(&(cursor as u16).to_le_bytes());
            leaf[cursor] = 0; // skip byte
            let body = record(key, value);
            leaf[cursor + 1..cursor + 1 + body.len()].copy_from_slice(&body);
            cursor += 1 + body.len();
            running = key.to_vec();
        }
        let _ = running;

        let mut data = meta;
        data.extend_from_slice(&leaf);
        let source: SharedSource = Rc::new(RefCell::new(IoCursor::new(data)));
        let len = source.borrow_mut().get_ref().len() as u64;
        let window = SectionWindow::new(source, 0, len);
        let navigator = Navigator::open(window, None).unwrap();
        let navigator: &'static Navigator = Box::leak(Box::new(navigator));
        NodeStore::new(navigator, AddressWidth::Bits32)
    }

    // S6 - composite key construction for a node-attribute lookup.
    #[test]
    fn composite_key_scenario() {
        let key = composite_key(b'S', KeyOperand::NodeId(0x1000), 0, AddressWidth::Bits32);
        let mut expected = vec![0x2E, b'S'];
        expected.extend_from_slice(&0x1000u32.to_be_bytes());
        expected.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(key, expected);
    }

    #[test]
    fn name_key_has_no_composite_prefix() {
        let key = name_key("main");
        assert_eq!(key, b"Nmain");
    }

    #[test]
    fn next_key_wraps_last_byte_without_carry() {
        assert_eq!(next_key(&[0x01, 0x02]), vec![0x01, 0x03]);
        assert_eq!(next_key(&[0x01, 0xFF]), vec![0x01, 0x00]);
    }

    #[test]
    fn string_strips_single_trailing_nul() {
        let store = single_leaf_store(&[(b"k", b"hello\0")]);
        assert_eq!(store.string(b"k").unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn string_strips_all_trailing_nuls() {
        let store = single_leaf_store(&[(b"k", b"hello\0\0\0")]);
        assert_eq!(store.string(b"k").unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn int_decodes_by_value_width() {
        let store = single_leaf_store(&[(b"k", &42u32.to_le_bytes())]);
        assert_eq!(store.int(b"k").unwrap(), Some(42));
    }

    // Invariant 7 - blob concatenates every value in [start, next(start)).
    #[test]
    fn blob_concatenates_range() {
        let store = single_leaf_store(&[(b"\x2eSa", b"1"), (b"\x2eSb", b"2"), (b"\x2eT", b"3")]);
        let out = store.blob(b"\x2eS").unwrap();
        assert_eq!(out, b"12");
    }

    #[test]
    fn node_by_name_decodes_little_endian_id() {
        let store = single_leaf_store(&[(b"Nmain", &0x401000u32.to_le_bytes())]);
        assert_eq!(store.node_by_name("main").unwrap(), Some(0x401000));
    }

    #[test]
    fn missing_key_is_none_not_error() {
        let store = single_leaf_store(&[(b"k", b"v")]);
        assert_eq!(store.bytes(b"zzz").unwrap(), None);
    }
}
