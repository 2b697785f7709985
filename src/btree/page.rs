//! Page decoder (C3), grounded on `idblib.BTree.BasePage`/`Page15`/
//! `Page16`/`Page20` and their `IndexEntry`/`LeafEntry` inner classes.
//!
//! The source's inheritance chain collapses here into one `Page` value
//! plus a layout tag; dispatch happens once, in `decode`, rather than
//! through virtual calls on every access.

use std::io::Cursor as ByteCursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{IdbError, Result};

/// Page-layout generation, detected from the meta-header's embedded
/// version literal (see `btree::navigator`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVariant {
    V15,
    V16,
    V20,
}

impl LayoutVariant {
    fn entry_size(self) -> usize {
        match self {
            LayoutVariant::V15 => 4,
            LayoutVariant::V16 | LayoutVariant::V20 => 6,
        }
    }

    /// v1.5 and v1.6 record bodies are preceded by one unused zero byte;
    /// v2.0 dropped it.
    fn has_skip_byte(self) -> bool {
        matches!(self, LayoutVariant::V15 | LayoutVariant::V16)
    }
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub child: u32,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct LeafEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Body {
    Index { preceding_page: u32, entries: Vec<IndexEntry> },
    Leaf { entries: Vec<LeafEntry> },
}

/// One decoded, fixed-size page.
#[derive(Debug, Clone)]
pub struct Page {
    pub number: u32,
    body: Body,
}

/// Outcome of a per-page search (`Page::find`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Act {
    Recurse,
    Eq,
    Lt,
    Gt,
}

impl Page {
    pub fn is_leaf(&self) -> bool {
        matches!(self.body, Body::Leaf { .. })
    }

    pub fn is_index(&self) -> bool {
        matches!(self.body, Body::Index { .. })
    }

    pub fn entry_count(&self) -> usize {
        match &self.body {
            Body::Index { entries, .. } => entries.len(),
            Body::Leaf { entries } => entries.len(),
        }
    }

    pub fn key(&self, i: usize) -> &[u8] {
        match &self.body {
            Body::Index { entries, .. } => &entries[i].key,
            Body::Leaf { entries } => &entries[i].key,
        }
    }

    pub fn value(&self, i: usize) -> &[u8] {
        match &self.body {
            Body::Index { entries, .. } => &entries[i].value,
            Body::Leaf { entries } => &entries[i].value,
        }
    }

    /// `i = -1` returns the index page's `preceding_page`. Never called on
    /// a leaf page.
    pub fn child(&self, i: i32) -> u32 {
        match &self.body {
            Body::Index { preceding_page, entries } => {
                if i < 0 {
                    *preceding_page
                } else {
                    entries[i as usize].child
                }
            }
            Body::Leaf { .. } => 0,
        }
    }

    /// Binary search with floor semantics, classified per spec.md section
    /// 4.3's table.
    pub fn find(&self, key: &[u8]) -> (Act, i32) {
        let i = floor_search(self, key);
        if i < 0 {
            if self.is_index() {
                (Act::Recurse, -1)
            } else {
                (Act::Gt, 0)
            }
        } else if self.key(i as usize) == key {
            (Act::Eq, i)
        } else if self.is_index() {
            (Act::Recurse, i)
        } else {
            (Act::Lt, i)
        }
    }
}

/// Largest index `i` with `key(i) <= key`, or `-1` if every key is greater.
/// Direct port of `idblib.binary_search` (an `a.upper_bound(k)--`).
pub fn floor_search(page: &Page, key: &[u8]) -> i32 {
    let mut first = 0i32;
    let mut last = page.entry_count() as i32;
    while first < last {
        let mid = (first + last) >> 1;
        if key < page.key(mid as usize) {
            last = mid;
        } else {
            first = mid + 1;
        }
    }
    first - 1
}

fn read_record(data: &[u8], ofs: usize) -> Result<(Vec<u8>, Vec<u8>)> {
    if ofs + 2 > data.len() {
        return Err(IdbError::BadPage(format!("record offset {ofs} out of bounds")));
    }
    let keylen = u16::from_le_bytes([data[ofs], data[ofs + 1]]) as usize;
    let kstart = ofs + 2;
    let kend = kstart + keylen;
    if kend + 2 > data.len() {
        return Err(IdbError::BadPage(format!("key of length {keylen} at {ofs} runs past page end")));
    }
    let key = data[kstart..kend].to_vec();
    let vallen = u16::from_le_bytes([data[kend], data[kend + 1]]) as usize;
    let vstart = kend + 2;
    let vend = vstart + vallen;
    if vend > data.len() {
        return Err(IdbError::BadPage(format!("value of length {vallen} at {kend} runs past page end")));
    }
    let value = data[vstart..vend].to_vec();
    Ok((key, value))
}

/// Decodes exactly `data.len()` bytes (expected to equal `page_size`) into
/// a `Page`, per the layout variant's slot/leaf formats (spec.md section 3
/// table).
pub fn decode(data: &[u8], variant: LayoutVariant, number: u32) -> Result<Page> {
    if data.len() < variant.entry_size() {
        return Err(IdbError::BadPage("page shorter than its own header".into()));
    }

    let mut header = ByteCursor::new(data);
    let (preceding_page, count) = match variant {
        LayoutVariant::V15 => {
            let p = header.read_u16::<LittleEndian>()? as u32;
            let c = header.read_u16::<LittleEndian>()?;
            (p, c)
        }
        LayoutVariant::V16 | LayoutVariant::V20 => {
            let p = header.read_u32::<LittleEndian>()?;
            let c = header.read_u16::<LittleEndian>()?;
            (p, c)
        }
    };

    let is_index = preceding_page != 0;
    let entry_size = variant.entry_size();
    let skip = variant.has_skip_byte();

    let mut index_entries = Vec::with_capacity(count as usize);
    let mut leaf_entries = Vec::with_capacity(count as usize);
    let mut running_key: Vec<u8> = Vec::new();

    for i in 0..count as usize {
        let slot_ofs = entry_size * (1 + i);
        if slot_ofs + entry_size > data.len() {
            return Err(IdbError::BadPage(format!("entry slot {i} out of bounds")));
        }
        let mut slot = ByteCursor::new(&data[slot_ofs..slot_ofs + entry_size]);

        if is_index {
            let (child, rec_ofs) = match variant {
                LayoutVariant::V15 => (slot.read_u16::<LittleEndian>()? as u32, slot.read_u16::<LittleEndian>()?),
                LayoutVariant::V16 | LayoutVariant::V20 => {
                    (slot.read_u32::<LittleEndian>()?, slot.read_u16::<LittleEndian>()?)
                }
            };
            let body_ofs = rec_ofs as usize + if skip { 1 } else { 0 };
            let (key, value) = read_record(data, body_ofs)?;
            if let Some(last) = index_entries.last().map(|e: &IndexEntry| &e.key) {
                if key.as_slice() <= last.as_slice() {
                    return Err(IdbError::BadPage("index keys are not strictly ascending".into()));
                }
            }
            index_entries.push(IndexEntry { child, key, value });
        } else {
            let (indent, rec_ofs) = match variant {
                LayoutVariant::V15 => {
                    let indent = slot.read_u8()? as usize;
                    let _aux = slot.read_u8()?;
                    (indent, slot.read_u16::<LittleEndian>()?)
                }
                LayoutVariant::V16 => {
                    let indent = slot.read_u8()? as usize;
                    let _aux1 = slot.read_u8()?;
                    let _aux = slot.read_u16::<LittleEndian>()?;
                    (indent, slot.read_u16::<LittleEndian>()?)
                }
                LayoutVariant::V20 => {
                    let indent = slot.read_u16::<LittleEndian>()? as usize;
                    let _aux = slot.read_u16::<LittleEndian>()?;
                    (indent, slot.read_u16::<LittleEndian>()?)
                }
            };
            let body_ofs = rec_ofs as usize + if skip { 1 } else { 0 };
            let (suffix, value) = read_record(data, body_ofs)?;
            if indent > running_key.len() {
                return Err(IdbError::BadPage(format!(
                    "indent {indent} exceeds previous reconstructed key length {}",
                    running_key.len()
                )));
            }
            let mut key = running_key[..indent].to_vec();
            key.extend_from_slice(&suffix);
            if let Some(last) = leaf_entries.last().map(|e: &LeafEntry| &e.key) {
                if key.as_slice() <= last.as_slice() {
                    return Err(IdbError::BadPage("leaf keys are not strictly ascending".into()));
                }
            }
            running_key = key.clone();
            leaf_entries.push(LeafEntry { key, value });
        }
    }

    let body = if is_index {
        Body::Index { preceding_page, entries: index_entries }
    } else {
        Body::Leaf { entries: leaf_entries }
    };
    Ok(Page { number, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePage(Vec<Vec<u8>>);
    impl FakePage {
        fn page(&self) -> Page {
            Page {
                number: 0,
                body: Body::Leaf {
                    entries: self.0.iter().map(|k| LeafEntry { key: k.clone(), value: vec![] }).collect(),
                },
            }
        }
    }

    // S2 - binary search floor, literal scenario from spec.md section 8.
    #[test]
    fn binary_search_floor_scenario() {
        let fake = FakePage(vec![vec![2], vec![3], vec![5], vec![6]]);
        let page = fake.page();
        assert_eq!(floor_search(&page, &[1]), -1);
        assert_eq!(floor_search(&page, &[2]), 0);
        assert_eq!(floor_search(&page, &[4]), 1);
        assert_eq!(floor_search(&page, &[5]), 2);
        assert_eq!(floor_search(&page, &[7]), 3);
    }

    #[test]
    fn floor_search_on_empty_page_is_always_absent() {
        let fake = FakePage(vec![]);
        let page = fake.page();
        assert_eq!(floor_search(&page, &[1]), -1);
    }

    fn record(key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(key.len() as u16).to_le_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    // S5 - leaf key reconstruction: v1.6, entry 0 (indent 0, "NamedNode"),
    // entry 1 (indent 5, "Ref") -> "NamedNode", "NamedRef".
    #[test]
    fn leaf_key_reconstruction_scenario() {
        let mut page = vec![0u8; 128];
        page[0..4].copy_from_slice(&0u32.to_le_bytes()); // preceding = 0 -> leaf
        page[2..4].copy_from_slice(&0u16.to_le_bytes());
        page[4..6].copy_from_slice(&2u16.to_le_bytes()); // count = 2

        let mut cursor = 6 + 6 * 2 + 6; // header + 2 slots + trailing pair
        let bodies = [(0u8, b"NamedNode".as_slice()), (5u8, b"Ref".as_slice())];
        for (i, (indent, suffix)) in bodies.iter().enumerate() {
            let slot_ofs = 6 * (1 + i);
            page[slot_ofs] = *indent;
            page[slot_ofs + 1] = 0;
            page[slot_ofs + 2..slot_ofs + 4].copy_from_slice(&0u16.to_le_bytes());
            page[slot_ofs + 4..slot_ofs + 6].copy_from_slice(&(cursor as u16).to_le_bytes());
            page[cursor] = 0; // skip byte
            let body = record(suffix, b"v");
            page[cursor + 1..cursor + 1 + body.len()].copy_from_slice(&body);
            cursor += 1 + body.len();
        }

        let decoded = decode(&page, LayoutVariant::V16, 0).unwrap();
        assert!(decoded.is_leaf());
        assert_eq!(decoded.key(0), b"NamedNode");
        assert_eq!(decoded.key(1), b"NamedRef");
    }

    #[test]
    fn v20_has_no_skip_byte() {
        let mut page = vec![0u8; 64];
        page[0..4].copy_from_slice(&0u32.to_le_bytes());
        page[4..6].copy_from_slice(&1u16.to_le_bytes());

        let slot_ofs = 6;
        let rec_ofs = 6 + 6 * 2; // header + 1 slot + trailing pair, no skip byte
        page[slot_ofs..slot_ofs + 2].copy_from_slice(&0u16.to_le_bytes()); // indent
        page[slot_ofs + 2..slot_ofs + 4].copy_from_slice(&0u16.to_le_bytes()); // aux
        page[slot_ofs + 4..slot_ofs + 6].copy_from_slice(&(rec_ofs as u16).to_le_bytes());
        let body = record(b"k", b"v");
        page[rec_ofs..rec_ofs + body.len()].copy_from_slice(&body);

        let decoded = decode(&page, LayoutVariant::V20, 0).unwrap();
        assert_eq!(decoded.key(0), b"k");
        assert_eq!(decoded.value(0), b"v");
    }

    #[test]
    fn non_ascending_leaf_keys_are_rejected() {
        let mut page = vec![0u8; 128];
        page[4..6].copy_from_slice(&2u16.to_le_bytes());
        let mut cursor = 6 + 6 * 2 + 6;
        for (i, key) in [b"bb".as_slice(), b"aa".as_slice()].iter().enumerate() {
            let slot_ofs = 6 * (1 + i);
            page[slot_ofs + 4..slot_ofs + 6].copy_from_slice(&(cursor as u16).to_le_bytes());
            page[cursor] = 0;
            let body = record(key, b"v");
            page[cursor + 1..cursor + 1 + body.len()].copy_from_slice(&body);
            cursor += 1 + body.len();
        }
        assert!(matches!(decode(&page, LayoutVariant::V16, 0), Err(IdbError::BadPage(_))));
    }

    // Invariant 2/S2 generalized: floor_search agrees with a naive linear
    // scan for any strictly ascending key set and any query key.
    proptest::proptest! {
        #[test]
        fn floor_search_matches_linear_scan(
            mut keys in proptest::collection::btree_set(0u8..=250, 0..16),
            query in 0u8..=255,
        ) {
            let keys: Vec<Vec<u8>> = {
                let mut v: Vec<u8> = keys.drain().collect();
                v.sort();
                v.into_iter().map(|k| vec![k]).collect()
            };
            let fake = FakePage(keys.clone());
            let page = fake.page();
            let got = floor_search(&page, &[query]);

            let want = keys.iter().rposition(|k| k.as_slice() <= [query].as_slice());
            let want = want.map(|i| i as i32).unwrap_or(-1);

            proptest::prop_assert_eq!(got, want);
        }
    }
}
