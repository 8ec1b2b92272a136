//! Variable-width integer codec: packs runs of small non-negative integers
//! into 64-bit words, with the two lowest selectors reserved for dense runs
//! of zeros (the common case for the Gorilla `tag0`/`tag1`/`nulls` streams).
//!
//! Each word is `[selector: 4 bits][items: packed low to high]`. The
//! selector picks how many items are packed and how many bits each gets.
//! Values must fit in `SELECTORS[15].1 == 60` bits; every value used by this
//! crate is bounded well below that (0/1 tags, leading-zero/width counts up
//! to 64), so encoding never fails to find a selector.

use crate::error::CompressionError;
use crate::storage::FileReaderUtils;

/// (items_per_word, bits_per_item). Index is the 4-bit selector.
const SELECTORS: [(u32, u32); 16] = [
    (240, 0),
    (120, 0),
    (60, 1),
    (30, 2),
    (20, 3),
    (15, 4),
    (12, 5),
    (10, 6),
    (8, 7),
    (7, 8),
    (6, 10),
    (5, 12),
    (4, 15),
    (3, 20),
    (2, 30),
    (1, 60),
];

#[inline]
fn mask(n_bits: u32) -> u64 {
    if n_bits >= 64 {
        u64::MAX
    } else {
        (1u64 << n_bits) - 1
    }
}

pub struct Simple8bRleBuilder {
    pending: Vec<u64>,
}

impl Simple8bRleBuilder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    pub fn append(&mut self, value: u64) {
        self.pending.push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        let values = &self.pending;
        let mut i = 0;
        while i < values.len() {
            let (sel, n_items) = choose_selector(&values[i..]);
            let (_, bits) = SELECTORS[sel];
            let mut word = sel as u64;
            let mut shift = 4u32;
            for k in 0..n_items {
                let v = values.get(i + k).copied().unwrap_or(0);
                if bits > 0 {
                    word |= (v & mask(bits)) << shift;
                    shift += bits;
                }
            }
            out.extend_from_slice(&word.to_le_bytes());
            i += n_items.min(values.len() - i);
        }
        out
    }
}

impl Default for Simple8bRleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn choose_selector(remaining: &[u64]) -> (usize, usize) {
    for (sel, &(n_items, bits)) in SELECTORS.iter().enumerate() {
        let n_items = n_items as usize;
        let end = n_items.min(remaining.len());
        let slice = &remaining[..end];
        let fits = if bits == 0 {
            slice.iter().all(|&v| v == 0)
        } else {
            let max_val = mask(bits);
            slice.iter().all(|&v| v <= max_val)
        };
        if fits {
            return (sel, n_items);
        }
    }
    unreachable!("selector 15 (1 item, 60 bits) always fits a single in-range value")
}

fn decode_word(word: u64) -> Vec<u64> {
    let sel = (word & 0xF) as usize;
    let (n_items, bits) = SELECTORS[sel];
    let mut items = Vec::with_capacity(n_items as usize);
    let mut shift = 4u32;
    for _ in 0..n_items {
        let v = if bits == 0 { 0 } else { (word >> shift) & mask(bits) };
        items.push(v);
        shift += bits;
    }
    items
}

fn total_items(buf: &[u8]) -> usize {
    let mut total = 0usize;
    let mut off = 0;
    while off + 8 <= buf.len() {
        let word = FileReaderUtils::read_u64_8(&buf[off..off + 8]);
        total += SELECTORS[(word & 0xF) as usize].0 as usize;
        off += 8;
    }
    total
}

/// Total logical item count (including RLE-expanded runs) a serialized
/// stream decodes to. Used by the wire `recv` path to recompute a count that
/// the internal blob format otherwise stores explicitly in its header.
pub fn total_item_count(buf: &[u8]) -> usize {
    total_items(buf)
}

/// Generic over the backing storage so the same decode logic serves both a
/// borrowed slice (the zero-copy row-by-row iterators) and an owned buffer
/// (the lazy per-column iterator, which must outlive the blob reference it
/// was built from).
pub struct Simple8bRleForwardIter<B: AsRef<[u8]>> {
    buf: B,
    word_idx: usize,
    item_idx: usize,
    current_items: Vec<u64>,
}

impl<B: AsRef<[u8]>> Simple8bRleForwardIter<B> {
    pub fn new(buf: B) -> Self {
        let mut it = Self {
            buf,
            word_idx: 0,
            item_idx: 0,
            current_items: Vec::new(),
        };
        it.load_word();
        it
    }

    fn load_word(&mut self) {
        self.item_idx = 0;
        self.current_items.clear();
        let off = self.word_idx * 8;
        if off + 8 > self.buf.as_ref().len() {
            return;
        }
        let word = FileReaderUtils::read_u64_8(&self.buf.as_ref()[off..off + 8]);
        self.current_items = decode_word(word);
    }
}

impl<B: AsRef<[u8]>> Iterator for Simple8bRleForwardIter<B> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            if self.item_idx < self.current_items.len() {
                let v = self.current_items[self.item_idx];
                self.item_idx += 1;
                return Some(v);
            }
            if (self.word_idx + 1) * 8 > self.buf.as_ref().len() {
                return None;
            }
            self.word_idx += 1;
            self.load_word();
            if self.current_items.is_empty() {
                return None;
            }
        }
    }
}

/// Reverse iterator. `count` is the number of logical (non-padding) items in
/// the stream; the final word may otherwise contain trailing zero padding up
/// to its selector's item count, which would otherwise surface first.
pub struct Simple8bRleReverseIter<B: AsRef<[u8]>> {
    buf: B,
    word_idx: isize,
    item_idx: isize,
    current_items: Vec<u64>,
    skip_remaining: usize,
}

impl<B: AsRef<[u8]>> Simple8bRleReverseIter<B> {
    pub fn new(buf: B, count: usize) -> Self {
        let num_words = (buf.as_ref().len() / 8) as isize;
        let padding = total_items(buf.as_ref()).saturating_sub(count);
        let mut it = Self {
            buf,
            word_idx: num_words - 1,
            item_idx: -1,
            current_items: Vec::new(),
            skip_remaining: padding,
        };
        if num_words > 0 {
            it.load_word();
        }
        it
    }

    fn load_word(&mut self) {
        let off = self.word_idx as usize * 8;
        let word = FileReaderUtils::read_u64_8(&self.buf.as_ref()[off..off + 8]);
        self.current_items = decode_word(word);
        if self.skip_remaining > 0 {
            let drop = self.skip_remaining.min(self.current_items.len());
            let new_len = self.current_items.len() - drop;
            self.current_items.truncate(new_len);
            self.skip_remaining -= drop;
        }
        self.item_idx = self.current_items.len() as isize - 1;
    }
}

impl<B: AsRef<[u8]>> Iterator for Simple8bRleReverseIter<B> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            if self.item_idx >= 0 {
                let v = self.current_items[self.item_idx as usize];
                self.item_idx -= 1;
                return Some(v);
            }
            self.word_idx -= 1;
            if self.word_idx < 0 {
                return None;
            }
            self.load_word();
        }
    }
}

/// Bulk bitmap fast path for the 0/1-valued `tag0`/`tag1`/`nulls` streams.
pub fn decode_bitmap(buf: &[u8], count: usize) -> Result<Vec<bool>, CompressionError> {
    let mut it = Simple8bRleForwardIter::new(buf);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        match it.next() {
            Some(0) => out.push(false),
            Some(1) => out.push(true),
            Some(_) => return Err(CompressionError::corrupted("bitmap stream value not 0/1")),
            None => return Err(CompressionError::out_of_sync("bitmap stream exhausted early")),
        }
    }
    Ok(out)
}
