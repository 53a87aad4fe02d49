use humansize::{format_size, DECIMAL};

use crate::{HasLength, MergableSpan, RleKeyed, Searchable, SplitableSpanHelpers};

/// Pairs a run-length key (an LV, a seq, ...) with a value. The key of the pair is the key of its
/// *first* logical element; `RleVec` uses it to binary-search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KVPair<V>(pub usize, pub V);

impl<V: HasLength> HasLength for KVPair<V> {
    fn len(&self) -> usize { self.1.len() }
}

impl<V: HasLength + SplitableSpanHelpers> SplitableSpanHelpers for KVPair<V> {
    fn truncate_h(&mut self, at: usize) -> Self {
        KVPair(self.0 + at, self.1.truncate_h(at))
    }
}

impl<V: MergableSpan> MergableSpan for KVPair<V> {
    fn can_append(&self, other: &Self) -> bool {
        self.0 + self.1.len() == other.0 && self.1.can_append(&other.1)
    }
    fn append(&mut self, other: Self) {
        self.1.append(other.1);
    }
}

impl<V> RleKeyed for KVPair<V> {
    fn rle_key(&self) -> usize { self.0 }
}

impl<V: Searchable> Searchable for KVPair<V> {
    type Item = V::Item;
    fn get_offset(&self, loc: Self::Item) -> Option<usize> { self.1.get_offset(loc) }
    fn at_offset(&self, offset: usize) -> Self::Item { self.1.at_offset(offset) }
}

/// A densely packed, sorted, run-length encoded list of spans, keyed by `RleKeyed::rle_key`.
///
/// Entries are kept RLE-maximal: `push` always tries to extend the previous entry before
/// appending a new one. Lookups are O(log n) binary search; mutation is always at the tail, so
/// `push` is amortized O(1).
#[derive(Debug, Clone, Default)]
pub struct RleVec<V>(pub Vec<V>);

/// Plain-data byte-footprint summary of an [`RleVec`], for a host to print or log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleStats {
    pub entry_byte_size: usize,
    pub len: usize,
    pub capacity: usize,
}

impl<V> RleVec<V> {
    pub fn new() -> Self { Self(Vec::new()) }

    pub fn len_entries(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn last(&self) -> Option<&V> { self.0.last() }

    pub fn get_stats(&self) -> RleStats {
        RleStats {
            entry_byte_size: std::mem::size_of::<V>(),
            len: self.0.len(),
            capacity: self.0.capacity(),
        }
    }

    pub fn print_stats(&self, name: &str) {
        let size = std::mem::size_of::<V>();
        println!("-------- {name} RLE --------");
        println!("number of {size} byte entries: {}", self.0.len());
        println!("allocated size: {}", format_size(self.0.capacity() * size, DECIMAL));
        println!("(used size: {})", format_size(self.0.len() * size, DECIMAL));
    }
}

impl<V: HasLength + RleKeyed> RleVec<V> {
    /// The exclusive end key of the last entry - i.e. one past the highest key stored.
    pub fn end(&self) -> usize {
        self.0.last().map_or(0, |last| last.rle_key() + last.len())
    }

    /// Find the index of the entry containing `needle`, if any.
    pub fn find_index(&self, needle: usize) -> Option<usize> {
        self.0
            .binary_search_by(|entry| {
                let start = entry.rle_key();
                let end = start + entry.len();
                if needle < start {
                    std::cmp::Ordering::Greater
                } else if needle >= end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
    }

    pub fn find(&self, needle: usize) -> Option<&V> {
        self.find_index(needle).map(|idx| &self.0[idx])
    }

    /// Returns the entry containing `needle` along with the offset of `needle` within it.
    pub fn find_with_offset(&self, needle: usize) -> Option<(&V, usize)> {
        let idx = self.find_index(needle)?;
        let entry = &self.0[idx];
        Some((entry, needle - entry.rle_key()))
    }
}

impl<V: HasLength + MergableSpan + RleKeyed> RleVec<V> {
    /// Push a new entry, merging it into the previous entry when it is RLE-contiguous.
    ///
    /// Returns `true` if the push merged into the existing tail entry.
    pub fn push(&mut self, entry: V) -> bool {
        if let Some(last) = self.0.last_mut() {
            if last.can_append(&entry) {
                last.append(entry);
                return true;
            }
        }
        self.0.push(entry);
        false
    }
}

impl<V> IntoIterator for RleVec<V> {
    type Item = V;
    type IntoIter = std::vec::IntoIter<V>;
    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl<'a, V> IntoIterator for &'a RleVec<V> {
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}
