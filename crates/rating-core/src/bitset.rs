//! Fixed-capacity bit set over competitor or group ids.
//!
//! Each id maps to one bit in a vector of 64-bit words, so membership tests
//! during group simplification are a shift and a mask.

use std::fmt;

const WORD_BITS: usize = 64;

/// A bit vector addressed by `usize` ids.
///
/// Capacity is fixed at construction. Inserting an id beyond it is a logic
/// error caught by a debug assertion; release builds grow the set instead.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct BitSet {
    words: Vec<u64>,
    capacity: usize,
}

impl BitSet {
    /// Creates an empty set able to hold ids `0..capacity`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
        }
    }

    /// Number of ids the set was sized for.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    const fn locate(id: usize) -> (usize, u64) {
        (id / WORD_BITS, 1u64 << (id % WORD_BITS))
    }

    /// Sets the bit for `id`. Returns true if it was not set before.
    #[inline]
    pub fn insert(&mut self, id: usize) -> bool {
        debug_assert!(id < self.capacity, "id {id} beyond capacity {}", self.capacity);
        let (word, mask) = Self::locate(id);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
            self.capacity = self.words.len() * WORD_BITS;
        }
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    /// Returns true if the bit for `id` is set.
    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        let (word, mask) = Self::locate(id);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Clears the bit for `id`. Returns true if it was set.
    #[inline]
    pub fn remove(&mut self, id: usize) -> bool {
        let (word, mask) = Self::locate(id);
        match self.words.get_mut(word) {
            Some(w) => {
                let was_set = *w & mask != 0;
                *w &= !mask;
                was_set
            }
            None => false,
        }
    }

    /// Clears every bit, keeping the capacity.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Number of ids in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterates over the set ids in ascending order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            words: &self.words,
            index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let ids: Vec<usize> = iter.into_iter().collect();
        let capacity = ids.iter().max().map_or(0, |&m| m + 1);
        let mut set = BitSet::with_capacity(capacity);
        for id in ids {
            set.insert(id);
        }
        set
    }
}

/// Iterator over the ids of a [`BitSet`], lowest first.
pub struct BitSetIter<'a> {
    words: &'a [u64],
    index: usize,
    current: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.index * WORD_BITS + bit);
            }
            self.index += 1;
            self.current = *self.words.get(self.index)?;
        }
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;
    type IntoIter = BitSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitset_insert_and_contains() {
        let mut set = BitSet::with_capacity(130);
        assert!(set.insert(0));
        assert!(set.insert(64));
        assert!(set.insert(129));
        assert!(!set.insert(64));
        assert!(set.contains(0));
        assert!(set.contains(129));
        assert!(!set.contains(1));
        assert!(!set.contains(500));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn bitset_remove_and_clear() {
        let mut set = BitSet::with_capacity(10);
        set.insert(3);
        set.insert(7);
        assert!(set.remove(3));
        assert!(!set.remove(3));
        assert!(!set.contains(3));
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.capacity(), 10);
    }

    #[test]
    fn bitset_iterates_in_order() {
        let set: BitSet = [200, 5, 63, 64, 0].into_iter().collect();
        let ids: Vec<usize> = set.iter().collect();
        assert_eq!(ids, vec![0, 5, 63, 64, 200]);
    }

    #[test]
    fn empty_bitset_iterates_nothing() {
        let set = BitSet::with_capacity(0);
        assert_eq!(set.iter().next(), None);
        assert!(set.is_empty());
    }
}
