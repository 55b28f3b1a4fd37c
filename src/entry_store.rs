//! Contiguous, offset-sorted storage for the real entries of a sparse leaf.
//!
//! Offsets are node-local and strictly increasing. Every edit that moves the
//! virtual position of later slots is paired with a [`EntryStore::shift_offsets`]
//! call by the owner; the store itself never rebases anything on its own.

/// A stored `(offset, item)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Entry<T> {
    pub(crate) offset: u32,
    pub(crate) item: T,
}

impl<T> Entry<T> {
    #[inline]
    pub(crate) fn new(offset: u32, item: T) -> Self {
        Self { offset, item }
    }
}

#[derive(Debug)]
pub(crate) struct EntryStore<T> {
    entries: Vec<Entry<T>>,
}

impl<T> EntryStore<T> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[Entry<T>] {
        &self.entries
    }

    #[cfg(test)]
    pub(crate) fn first(&self) -> Option<&Entry<T>> {
        self.entries.first()
    }

    #[inline]
    pub(crate) fn last(&self) -> Option<&Entry<T>> {
        self.entries.last()
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> &Entry<T> {
        &self.entries[i]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, i: usize) -> &mut Entry<T> {
        &mut self.entries[i]
    }

    /// `Ok(i)` if an entry sits exactly at `offset`, otherwise `Err(i)` with
    /// the index at which such an entry would be inserted.
    #[inline]
    pub(crate) fn find(&self, offset: u32) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&offset, |e| e.offset)
    }

    /// Index of the first entry whose offset is `>= offset`.
    #[inline]
    pub(crate) fn lower_bound(&self, offset: u32) -> usize {
        match self.find(offset) {
            Ok(i) | Err(i) => i,
        }
    }

    /// Make room for `more` additional entries, doubling the allocation but
    /// never reserving past `max`.
    pub(crate) fn auto_raise_capacity(&mut self, more: usize, max: usize) {
        let needed = self.entries.len() + more;
        let cap = self.entries.capacity();
        if needed <= cap {
            return;
        }
        let target = needed.max((cap * 2).max(4).min(max));
        self.entries.reserve_exact(target - self.entries.len());
    }

    pub(crate) fn insert_at(&mut self, i: usize, entry: Entry<T>) {
        debug_assert!(i <= self.entries.len());
        debug_assert!(i == 0 || self.entries[i - 1].offset < entry.offset);
        self.entries.insert(i, entry);
    }

    /// Insert a run of entries before index `i`. The run must already be
    /// sorted and must fit between its neighbours once the caller shifts the
    /// tail.
    pub(crate) fn insert_many<I>(&mut self, i: usize, run: I)
    where
        I: IntoIterator<Item = Entry<T>>,
    {
        debug_assert!(i <= self.entries.len());
        self.entries.splice(i..i, run);
    }

    pub(crate) fn push_last(&mut self, entry: Entry<T>) {
        debug_assert!(self.last().map_or(true, |e| e.offset < entry.offset));
        self.entries.push(entry);
    }

    pub(crate) fn push_first(&mut self, entry: Entry<T>) {
        self.entries.insert(0, entry);
    }

    pub(crate) fn pop_first(&mut self) -> Option<Entry<T>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub(crate) fn pop_last(&mut self) -> Option<Entry<T>> {
        self.entries.pop()
    }

    /// Remove entries `[i1, i2)`, moving later entries down.
    pub(crate) fn remove_range(&mut self, i1: usize, i2: usize) {
        debug_assert!(i1 <= i2 && i2 <= self.entries.len());
        self.entries.drain(i1..i2);
    }

    /// Add `delta` to the offset of every entry at index `from` or later.
    pub(crate) fn shift_offsets(&mut self, from: usize, delta: i64) {
        if delta == 0 {
            return;
        }
        for e in &mut self.entries[from..] {
            let shifted = i64::from(e.offset) + delta;
            debug_assert!(
                (0..=i64::from(u32::MAX)).contains(&shifted),
                "offset shift out of range: {} + {delta}",
                e.offset
            );
            e.offset = shifted as u32;
        }
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Entry<T>> {
        self.entries.iter()
    }
}

impl<T: Clone> EntryStore<T> {
    /// Copy entries `[i1, i1 + count)` into a new store. Offsets are copied
    /// as-is.
    pub(crate) fn extract_section(&self, i1: usize, count: usize) -> Self {
        Self {
            entries: self.entries[i1..i1 + count].to_vec(),
        }
    }
}

impl<T: Clone> Clone for EntryStore<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> Default for EntryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
