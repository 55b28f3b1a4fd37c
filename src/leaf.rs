//! Sparse leaf node.
//!
//! A leaf represents `total` virtual slots but only stores the slots that
//! hold a value, as `(offset, item)` pairs sorted by offset. Offsets are
//! relative to the leaf's own start. Leading empty space shows up as a first
//! offset above 0, trailing empty space as `last.offset + 1 < total`.
//!
//! Capacity, fullness and undersize are all measured in real entries. A leaf
//! only holds zero entries when it is the only node of an entirely empty list;
//! the tree layer is responsible for that.

use crate::entry_store::{Entry, EntryStore};
use crate::operation::{Direction, OpOutcome, OpSource, SparseOperation, SparseSource};
use crate::tracing_helpers::{debug_log, trace_log};
use crate::{NodeSize, RangeNode, SparseMutable};

#[derive(Debug)]
pub struct SparseLeaf<T> {
    list: EntryStore<T>,
    total: u32,
    max_node_size: u16,
    frozen: bool,
}

impl<T> SparseLeaf<T> {
    /// An empty leaf with no virtual slots.
    pub fn new(max_node_size: NodeSize) -> Self {
        Self::from_parts(max_node_size.get(), EntryStore::new(), 0)
    }

    fn from_parts(max_node_size: u16, list: EntryStore<T>, total: u32) -> Self {
        debug_assert!(max_node_size >= crate::MIN_NODE_SIZE);
        Self {
            list,
            total,
            max_node_size,
            frozen: false,
        }
    }

    #[inline]
    pub fn max_node_size(&self) -> u16 {
        self.max_node_size
    }

    /// Number of real entries.
    #[inline]
    pub fn real_item_count(&self) -> usize {
        self.list.len()
    }

    /// Real entries in offset order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.list.iter().map(|e| (e.offset, &e.item))
    }

    /// The stored item at `index`, distinguishing an empty slot from a
    /// stored default.
    pub fn try_get(&self, index: u32) -> Option<&T> {
        match self.list.find(index) {
            Ok(i) => Some(&self.list.get(i).item),
            Err(_) => None,
        }
    }

    /// The stored item at `index`, or its closest stored neighbour in
    /// `direction`.
    pub fn nearest(&self, index: u32, direction: Direction) -> Option<(u32, &T)> {
        let i = match self.list.find(index) {
            Ok(i) => i,
            Err(i) => match direction {
                Direction::Exact => return None,
                Direction::Higher => i,
                Direction::Lower => i.checked_sub(1)?,
            },
        };
        self.list.as_slice().get(i).map(|e| (e.offset, &e.item))
    }

    #[inline]
    fn capacity(&self) -> usize {
        usize::from(self.max_node_size)
    }

    #[inline]
    fn full(&self) -> bool {
        self.list.len() >= self.capacity()
    }

    #[inline]
    fn undersized(&self) -> bool {
        self.list.len() * 3 <= self.capacity()
    }

    /// Entry index range `[i1, i2)` covering virtual slots
    /// `[index, index + count)`.
    fn section_range(&self, index: u32, count: u32) -> (usize, usize) {
        let i1 = self.list.lower_bound(index);
        let i2 = self.list.lower_bound(index.saturating_add(count));
        (i1, i2)
    }

    fn insert_space(&mut self, index: u32, count: u32) {
        let i = self.list.lower_bound(index);
        self.list.shift_offsets(i, i64::from(count));
        self.total += count;
    }

    /// Overwrite the slot at `index`, creating an entry if it was empty.
    /// Fails only when a new entry is needed and the leaf is full.
    fn replace_single(&mut self, index: u32, item: T) -> bool {
        debug_assert!(index < self.total);
        match self.list.find(index) {
            Ok(i) => {
                self.list.get_mut(i).item = item;
                true
            }
            Err(_) if self.full() => false,
            Err(i) => {
                self.list.auto_raise_capacity(1, self.capacity());
                self.list.insert_at(i, Entry::new(index, item));
                true
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        assert!(self.list.len() <= self.capacity(), "over capacity");
        for pair in self.list.as_slice().windows(2) {
            assert!(
                pair[0].offset < pair[1].offset,
                "offsets must be strictly increasing"
            );
        }
        if let Some(last) = self.list.last() {
            assert!(last.offset < self.total, "entry beyond virtual length");
        }
    }
}

impl<T: Clone> SparseLeaf<T> {
    /// Split a leaf in two around its middle real entry.
    ///
    /// Empty space before the dividing entry stays on the left; the dividing
    /// entry becomes offset 0 of the right half. Both virtual length and real
    /// count are conserved. `self` is left untouched.
    pub fn split(&self) -> (Self, Self) {
        debug_assert!(!self.list.is_empty(), "cannot split a leaf without entries");
        let count = self.list.len();
        let div_at = count / 2;
        let div_offset = self.list.get(div_at).offset;

        let left = Self::from_parts(
            self.max_node_size,
            self.list.extract_section(0, div_at),
            div_offset,
        );
        let mut right_list = self.list.extract_section(div_at, count - div_at);
        right_list.shift_offsets(0, -i64::from(div_offset));
        let right = Self::from_parts(self.max_node_size, right_list, self.total - div_offset);

        trace_log!(
            real = count,
            total = self.total,
            div_offset,
            "split sparse leaf"
        );
        (left, right)
    }

    fn split_outcome(&self) -> OpOutcome<Self> {
        let (left, right) = self.split();
        OpOutcome::split(left, right)
    }

    fn do_insert(&mut self, op: &mut SparseOperation<'_, T>, index: u32) -> OpOutcome<Self> {
        debug_assert!(
            self.total.checked_add(op.remaining()).is_some(),
            "insert would overflow the virtual length"
        );
        debug_assert!(index <= self.total);

        if op.write_empty() {
            debug_assert_eq!(op.source_index, 0, "empty space is inserted in one call");
            let count = op.source_count;
            self.insert_space(index, count);
            op.source_index = count;
            return OpOutcome::done(count);
        }

        let room = self.capacity() - self.list.len();
        if room == 0 {
            return self.split_outcome();
        }

        let max = self.capacity();
        let i = self.list.lower_bound(index);
        let cursor = op.source_index;

        match &op.source {
            OpSource::Empty => unreachable!("handled above"),
            OpSource::Item(item) => {
                debug_assert_eq!(op.source_count, 1);
                self.list.auto_raise_capacity(1, max);
                self.list.insert_at(i, Entry::new(index, item.clone()));
                self.list.shift_offsets(i + 1, 1);
                self.total += 1;
                op.source_index += 1;
                OpOutcome::done(1)
            }
            OpSource::Dense(items) => {
                let left_to_insert = op.source_count - cursor;
                debug_assert!(left_to_insert > 0);
                let n = room.min(left_to_insert as usize);
                let start = cursor as usize;

                self.list.auto_raise_capacity(n, max);
                self.list.insert_many(
                    i,
                    items[start..start + n]
                        .iter()
                        .zip(index..)
                        .map(|(item, off)| Entry::new(off, item.clone())),
                );
                let n = n as u32;
                self.list.shift_offsets(i + n as usize, i64::from(n));
                self.total += n;
                op.source_index += n;
                OpOutcome::done(n)
            }
            OpSource::Sparse(source) => {
                let source_len = op.source_count;
                let mut run = Vec::with_capacity(room);
                let mut next = cursor;
                let mut filled = false;
                while next < source_len {
                    let Some((si, item)) = source.nearest(next, Direction::Higher) else {
                        break;
                    };
                    if si >= source_len {
                        break;
                    }
                    debug_assert!(si >= next, "sparse source went backwards");
                    run.push(Entry::new(index + (si - cursor), item));
                    next = si + 1;
                    if run.len() == room {
                        filled = true;
                        break;
                    }
                }

                let new_index = if filled { next } else { source_len };
                let inserted = new_index - cursor;
                let fetched = run.len();

                self.list.auto_raise_capacity(fetched, max);
                self.list.insert_many(i, run);
                self.list.shift_offsets(i + fetched, i64::from(inserted));
                self.total += inserted;
                op.source_index = new_index;
                OpOutcome::done(inserted)
            }
        }
    }

    fn do_replace(&mut self, op: &mut SparseOperation<'_, T>, index: u32) -> OpOutcome<Self> {
        debug_assert!(index <= self.total);

        if op.write_empty() {
            let left_to_replace = op.remaining();
            let (i1, i2) = self.section_range(index, left_to_replace);
            self.list.remove_range(i1, i2);
            op.source_index += left_to_replace.min(self.total - index);

            if self.undersized() {
                debug_log!(real = self.list.len(), "cleared sparse leaf is undersized");
                return OpOutcome::undersized();
            }
            return OpOutcome::done(0);
        }

        let cursor = op.source_index;
        match &op.source {
            OpSource::Empty => unreachable!("handled above"),
            OpSource::Sparse(_) => unreachable!("replacing from a sparse source is not supported"),
            OpSource::Item(item) => {
                debug_assert!(op.source_index == 0 && op.source_count == 1);
                if !self.replace_single(index, item.clone()) {
                    return self.split_outcome();
                }
                op.source_index += 1;
            }
            OpSource::Dense(items) => {
                // Items past the end of this leaf belong to the next one.
                while op.source_index < op.source_count {
                    let k = op.source_index;
                    let at = index + (k - cursor);
                    if at >= self.total {
                        break;
                    }
                    if !self.replace_single(at, items[k as usize].clone()) {
                        return self.split_outcome();
                    }
                    op.source_index += 1;
                }
            }
        }
        OpOutcome::done(0)
    }
}

impl<T: Clone + Default> RangeNode<T> for SparseLeaf<T> {
    fn get(&self, index: u32) -> T {
        self.try_get(index).cloned().unwrap_or_default()
    }

    #[inline]
    fn total_count(&self) -> u32 {
        self.total
    }

    #[inline]
    fn local_count(&self) -> usize {
        self.list.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.full()
    }

    #[inline]
    fn is_undersized(&self) -> bool {
        self.undersized()
    }

    #[inline]
    fn capacity_left(&self) -> usize {
        self.capacity().saturating_sub(self.list.len())
    }

    fn last_item(&self) -> T {
        match self.list.last() {
            Some(e) if e.offset + 1 == self.total => e.item.clone(),
            _ => T::default(),
        }
    }

    fn remove_at(&mut self, index: u32, count: u32) -> bool {
        assert!(!self.frozen, "remove_at on a frozen sparse leaf");
        debug_assert!(count <= self.total);
        debug_assert!(index.checked_add(count).is_some());
        if count == 0 {
            return self.undersized();
        }

        let (i1, i2) = self.section_range(index, count);
        self.list.remove_range(i1, i2);
        self.list.shift_offsets(i1, -i64::from(count));
        self.total -= count;

        self.undersized()
    }

    fn take_from_right(&mut self, right: &mut Self) -> u32 {
        if self.frozen || right.frozen {
            trace_log!("take_from_right refused: frozen participant");
            return 0;
        }
        if !right.list.is_empty() && self.full() {
            return 0;
        }

        let amount = match right.list.pop_first() {
            // Nothing real left on the right: take all of its empty space.
            None => right.total,
            Some(mut entry) => {
                let amount = entry.offset + 1;
                entry.offset += self.total;
                let max = self.capacity();
                self.list.auto_raise_capacity(1, max);
                self.list.push_last(entry);
                right.list.shift_offsets(0, -i64::from(amount));
                debug_assert_eq!(
                    self.list.last().map(|e| e.offset + 1),
                    Some(self.total + amount)
                );
                amount
            }
        };
        right.total -= amount;
        self.total += amount;
        trace_log!(amount, "took from right sibling");
        amount
    }

    fn take_from_left(&mut self, left: &mut Self) -> u32 {
        if self.frozen || left.frozen {
            trace_log!("take_from_left refused: frozen participant");
            return 0;
        }
        if !left.list.is_empty() && self.full() {
            return 0;
        }

        let amount = match left.list.pop_last() {
            None => {
                let amount = left.total;
                self.list.shift_offsets(0, i64::from(amount));
                amount
            }
            Some(mut entry) => {
                let amount = left.total - entry.offset;
                entry.offset = 0;
                let max = self.capacity();
                self.list.auto_raise_capacity(1, max);
                self.list.push_first(entry);
                self.list.shift_offsets(1, i64::from(amount));
                amount
            }
        };
        left.total -= amount;
        self.total += amount;
        trace_log!(amount, "took from left sibling");
        amount
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    #[inline]
    fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn detached_clone(&self) -> Self {
        Self::from_parts(self.max_node_size, self.list.clone(), self.total)
    }

    fn copy_section(&self, index: u32, count: u32) -> Self {
        debug_assert!(index
            .checked_add(count)
            .map_or(false, |end| end <= self.total));
        let (i1, i2) = self.section_range(index, count);
        let mut section = self.list.extract_section(i1, i2 - i1);
        section.shift_offsets(0, -i64::from(index));
        Self::from_parts(self.max_node_size, section, count)
    }

    fn immutable_count(&self, exclude_sparse: bool) -> u32 {
        if !self.frozen {
            return 0;
        }
        if exclude_sparse {
            self.list.len() as u32
        } else {
            self.total
        }
    }
}

impl<T: Clone + Default> SparseMutable<T> for SparseLeaf<T> {
    fn do_sparse_operation(
        &mut self,
        op: &mut SparseOperation<'_, T>,
        index: u32,
    ) -> OpOutcome<Self> {
        assert!(!self.frozen, "sparse operation on a frozen sparse leaf");
        if op.is_insert() {
            self.do_insert(op, index)
        } else {
            self.do_replace(op, index)
        }
    }

    fn sparse_get_nearest(&self, index: &mut Option<u32>, direction: Direction) -> T {
        match index.and_then(|at| self.nearest(at, direction)) {
            Some((offset, item)) => {
                *index = Some(offset);
                item.clone()
            }
            None => {
                *index = None;
                T::default()
            }
        }
    }
}

impl<T: Clone> SparseSource<T> for SparseLeaf<T> {
    fn len(&self) -> u32 {
        self.total
    }

    fn nearest(&self, index: u32, direction: Direction) -> Option<(u32, T)> {
        SparseLeaf::nearest(self, index, direction).map(|(offset, item)| (offset, item.clone()))
    }
}
