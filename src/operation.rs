//! Bulk mutation requests handed to sparse leaves.
//!
//! A [`SparseOperation`] is owned by the caller and may need several leaves
//! (or several calls on one leaf, interleaved with splits) to finish. The leaf
//! reports progress by advancing [`SparseOperation::source_index`].

/// Which neighbour [`SparseSource::nearest`] should settle for when nothing
/// is stored exactly at the requested position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Previous stored item.
    Lower,
    /// Only an exact hit.
    Exact,
    /// Next stored item.
    Higher,
}

/// Random-access view over a sequence where most positions are empty.
pub trait SparseSource<T> {
    /// Virtual length, counting empty positions.
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored item at `index`, or the closest one in `direction`.
    fn nearest(&self, index: u32, direction: Direction) -> Option<(u32, T)>;
}

impl<T: Clone> SparseSource<T> for [Option<T>] {
    fn len(&self) -> u32 {
        u32::try_from(<[Option<T>]>::len(self)).expect("sparse source longer than u32::MAX")
    }

    fn nearest(&self, index: u32, direction: Direction) -> Option<(u32, T)> {
        let at = index as usize;
        if let Some(Some(item)) = self.get(at) {
            return Some((index, item.clone()));
        }
        let found = match direction {
            Direction::Exact => None,
            Direction::Higher => self
                .iter()
                .enumerate()
                .skip(at)
                .find_map(|(i, slot)| slot.as_ref().map(|item| (i, item))),
            Direction::Lower => self[..at.min(<[Option<T>]>::len(self))]
                .iter()
                .enumerate()
                .rev()
                .find_map(|(i, slot)| slot.as_ref().map(|item| (i, item))),
        };
        found.map(|(i, item)| (i as u32, item.clone()))
    }
}

impl<T: Clone> SparseSource<T> for Vec<Option<T>> {
    #[inline]
    fn len(&self) -> u32 {
        SparseSource::<T>::len(self.as_slice())
    }

    #[inline]
    fn nearest(&self, index: u32, direction: Direction) -> Option<(u32, T)> {
        SparseSource::<T>::nearest(self.as_slice(), index, direction)
    }
}

/// Lets a borrowed slice (`&&[Option<T>]`) coerce to `&dyn SparseSource<T>`.
impl<T, S: SparseSource<T> + ?Sized> SparseSource<T> for &S {
    #[inline]
    fn len(&self) -> u32 {
        (**self).len()
    }

    #[inline]
    fn nearest(&self, index: u32, direction: Direction) -> Option<(u32, T)> {
        (**self).nearest(index, direction)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Replace,
}

/// Where the items of an operation come from.
pub enum OpSource<'a, T> {
    /// Empty space: insert blank slots, or clear a range to empty.
    Empty,
    /// One item, no backing array.
    Item(T),
    Dense(&'a [T]),
    Sparse(&'a dyn SparseSource<T>),
}

/// A pending insert or replace, advanced in place by the leaves it visits.
pub struct SparseOperation<'a, T> {
    pub(crate) kind: OpKind,
    pub(crate) source: OpSource<'a, T>,
    /// Cursor into the source: everything before it has been applied.
    pub source_index: u32,
    pub source_count: u32,
}

fn slice_len<T>(items: &[T]) -> u32 {
    u32::try_from(items.len()).expect("sparse operation source longer than u32::MAX")
}

impl<'a, T> SparseOperation<'a, T> {
    fn new(kind: OpKind, source: OpSource<'a, T>, source_count: u32) -> Self {
        Self {
            kind,
            source,
            source_index: 0,
            source_count,
        }
    }

    /// Insert `count` empty slots.
    pub fn insert_empty(count: u32) -> Self {
        Self::new(OpKind::Insert, OpSource::Empty, count)
    }

    pub fn insert_item(item: T) -> Self {
        Self::new(OpKind::Insert, OpSource::Item(item), 1)
    }

    pub fn insert_dense(items: &'a [T]) -> Self {
        Self::new(OpKind::Insert, OpSource::Dense(items), slice_len(items))
    }

    /// Insert the whole of `source`, keeping its empty positions empty.
    pub fn insert_sparse(source: &'a dyn SparseSource<T>) -> Self {
        Self::new(OpKind::Insert, OpSource::Sparse(source), source.len())
    }

    /// Reset `count` slots to empty without changing any length.
    pub fn clear(count: u32) -> Self {
        Self::new(OpKind::Replace, OpSource::Empty, count)
    }

    pub fn replace_item(item: T) -> Self {
        Self::new(OpKind::Replace, OpSource::Item(item), 1)
    }

    pub fn replace_dense(items: &'a [T]) -> Self {
        Self::new(OpKind::Replace, OpSource::Dense(items), slice_len(items))
    }

    #[inline]
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    #[inline]
    pub fn is_insert(&self) -> bool {
        self.kind == OpKind::Insert
    }

    #[inline]
    pub fn write_empty(&self) -> bool {
        matches!(self.source, OpSource::Empty)
    }

    #[inline]
    pub fn source(&self) -> &OpSource<'a, T> {
        &self.source
    }

    /// Items of the source not yet applied.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.source_count - self.source_index
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.source_index >= self.source_count
    }
}

/// Structural follow-up a leaf asks of its caller after a sparse operation.
#[derive(Debug)]
pub enum Restructure<N> {
    None,
    /// The leaf was full. Replace it with `left` and `right` and resume the
    /// operation on whichever half covers the cursor.
    Split { left: N, right: N },
    /// The leaf dropped to a third of its capacity or less and should borrow
    /// from or merge with a sibling.
    Undersized,
}

impl<N> Restructure<N> {
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Restructure::None)
    }

    #[inline]
    pub fn is_split(&self) -> bool {
        matches!(self, Restructure::Split { .. })
    }
}

/// Result of [`crate::SparseMutable::do_sparse_operation`].
#[derive(Debug)]
pub struct OpOutcome<N> {
    /// Virtual slots added to the leaf. Always 0 for replacements.
    pub inserted: u32,
    pub restructure: Restructure<N>,
}

impl<N> OpOutcome<N> {
    #[inline]
    pub(crate) fn done(inserted: u32) -> Self {
        Self {
            inserted,
            restructure: Restructure::None,
        }
    }

    #[inline]
    pub(crate) fn split(left: N, right: N) -> Self {
        Self {
            inserted: 0,
            restructure: Restructure::Split { left, right },
        }
    }

    #[inline]
    pub(crate) fn undersized() -> Self {
        Self {
            inserted: 0,
            restructure: Restructure::Undersized,
        }
    }
}
