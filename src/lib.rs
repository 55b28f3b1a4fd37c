//! # sparse-alist
//!
//! Leaf node of a sparse, B+tree-backed list: a list indexed by position in
//! which most slots may be empty without occupying any memory.
//!
//! A [`SparseLeaf`] stores only its real `(offset, value)` pairs together with
//! a virtual length. Splitting and merging decisions are driven by the number
//! of real entries, so a leaf covering millions of empty slots costs the same
//! as one covering a handful. All growth goes through the bulk
//! [`SparseOperation`] protocol; the tree walking above the leaves belongs to
//! the caller.
//!
//! ## Example
//!
//! ```rust
//! use sparse_alist::{NodeSize, RangeNode, SparseLeaf, SparseMutable, SparseOperation};
//!
//! let mut leaf: SparseLeaf<u32> = SparseLeaf::new(NodeSize::default());
//!
//! let mut op = SparseOperation::insert_empty(1_000);
//! leaf.do_sparse_operation(&mut op, 0);
//!
//! let mut op = SparseOperation::replace_item(7);
//! leaf.do_sparse_operation(&mut op, 500);
//!
//! assert_eq!(leaf.total_count(), 1_000);
//! assert_eq!(leaf.local_count(), 1);
//! assert_eq!(leaf.get(500), 7);
//! assert_eq!(leaf.get(499), 0);
//! ```
//!
//! The leaf has no `set` or `insert` of its own, so a direct slot write is
//! rejected as a missing method (E0599):
//!
//! ```compile_fail,E0599
//! use sparse_alist::{NodeSize, SparseLeaf};
//!
//! let mut leaf: SparseLeaf<u32> = SparseLeaf::new(NodeSize::default());
//! leaf.insert(0, 1);
//! ```
//!
//! Code holding only a [`RangeNode`] bound cannot start a bulk operation
//! either; `do_sparse_operation` lives on [`SparseMutable`]:
//!
//! ```compile_fail,E0599
//! use sparse_alist::{RangeNode, SparseOperation};
//!
//! fn fill(node: &mut impl RangeNode<u32>) {
//!     let mut op = SparseOperation::insert_item(1u32);
//!     node.do_sparse_operation(&mut op, 0);
//! }
//! ```

#![deny(unsafe_code)]

mod tracing_helpers;

mod entry_store;
mod error;
mod leaf;
mod operation;

pub use error::ConfigError;
pub use leaf::SparseLeaf;
pub use operation::{
    Direction, OpKind, OpOutcome, OpSource, Restructure, SparseOperation, SparseSource,
};

// =============================================================================
// Configuration
// =============================================================================

/// Smallest leaf capacity that still splits into two non-empty halves.
pub const MIN_NODE_SIZE: u16 = 3;
/// Leaf capacity used by [`NodeSize::default`].
pub const DEFAULT_NODE_SIZE: u16 = 48;

/// Maximum number of real entries a leaf may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeSize(u16);

impl NodeSize {
    pub fn new(size: u16) -> Result<Self, ConfigError> {
        if size < MIN_NODE_SIZE {
            return Err(ConfigError::NodeSizeTooSmall {
                requested: size,
                minimum: MIN_NODE_SIZE,
            });
        }
        Ok(Self(size))
    }

    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl Default for NodeSize {
    fn default() -> Self {
        Self(DEFAULT_NODE_SIZE)
    }
}

impl TryFrom<u16> for NodeSize {
    type Error = ConfigError;

    fn try_from(size: u16) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

// =============================================================================
// Node capabilities
// =============================================================================

/// Operations every leaf kind offers to the tree layer: lookup, removal,
/// sibling borrowing, and copy-on-write support.
///
/// Sizes are in virtual slots (`u32`) unless stated otherwise; counts of real
/// entries are `usize`.
pub trait RangeNode<T>: Sized {
    /// Value at `index`, or `T::default()` for an empty slot.
    fn get(&self, index: u32) -> T;

    /// Virtual length, counting empty slots.
    fn total_count(&self) -> u32;

    /// Number of real entries.
    fn local_count(&self) -> usize;

    fn is_leaf(&self) -> bool {
        true
    }

    fn is_full(&self) -> bool;

    fn is_undersized(&self) -> bool;

    fn capacity_left(&self) -> usize;

    /// Value in the final virtual slot.
    fn last_item(&self) -> T;

    /// Delete slots `[index, index + count)`. Returns whether the node is now
    /// undersized.
    fn remove_at(&mut self, index: u32, count: u32) -> bool;

    /// Move content from the front of `right` onto the end of `self`.
    /// Returns the number of virtual slots moved; 0 means nothing changed.
    fn take_from_right(&mut self, right: &mut Self) -> u32;

    /// Move content from the end of `left` onto the front of `self`.
    fn take_from_left(&mut self, left: &mut Self) -> u32;

    /// Mark the node as shared. Frozen nodes must be cloned before mutation.
    fn freeze(&mut self);

    fn is_frozen(&self) -> bool;

    /// Deep copy that is never frozen.
    fn detached_clone(&self) -> Self;

    /// Copy slots `[index, index + count)` into a new node.
    fn copy_section(&self, index: u32, count: u32) -> Self;

    /// How much of this node is already immutable: 0 unless frozen, then
    /// either the real entry count (`exclude_sparse`) or the virtual length.
    fn immutable_count(&self, exclude_sparse: bool) -> u32;
}

/// Mutation through bulk sparse operations. Only sparse leaves implement this.
pub trait SparseMutable<T>: RangeNode<T> {
    /// Apply as much of `op` as fits, starting with the item under the cursor
    /// at node-local position `index`.
    ///
    /// The caller keeps calling (on this node or on split halves) until
    /// `op.is_done()`.
    fn do_sparse_operation(&mut self, op: &mut SparseOperation<'_, T>, index: u32)
        -> OpOutcome<Self>;

    /// Nearest stored item to `*index` in `direction`. On success `*index` is
    /// moved to the item's offset; otherwise it is cleared and the default
    /// value is returned.
    fn sparse_get_nearest(&self, index: &mut Option<u32>, direction: Direction) -> T;
}

#[cfg(test)]
mod proptests;
