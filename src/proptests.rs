use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

/// A flat run of sibling leaves, driven the way a tree walker drives them.
/// Positions are global; each leaf covers `[start, start + total_count)`.
struct LeafRun {
    leaves: Vec<SparseLeaf<u64>>,
}

impl LeafRun {
    fn new(size: NodeSize) -> Self {
        Self {
            leaves: vec![SparseLeaf::new(size)],
        }
    }

    fn len(&self) -> u32 {
        self.leaves.iter().map(|l| l.total_count()).sum()
    }

    /// Leaf covering `pos` (`pos < len`).
    fn locate(&self, pos: u32) -> (usize, u32) {
        let mut start = 0;
        for (i, leaf) in self.leaves.iter().enumerate() {
            if pos < start + leaf.total_count() {
                return (i, start);
            }
            start += leaf.total_count();
        }
        panic!("position {pos} out of range");
    }

    /// Leaf that may receive an insert at `pos` (`pos <= len`).
    fn locate_insert(&self, pos: u32) -> (usize, u32) {
        let mut start = 0;
        for (i, leaf) in self.leaves.iter().enumerate() {
            if pos <= start + leaf.total_count() {
                return (i, start);
            }
            start += leaf.total_count();
        }
        panic!("insert position {pos} out of range");
    }

    /// Swap a frozen leaf for a private copy before mutating it.
    fn thaw(&mut self, idx: usize) -> &mut SparseLeaf<u64> {
        if self.leaves[idx].is_frozen() {
            self.leaves[idx] = self.leaves[idx].detached_clone();
        }
        &mut self.leaves[idx]
    }

    /// Run `op` to completion. `base` is the global position of source item 0.
    fn apply(&mut self, op: &mut SparseOperation<'_, u64>, base: u32) {
        let mut calls = 0;
        while !op.is_done() {
            calls += 1;
            assert!(calls < 10_000, "sparse operation made no progress");

            let pos = base + op.source_index;
            let (idx, start) = if op.is_insert() {
                self.locate_insert(pos)
            } else {
                self.locate(pos)
            };
            let out = self.thaw(idx).do_sparse_operation(op, pos - start);
            if let Restructure::Split { left, right } = out.restructure {
                assert_split(&self.leaves[idx], &left, &right);
                self.leaves.splice(idx..=idx, [left, right]);
            }
        }
    }

    fn remove(&mut self, at: u32, count: u32) {
        let mut remaining = count;
        while remaining > 0 {
            let (idx, start) = self.locate(at);
            let leaf = self.thaw(idx);
            let local = at - start;
            let n = remaining.min(leaf.total_count() - local);
            leaf.remove_at(local, n);
            remaining -= n;
        }
        self.prune();
    }

    fn rebalance(&mut self, which: usize, from_right: bool) {
        if self.leaves.len() < 2 {
            return;
        }
        let i = which % (self.leaves.len() - 1);
        let before = self.len();
        let (head, tail) = self.leaves.split_at_mut(i + 1);
        let (left, right) = (&mut head[i], &mut tail[0]);
        let frozen = left.is_frozen() || right.is_frozen();
        let snapshot = (left.total_count(), right.total_count());

        let amount = if from_right {
            left.take_from_right(right)
        } else {
            right.take_from_left(left)
        };

        if frozen {
            assert_eq!(amount, 0);
            assert_eq!(snapshot, (left.total_count(), right.total_count()));
        }
        assert_eq!(self.len(), before, "borrowing must conserve length");
        self.prune();
    }

    /// Drop drained leaves, keeping one when the whole run is empty.
    fn prune(&mut self) {
        if self.leaves.iter().all(|l| l.total_count() == 0) {
            self.leaves.truncate(1);
        } else {
            self.leaves.retain(|l| l.total_count() > 0);
        }
    }

    fn values(&self) -> Vec<u64> {
        self.leaves
            .iter()
            .flat_map(|l| (0..l.total_count()).map(move |i| l.get(i)))
            .collect()
    }

    fn validate(&self) {
        for leaf in &self.leaves {
            leaf.check_invariants();
        }
    }
}

fn assert_split(orig: &SparseLeaf<u64>, left: &SparseLeaf<u64>, right: &SparseLeaf<u64>) {
    assert_eq!(
        left.total_count() + right.total_count(),
        orig.total_count(),
        "split must conserve virtual length"
    );
    assert_eq!(
        left.local_count() + right.local_count(),
        orig.local_count(),
        "split must conserve real entries"
    );
    left.check_invariants();
    right.check_invariants();
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    InsertDense {
        at: u16,
        #[proptest(strategy = "prop::collection::vec(1u64..1000, 0..12)")]
        items: Vec<u64>,
    },
    InsertSparse {
        at: u16,
        #[proptest(strategy = "prop::collection::vec(prop::option::weighted(0.3, 1u64..1000), 0..24)")]
        items: Vec<Option<u64>>,
    },
    InsertEmpty {
        at: u16,
        #[proptest(strategy = "0u32..20")]
        count: u32,
    },
    Replace {
        at: u16,
        #[proptest(strategy = "prop::collection::vec(1u64..1000, 1..6)")]
        items: Vec<u64>,
    },
    Clear {
        at: u16,
        #[proptest(strategy = "0u32..20")]
        count: u32,
    },
    Remove {
        at: u16,
        #[proptest(strategy = "0u32..20")]
        count: u32,
    },
    Rebalance {
        which: u8,
        from_right: bool,
    },
    Freeze {
        which: u8,
    },
}

fn run_ops(size: u16, ops: Vec<Op>) {
    let mut run = LeafRun::new(NodeSize::new(size).unwrap());
    let mut model: Vec<u64> = Vec::new();

    for op in ops {
        let len = model.len() as u32;
        match op {
            Op::InsertDense { at, items } => {
                let at = u32::from(at) % (len + 1);
                let mut sop = SparseOperation::insert_dense(&items);
                run.apply(&mut sop, at);
                model.splice(at as usize..at as usize, items.iter().copied());
            }
            Op::InsertSparse { at, items } => {
                let at = u32::from(at) % (len + 1);
                let mut sop = SparseOperation::insert_sparse(&items);
                run.apply(&mut sop, at);
                model.splice(
                    at as usize..at as usize,
                    items.iter().map(|v| v.unwrap_or(0)),
                );
            }
            Op::InsertEmpty { at, count } => {
                let at = u32::from(at) % (len + 1);
                let mut sop = SparseOperation::insert_empty(count);
                run.apply(&mut sop, at);
                model.splice(
                    at as usize..at as usize,
                    std::iter::repeat(0).take(count as usize),
                );
            }
            Op::Replace { at, mut items } if len > 0 => {
                let at = u32::from(at) % len;
                items.truncate((len - at) as usize);
                let mut sop = SparseOperation::replace_dense(&items);
                run.apply(&mut sop, at);
                model[at as usize..at as usize + items.len()].copy_from_slice(&items);
            }
            Op::Clear { at, count } if len > 0 => {
                let at = u32::from(at) % len;
                let count = count.min(len - at);
                let mut sop = SparseOperation::clear(count);
                run.apply(&mut sop, at);
                model[at as usize..(at + count) as usize].fill(0);
            }
            Op::Remove { at, count } if len > 0 => {
                let at = u32::from(at) % len;
                let count = count.min(len - at);
                run.remove(at, count);
                model.drain(at as usize..(at + count) as usize);
            }
            Op::Rebalance { which, from_right } => {
                run.rebalance(usize::from(which), from_right);
            }
            Op::Freeze { which } => {
                let i = usize::from(which) % run.leaves.len();
                run.leaves[i].freeze();
            }
            _ => {}
        }

        run.validate();
        assert_eq!(run.len() as usize, model.len());
    }

    assert_eq!(run.values(), model);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_leaf_run_matches_model(
        size in 3u16..9,
        ops in prop::collection::vec(any::<Op>(), 0..=200),
    ) {
        run_ops(size, ops);
    }

    #[test]
    fn prop_nearest_matches_scan(
        items in prop::collection::vec(prop::option::weighted(0.2, 1u64..1000), 0..64),
        probe in 0u32..80,
    ) {
        let mut leaf: SparseLeaf<u64> = SparseLeaf::new(NodeSize::new(64).unwrap());
        let mut op = SparseOperation::insert_sparse(&items);
        let out = leaf.do_sparse_operation(&mut op, 0);
        prop_assert!(out.restructure.is_none());
        prop_assert!(op.is_done());

        let stored: Vec<(u32, u64)> = items
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i as u32, v)))
            .collect();

        let exact = stored.iter().find(|&&(i, _)| i == probe).copied();
        let higher = stored.iter().find(|&&(i, _)| i >= probe).copied();
        let lower = stored.iter().rev().find(|&&(i, _)| i <= probe).copied();

        for (direction, expected) in [
            (Direction::Exact, exact),
            (Direction::Higher, higher),
            (Direction::Lower, lower),
        ] {
            let mut at = Some(probe);
            let got = leaf.sparse_get_nearest(&mut at, direction);
            prop_assert_eq!(at, expected.map(|(i, _)| i));
            prop_assert_eq!(got, expected.map_or(0, |(_, v)| v));
        }
    }

    #[test]
    fn prop_copy_section_matches_slice(
        items in prop::collection::vec(prop::option::weighted(0.4, 1u64..1000), 1..40),
        a in 0usize..40,
        b in 0usize..40,
    ) {
        let mut leaf: SparseLeaf<u64> = SparseLeaf::new(NodeSize::new(48).unwrap());
        let mut op = SparseOperation::insert_sparse(&items);
        leaf.do_sparse_operation(&mut op, 0);

        let (lo, hi) = (a.min(b) % items.len(), a.max(b) % items.len());
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        let section = leaf.copy_section(lo as u32, (hi - lo) as u32);
        section.check_invariants();

        let got: Vec<u64> = (0..section.total_count()).map(|i| section.get(i)).collect();
        let expected: Vec<u64> = items[lo..hi].iter().map(|v| v.unwrap_or(0)).collect();
        prop_assert_eq!(got, expected);
    }
}

#[test]
fn exhaustive_split_positions_small_leaf() {
    // Every fill pattern of a 6-slot leaf with capacity 3.
    for mask in 0u32..(1 << 6) {
        if mask.count_ones() != 3 {
            continue;
        }
        let items: Vec<Option<u64>> = (0..6u32)
            .map(|i| (mask & (1 << i) != 0).then_some(u64::from(i) + 1))
            .collect();
        let mut leaf: SparseLeaf<u64> = SparseLeaf::new(NodeSize::new(3).unwrap());
        let mut op = SparseOperation::insert_empty(6);
        leaf.do_sparse_operation(&mut op, 0);
        for (i, v) in items.iter().enumerate() {
            if let Some(v) = v {
                let mut op = SparseOperation::replace_item(*v);
                let out = leaf.do_sparse_operation(&mut op, i as u32);
                assert!(out.restructure.is_none());
            }
        }
        assert!(leaf.is_full());

        let (left, right) = leaf.split();
        assert_split(&leaf, &left, &right);
        assert_eq!(left.local_count(), 1);
        assert_eq!(right.entries().next().map(|(off, _)| off), Some(0));

        let mut got: Vec<u64> = (0..left.total_count()).map(|i| left.get(i)).collect();
        got.extend((0..right.total_count()).map(|i| right.get(i)));
        let expected: Vec<u64> = items.iter().map(|v| v.unwrap_or(0)).collect();
        assert_eq!(got, expected);
    }
}
