//! Disallow bookkeeping over an implicit Cartesian product of slots.
//!
//! The product space is never materialized. Instead the tracker keeps, for every
//! *partial* selection it has had reason to look at, the set of element indices that
//! are exhausted at the slot being filled. A partial selection is keyed by the full
//! selection vector: concrete picks, exactly one [`Selection::ToFill`] marker, and
//! [`Selection::Unfilled`] everywhere else.
//!
//! ## Exhaustion propagation
//!
//! Committing a full combination `c` inserts `c[i]` into the key "`c` with slot `i`
//! marked to-fill" for every slot `i`. Whenever such a set becomes full (every element of
//! the slot is either exhausted or retired), the whole subtree below the remaining
//! concrete picks is exhausted, so each concrete pick `j` is in turn inserted into the key
//! obtained by unfilling the to-fill slot and marking `j` to-fill. This recurses toward the
//! all-unfilled root.
//!
//! Because an exhausted subtree is always recorded at every one of its parents, a query
//! made in any slot order sees it, and following only legal picks from a non-exhausted
//! root can never dead-end.
//!
//! ## Retirement
//!
//! Retired elements live in a per-slot set that is unioned into every answer. Retiring an
//! element may complete sets that were one short, so those keys are re-checked and
//! propagated. The cost is linear in the number of tracked keys for that slot, never in
//! the product size.

use std::collections::{BTreeMap, BTreeSet};

use crate::TrackerError;

/// One entry of a selection vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Selection {
    /// Not decided yet.
    Unfilled,
    /// The slot whose legal choices are being asked for.
    ToFill,
    /// A concrete element index.
    Chosen(usize),
}

impl Selection {
    pub fn chosen(self) -> Option<usize> {
        match self {
            Selection::Chosen(i) => Some(i),
            _ => None,
        }
    }
}

/// Tracks exhausted and retired choices so no full combination is produced twice.
#[derive(Debug, Clone)]
pub struct CombinationTracker {
    sizes: Vec<usize>,
    // Keyed by selection vector with exactly one `ToFill`.
    exhausted: BTreeMap<Vec<Selection>, BTreeSet<usize>>,
    retired: Vec<BTreeSet<usize>>,
    committed: u64,
}

impl CombinationTracker {
    /// Create a tracker for slots of the given sizes.
    pub fn new(sizes: Vec<usize>) -> Self {
        let retired = vec![BTreeSet::new(); sizes.len()];
        Self {
            sizes,
            exhausted: BTreeMap::new(),
            retired,
            committed: 0,
        }
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn num_slots(&self) -> usize {
        self.sizes.len()
    }

    /// Number of full combinations committed so far.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// Size of the full product space, saturating at `u128::MAX`.
    pub fn total_combinations(&self) -> u128 {
        self.sizes
            .iter()
            .try_fold(1u128, |acc, &n| acc.checked_mul(n as u128))
            .unwrap_or(u128::MAX)
    }

    pub fn is_retired(&self, slot: usize, element: usize) -> bool {
        self.retired
            .get(slot)
            .is_some_and(|r| r.contains(&element))
    }

    pub fn retired(&self, slot: usize) -> Option<&BTreeSet<usize>> {
        self.retired.get(slot)
    }

    /// Element indices of `slot` that must not be picked given the rest of `selection`.
    ///
    /// `selection` must mark `slot` (and only `slot`) as [`Selection::ToFill`].
    pub fn disallowed(
        &self,
        selection: &[Selection],
        slot: usize,
    ) -> Result<BTreeSet<usize>, TrackerError> {
        self.check_query(selection, slot)?;
        if self.has_dead_slot() {
            return Ok((0..self.sizes[slot]).collect());
        }
        let mut out = self.retired[slot].clone();
        if let Some(set) = self.exhausted.get(selection) {
            out.extend(set.iter().copied());
        }
        Ok(out)
    }

    /// Complement of [`Self::disallowed`], in ascending order.
    pub fn legal_choices(
        &self,
        selection: &[Selection],
        slot: usize,
    ) -> Result<Vec<usize>, TrackerError> {
        let disallowed = self.disallowed(selection, slot)?;
        Ok((0..self.sizes[slot])
            .filter(|i| !disallowed.contains(i))
            .collect())
    }

    /// True when no further combination can be produced.
    pub fn is_exhausted(&self) -> bool {
        if self.sizes.is_empty() || self.has_dead_slot() {
            return true;
        }
        let mut root = vec![Selection::Unfilled; self.sizes.len()];
        root[0] = Selection::ToFill;
        self.is_full(&root, 0)
    }

    /// Mark a fully concrete combination as consumed.
    pub fn commit(&mut self, selection: &[Selection]) -> Result<(), TrackerError> {
        let choices = self.full_choices(selection)?;
        if choices.is_empty() {
            return Err(TrackerError::Incomplete { slot: 0 });
        }
        for (slot, &element) in choices.iter().enumerate() {
            if self.retired[slot].contains(&element) {
                return Err(TrackerError::Retired { slot, element });
            }
        }
        // A one-slot-open key only ever receives direct commits.
        let mut probe = selection.to_vec();
        probe[0] = Selection::ToFill;
        if self
            .exhausted
            .get(&probe)
            .is_some_and(|s| s.contains(&choices[0]))
        {
            return Err(TrackerError::AlreadyCommitted(choices));
        }

        for (slot, &element) in choices.iter().enumerate() {
            let mut key = selection.to_vec();
            key[slot] = Selection::ToFill;
            self.insert(key, slot, element);
        }
        self.committed += 1;
        Ok(())
    }

    /// Permanently exclude `element` from `slot`.
    pub fn retire(&mut self, slot: usize, element: usize) -> Result<(), TrackerError> {
        let size = self.slot_size(slot)?;
        if element >= size {
            return Err(TrackerError::OutOfRange {
                slot,
                element,
                size,
            });
        }
        if !self.retired[slot].insert(element) {
            return Ok(());
        }
        let completed: Vec<Vec<Selection>> = self
            .exhausted
            .iter()
            .filter(|(key, set)| {
                key[slot] == Selection::ToFill
                    && !set.contains(&element)
                    && self.union_len(set, slot) == size
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in completed {
            self.propagate(&key, slot);
        }
        Ok(())
    }

    fn insert(&mut self, key: Vec<Selection>, slot: usize, element: usize) {
        let newly = self
            .exhausted
            .entry(key.clone())
            .or_default()
            .insert(element);
        if newly && !self.retired[slot].contains(&element) && self.is_full(&key, slot) {
            self.propagate(&key, slot);
        }
    }

    // `key` is full at `slot`: the subtree fixed by its concrete picks is exhausted.
    fn propagate(&mut self, key: &[Selection], slot: usize) {
        for (j, sel) in key.iter().enumerate() {
            if let Selection::Chosen(element) = *sel {
                let mut parent = key.to_vec();
                parent[slot] = Selection::Unfilled;
                parent[j] = Selection::ToFill;
                self.insert(parent, j, element);
            }
        }
    }

    // A slot with nothing left to offer leaves no combination anywhere.
    fn has_dead_slot(&self) -> bool {
        self.sizes
            .iter()
            .zip(&self.retired)
            .any(|(&n, r)| r.len() >= n)
    }

    fn is_full(&self, key: &[Selection], slot: usize) -> bool {
        let size = self.sizes[slot];
        match self.exhausted.get(key) {
            Some(set) => self.union_len(set, slot) == size,
            None => self.retired[slot].len() == size,
        }
    }

    fn union_len(&self, set: &BTreeSet<usize>, slot: usize) -> usize {
        let retired = &self.retired[slot];
        set.len() + retired.iter().filter(|r| !set.contains(r)).count()
    }

    fn slot_size(&self, slot: usize) -> Result<usize, TrackerError> {
        self.sizes.get(slot).copied().ok_or(TrackerError::WrongTarget { slot })
    }

    fn check_len(&self, selection: &[Selection]) -> Result<(), TrackerError> {
        if selection.len() != self.sizes.len() {
            return Err(TrackerError::LengthMismatch {
                expected: self.sizes.len(),
                got: selection.len(),
            });
        }
        Ok(())
    }

    fn check_range(&self, selection: &[Selection]) -> Result<(), TrackerError> {
        for (slot, sel) in selection.iter().enumerate() {
            if let Selection::Chosen(element) = *sel {
                let size = self.sizes[slot];
                if element >= size {
                    return Err(TrackerError::OutOfRange {
                        slot,
                        element,
                        size,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_query(&self, selection: &[Selection], slot: usize) -> Result<(), TrackerError> {
        self.check_len(selection)?;
        let targets = selection
            .iter()
            .filter(|s| **s == Selection::ToFill)
            .count();
        if targets != 1 {
            return Err(TrackerError::TargetCount(targets));
        }
        if selection.get(slot) != Some(&Selection::ToFill) {
            return Err(TrackerError::WrongTarget { slot });
        }
        self.check_range(selection)
    }

    fn full_choices(&self, selection: &[Selection]) -> Result<Vec<usize>, TrackerError> {
        self.check_len(selection)?;
        self.check_range(selection)?;
        selection
            .iter()
            .enumerate()
            .map(|(slot, s)| s.chosen().ok_or(TrackerError::Incomplete { slot }))
            .collect()
    }
}

/// Build a fully concrete selection vector.
pub fn full_selection(choices: &[usize]) -> Vec<Selection> {
    choices.iter().map(|&c| Selection::Chosen(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Selection::{Chosen as C, ToFill as F, Unfilled as U};

    #[test]
    fn fresh_tracker_allows_everything() {
        let t = CombinationTracker::new(vec![3, 2]);
        assert_eq!(t.legal_choices(&[F, U], 0).unwrap(), vec![0, 1, 2]);
        assert_eq!(t.legal_choices(&[C(1), F], 1).unwrap(), vec![0, 1]);
        assert!(!t.is_exhausted());
        assert_eq!(t.total_combinations(), 6);
    }

    #[test]
    fn committed_leaf_is_disallowed() {
        let mut t = CombinationTracker::new(vec![3, 2]);
        t.commit(&[C(1), C(0)]).unwrap();
        assert_eq!(t.legal_choices(&[C(1), F], 1).unwrap(), vec![1]);
        assert_eq!(t.legal_choices(&[F, C(0)], 0).unwrap(), vec![0, 2]);
        // Nothing exhausted at the root yet.
        assert_eq!(t.legal_choices(&[F, U], 0).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn exhausted_subtree_bubbles_to_root() {
        let mut t = CombinationTracker::new(vec![3, 2]);
        t.commit(&[C(1), C(0)]).unwrap();
        t.commit(&[C(1), C(1)]).unwrap();
        assert_eq!(t.legal_choices(&[F, U], 0).unwrap(), vec![0, 2]);
        // Slot 1 still has completions through elements 0 and 2.
        assert_eq!(t.legal_choices(&[U, F], 1).unwrap(), vec![0, 1]);
    }

    #[test]
    fn double_commit_is_rejected() {
        let mut t = CombinationTracker::new(vec![2, 2]);
        t.commit(&[C(0), C(1)]).unwrap();
        assert_eq!(
            t.commit(&[C(0), C(1)]),
            Err(TrackerError::AlreadyCommitted(vec![0, 1]))
        );
        assert_eq!(t.committed(), 1);
    }

    #[test]
    fn fourth_commit_exhausts_two_by_two() {
        let mut t = CombinationTracker::new(vec![2, 2]);
        for (a, b) in [(0, 0), (1, 1), (0, 1), (1, 0)] {
            assert!(!t.is_exhausted());
            t.commit(&[C(a), C(b)]).unwrap();
        }
        assert!(t.is_exhausted());
        assert!(t.legal_choices(&[F, U], 0).unwrap().is_empty());
        assert!(t.legal_choices(&[U, F], 1).unwrap().is_empty());
        for e in 0..2 {
            assert!(t.legal_choices(&[C(e), F], 1).unwrap().is_empty());
            assert!(t.legal_choices(&[F, C(e)], 0).unwrap().is_empty());
        }
    }

    #[test]
    fn three_slots_any_fill_order() {
        let mut t = CombinationTracker::new(vec![2, 2, 2]);
        t.commit(&[C(0), C(0), C(0)]).unwrap();
        t.commit(&[C(0), C(0), C(1)]).unwrap();
        // Pair (0, 0) on slots 0/1 is exhausted, seen from either side.
        assert_eq!(t.legal_choices(&[C(0), F, U], 1).unwrap(), vec![1]);
        assert_eq!(t.legal_choices(&[F, C(0), U], 0).unwrap(), vec![1]);
        t.commit(&[C(0), C(1), C(0)]).unwrap();
        t.commit(&[C(0), C(1), C(1)]).unwrap();
        assert_eq!(t.legal_choices(&[F, U, U], 0).unwrap(), vec![1]);
        assert_eq!(t.legal_choices(&[U, F, C(1)], 1).unwrap(), vec![0, 1]);
        assert_eq!(t.legal_choices(&[F, U, C(1)], 0).unwrap(), vec![1]);
    }

    #[test]
    fn retired_element_never_legal() {
        let mut t = CombinationTracker::new(vec![3, 2]);
        t.retire(0, 2).unwrap();
        assert_eq!(t.legal_choices(&[F, U], 0).unwrap(), vec![0, 1]);
        assert_eq!(t.legal_choices(&[F, C(1)], 0).unwrap(), vec![0, 1]);
        assert_eq!(
            t.commit(&[C(2), C(0)]),
            Err(TrackerError::Retired { slot: 0, element: 2 })
        );
    }

    #[test]
    fn retirement_completes_pending_sets() {
        let mut t = CombinationTracker::new(vec![2, 2]);
        t.commit(&[C(0), C(0)]).unwrap();
        t.commit(&[C(1), C(0)]).unwrap();
        // Element 0 of slot 1 is used up; element 1 still reachable.
        assert_eq!(t.legal_choices(&[U, F], 1).unwrap(), vec![1]);
        t.retire(1, 1).unwrap();
        assert!(t.is_exhausted());
        assert!(t.legal_choices(&[F, U], 0).unwrap().is_empty());
    }

    #[test]
    fn retiring_whole_slot_exhausts_space() {
        let mut t = CombinationTracker::new(vec![2, 3]);
        for e in 0..3 {
            t.retire(1, e).unwrap();
        }
        assert!(t.is_exhausted());
        assert!(t.legal_choices(&[F, U], 0).unwrap().is_empty());
    }

    #[test]
    fn malformed_queries_are_rejected() {
        let t = CombinationTracker::new(vec![2, 2]);
        assert_eq!(
            t.disallowed(&[F], 0),
            Err(TrackerError::LengthMismatch {
                expected: 2,
                got: 1
            })
        );
        assert_eq!(t.disallowed(&[F, F], 0), Err(TrackerError::TargetCount(2)));
        assert_eq!(t.disallowed(&[U, U], 0), Err(TrackerError::TargetCount(0)));
        assert_eq!(
            t.disallowed(&[F, U], 1),
            Err(TrackerError::WrongTarget { slot: 1 })
        );
        assert_eq!(
            t.disallowed(&[F, C(5)], 0),
            Err(TrackerError::OutOfRange {
                slot: 1,
                element: 5,
                size: 2
            })
        );
    }

    #[test]
    fn incomplete_commit_is_rejected() {
        let mut t = CombinationTracker::new(vec![2, 2]);
        assert_eq!(
            t.commit(&[C(0), U]),
            Err(TrackerError::Incomplete { slot: 1 })
        );
        assert_eq!(t.committed(), 0);
    }

    #[test]
    fn total_combinations_saturates() {
        let t = CombinationTracker::new(vec![usize::MAX, usize::MAX, usize::MAX]);
        assert_eq!(t.total_combinations(), u128::MAX);
    }
}
