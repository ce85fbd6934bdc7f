//! Sets of non-overlapping address ranges.
//!
//! An [`AddressRangeSet`] never holds two members that overlap or sit within
//! one address of each other. The set refuses to repair such input itself:
//! callers coalesce first, usually through [`AddressRangeSet::coalesce`] or
//! [`AddressRangeSet::from_coalesced_list`].

use serde::{Deserialize, Serialize};

use crate::core::address_range::{AddressRange, DEFAULT_MAX_PADDING};
use crate::error::{DiffError, Result};

/// A collection of mutually non-overlapping, non-adjacent address ranges.
///
/// Member counts are small (a section has tens of COFF groups, not
/// thousands), so every query is a linear scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRangeSet {
    ranges: Vec<AddressRange>,
}

/// Two members conflict when they overlap or sit within one address of each
/// other, whatever their kinds.
fn conflicts(existing: &AddressRange, incoming: &AddressRange) -> bool {
    let overlaps = existing.start() <= incoming.end() && incoming.start() <= existing.end();
    overlaps || existing.is_adjacent_to(incoming, DEFAULT_MAX_PADDING)
}

impl AddressRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterate the members. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = &AddressRange> + '_ {
        self.ranges.iter()
    }

    /// Insert a range that does not touch any existing member.
    ///
    /// # Errors
    /// Returns [`DiffError::RangeSetConflict`] if `range` overlaps or is
    /// adjacent to a member. The set is left unchanged.
    pub fn add(&mut self, range: AddressRange) -> Result<()> {
        if let Some(existing) = self.ranges.iter().find(|r| conflicts(r, &range)) {
            return Err(DiffError::RangeSetConflict {
                incoming: range,
                existing: *existing,
            });
        }

        self.ranges.push(range);
        Ok(())
    }

    /// Add every member of `other` to this set.
    ///
    /// Members present in both sets are kept once. Everything is validated
    /// before anything is inserted, so a failed union leaves `self` exactly
    /// as it was.
    pub fn union_with(&mut self, other: &AddressRangeSet) -> Result<()> {
        for incoming in &other.ranges {
            if let Some(existing) = self
                .ranges
                .iter()
                .find(|r| *r != incoming && conflicts(r, incoming))
            {
                return Err(DiffError::RangeSetConflict {
                    incoming: *incoming,
                    existing: *existing,
                });
            }
        }

        for incoming in &other.ranges {
            if !self.ranges.contains(incoming) {
                self.ranges.push(*incoming);
            }
        }
        Ok(())
    }

    pub fn contains(&self, rva: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(rva))
    }

    /// True if a single member holds all of `[rva, rva + size - 1]`.
    pub fn fully_contains(&self, rva: u32, size: u32) -> bool {
        self.ranges.iter().any(|r| r.contains_span(rva, size))
    }

    pub fn fully_contains_range(&self, range: &AddressRange) -> bool {
        self.ranges.iter().any(|r| r.contains_range(range))
    }

    /// True if `incoming` touches any member at all.
    ///
    /// With members `[0, 100]` and `[200, 300]`, all of `[50, 150]`,
    /// `[150, 250]` and `[150, 350]` overlap: the last one spans the gap and
    /// swallows the second member whole.
    pub fn at_least_partially_overlaps_with(&self, incoming: &AddressRange) -> bool {
        self.ranges.iter().any(|r| {
            r.contains(incoming.start()) || r.contains(incoming.end()) || incoming.contains_range(r)
        })
    }

    /// Sum of on-disk sizes of all members.
    pub fn total_size(&self) -> u64 {
        self.ranges.iter().map(AddressRange::size).sum()
    }

    /// Sum of in-memory sizes of all members.
    pub fn total_virtual_size(&self) -> u64 {
        self.ranges.iter().map(AddressRange::virtual_size).sum()
    }

    /// Produce the minimal cover of `ranges`, merging anything that overlaps
    /// or lies within `max_padding_to_merge` of its neighbour.
    ///
    /// The output is sorted by start address.
    pub fn coalesce(ranges: &[AddressRange], max_padding_to_merge: u32) -> Vec<AddressRange> {
        let mut sorted = ranges.to_vec();
        sorted.sort_by_key(AddressRange::start);

        let mut coalesced: Vec<AddressRange> = Vec::with_capacity(sorted.len());
        for range in sorted {
            match coalesced.last_mut() {
                Some(last) if last.can_be_combined_with(&range, max_padding_to_merge) => {
                    // can_be_combined_with already ruled out a virtual/physical mix
                    *last = AddressRange::new(
                        last.start().min(range.start()),
                        last.end().max(range.end()),
                        last.is_virtual(),
                    );
                }
                _ => coalesced.push(range),
            }
        }
        coalesced
    }

    /// Coalesce `ranges` and build a set from the result.
    ///
    /// The padding used for merging is never below the set's own adjacency
    /// padding, so neighbours the set would reject are merged instead.
    ///
    /// # Errors
    /// [`DiffError::RangeSetConflict`] when an on-disk range and a
    /// virtual-only range in the input overlap or touch, since coalescing
    /// never merges the two kinds.
    pub fn from_coalesced_list(
        ranges: &[AddressRange],
        max_padding_to_merge: u32,
    ) -> Result<Self> {
        let padding = max_padding_to_merge.max(DEFAULT_MAX_PADDING);
        let mut set = AddressRangeSet::new();
        for range in Self::coalesce(ranges, padding) {
            set.add(range)?;
        }
        Ok(set)
    }
}

impl<'a> IntoIterator for &'a AddressRangeSet {
    type Item = &'a AddressRange;
    type IntoIter = std::slice::Iter<'a, AddressRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u32, end: u32) -> AddressRange {
        AddressRange::new(start, end, false)
    }

    #[test]
    fn test_add_disjoint_ranges() {
        let mut set = AddressRangeSet::new();
        set.add(r(0, 100)).unwrap();
        set.add(r(200, 300)).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(50));
        assert!(set.contains(300));
        assert!(!set.contains(150));
    }

    #[test]
    fn test_add_rejects_overlap_and_adjacency() {
        let mut set = AddressRangeSet::new();
        set.add(r(100, 200)).unwrap();
        let before = set.clone();

        for bad in [r(200, 300), r(201, 300), r(150, 160), r(50, 250), r(0, 99), r(100, 200)] {
            assert!(
                matches!(set.add(bad), Err(DiffError::RangeSetConflict { .. })),
                "{bad} should have been rejected"
            );
            assert_eq!(set, before);
        }

        // A gap of two addresses is fine
        set.add(r(202, 300)).unwrap();
        set.add(r(0, 98)).unwrap();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_adjacency_rejected_across_kinds() {
        let mut set = AddressRangeSet::new();
        set.add(r(0, 10)).unwrap();

        let touching = AddressRange::new(11, 20, true);
        assert!(matches!(
            set.add(touching),
            Err(DiffError::RangeSetConflict { existing, .. }) if existing == r(0, 10)
        ));
        assert_eq!(set.len(), 1);

        let mut other = AddressRangeSet::new();
        other.add(touching).unwrap();
        assert!(set.union_with(&other).is_err());
        assert_eq!(set.len(), 1);

        set.add(AddressRange::new(12, 20, true)).unwrap();
        assert_eq!(set.total_size(), 11);
        assert_eq!(set.total_virtual_size(), 20);
    }

    #[test]
    fn test_from_coalesced_list_rejects_touching_kinds() {
        let input = [r(0, 10), AddressRange::new(11, 20, true)];
        assert!(matches!(
            AddressRangeSet::from_coalesced_list(&input, 1),
            Err(DiffError::RangeSetConflict { .. })
        ));
    }

    #[test]
    fn test_union_with() {
        let mut a = AddressRangeSet::new();
        a.add(r(0, 100)).unwrap();

        let mut b = AddressRangeSet::new();
        b.add(r(0, 100)).unwrap();
        b.add(r(300, 400)).unwrap();

        a.union_with(&b).unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.contains(350));
    }

    #[test]
    fn test_failed_union_leaves_set_unchanged() {
        let mut a = AddressRangeSet::new();
        a.add(r(0, 100)).unwrap();
        a.add(r(500, 600)).unwrap();
        let before = a.clone();

        // First member is fine, second conflicts: nothing may be inserted
        let mut b = AddressRangeSet::new();
        b.add(r(300, 400)).unwrap();
        b.add(r(601, 700)).unwrap();

        assert!(a.union_with(&b).is_err());
        assert_eq!(a, before);
        assert!(!a.contains(350));
    }

    #[test]
    fn test_fully_contains() {
        let mut set = AddressRangeSet::new();
        set.add(r(0, 100)).unwrap();
        set.add(r(200, 300)).unwrap();

        assert!(set.fully_contains(10, 20));
        assert!(!set.fully_contains(90, 20));
        assert!(set.fully_contains_range(&r(210, 290)));
        assert!(!set.fully_contains_range(&r(50, 250)));
    }

    #[test]
    fn test_at_least_partially_overlaps_with() {
        let mut set = AddressRangeSet::new();
        set.add(r(0, 100)).unwrap();
        set.add(r(200, 300)).unwrap();

        assert!(set.at_least_partially_overlaps_with(&r(50, 150)));
        assert!(set.at_least_partially_overlaps_with(&r(150, 250)));
        assert!(set.at_least_partially_overlaps_with(&r(150, 350)));
        assert!(!set.at_least_partially_overlaps_with(&r(120, 180)));
    }

    #[test]
    fn test_coalesce_merges_overlapping_and_adjacent() {
        let input = [r(200, 300), r(0, 10), r(11, 20), r(5, 8), r(301, 310), r(400, 500)];
        let coalesced = AddressRangeSet::coalesce(&input, 1);
        assert_eq!(coalesced, vec![r(0, 20), r(200, 310), r(400, 500)]);
    }

    #[test]
    fn test_coalesce_respects_padding() {
        let input = [r(0, 10), r(16, 20)];
        assert_eq!(AddressRangeSet::coalesce(&input, 1).len(), 2);
        assert_eq!(AddressRangeSet::coalesce(&input, 8), vec![r(0, 20)]);
    }

    #[test]
    fn test_coalesce_keeps_virtual_and_physical_apart() {
        let input = [r(0, 10), AddressRange::new(11, 20, true)];
        assert_eq!(AddressRangeSet::coalesce(&input, 1).len(), 2);
    }

    #[test]
    fn test_coalesce_is_idempotent() {
        let input = [
            r(90, 95),
            r(0, 10),
            r(12, 13),
            r(14, 40),
            AddressRange::new(41, 60, true),
            AddressRange::new(55, 70, true),
            r(96, 96),
            r(1000, 1000),
        ];
        for padding in [0, 1, 4] {
            let once = AddressRangeSet::coalesce(&input, padding);
            let twice = AddressRangeSet::coalesce(&once, padding);
            assert_eq!(once, twice, "padding {padding}");
        }
    }

    #[test]
    fn test_from_coalesced_list_never_rejects() {
        let input = [r(0, 10), r(11, 20), r(22, 30), r(100, 200), r(150, 250)];
        for padding in [0, 1, 16] {
            let set = AddressRangeSet::from_coalesced_list(&input, padding).unwrap();
            assert!(set.contains(15));
            assert!(set.fully_contains_range(&r(100, 250)));
        }
    }
}
