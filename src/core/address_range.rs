//! AddressRange types for binary analysis.
//!
//! This module provides the AddressRange type that represents an inclusive
//! interval of relative virtual addresses. Ranges are tagged as either
//! physical (present on disk) or virtual-only (present only once loaded,
//! like `.bss`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DiffError, Result};

/// Padding used by adjacency checks when the caller has no opinion.
pub const DEFAULT_MAX_PADDING: u32 = 1;

/// An inclusive, immutable interval `[start, end]` of RVAs.
///
/// `[0, 50]` starts at 0, ends at 50 and has a size of 51.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    start: u32,
    end: u32,
    is_virtual: bool,
}

impl AddressRange {
    /// Create a new range from inclusive bounds.
    ///
    /// `start` must not exceed `end`.
    pub fn new(start: u32, end: u32, is_virtual: bool) -> Self {
        debug_assert!(start <= end, "range start {start:#x} is past end {end:#x}");
        Self {
            start,
            end,
            is_virtual,
        }
    }

    /// Create a new range, rejecting inverted bounds instead of asserting.
    pub fn try_new(start: u32, end: u32, is_virtual: bool) -> Result<Self> {
        if start > end {
            return Err(DiffError::InvariantViolation(format!(
                "range start {start:#x} is past end {end:#x}"
            )));
        }
        Ok(Self::new(start, end, is_virtual))
    }

    /// Create a range covering `size` bytes from `start`.
    ///
    /// A size of zero produces the single-address range `[start, start]`.
    pub fn from_start_and_size(start: u32, size: u32, is_virtual: bool) -> Self {
        let end = if size == 0 {
            start
        } else {
            start.saturating_add(size - 1)
        };
        Self::new(start, end, is_virtual)
    }

    /// First address of the range (inclusive).
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last address of the range (inclusive).
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Whether this range only exists in memory.
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// On-disk size. Always 0 for virtual-only ranges.
    pub fn size(&self) -> u64 {
        if self.is_virtual {
            0
        } else {
            self.virtual_size()
        }
    }

    /// In-memory size.
    pub fn virtual_size(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    pub fn contains(&self, rva: u32) -> bool {
        rva >= self.start && rva <= self.end
    }

    /// True iff `[rva, rva + size - 1]` lies inside this range.
    pub fn contains_span(&self, rva: u32, size: u32) -> bool {
        if size == 0 {
            return self.contains(rva);
        }
        let last = u64::from(rva) + u64::from(size) - 1;
        rva >= self.start && last <= u64::from(self.end)
    }

    pub fn contains_range(&self, other: &AddressRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Check whether two ranges touch within `max_padding` addresses.
    ///
    /// Symmetric. Ranges sharing a start are never adjacent: they overlap or
    /// are identical. Overlapping ranges have a gap of zero, so they count as
    /// adjacent too.
    pub fn is_adjacent_to(&self, other: &AddressRange, max_padding: u32) -> bool {
        if self.start < other.start {
            other.start.saturating_sub(self.end) <= max_padding
        } else if other.start < self.start {
            self.start.saturating_sub(other.end) <= max_padding
        } else {
            false
        }
    }

    /// Check whether [`combine_with`](Self::combine_with) is meaningful.
    pub fn can_be_combined_with(&self, other: &AddressRange, max_padding: u32) -> bool {
        if self.is_virtual != other.is_virtual {
            return false;
        }

        if self.is_adjacent_to(other, max_padding) {
            return true;
        }

        // Not adjacent, but one may still sit inside the other
        self.contains(other.start)
            || self.contains(other.end)
            || other.contains(self.start)
            || other.contains(self.end)
    }

    /// Merge two combinable ranges into their covering range.
    ///
    /// # Errors
    /// Returns [`DiffError::InvalidMerge`] if one range is virtual-only and
    /// the other is not.
    pub fn combine_with(&self, other: &AddressRange, max_padding: u32) -> Result<AddressRange> {
        if self.is_virtual != other.is_virtual {
            return Err(DiffError::InvalidMerge {
                first: *self,
                second: *other,
            });
        }

        debug_assert!(
            self.can_be_combined_with(other, max_padding),
            "{self} and {other} are too far apart to combine"
        );

        Ok(AddressRange::new(
            self.start.min(other.start),
            self.end.max(other.end),
            self.is_virtual,
        ))
    }

    /// Grow the end of the range, never shrinking it.
    pub fn expand_end_to(&self, new_end: u32) -> AddressRange {
        AddressRange::new(self.start, self.end.max(new_end), self.is_virtual)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} - {:#x}", self.start, self.end)
    }
}
