//! What one library or compiland contributes to a section or COFF group.

use serde::{Deserialize, Serialize};

use crate::core::address_range::{AddressRange, DEFAULT_MAX_PADDING};
use crate::core::address_range_set::AddressRangeSet;

/// The ranges a library or compiland occupies inside one section or COFF
/// group, named after that section or group.
///
/// Ranges are kept coalesced but not as an [`AddressRangeSet`]: a `.data`
/// contribution often ends in zero-fill bytes right behind its on-disk part,
/// and a set refuses to hold those two side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub name: String,
    ranges: Vec<AddressRange>,
}

impl Contribution {
    pub fn new(name: impl Into<String>, ranges: &[AddressRange]) -> Self {
        Self {
            name: name.into(),
            ranges: AddressRangeSet::coalesce(ranges, DEFAULT_MAX_PADDING),
        }
    }

    /// Coalesced ranges, sorted by start address.
    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    pub fn size(&self) -> u64 {
        self.ranges.iter().map(AddressRange::size).sum()
    }

    pub fn virtual_size(&self) -> u64 {
        self.ranges.iter().map(AddressRange::virtual_size).sum()
    }

    pub fn contains(&self, rva: u32, size: u32) -> bool {
        self.ranges.iter().any(|r| r.contains_span(rva, size))
    }
}
