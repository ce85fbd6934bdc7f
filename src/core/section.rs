//! Section and COFF group types.
//!
//! Sections are the image's top-level units (`.text`, `.data`). Each is split
//! into named COFF groups (`.text$mn`, `.data$r`) by the linker.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::address_range::AddressRange;
use crate::core::address_range_set::AddressRangeSet;
use crate::error::Result;

/// The range covering `[rva, rva + max(size, virtual_size))`.
///
/// Virtual-only when nothing is stored on disk; a zero-fill tail behind
/// on-disk bytes stays part of the one range. `None` when both sizes are 0.
fn range_for(rva: u32, size: u32, virtual_size: u32) -> Option<AddressRange> {
    let extent = size.max(virtual_size);
    (extent > 0).then(|| AddressRange::from_start_and_size(rva, extent, size == 0))
}

/// A named subdivision of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffGroup {
    pub name: String,
    pub rva: u32,
    pub size: u32,
    pub virtual_size: u32,
}

impl CoffGroup {
    pub fn new(name: impl Into<String>, rva: u32, size: u32, virtual_size: u32) -> Self {
        Self {
            name: name.into(),
            rva,
            size,
            virtual_size,
        }
    }

    /// Range this group occupies. `None` for a group with no size at all.
    pub fn range(&self) -> Option<AddressRange> {
        range_for(self.rva, self.size, self.virtual_size)
    }

    /// True for groups such as `.bss` that occupy memory only.
    pub fn is_virtual_only(&self) -> bool {
        self.size == 0 && self.virtual_size > 0
    }
}

/// A section of a binary image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySection {
    pub name: String,
    pub rva: u32,
    pub size: u32,
    pub virtual_size: u32,
    pub coff_groups: Vec<Arc<CoffGroup>>,
}

impl BinarySection {
    pub fn new(name: impl Into<String>, rva: u32, size: u32, virtual_size: u32) -> Self {
        Self {
            name: name.into(),
            rva,
            size,
            virtual_size,
            coff_groups: Vec::new(),
        }
    }

    pub fn with_coff_group(mut self, group: CoffGroup) -> Self {
        self.coff_groups.push(Arc::new(group));
        self
    }

    /// Everything this section occupies, coalesced.
    ///
    /// Built from the COFF groups when there are any, since padding between
    /// groups belongs to no group; otherwise from the section header. Every
    /// member takes the section's own kind, so a `.bss` group right behind
    /// on-disk data merges with it instead of colliding.
    pub fn range_set(&self, max_padding_to_merge: u32) -> Result<AddressRangeSet> {
        let is_virtual = self.size == 0;
        let ranges: Vec<AddressRange> = if self.coff_groups.is_empty() {
            range_for(self.rva, self.size, self.virtual_size).into_iter().collect()
        } else {
            self.coff_groups
                .iter()
                .filter_map(|g| g.range())
                .map(|r| AddressRange::new(r.start(), r.end(), is_virtual))
                .collect()
        };
        AddressRangeSet::from_coalesced_list(&ranges, max_padding_to_merge)
    }
}
