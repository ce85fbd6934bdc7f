//! Core data types for sizediff.
//!
//! This module contains the address-range algebra and the read-only raw
//! entities a [`BinarySession`](crate::session::BinarySession) hands out.

pub mod address_range;
pub mod address_range_set;
pub mod contribution;
pub mod items;
pub mod library;
pub mod section;
pub mod symbol;

pub use address_range::{AddressRange, DEFAULT_MAX_PADDING};
pub use address_range_set::AddressRangeSet;
pub use contribution::Contribution;
pub use items::{DuplicateDataItem, TemplateFoldabilityItem};
pub use library::{Compiland, Library};
pub use section::{BinarySection, CoffGroup};
pub use symbol::{
    BlockLayout, Function, Side, Symbol, SymbolComparisonClass, SymbolId, SymbolKey, SymbolKind,
};
