//! Diff objects and the machinery that keeps them canonical.

pub mod cache;
pub mod entity;
pub mod factory;
pub mod symbol_diff;

pub use cache::{rva_pair_key, DiffIdentityCache, RvaPairKey};
pub use entity::{
    CoffGroupDiff, CompilandDiff, ContributionDiff, ContributionDiffs, ContributionKind,
    DiffEntityKind, DiffPair, DiffStatus, DiffSummary, DuplicateDataItemDiff, EntityDiff,
    LibraryDiff, SectionDiff, SizedEntity, TemplateFoldabilityItemDiff,
};
pub use factory::DiffFactory;
pub use symbol_diff::{FunctionDiff, FunctionDiffId, SymbolDiff, SymbolDiffKind};
