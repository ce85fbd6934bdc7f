//! Diffs of sections, COFF groups, libraries, compilands, their
//! contributions and waste items.
//!
//! Each diff wraps a [`DiffPair`] of the raw entity and exposes its numbers
//! through the [`EntityDiff`] trait.

use serde::Serialize;
use std::sync::Arc;

use crate::core::contribution::Contribution;
use crate::core::items::{DuplicateDataItem, TemplateFoldabilityItem};
use crate::core::library::{Compiland, Library};
use crate::core::section::{BinarySection, CoffGroup};
use crate::diff::symbol_diff::{signed_diff, SymbolDiff};
use crate::error::{DiffError, Result};

/// A raw entity with a name and a size.
pub trait SizedEntity {
    fn name(&self) -> &str;
    fn size(&self) -> u64;
    fn virtual_size(&self) -> u64;
}

impl SizedEntity for BinarySection {
    fn name(&self) -> &str {
        &self.name
    }
    fn size(&self) -> u64 {
        u64::from(self.size)
    }
    fn virtual_size(&self) -> u64 {
        u64::from(self.virtual_size)
    }
}

impl SizedEntity for CoffGroup {
    fn name(&self) -> &str {
        &self.name
    }
    fn size(&self) -> u64 {
        u64::from(self.size)
    }
    fn virtual_size(&self) -> u64 {
        u64::from(self.virtual_size)
    }
}

impl SizedEntity for Library {
    fn name(&self) -> &str {
        &self.name
    }
    fn size(&self) -> u64 {
        u64::from(self.size)
    }
    fn virtual_size(&self) -> u64 {
        u64::from(self.virtual_size)
    }
}

impl SizedEntity for Compiland {
    fn name(&self) -> &str {
        &self.name
    }
    fn size(&self) -> u64 {
        u64::from(self.size)
    }
    fn virtual_size(&self) -> u64 {
        u64::from(self.virtual_size)
    }
}

impl SizedEntity for Contribution {
    fn name(&self) -> &str {
        &self.name
    }
    fn size(&self) -> u64 {
        Contribution::size(self)
    }
    fn virtual_size(&self) -> u64 {
        Contribution::virtual_size(self)
    }
}

impl SizedEntity for DuplicateDataItem {
    fn name(&self) -> &str {
        &self.symbol.name
    }
    fn size(&self) -> u64 {
        u64::from(self.total_size)
    }
    fn virtual_size(&self) -> u64 {
        u64::from(self.total_size)
    }
}

impl SizedEntity for TemplateFoldabilityItem {
    fn name(&self) -> &str {
        &self.template_name
    }
    fn size(&self) -> u64 {
        u64::from(self.total_size)
    }
    fn virtual_size(&self) -> u64 {
        u64::from(self.total_size)
    }
}

/// An optional before and an optional after entity, at least one present.
#[derive(Debug)]
pub struct DiffPair<T> {
    before: Option<Arc<T>>,
    after: Option<Arc<T>>,
}

impl<T: SizedEntity> DiffPair<T> {
    pub fn new(before: Option<Arc<T>>, after: Option<Arc<T>>, what: &str) -> Result<Self> {
        if before.is_none() && after.is_none() {
            return Err(DiffError::both_sides_absent(what));
        }
        Ok(Self { before, after })
    }

    pub fn before(&self) -> Option<&Arc<T>> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Arc<T>> {
        self.after.as_ref()
    }

    /// Name of the before entity if present, else of the after entity.
    pub fn name(&self) -> &str {
        self.before
            .as_ref()
            .or(self.after.as_ref())
            .map(|e| e.name())
            .unwrap_or_default()
    }

    pub fn size_diff(&self) -> i64 {
        signed_diff(
            self.before.as_ref().map(|e| e.size()),
            self.after.as_ref().map(|e| e.size()),
        )
    }

    pub fn virtual_size_diff(&self) -> i64 {
        signed_diff(
            self.before.as_ref().map(|e| e.virtual_size()),
            self.after.as_ref().map(|e| e.virtual_size()),
        )
    }

    /// True if `entity` is one of the two sides, by allocation.
    pub fn contains(&self, entity: &Arc<T>) -> bool {
        self.before.as_ref().is_some_and(|e| Arc::ptr_eq(e, entity))
            || self.after.as_ref().is_some_and(|e| Arc::ptr_eq(e, entity))
    }
}

/// Kind of entity a [`DiffSummary`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffEntityKind {
    Section,
    CoffGroup,
    Library,
    Compiland,
    Contribution,
    Symbol,
    DuplicateData,
    TemplateFoldability,
}

/// How an entity changed between the two builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Removed,
    Changed,
    Unchanged,
}

impl DiffStatus {
    fn of(has_before: bool, has_after: bool, size_diff: i64, virtual_size_diff: i64) -> Self {
        match (has_before, has_after) {
            (false, _) => DiffStatus::Added,
            (_, false) => DiffStatus::Removed,
            _ if size_diff == 0 && virtual_size_diff == 0 => DiffStatus::Unchanged,
            _ => DiffStatus::Changed,
        }
    }
}

/// Flat, serializable view of any diff for export layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub kind: DiffEntityKind,
    pub name: String,
    pub status: DiffStatus,
    pub size_diff: i64,
    pub virtual_size_diff: i64,
}

/// Common surface of entity diffs.
pub trait EntityDiff {
    type Entity: SizedEntity;
    const KIND: DiffEntityKind;

    fn pair(&self) -> &DiffPair<Self::Entity>;

    fn before(&self) -> Option<&Arc<Self::Entity>> {
        self.pair().before()
    }

    fn after(&self) -> Option<&Arc<Self::Entity>> {
        self.pair().after()
    }

    fn name(&self) -> &str {
        self.pair().name()
    }

    fn size_diff(&self) -> i64 {
        self.pair().size_diff()
    }

    fn virtual_size_diff(&self) -> i64 {
        self.pair().virtual_size_diff()
    }

    /// True if this diff has `entity` on either side.
    fn is_diff_of(&self, entity: &Arc<Self::Entity>) -> bool {
        self.pair().contains(entity)
    }

    fn summary(&self) -> DiffSummary {
        DiffSummary {
            kind: Self::KIND,
            name: self.name().to_string(),
            status: DiffStatus::of(
                self.before().is_some(),
                self.after().is_some(),
                self.size_diff(),
                self.virtual_size_diff(),
            ),
            size_diff: self.size_diff(),
            virtual_size_diff: self.virtual_size_diff(),
        }
    }
}

impl From<&SymbolDiff> for DiffSummary {
    fn from(diff: &SymbolDiff) -> Self {
        DiffSummary {
            kind: DiffEntityKind::Symbol,
            name: diff.name().to_string(),
            status: DiffStatus::of(
                diff.before().is_some(),
                diff.after().is_some(),
                diff.size_diff(),
                diff.virtual_size_diff(),
            ),
            size_diff: diff.size_diff(),
            virtual_size_diff: diff.virtual_size_diff(),
        }
    }
}

#[derive(Debug)]
pub struct CoffGroupDiff {
    pair: DiffPair<CoffGroup>,
    section_name: String,
}

impl CoffGroupDiff {
    pub fn new(
        before: Option<Arc<CoffGroup>>,
        after: Option<Arc<CoffGroup>>,
        section_name: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            pair: DiffPair::new(before, after, "COFF groups")?,
            section_name: section_name.into(),
        })
    }

    /// Name of the section diff this group belongs to.
    pub fn section_name(&self) -> &str {
        &self.section_name
    }
}

impl EntityDiff for CoffGroupDiff {
    type Entity = CoffGroup;
    const KIND: DiffEntityKind = DiffEntityKind::CoffGroup;

    fn pair(&self) -> &DiffPair<CoffGroup> {
        &self.pair
    }
}

#[derive(Debug)]
pub struct SectionDiff {
    pair: DiffPair<BinarySection>,
    coff_groups: Vec<Arc<CoffGroupDiff>>,
}

impl SectionDiff {
    pub fn new(
        before: Option<Arc<BinarySection>>,
        after: Option<Arc<BinarySection>>,
        coff_groups: Vec<Arc<CoffGroupDiff>>,
    ) -> Result<Self> {
        Ok(Self {
            pair: DiffPair::new(before, after, "sections")?,
            coff_groups,
        })
    }

    pub fn coff_group_diffs(&self) -> &[Arc<CoffGroupDiff>] {
        &self.coff_groups
    }
}

impl EntityDiff for SectionDiff {
    type Entity = BinarySection;
    const KIND: DiffEntityKind = DiffEntityKind::Section;

    fn pair(&self) -> &DiffPair<BinarySection> {
        &self.pair
    }
}

/// Whether a contribution covers a whole section or one COFF group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Section,
    CoffGroup,
}

/// Diff of what one library or compiland put into one section or COFF group.
#[derive(Debug)]
pub struct ContributionDiff {
    pair: DiffPair<Contribution>,
    kind: ContributionKind,
    owner: String,
}

impl ContributionDiff {
    pub fn new(
        before: Option<Arc<Contribution>>,
        after: Option<Arc<Contribution>>,
        kind: ContributionKind,
        owner: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            pair: DiffPair::new(before, after, "contributions")?,
            kind,
            owner: owner.into(),
        })
    }

    pub fn kind(&self) -> ContributionKind {
        self.kind
    }

    /// The contributing library's name, or `library:compiland` for a
    /// compiland's contribution.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl EntityDiff for ContributionDiff {
    type Entity = Contribution;
    const KIND: DiffEntityKind = DiffEntityKind::Contribution;

    fn pair(&self) -> &DiffPair<Contribution> {
        &self.pair
    }
}

/// Section and COFF group contribution diffs of a library or compiland diff.
#[derive(Debug, Default)]
pub struct ContributionDiffs {
    pub sections: Vec<Arc<ContributionDiff>>,
    pub coff_groups: Vec<Arc<ContributionDiff>>,
}

#[derive(Debug)]
pub struct CompilandDiff {
    pair: DiffPair<Compiland>,
    library_name: String,
    contributions: ContributionDiffs,
}

impl CompilandDiff {
    pub fn new(
        before: Option<Arc<Compiland>>,
        after: Option<Arc<Compiland>>,
        library_name: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            pair: DiffPair::new(before, after, "compilands")?,
            library_name: library_name.into(),
            contributions: ContributionDiffs::default(),
        })
    }

    pub fn with_contributions(mut self, contributions: ContributionDiffs) -> Self {
        self.contributions = contributions;
        self
    }

    /// Name of the library diff this compiland belongs to.
    pub fn library_name(&self) -> &str {
        &self.library_name
    }

    pub fn section_contribution_diffs(&self) -> &[Arc<ContributionDiff>] {
        &self.contributions.sections
    }

    pub fn coff_group_contribution_diffs(&self) -> &[Arc<ContributionDiff>] {
        &self.contributions.coff_groups
    }
}

impl EntityDiff for CompilandDiff {
    type Entity = Compiland;
    const KIND: DiffEntityKind = DiffEntityKind::Compiland;

    fn pair(&self) -> &DiffPair<Compiland> {
        &self.pair
    }
}

#[derive(Debug)]
pub struct LibraryDiff {
    pair: DiffPair<Library>,
    compilands: Vec<Arc<CompilandDiff>>,
    contributions: ContributionDiffs,
}

impl LibraryDiff {
    pub fn new(
        before: Option<Arc<Library>>,
        after: Option<Arc<Library>>,
        compilands: Vec<Arc<CompilandDiff>>,
    ) -> Result<Self> {
        Ok(Self {
            pair: DiffPair::new(before, after, "libraries")?,
            compilands,
            contributions: ContributionDiffs::default(),
        })
    }

    pub fn with_contributions(mut self, contributions: ContributionDiffs) -> Self {
        self.contributions = contributions;
        self
    }

    pub fn compiland_diffs(&self) -> &[Arc<CompilandDiff>] {
        &self.compilands
    }

    pub fn section_contribution_diffs(&self) -> &[Arc<ContributionDiff>] {
        &self.contributions.sections
    }

    pub fn coff_group_contribution_diffs(&self) -> &[Arc<ContributionDiff>] {
        &self.contributions.coff_groups
    }
}

impl EntityDiff for LibraryDiff {
    type Entity = Library;
    const KIND: DiffEntityKind = DiffEntityKind::Library;

    fn pair(&self) -> &DiffPair<Library> {
        &self.pair
    }
}

#[derive(Debug)]
pub struct DuplicateDataItemDiff {
    pair: DiffPair<DuplicateDataItem>,
    symbol: Arc<SymbolDiff>,
}

impl DuplicateDataItemDiff {
    /// `symbol` must be the canonical diff of the items' symbols.
    pub fn new(
        before: Option<Arc<DuplicateDataItem>>,
        after: Option<Arc<DuplicateDataItem>>,
        symbol: Arc<SymbolDiff>,
    ) -> Result<Self> {
        Ok(Self {
            pair: DiffPair::new(before, after, "duplicate data items")?,
            symbol,
        })
    }

    pub fn symbol_diff(&self) -> &Arc<SymbolDiff> {
        &self.symbol
    }

    pub fn wasted_size_diff(&self) -> i64 {
        signed_diff(
            self.pair.before().map(|i| u64::from(i.wasted_size)),
            self.pair.after().map(|i| u64::from(i.wasted_size)),
        )
    }

    /// Waste still present in the after build.
    pub fn wasted_size_remaining(&self) -> u64 {
        self.pair.after().map_or(0, |i| u64::from(i.wasted_size))
    }
}

impl EntityDiff for DuplicateDataItemDiff {
    type Entity = DuplicateDataItem;
    const KIND: DiffEntityKind = DiffEntityKind::DuplicateData;

    fn pair(&self) -> &DiffPair<DuplicateDataItem> {
        &self.pair
    }
}

#[derive(Debug)]
pub struct TemplateFoldabilityItemDiff {
    pair: DiffPair<TemplateFoldabilityItem>,
}

impl TemplateFoldabilityItemDiff {
    pub fn new(
        before: Option<Arc<TemplateFoldabilityItem>>,
        after: Option<Arc<TemplateFoldabilityItem>>,
    ) -> Result<Self> {
        Ok(Self {
            pair: DiffPair::new(before, after, "template foldability items")?,
        })
    }

    pub fn wasted_size_diff(&self) -> i64 {
        signed_diff(
            self.pair.before().map(|i| u64::from(i.wasted_size)),
            self.pair.after().map(|i| u64::from(i.wasted_size)),
        )
    }

    pub fn wasted_size_remaining(&self) -> u64 {
        self.pair.after().map_or(0, |i| u64::from(i.wasted_size))
    }
}

impl EntityDiff for TemplateFoldabilityItemDiff {
    type Entity = TemplateFoldabilityItem;
    const KIND: DiffEntityKind = DiffEntityKind::TemplateFoldability;

    fn pair(&self) -> &DiffPair<TemplateFoldabilityItem> {
        &self.pair
    }
}
