//! Per-session memo slots for reconciliation results.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::diff::cache::DiffIdentityCache;
use crate::diff::entity::{
    CoffGroupDiff, CompilandDiff, ContributionKind, DuplicateDataItemDiff, LibraryDiff,
    SectionDiff, TemplateFoldabilityItemDiff,
};
use crate::diff::symbol_diff::SymbolDiff;

/// A memoized diff list. Callers compare with `Arc::ptr_eq` to tell a cached
/// result from a recomputed one.
pub type DiffList<T> = Arc<Vec<Arc<T>>>;

/// Which container a symbol diff list was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolListKey {
    Section(String),
    CoffGroup(String),
    Library(String),
    Compiland(String),
    Contribution(ContributionKind, String),
}

impl fmt::Display for SymbolListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolListKey::Section(name) => write!(f, "section {name}"),
            SymbolListKey::CoffGroup(name) => write!(f, "COFF group {name}"),
            SymbolListKey::Library(name) => write!(f, "library {name}"),
            SymbolListKey::Compiland(name) => write!(f, "compiland {name}"),
            SymbolListKey::Contribution(ContributionKind::Section, name) => {
                write!(f, "section contribution {name}")
            }
            SymbolListKey::Contribution(ContributionKind::CoffGroup, name) => {
                write!(f, "COFF group contribution {name}")
            }
        }
    }
}

/// Everything a diff session has computed so far.
///
/// Slots are filled once and never replaced.
#[derive(Debug, Default)]
pub struct DiffSessionCache {
    pub(crate) identity: DiffIdentityCache,
    pub(crate) sections: Option<DiffList<SectionDiff>>,
    pub(crate) coff_groups: Option<DiffList<CoffGroupDiff>>,
    pub(crate) libraries: Option<DiffList<LibraryDiff>>,
    pub(crate) compilands: Option<DiffList<CompilandDiff>>,
    pub(crate) duplicate_data: Option<DiffList<DuplicateDataItemDiff>>,
    pub(crate) template_foldability: Option<DiffList<TemplateFoldabilityItemDiff>>,
    pub(crate) symbol_lists: HashMap<SymbolListKey, DiffList<SymbolDiff>>,
}

impl DiffSessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> &DiffIdentityCache {
        &self.identity
    }

    pub fn sections(&self) -> Option<&DiffList<SectionDiff>> {
        self.sections.as_ref()
    }

    pub fn coff_groups(&self) -> Option<&DiffList<CoffGroupDiff>> {
        self.coff_groups.as_ref()
    }

    pub fn libraries(&self) -> Option<&DiffList<LibraryDiff>> {
        self.libraries.as_ref()
    }

    pub fn compilands(&self) -> Option<&DiffList<CompilandDiff>> {
        self.compilands.as_ref()
    }

    pub fn duplicate_data(&self) -> Option<&DiffList<DuplicateDataItemDiff>> {
        self.duplicate_data.as_ref()
    }

    pub fn template_foldability(&self) -> Option<&DiffList<TemplateFoldabilityItemDiff>> {
        self.template_foldability.as_ref()
    }

    pub fn symbol_list(&self, key: &SymbolListKey) -> Option<&DiffList<SymbolDiff>> {
        self.symbol_lists.get(key)
    }
}
