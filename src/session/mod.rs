//! Diff sessions: two binaries, one cache.
//!
//! A [`DiffSession`] owns the before and after [`BinarySession`]s together
//! with the [`DiffSessionCache`] every reconciliation writes into. All
//! operations take `&mut self`, so one caller drives a session at a time.

pub mod cache;
pub mod source;

pub use cache::{DiffList, DiffSessionCache, SymbolListKey};
pub use source::BinarySession;

use std::sync::Arc;
use tracing::info;

use crate::cancel::CancellationToken;
use crate::config::DiffConfig;
use crate::core::address_range::AddressRange;
use crate::core::contribution::Contribution;
use crate::core::items::{DuplicateDataItem, TemplateFoldabilityItem};
use crate::core::library::{Compiland, Library};
use crate::core::section::{BinarySection, CoffGroup};
use crate::core::symbol::{Side, Symbol, SymbolKey};
use crate::diff::entity::{
    CoffGroupDiff, CompilandDiff, ContributionDiff, DuplicateDataItemDiff, EntityDiff,
    LibraryDiff, SectionDiff, TemplateFoldabilityItemDiff,
};
use crate::diff::symbol_diff::{FunctionDiff, SymbolDiff};
use crate::error::{DiffError, Result};
use crate::log_failure;
use crate::tasks::{self, ProgressSink, TaskContext};

/// Symbols of `binary` in every range, in range order.
async fn symbols_in_ranges<B: BinarySession>(
    binary: &B,
    ranges: Vec<AddressRange>,
    cancel: &CancellationToken,
) -> Result<Vec<Arc<Symbol>>> {
    let mut symbols = Vec::new();
    for range in ranges {
        cancel.check()?;
        symbols.extend(binary.symbols_in_range(range, cancel).await?);
    }
    Ok(symbols)
}

/// Reconciles one before binary with one after binary.
pub struct DiffSession<B: BinarySession> {
    before: B,
    after: B,
    cache: DiffSessionCache,
    config: DiffConfig,
    cancel: CancellationToken,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl<B: BinarySession> DiffSession<B> {
    pub fn new(before: B, after: B) -> Self {
        info!(
            before = before.binary_path(),
            after = after.binary_path(),
            "opening diff session"
        );
        Self {
            before,
            after,
            cache: DiffSessionCache::new(),
            config: DiffConfig::default(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Replace the default configuration.
    ///
    /// # Errors
    /// [`DiffError::Config`] if `config` does not validate.
    pub fn with_config(mut self, config: DiffConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// A handle that cancels every running and future operation of this
    /// session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    pub fn cache(&self) -> &DiffSessionCache {
        &self.cache
    }

    pub fn before(&self) -> &B {
        &self.before
    }

    pub fn after(&self) -> &B {
        &self.after
    }

    fn split(&mut self, name: &'static str) -> (&B, &B, &mut DiffSessionCache, TaskContext<'_>) {
        let ctx = TaskContext::new(name, &self.cancel, &self.config)
            .with_progress(self.progress.as_deref());
        (&self.before, &self.after, &mut self.cache, ctx)
    }

    pub async fn section_diffs(&mut self) -> Result<DiffList<SectionDiff>> {
        let (before, after, cache, ctx) = self.split("section diffs");
        tasks::sections::section_diffs(
            cache,
            &ctx,
            before.sections(ctx.cancel),
            after.sections(ctx.cancel),
        )
        .await
        .map_err(|e| log_failure!(e, "section diffs"))
    }

    /// COFF group diffs of every section, reconciling sections first if
    /// needed.
    pub async fn coff_group_diffs(&mut self) -> Result<DiffList<CoffGroupDiff>> {
        if self.cache.coff_groups.is_none() {
            self.section_diffs().await?;
        }
        self.cache.coff_groups.clone().ok_or_else(|| {
            DiffError::InternalConsistency("section diffs left no COFF groups".into())
        })
    }

    pub async fn library_diffs(&mut self) -> Result<DiffList<LibraryDiff>> {
        let (before, after, cache, ctx) = self.split("library diffs");
        tasks::libraries::library_diffs(
            cache,
            &ctx,
            before.libraries(ctx.cancel),
            after.libraries(ctx.cancel),
        )
        .await
        .map_err(|e| log_failure!(e, "library diffs"))
    }

    /// Compiland diffs of every library, reconciling libraries first if
    /// needed.
    pub async fn compiland_diffs(&mut self) -> Result<DiffList<CompilandDiff>> {
        if self.cache.compilands.is_none() {
            self.library_diffs().await?;
        }
        self.cache.compilands.clone().ok_or_else(|| {
            DiffError::InternalConsistency("library diffs left no compilands".into())
        })
    }

    pub async fn symbol_diffs_in_section(
        &mut self,
        section: &SectionDiff,
    ) -> Result<DiffList<SymbolDiff>> {
        let padding = self.config.ranges.section_max_padding;
        let ranges_of = |s: Option<&Arc<BinarySection>>| -> Result<Vec<AddressRange>> {
            Ok(match s {
                Some(s) => s.range_set(padding)?.iter().copied().collect(),
                None => Vec::new(),
            })
        };
        let before_ranges = ranges_of(section.before())?;
        let after_ranges = ranges_of(section.after())?;

        let key = SymbolListKey::Section(section.name().to_string());
        let (before, after, cache, ctx) = self.split("symbol diffs in section");
        tasks::symbols::symbol_diffs(
            cache,
            &ctx,
            key,
            symbols_in_ranges(before, before_ranges, ctx.cancel),
            symbols_in_ranges(after, after_ranges, ctx.cancel),
        )
        .await
        .map_err(|e| log_failure!(e, "symbol diffs in section"))
    }

    pub async fn symbol_diffs_in_coff_group(
        &mut self,
        group: &CoffGroupDiff,
    ) -> Result<DiffList<SymbolDiff>> {
        let ranges_of = |g: Option<&Arc<CoffGroup>>| -> Vec<AddressRange> {
            g.and_then(|g| g.range()).into_iter().collect()
        };
        let before_ranges = ranges_of(group.before());
        let after_ranges = ranges_of(group.after());

        let key = SymbolListKey::CoffGroup(format!("{}:{}", group.section_name(), group.name()));
        let (before, after, cache, ctx) = self.split("symbol diffs in COFF group");
        tasks::symbols::symbol_diffs(
            cache,
            &ctx,
            key,
            symbols_in_ranges(before, before_ranges, ctx.cancel),
            symbols_in_ranges(after, after_ranges, ctx.cancel),
        )
        .await
        .map_err(|e| log_failure!(e, "symbol diffs in COFF group"))
    }

    pub async fn symbol_diffs_in_library(
        &mut self,
        library: &LibraryDiff,
    ) -> Result<DiffList<SymbolDiff>> {
        let key = SymbolListKey::Library(library.name().to_string());
        let (before, after, cache, ctx) = self.split("symbol diffs in library");
        let before_symbols = async {
            match library.before() {
                Some(l) => before.symbols_in_library(l, ctx.cancel).await,
                None => Ok(Vec::new()),
            }
        };
        let after_symbols = async {
            match library.after() {
                Some(l) => after.symbols_in_library(l, ctx.cancel).await,
                None => Ok(Vec::new()),
            }
        };
        tasks::symbols::symbol_diffs(cache, &ctx, key, before_symbols, after_symbols)
            .await
            .map_err(|e| log_failure!(e, "symbol diffs in library"))
    }

    pub async fn symbol_diffs_in_compiland(
        &mut self,
        compiland: &CompilandDiff,
    ) -> Result<DiffList<SymbolDiff>> {
        let key =
            SymbolListKey::Compiland(format!("{}:{}", compiland.library_name(), compiland.name()));
        let (before, after, cache, ctx) = self.split("symbol diffs in compiland");
        let before_symbols = async {
            match compiland.before() {
                Some(c) => before.symbols_in_compiland(c, ctx.cancel).await,
                None => Ok(Vec::new()),
            }
        };
        let after_symbols = async {
            match compiland.after() {
                Some(c) => after.symbols_in_compiland(c, ctx.cancel).await,
                None => Ok(Vec::new()),
            }
        };
        tasks::symbols::symbol_diffs(cache, &ctx, key, before_symbols, after_symbols)
            .await
            .map_err(|e| log_failure!(e, "symbol diffs in compiland"))
    }

    /// Symbol diffs inside one section or COFF group contribution of a
    /// library or compiland.
    pub async fn symbol_diffs_in_contribution(
        &mut self,
        contribution: &ContributionDiff,
    ) -> Result<DiffList<SymbolDiff>> {
        let ranges_of = |c: Option<&Arc<Contribution>>| -> Vec<AddressRange> {
            c.map(|c| c.ranges().to_vec()).unwrap_or_default()
        };
        let before_ranges = ranges_of(contribution.before());
        let after_ranges = ranges_of(contribution.after());

        let key = SymbolListKey::Contribution(
            contribution.kind(),
            format!("{}:{}", contribution.owner(), contribution.name()),
        );
        let (before, after, cache, ctx) = self.split("symbol diffs in contribution");
        tasks::symbols::symbol_diffs(
            cache,
            &ctx,
            key,
            symbols_in_ranges(before, before_ranges, ctx.cancel),
            symbols_in_ranges(after, after_ranges, ctx.cancel),
        )
        .await
        .map_err(|e| log_failure!(e, "symbol diffs in contribution"))
    }

    pub async fn duplicate_data_diffs(&mut self) -> Result<DiffList<DuplicateDataItemDiff>> {
        let (before, after, cache, ctx) = self.split("duplicate data diffs");
        tasks::duplicate_data::duplicate_data_diffs(
            cache,
            &ctx,
            before.duplicate_data_items(ctx.cancel),
            after.duplicate_data_items(ctx.cancel),
        )
        .await
        .map_err(|e| log_failure!(e, "duplicate data diffs"))
    }

    pub async fn template_foldability_diffs(
        &mut self,
    ) -> Result<DiffList<TemplateFoldabilityItemDiff>> {
        let (before, after, cache, ctx) = self.split("template foldability diffs");
        tasks::template_foldability::template_foldability_diffs(
            cache,
            &ctx,
            before.template_foldability_items(ctx.cancel),
            after.template_foldability_items(ctx.cancel),
        )
        .await
        .map_err(|e| log_failure!(e, "template foldability diffs"))
    }

    /// Diff of the symbols at `before_rva` and `after_rva`.
    ///
    /// `None` on a side skips that binary. Returns `Ok(None)` when no symbol
    /// was found on either side.
    pub async fn load_symbol_diff_by_rvas(
        &mut self,
        before_rva: Option<u32>,
        after_rva: Option<u32>,
    ) -> Result<Option<Arc<SymbolDiff>>> {
        let (before, after, cache, ctx) = self.split("symbol diff by RVAs");
        let before_symbol = async {
            match before_rva {
                Some(rva) => before.symbol_at_rva(rva, ctx.cancel).await,
                None => Ok(None),
            }
        };
        let after_symbol = async {
            match after_rva {
                Some(rva) => after.symbol_at_rva(rva, ctx.cancel).await,
                None => Ok(None),
            }
        };
        let identity = &mut cache.identity;
        tasks::symbols::load_symbol_diff_by_rvas(identity, &ctx, before_symbol, after_symbol)
            .await
            .map_err(|e| log_failure!(e, "symbol diff by RVAs"))
    }

    /// The section diff named `name` on either side, reconciling sections
    /// first if needed.
    pub async fn section_diff_by_name(&mut self, name: &str) -> Result<Option<Arc<SectionDiff>>> {
        let sections = self.section_diffs().await?;
        Ok(sections
            .iter()
            .find(|d| d.before().into_iter().chain(d.after()).any(|s| s.name == name))
            .cloned())
    }

    pub fn section_diff_for(&self, section: &Arc<BinarySection>) -> Option<Arc<SectionDiff>> {
        find_diff(self.cache.sections.as_ref(), section)
    }

    pub fn coff_group_diff_for(&self, group: &Arc<CoffGroup>) -> Option<Arc<CoffGroupDiff>> {
        find_diff(self.cache.coff_groups.as_ref(), group)
    }

    pub fn library_diff_for(&self, library: &Arc<Library>) -> Option<Arc<LibraryDiff>> {
        find_diff(self.cache.libraries.as_ref(), library)
    }

    pub fn compiland_diff_for(&self, compiland: &Arc<Compiland>) -> Option<Arc<CompilandDiff>> {
        find_diff(self.cache.compilands.as_ref(), compiland)
    }

    pub fn duplicate_data_diff_for(
        &self,
        item: &Arc<DuplicateDataItem>,
    ) -> Option<Arc<DuplicateDataItemDiff>> {
        find_diff(self.cache.duplicate_data.as_ref(), item)
    }

    pub fn template_foldability_diff_for(
        &self,
        item: &Arc<TemplateFoldabilityItem>,
    ) -> Option<Arc<TemplateFoldabilityItemDiff>> {
        find_diff(self.cache.template_foldability.as_ref(), item)
    }

    /// The diff `symbol` was paired into so far, if any. Never builds one.
    pub fn symbol_diff_for(&self, symbol: &Symbol, side: Side) -> Option<Arc<SymbolDiff>> {
        self.cache.identity.symbol_diff_for(SymbolKey::new(side, symbol.id))
    }

    /// The function diff owning a code block diff.
    pub fn function_diff_for(&self, block: &SymbolDiff) -> Option<Arc<FunctionDiff>> {
        block.function_id().and_then(|id| self.cache.identity.function(id))
    }
}

/// Lookup in a memoized list; `None` until the list exists.
fn find_diff<D: EntityDiff>(
    list: Option<&DiffList<D>>,
    entity: &Arc<D::Entity>,
) -> Option<Arc<D>> {
    list?.iter().find(|d| d.is_diff_of(entity)).cloned()
}
