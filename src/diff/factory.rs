//! Canonical construction of symbol and function diffs.
//!
//! Every symbol diff handed out by a session comes from [`DiffFactory`], so a
//! given pairing always yields the same `Arc`. Code blocks are never diffed on
//! their own: asking for a block diff builds (or fetches) the diff of the
//! owning functions and returns the matching block from it.

use std::sync::Arc;
use tracing::trace;

use crate::core::symbol::{Function, Side, Symbol, SymbolKey};
use crate::diff::cache::DiffIdentityCache;
use crate::diff::symbol_diff::{FunctionDiff, FunctionDiffId, SymbolDiff, SymbolDiffKind};
use crate::error::{DiffError, Result};

fn owning_function_of(symbol: &Symbol) -> Result<Arc<Function>> {
    symbol.owning_function().ok_or_else(|| {
        DiffError::InternalConsistency(format!(
            "code block {} ({}) has no live owning function",
            symbol.id, symbol.name
        ))
    })
}

/// Builds diffs through a session's [`DiffIdentityCache`].
pub struct DiffFactory<'c> {
    cache: &'c mut DiffIdentityCache,
}

impl<'c> DiffFactory<'c> {
    pub fn new(cache: &'c mut DiffIdentityCache) -> Self {
        Self { cache }
    }

    /// Diff for `(before, after)`, built once per session.
    ///
    /// # Errors
    /// - [`DiffError::InvariantViolation`] if both sides are absent.
    /// - [`DiffError::InternalConsistency`] if a code block pairing cannot be
    ///   found in its function's diff.
    pub fn create_symbol_diff(
        &mut self,
        before: Option<&Arc<Symbol>>,
        after: Option<&Arc<Symbol>>,
    ) -> Result<Arc<SymbolDiff>> {
        if before.is_none() && after.is_none() {
            return Err(DiffError::both_sides_absent("symbols"));
        }

        if let Some(cached) = self
            .cache
            .lookup(before.map(Arc::as_ref), after.map(Arc::as_ref))
        {
            return Ok(cached);
        }

        let absent_or_block = |s: Option<&Arc<Symbol>>| s.is_none_or(|s| s.is_code_block());
        if absent_or_block(before) && absent_or_block(after) {
            return self.block_diff_via_function(before, after);
        }

        let kind = if before.into_iter().chain(after).any(|s| s.is_user_defined_type()) {
            SymbolDiffKind::Type
        } else {
            SymbolDiffKind::Plain
        };

        let diff = Arc::new(SymbolDiff::new(before.cloned(), after.cloned(), kind)?);
        self.cache.insert(&diff);
        trace!(symbol = diff.name(), size_diff = diff.size_diff(), "created symbol diff");
        Ok(diff)
    }

    fn block_diff_via_function(
        &mut self,
        before: Option<&Arc<Symbol>>,
        after: Option<&Arc<Symbol>>,
    ) -> Result<Arc<SymbolDiff>> {
        let before_function = before.map(|s| owning_function_of(s)).transpose()?;
        let after_function = after.map(|s| owning_function_of(s)).transpose()?;

        let function =
            self.create_function_diff(before_function.as_ref(), after_function.as_ref())?;
        function
            .block_diffs()
            .iter()
            .find(|block| block.pairs(before, after))
            .cloned()
            .ok_or_else(|| {
                DiffError::InternalConsistency(format!(
                    "function diff for {} has no block pairing the requested code blocks",
                    function.name()
                ))
            })
    }

    /// Diff for a pair of functions and all their blocks, built once per
    /// session.
    ///
    /// Blocks are paired greedily in before order: each before block takes the
    /// first remaining after block that is very likely the same.
    pub fn create_function_diff(
        &mut self,
        before: Option<&Arc<Function>>,
        after: Option<&Arc<Function>>,
    ) -> Result<Arc<FunctionDiff>> {
        if before.is_none() && after.is_none() {
            return Err(DiffError::both_sides_absent("functions"));
        }

        let before_primary = before.map(|f| f.primary_block().as_ref());
        let after_primary = after.map(|f| f.primary_block().as_ref());
        if let Some(cached) = self.cache.lookup(before_primary, after_primary) {
            let id = cached.function_id().ok_or_else(|| {
                DiffError::InternalConsistency(format!(
                    "primary block {} is cached as a non-block diff",
                    cached.name()
                ))
            })?;
            return self.function_diff(id);
        }

        let id = self.cache.next_function_id();
        let mut remaining_after: Vec<&Arc<Symbol>> =
            after.map(|f| f.blocks().iter().collect()).unwrap_or_default();
        let mut blocks = Vec::new();

        for before_block in before.map(|f| f.blocks()).unwrap_or_default() {
            let matching = remaining_after
                .iter()
                .position(|candidate| before_block.is_very_likely_the_same_as(candidate))
                .map(|idx| remaining_after.remove(idx));
            blocks.push(self.block_diff(id, Some(before_block), matching)?);
        }
        for after_block in remaining_after {
            blocks.push(self.block_diff(id, None, Some(after_block))?);
        }

        let function = self.cache.push_function(FunctionDiff::new(
            id,
            before.cloned(),
            after.cloned(),
            blocks,
        )?)?;

        // Only now that the owner exists are its blocks reachable
        for block in function.block_diffs() {
            self.cache.insert(block);
        }

        trace!(
            function = function.name(),
            blocks = function.block_diffs().len(),
            "created function diff"
        );
        Ok(function)
    }

    /// An existing block diff for the pairing, or a new one owned by
    /// `function`. New diffs are not cached here; the caller inserts them once
    /// the owning function diff is in the arena.
    fn block_diff(
        &self,
        function: FunctionDiffId,
        before: Option<&Arc<Symbol>>,
        after: Option<&Arc<Symbol>>,
    ) -> Result<Arc<SymbolDiff>> {
        if let Some(cached) = self
            .cache
            .lookup(before.map(Arc::as_ref), after.map(Arc::as_ref))
        {
            return Ok(cached);
        }
        Ok(Arc::new(SymbolDiff::new(
            before.cloned(),
            after.cloned(),
            SymbolDiffKind::CodeBlock { function },
        )?))
    }

    pub fn function_diff(&self, id: FunctionDiffId) -> Result<Arc<FunctionDiff>> {
        self.cache
            .function(id)
            .ok_or_else(|| DiffError::InternalConsistency(format!("no function diff {id}")))
    }

    /// Lookup only: the diff `symbol` was already paired into.
    pub fn symbol_diff_for(&self, symbol: &Symbol, side: Side) -> Option<Arc<SymbolDiff>> {
        self.cache.symbol_diff_for(SymbolKey::new(side, symbol.id))
    }

    /// The function diff owning a code block diff. `None` for other diffs.
    pub fn owning_function(&self, diff: &SymbolDiff) -> Result<Option<Arc<FunctionDiff>>> {
        diff.function_id().map(|id| self.function_diff(id)).transpose()
    }
}
