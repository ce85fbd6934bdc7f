//! Session-scoped diff identity memoization.
//!
//! The cache guarantees one [`SymbolDiff`] instance per logical pairing for
//! the lifetime of a diff session. Lookups and inserts share a single key
//! normalization, [`rva_pair_key`], so the two paths cannot drift apart.
//!
//! Entries are first-write-wins and are never removed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::symbol::{Side, Symbol, SymbolKey};
use crate::diff::symbol_diff::{FunctionDiff, FunctionDiffId, SymbolDiff};
use crate::error::{DiffError, Result};

/// `(before RVA, after RVA)`, with `None` for an absent side.
pub type RvaPairKey = (Option<u32>, Option<u32>);

/// RVA 0 marks symbols that were optimized away entirely.
pub const SENTINEL_RVA: u32 = 0;

/// Whether a present symbol may take part in an RVA-keyed entry.
///
/// Sentinel symbols share RVA 0 and COMDAT-folded symbols share their
/// survivor's RVA, so neither identifies a pairing by address.
fn addressable(symbol: &Symbol) -> bool {
    symbol.rva != SENTINEL_RVA && !symbol.is_folded_duplicate
}

/// Normalize a pairing into its RVA key.
///
/// Returns `None` when both sides are absent or any present side is not
/// addressable; such pairings are deduplicated by symbol identity only.
pub fn rva_pair_key(before: Option<&Symbol>, after: Option<&Symbol>) -> Option<RvaPairKey> {
    if before.is_none() && after.is_none() {
        return None;
    }
    if before.into_iter().chain(after).any(|s| !addressable(s)) {
        return None;
    }
    Some((before.map(|s| s.rva), after.map(|s| s.rva)))
}

/// Identity maps for symbol diffs plus the function diff arena.
#[derive(Debug, Default)]
pub struct DiffIdentityCache {
    by_rva: HashMap<RvaPairKey, Arc<SymbolDiff>>,
    by_symbol: HashMap<SymbolKey, Arc<SymbolDiff>>,
    functions: Vec<Arc<FunctionDiff>>,
}

impl DiffIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find an existing diff for a pairing.
    ///
    /// Tries the RVA key first, then the identity of the before symbol, then
    /// the identity of the after symbol. The identity fallbacks may return a
    /// diff that paired the symbol with a different counterpart.
    pub fn lookup(
        &self,
        before: Option<&Symbol>,
        after: Option<&Symbol>,
    ) -> Option<Arc<SymbolDiff>> {
        if let Some(key) = rva_pair_key(before, after) {
            if let Some(diff) = self.by_rva.get(&key) {
                return Some(Arc::clone(diff));
            }
        }

        before
            .and_then(|s| self.by_symbol.get(&SymbolKey::new(Side::Before, s.id)))
            .or_else(|| after.and_then(|s| self.by_symbol.get(&SymbolKey::new(Side::After, s.id))))
            .cloned()
    }

    /// Record a newly built diff under every key that applies to it.
    ///
    /// Existing entries win: a key already present keeps its diff.
    pub fn insert(&mut self, diff: &Arc<SymbolDiff>) {
        let before = diff.before().map(Arc::as_ref);
        let after = diff.after().map(Arc::as_ref);

        if let Some(key) = rva_pair_key(before, after) {
            self.by_rva.entry(key).or_insert_with(|| Arc::clone(diff));
        }
        if let Some(symbol) = before {
            self.by_symbol
                .entry(SymbolKey::new(Side::Before, symbol.id))
                .or_insert_with(|| Arc::clone(diff));
        }
        if let Some(symbol) = after {
            self.by_symbol
                .entry(SymbolKey::new(Side::After, symbol.id))
                .or_insert_with(|| Arc::clone(diff));
        }
    }

    /// The diff a symbol was paired into, if any.
    pub fn symbol_diff_for(&self, key: SymbolKey) -> Option<Arc<SymbolDiff>> {
        self.by_symbol.get(&key).cloned()
    }

    /// Id the next function diff pushed into the arena will get.
    pub fn next_function_id(&self) -> FunctionDiffId {
        FunctionDiffId(self.functions.len())
    }

    /// Append a function diff built with [`next_function_id`](Self::next_function_id).
    pub fn push_function(&mut self, function: FunctionDiff) -> Result<Arc<FunctionDiff>> {
        let expected = self.next_function_id();
        if function.id() != expected {
            return Err(DiffError::InternalConsistency(format!(
                "function diff {} pushed where {} was reserved",
                function.id(),
                expected
            )));
        }

        let function = Arc::new(function);
        self.functions.push(Arc::clone(&function));
        Ok(function)
    }

    pub fn function(&self, id: FunctionDiffId) -> Option<Arc<FunctionDiff>> {
        self.functions.get(id.index()).cloned()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Number of distinct symbol diffs reachable by symbol identity.
    pub fn symbol_entry_count(&self) -> usize {
        self.by_symbol.len()
    }
}
