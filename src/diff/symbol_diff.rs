//! Symbol, code block and function diffs.
//!
//! A [`SymbolDiff`] pairs an optional before symbol with an optional after
//! symbol. Code block diffs belong to exactly one [`FunctionDiff`], referenced
//! by its [`FunctionDiffId`] in the session's function arena.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::symbol::{Function, Symbol};
use crate::error::{DiffError, Result};

/// Index of a [`FunctionDiff`] in the identity cache's function arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionDiffId(pub(crate) usize);

impl FunctionDiffId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FunctionDiffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

/// What a [`SymbolDiff`] pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolDiffKind {
    Plain,
    /// User-defined type
    Type,
    /// A block of the function diff `function`.
    CodeBlock { function: FunctionDiffId },
}

pub(crate) fn signed_diff(before: Option<u64>, after: Option<u64>) -> i64 {
    let before = before.unwrap_or(0) as i64;
    let after = after.unwrap_or(0) as i64;
    after - before
}

/// Pairing of a before symbol and an after symbol, at least one present.
#[derive(Debug)]
pub struct SymbolDiff {
    before: Option<Arc<Symbol>>,
    after: Option<Arc<Symbol>>,
    kind: SymbolDiffKind,
}

impl SymbolDiff {
    pub(crate) fn new(
        before: Option<Arc<Symbol>>,
        after: Option<Arc<Symbol>>,
        kind: SymbolDiffKind,
    ) -> Result<Self> {
        if before.is_none() && after.is_none() {
            return Err(DiffError::both_sides_absent("symbols"));
        }
        Ok(Self {
            before,
            after,
            kind,
        })
    }

    pub fn before(&self) -> Option<&Arc<Symbol>> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Arc<Symbol>> {
        self.after.as_ref()
    }

    pub fn kind(&self) -> SymbolDiffKind {
        self.kind
    }

    /// Owning function diff, for code block diffs.
    pub fn function_id(&self) -> Option<FunctionDiffId> {
        match self.kind {
            SymbolDiffKind::CodeBlock { function } => Some(function),
            _ => None,
        }
    }

    pub fn is_code_block(&self) -> bool {
        self.function_id().is_some()
    }

    /// Name of the after symbol if present, else of the before symbol.
    pub fn name(&self) -> &str {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map(|s| s.name.as_str())
            .unwrap_or_default()
    }

    pub fn size_diff(&self) -> i64 {
        signed_diff(
            self.before.as_ref().map(|s| u64::from(s.size)),
            self.after.as_ref().map(|s| u64::from(s.size)),
        )
    }

    pub fn virtual_size_diff(&self) -> i64 {
        signed_diff(
            self.before.as_ref().map(|s| u64::from(s.virtual_size)),
            self.after.as_ref().map(|s| u64::from(s.virtual_size)),
        )
    }

    /// True if this diff pairs exactly these two symbols, by allocation.
    pub(crate) fn pairs(&self, before: Option<&Arc<Symbol>>, after: Option<&Arc<Symbol>>) -> bool {
        fn same(a: Option<&Arc<Symbol>>, b: Option<&Arc<Symbol>>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
        }
        same(self.before.as_ref(), before) && same(self.after.as_ref(), after)
    }
}

impl fmt::Display for SymbolDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:+} bytes)", self.name(), self.size_diff())
    }
}

/// Pairing of two functions and of all their code blocks.
#[derive(Debug)]
pub struct FunctionDiff {
    id: FunctionDiffId,
    before: Option<Arc<Function>>,
    after: Option<Arc<Function>>,
    blocks: Vec<Arc<SymbolDiff>>,
}

impl FunctionDiff {
    pub(crate) fn new(
        id: FunctionDiffId,
        before: Option<Arc<Function>>,
        after: Option<Arc<Function>>,
        blocks: Vec<Arc<SymbolDiff>>,
    ) -> Result<Self> {
        if before.is_none() && after.is_none() {
            return Err(DiffError::both_sides_absent("functions"));
        }
        Ok(Self {
            id,
            before,
            after,
            blocks,
        })
    }

    pub fn id(&self) -> FunctionDiffId {
        self.id
    }

    pub fn before(&self) -> Option<&Arc<Function>> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Arc<Function>> {
        self.after.as_ref()
    }

    /// Block diffs in construction order: before blocks first, then blocks
    /// only present after.
    pub fn block_diffs(&self) -> &[Arc<SymbolDiff>] {
        &self.blocks
    }

    pub fn name(&self) -> &str {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map(|f| f.name.as_str())
            .unwrap_or_default()
    }

    pub fn size_diff(&self) -> i64 {
        signed_diff(
            self.before.as_ref().map(|f| f.size()),
            self.after.as_ref().map(|f| f.size()),
        )
    }
}
