//! Raw symbol and function types as produced by a [`BinarySession`].
//!
//! Symbols are shared as `Arc<Symbol>` for the life of a session. A code
//! block knows its owning [`Function`] through a weak link, so a function must
//! be kept alive by its producer for as long as its blocks are in use.
//!
//! [`BinarySession`]: crate::session::BinarySession

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::address_range::AddressRange;

/// Identifier of a symbol, unique within one binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which binary of a diff an entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Before,
    After,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Before => write!(f, "before"),
            Side::After => write!(f, "after"),
        }
    }
}

/// Symbol identity across both binaries of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub side: Side,
    pub id: SymbolId,
}

impl SymbolKey {
    pub fn new(side: Side, id: SymbolId) -> Self {
        Self { side, id }
    }
}

/// Buckets used when pairing symbols. Symbols in different buckets are never
/// considered the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolComparisonClass {
    PrimaryCodeBlock,
    SeparatedCodeBlock,
    PublicSymbol,
    Thunk,
    StaticData,
    UserDefinedType,
}

/// What a symbol is.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    Data,
    PublicSymbol,
    Thunk,
    UserDefinedType,
    /// A contiguous piece of a function's code. The first block of a
    /// function is its primary block; the rest were separated by PGO or
    /// similar layout optimizations.
    CodeBlock {
        function: Weak<Function>,
        is_primary: bool,
    },
}

/// A named thing at an address in one binary.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    /// RVA 0 marks symbols that were optimized away entirely.
    pub rva: u32,
    pub size: u32,
    pub virtual_size: u32,
    /// Set when COMDAT folding merged this symbol into another at the same RVA.
    pub is_folded_duplicate: bool,
    /// Name of the symbol COMDAT folding keeps for this one's group, for
    /// symbols the linker may fold.
    pub canonical_name: Option<String>,
    pub kind: SymbolKind,
}

impl Symbol {
    fn with_kind(
        id: SymbolId,
        name: impl Into<String>,
        rva: u32,
        size: u32,
        kind: SymbolKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            rva,
            size,
            virtual_size: size,
            is_folded_duplicate: false,
            canonical_name: None,
            kind,
        }
    }

    pub fn data(id: SymbolId, name: impl Into<String>, rva: u32, size: u32) -> Self {
        Self::with_kind(id, name, rva, size, SymbolKind::Data)
    }

    pub fn public_symbol(id: SymbolId, name: impl Into<String>, rva: u32, size: u32) -> Self {
        Self::with_kind(id, name, rva, size, SymbolKind::PublicSymbol)
    }

    pub fn thunk(id: SymbolId, name: impl Into<String>, rva: u32, size: u32) -> Self {
        Self::with_kind(id, name, rva, size, SymbolKind::Thunk)
    }

    /// User-defined types have no address.
    pub fn user_defined_type(id: SymbolId, name: impl Into<String>, size: u32) -> Self {
        Self::with_kind(id, name, 0, size, SymbolKind::UserDefinedType)
    }

    /// Override the in-memory size, e.g. for zero-initialized data.
    pub fn with_virtual_size(mut self, virtual_size: u32) -> Self {
        self.virtual_size = virtual_size;
        self
    }

    /// Mark this symbol as foldable under `canonical_name`.
    pub fn with_canonical_name(mut self, canonical_name: impl Into<String>) -> Self {
        self.canonical_name = Some(canonical_name.into());
        self
    }

    pub fn folded(mut self) -> Self {
        self.is_folded_duplicate = true;
        self
    }

    pub fn is_code_block(&self) -> bool {
        matches!(self.kind, SymbolKind::CodeBlock { .. })
    }

    pub fn is_user_defined_type(&self) -> bool {
        matches!(self.kind, SymbolKind::UserDefinedType)
    }

    /// The function owning this code block, or `None` for other symbols
    /// and for blocks whose function has already been dropped.
    pub fn owning_function(&self) -> Option<Arc<Function>> {
        match &self.kind {
            SymbolKind::CodeBlock { function, .. } => function.upgrade(),
            _ => None,
        }
    }

    pub fn comparison_class(&self) -> SymbolComparisonClass {
        match &self.kind {
            SymbolKind::Data => SymbolComparisonClass::StaticData,
            SymbolKind::PublicSymbol => SymbolComparisonClass::PublicSymbol,
            SymbolKind::Thunk => SymbolComparisonClass::Thunk,
            SymbolKind::UserDefinedType => SymbolComparisonClass::UserDefinedType,
            SymbolKind::CodeBlock {
                is_primary: true, ..
            } => SymbolComparisonClass::PrimaryCodeBlock,
            SymbolKind::CodeBlock { is_primary: false, .. } => {
                SymbolComparisonClass::SeparatedCodeBlock
            }
        }
    }

    /// Address range occupied by this symbol. Zero-sized symbols cover their
    /// own RVA only.
    pub fn range(&self) -> AddressRange {
        if self.size == 0 && self.virtual_size > 0 {
            AddressRange::from_start_and_size(self.rva, self.virtual_size, true)
        } else {
            AddressRange::from_start_and_size(self.rva, self.size, false)
        }
    }

    /// Heuristic used to pair a symbol in one binary with its counterpart in
    /// another. Both must be in the same comparison class with an identical
    /// name, or be foldable symbols with a real address and the same
    /// canonical name. Separated blocks carry their function's name, so they
    /// only match when each function has exactly one separated block and the
    /// functions themselves match.
    pub fn is_very_likely_the_same_as(&self, other: &Symbol) -> bool {
        if self.comparison_class() != other.comparison_class() {
            return false;
        }
        if self.name != other.name {
            return self.shares_canonical_name_with(other);
        }

        if self.comparison_class() != SymbolComparisonClass::SeparatedCodeBlock {
            return true;
        }

        match (self.owning_function(), other.owning_function()) {
            (Some(mine), Some(theirs)) => {
                mine.separated_block_count() == 1
                    && theirs.separated_block_count() == 1
                    && mine.is_very_likely_the_same_as(&theirs)
            }
            _ => false,
        }
    }

    fn shares_canonical_name_with(&self, other: &Symbol) -> bool {
        if self.rva == 0 || other.rva == 0 {
            return false;
        }
        match (&self.canonical_name, &other.canonical_name) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {:#x} ({} bytes)", self.name, self.rva, self.size)
    }
}

/// Address and size of one code block, used to build a [`Function`].
#[derive(Debug, Clone, Copy)]
pub struct BlockLayout {
    pub id: SymbolId,
    pub rva: u32,
    pub size: u32,
}

impl BlockLayout {
    pub fn new(id: SymbolId, rva: u32, size: u32) -> Self {
        Self { id, rva, size }
    }
}

/// A function made of one or more code blocks. The first block is primary.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    blocks: Vec<Arc<Symbol>>,
}

impl Function {
    /// Build a function and its blocks in one step, wiring every block back
    /// to the function.
    ///
    /// Returns `None` when `layout` is empty: a function always has a primary
    /// block.
    pub fn new(name: impl Into<String>, layout: &[BlockLayout]) -> Option<Arc<Function>> {
        if layout.is_empty() {
            return None;
        }

        let name = name.into();
        Some(Arc::new_cyclic(|weak: &Weak<Function>| {
            let blocks = layout
                .iter()
                .enumerate()
                .map(|(idx, block)| {
                    Arc::new(Symbol::with_kind(
                        block.id,
                        name.clone(),
                        block.rva,
                        block.size,
                        SymbolKind::CodeBlock {
                            function: weak.clone(),
                            is_primary: idx == 0,
                        },
                    ))
                })
                .collect();
            Function { name, blocks }
        }))
    }

    pub fn primary_block(&self) -> &Arc<Symbol> {
        // new() never builds a function without blocks
        &self.blocks[0]
    }

    pub fn blocks(&self) -> &[Arc<Symbol>] {
        &self.blocks
    }

    pub fn separated_block_count(&self) -> usize {
        self.blocks.len() - 1
    }

    pub fn size(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.size)).sum()
    }

    pub fn is_very_likely_the_same_as(&self, other: &Function) -> bool {
        self.name == other.name
    }
}
