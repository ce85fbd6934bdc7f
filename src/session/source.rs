//! The boundary to whatever reads raw entities out of a binary.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::core::address_range::AddressRange;
use crate::core::items::{DuplicateDataItem, TemplateFoldabilityItem};
use crate::core::library::{Compiland, Library};
use crate::core::section::BinarySection;
use crate::core::symbol::Symbol;
use crate::error::Result;

/// Read-only access to the raw entities of one binary.
///
/// Implementations are expected to observe `cancel` while they do I/O and to
/// return [`DiffError::Cancelled`](crate::error::DiffError::Cancelled) when it
/// fires. Lists must be stable: the same call returns entities in the same
/// order every time.
#[async_trait]
pub trait BinarySession: Send + Sync {
    /// Path of the binary, for logging.
    fn binary_path(&self) -> &str;

    async fn sections(&self, cancel: &CancellationToken) -> Result<Vec<Arc<BinarySection>>>;

    async fn libraries(&self, cancel: &CancellationToken) -> Result<Vec<Arc<Library>>>;

    /// Symbols whose RVA lies in `range`.
    async fn symbols_in_range(
        &self,
        range: AddressRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Symbol>>>;

    async fn symbols_in_library(
        &self,
        library: &Library,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Symbol>>>;

    async fn symbols_in_compiland(
        &self,
        compiland: &Compiland,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Symbol>>>;

    async fn duplicate_data_items(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<DuplicateDataItem>>>;

    async fn template_foldability_items(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<TemplateFoldabilityItem>>>;

    /// The symbol starting at `rva`, if any.
    async fn symbol_at_rva(
        &self,
        rva: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Symbol>>>;
}
