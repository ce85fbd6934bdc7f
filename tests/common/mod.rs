//! Common test utilities and helpers.
//!
//! [`MockBinary`] is an in-memory [`BinarySession`] that integration tests
//! fill with hand-built sections, libraries and symbols.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sizediff::core::{
    AddressRange, BinarySection, BlockLayout, Compiland, DuplicateDataItem, Function, Library,
    Symbol, SymbolId, TemplateFoldabilityItem,
};
use sizediff::{BinarySession, CancellationToken, Result};

/// An in-memory binary.
#[derive(Default)]
pub struct MockBinary {
    pub path: String,
    pub sections: Vec<Arc<BinarySection>>,
    pub libraries: Vec<Arc<Library>>,
    pub symbols: Vec<Arc<Symbol>>,
    /// Keeps code blocks' owning functions alive.
    pub functions: Vec<Arc<Function>>,
    pub library_symbols: HashMap<String, Vec<Arc<Symbol>>>,
    pub compiland_symbols: HashMap<String, Vec<Arc<Symbol>>>,
    pub duplicate_data: Vec<Arc<DuplicateDataItem>>,
    pub templates: Vec<Arc<TemplateFoldabilityItem>>,
    /// Makes `sections` hang until cancelled.
    pub stall: bool,
}

impl MockBinary {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn section(mut self, section: BinarySection) -> Self {
        self.sections.push(Arc::new(section));
        self
    }

    pub fn library(mut self, library: Library) -> Self {
        self.libraries.push(Arc::new(library));
        self
    }

    pub fn data(mut self, id: u32, name: &str, rva: u32, size: u32) -> Self {
        self.symbols.push(Arc::new(Symbol::data(SymbolId(id), name, rva, size)));
        self
    }

    /// Adds a function whose blocks get consecutive ids starting at `first_id`.
    pub fn function(mut self, name: &str, first_id: u32, blocks: &[(u32, u32)]) -> Self {
        let layout: Vec<BlockLayout> = blocks
            .iter()
            .enumerate()
            .map(|(i, &(rva, size))| BlockLayout::new(SymbolId(first_id + i as u32), rva, size))
            .collect();
        let function = Function::new(name, &layout).expect("function needs at least one block");
        self.symbols.extend(function.blocks().iter().cloned());
        self.functions.push(function);
        self
    }

    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }
}

#[async_trait]
impl BinarySession for MockBinary {
    fn binary_path(&self) -> &str {
        &self.path
    }

    async fn sections(&self, cancel: &CancellationToken) -> Result<Vec<Arc<BinarySection>>> {
        cancel.check()?;
        if self.stall {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(self.sections.clone())
    }

    async fn libraries(&self, cancel: &CancellationToken) -> Result<Vec<Arc<Library>>> {
        cancel.check()?;
        Ok(self.libraries.clone())
    }

    async fn symbols_in_range(
        &self,
        range: AddressRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Symbol>>> {
        cancel.check()?;
        Ok(self
            .symbols
            .iter()
            .filter(|s| range.contains(s.rva))
            .cloned()
            .collect())
    }

    async fn symbols_in_library(
        &self,
        library: &Library,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Symbol>>> {
        cancel.check()?;
        Ok(self.library_symbols.get(&library.name).cloned().unwrap_or_default())
    }

    async fn symbols_in_compiland(
        &self,
        compiland: &Compiland,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Symbol>>> {
        cancel.check()?;
        Ok(self.compiland_symbols.get(&compiland.name).cloned().unwrap_or_default())
    }

    async fn duplicate_data_items(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<DuplicateDataItem>>> {
        cancel.check()?;
        Ok(self.duplicate_data.clone())
    }

    async fn template_foldability_items(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<TemplateFoldabilityItem>>> {
        cancel.check()?;
        Ok(self.templates.clone())
    }

    async fn symbol_at_rva(
        &self,
        rva: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Symbol>>> {
        cancel.check()?;
        Ok(self.symbols.iter().find(|s| s.rva == rva).cloned())
    }
}

/// Before and after binaries for the section scenario:
/// `.text` grows by 500, `.data` shrinks by 1000, `.rdata` is unchanged,
/// `.rsrc` disappears and a virtual-only `.virt` appears.
pub fn section_scenario() -> (MockBinary, MockBinary) {
    let before = MockBinary::new(r"c:\build1\app.exe")
        .section(BinarySection::new(".text", 0x1000, 0x2000, 0x2000))
        .section(BinarySection::new(".data", 0x3000, 0x1800, 0x1800))
        .section(BinarySection::new(".rdata", 0x5000, 0x400, 0x400))
        .section(BinarySection::new(".rsrc", 0x6000, 0x200, 0x200));
    let after = MockBinary::new(r"c:\build2\app.exe")
        .section(BinarySection::new(".text", 0x1000, 0x2000 + 500, 0x2000 + 500))
        .section(BinarySection::new(".data", 0x4000, 0x1800 - 1000, 0x1800 - 1000))
        .section(BinarySection::new(".rdata", 0x5000, 0x400, 0x400))
        .section(BinarySection::new(".virt", 0x7000, 0, 0x100));
    (before, after)
}

/// Before and after binaries for the library scenario:
/// `a.lib` grows by 400, `b.lib` shrinks by 900, `d.lib` disappears and
/// `c.lib` appears.
pub fn library_scenario() -> (MockBinary, MockBinary) {
    let before = MockBinary::new("before.exe")
        .library(
            Library::new(r"c:\b1\out\a.lib", 1000, 1000)
                .with_compiland(Compiland::new(r"c:\b1\obj\a1.obj", 600, 600))
                .with_compiland(Compiland::new(r"c:\b1\obj\a2.obj", 400, 400)),
        )
        .library(Library::new(r"c:\b1\out\b.lib", 2000, 2000))
        .library(Library::new(r"c:\b1\out\d.lib", 300, 300));
    let after = MockBinary::new("after.exe")
        .library(
            Library::new(r"c:\b2\out\a.lib", 1400, 1400)
                .with_compiland(Compiland::new(r"c:\b2\obj\a1.obj", 1000, 1000))
                .with_compiland(Compiland::new(r"c:\b2\obj\a2.obj", 400, 400)),
        )
        .library(Library::new(r"c:\b2\out\b.lib", 1100, 1100))
        .library(Library::new(r"c:\b2\out\c.lib", 50, 50));
    (before, after)
}
