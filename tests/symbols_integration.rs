//! Symbol-level reconciliation through a [`DiffSession`].

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::MockBinary;
use sizediff::core::{BinarySection, CoffGroup, Compiland, Library, Side, Symbol, SymbolId};
use sizediff::diff::EntityDiff;
use sizediff::DiffSession;

fn binaries() -> (MockBinary, MockBinary) {
    let before = MockBinary::new("before.exe")
        .section(
            BinarySection::new(".text", 0x1000, 0x1000, 0x1000)
                .with_coff_group(CoffGroup::new(".text$mn", 0x1000, 0x800, 0x800))
                .with_coff_group(CoffGroup::new(".text$x", 0x1800, 0x800, 0x800)),
        )
        .section(BinarySection::new(".data", 0x3000, 0x100, 0x100))
        .function("Widget::Draw", 1, &[(0x1000, 0x40), (0x1800, 0x10)])
        .function("Widget::Hide", 10, &[(0x1100, 0x20)])
        .data(20, "g_count", 0x3000, 4)
        .data(21, "g_name", 0x3010, 16);
    let after = MockBinary::new("after.exe")
        .section(
            BinarySection::new(".text", 0x1000, 0x1000, 0x1000)
                .with_coff_group(CoffGroup::new(".text$mn", 0x1000, 0x800, 0x800))
                .with_coff_group(CoffGroup::new(".text$x", 0x1800, 0x800, 0x800)),
        )
        .section(BinarySection::new(".data", 0x3000, 0x100, 0x100))
        .function("Widget::Draw", 1, &[(0x1000, 0x60), (0x1800, 0x18)])
        .function("Widget::Show", 10, &[(0x1200, 0x30)])
        .data(20, "g_count", 0x3000, 8);
    (before, after)
}

#[tokio::test]
async fn test_symbols_in_section_partition_blocks() {
    let (before, after) = binaries();
    let mut session = DiffSession::new(before, after);
    let sections = session.section_diffs().await.unwrap();
    let text = sections.iter().find(|s| s.name() == ".text").unwrap().clone();

    let diffs = session.symbol_diffs_in_section(&text).await.unwrap();

    // Draw's two blocks paired, Hide removed, Show added
    assert_eq!(diffs.len(), 4);
    let mut seen = HashSet::new();
    for diff in diffs.iter() {
        assert!(diff.is_code_block());
        for symbol in diff.before().into_iter().chain(diff.after()) {
            assert!(seen.insert(Arc::as_ptr(symbol)));
        }
    }
    assert_eq!(seen.len(), 6);

    let draw = session.function_diff_for(&diffs[0]).unwrap();
    assert_eq!(draw.name(), "Widget::Draw");
    assert_eq!(draw.size_diff(), 0x28);
    for block in draw.block_diffs() {
        assert!(diffs.iter().any(|d| Arc::ptr_eq(d, block)));
    }

    let again = session.symbol_diffs_in_section(&text).await.unwrap();
    assert!(Arc::ptr_eq(&diffs, &again));
}

#[tokio::test]
async fn test_coff_group_symbols_share_diffs_with_section() {
    let (before, after) = binaries();
    let mut session = DiffSession::new(before, after);
    let sections = session.section_diffs().await.unwrap();
    let text = sections.iter().find(|s| s.name() == ".text").unwrap().clone();
    let section_symbols = session.symbol_diffs_in_section(&text).await.unwrap();

    let groups = session.coff_group_diffs().await.unwrap();
    let cold = groups.iter().find(|g| g.name() == ".text$x").unwrap().clone();
    let cold_symbols = session.symbol_diffs_in_coff_group(&cold).await.unwrap();

    assert_eq!(cold_symbols.len(), 1);
    assert!(section_symbols.iter().any(|d| Arc::ptr_eq(d, &cold_symbols[0])));
}

#[tokio::test]
async fn test_data_symbols_and_lookup() {
    let (before, after) = binaries();
    let mut session = DiffSession::new(before, after);
    let data = session.section_diff_by_name(".data").await.unwrap().unwrap();

    let diffs = session.symbol_diffs_in_section(&data).await.unwrap();
    assert_eq!(diffs.len(), 2);
    assert_eq!(diffs[0].size_diff(), 4);
    assert!(diffs[1].after().is_none());

    let g_name = session
        .before()
        .symbols
        .iter()
        .find(|s| s.name == "g_name")
        .unwrap()
        .clone();
    let found = session.symbol_diff_for(&g_name, Side::Before).unwrap();
    assert!(Arc::ptr_eq(&found, &diffs[1]));
    assert!(session.symbol_diff_for(&g_name, Side::After).is_none());
}

#[tokio::test]
async fn test_symbols_by_rva() {
    let (before, after) = binaries();
    let mut session = DiffSession::new(before, after);

    let diff = session
        .load_symbol_diff_by_rvas(Some(0x3000), Some(0x3000))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(diff.name(), "g_count");

    let same = session
        .load_symbol_diff_by_rvas(Some(0x3000), Some(0x3000))
        .await
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&diff, &same));

    assert!(session.load_symbol_diff_by_rvas(Some(0x9999), None).await.unwrap().is_none());
    assert!(session.load_symbol_diff_by_rvas(None, None).await.unwrap().is_none());

    // A separated block resolves through its function
    let block = session
        .load_symbol_diff_by_rvas(Some(0x1800), Some(0x1800))
        .await
        .unwrap()
        .unwrap();
    let owner = session.function_diff_for(&block).unwrap();
    assert_eq!(owner.block_diffs().len(), 2);
}

#[tokio::test]
async fn test_library_and_compiland_symbols() {
    let lib_path = r"c:\b\out\core.lib";
    let obj_path = r"c:\b\obj\core.obj";
    let library =
        || Library::new(lib_path, 64, 64).with_compiland(Compiland::new(obj_path, 64, 64));
    let symbol = |id, size| Arc::new(Symbol::data(SymbolId(id), "g_core", 0x5000, size));

    let mut before = MockBinary::new("before.exe").library(library());
    let mut after = MockBinary::new("after.exe").library(library());
    before.library_symbols.insert(lib_path.to_string(), vec![symbol(1, 8)]);
    after.library_symbols.insert(lib_path.to_string(), vec![symbol(1, 12)]);
    before.compiland_symbols.insert(obj_path.to_string(), vec![symbol(1, 8)]);
    after.compiland_symbols.insert(obj_path.to_string(), vec![symbol(1, 12)]);

    let mut session = DiffSession::new(before, after);
    let libraries = session.library_diffs().await.unwrap();
    let by_library = session.symbol_diffs_in_library(&libraries[0]).await.unwrap();
    assert_eq!(by_library.len(), 1);
    assert_eq!(by_library[0].size_diff(), 4);

    let compilands = session.compiland_diffs().await.unwrap();
    let by_compiland = session.symbol_diffs_in_compiland(&compilands[0]).await.unwrap();
    assert_eq!(by_compiland.len(), 1);
    assert_eq!(by_compiland[0].size_diff(), 4);
}
