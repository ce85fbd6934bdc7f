//! Symbol reconciliation within one container.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::core::symbol::{Symbol, SymbolComparisonClass};
use crate::diff::cache::DiffIdentityCache;
use crate::diff::factory::DiffFactory;
use crate::diff::symbol_diff::SymbolDiff;
use crate::diff_span;
use crate::error::Result;
use crate::session::cache::{DiffList, DiffSessionCache, SymbolListKey};
use crate::tasks::{load_both, pair_entities, Matcher, PairingProgress, TaskContext};

/// Symbol diffs for the container named by `key`, computed once per key.
///
/// Symbols are only compared within their comparison class. Every diff comes
/// from the session's factory, so a code block found here is the same
/// instance as the block inside its function diff.
pub async fn symbol_diffs<FB, FA>(
    cache: &mut DiffSessionCache,
    ctx: &TaskContext<'_>,
    key: SymbolListKey,
    before: FB,
    after: FA,
) -> Result<DiffList<SymbolDiff>>
where
    FB: Future<Output = Result<Vec<Arc<Symbol>>>>,
    FA: Future<Output = Result<Vec<Arc<Symbol>>>>,
{
    if let Some(cached) = cache.symbol_lists.get(&key) {
        debug!(container = %key, "symbol diffs served from cache");
        return Ok(Arc::clone(cached));
    }

    let span = diff_span!("symbol_diffs", task = ctx.name, container = %key);
    async {
        let (before, after) = load_both(ctx, before, after).await?;
        let diffs = Arc::new(pair_symbols(&mut cache.identity, ctx, &before, &after)?);
        info!(
            before = before.len(),
            after = after.len(),
            diffs = diffs.len(),
            "symbol diffs ready"
        );

        cache.symbol_lists.insert(key, Arc::clone(&diffs));
        Ok(diffs)
    }
    .instrument(span)
    .await
}

fn pair_symbols(
    identity: &mut DiffIdentityCache,
    ctx: &TaskContext<'_>,
    before: &[Arc<Symbol>],
    after: &[Arc<Symbol>],
) -> Result<Vec<Arc<SymbolDiff>>> {
    let interval = ctx.config.progress.symbol_interval;
    let mut progress = PairingProgress::new(ctx, "symbols", interval, before.len() + after.len());
    let heuristic: Matcher<Arc<Symbol>> = &|b, a| b.is_very_likely_the_same_as(a);

    // Renamed foldable symbols may still match, so the name cannot narrow
    // the bucket
    let bucket = |s: &Arc<Symbol>| -> SymbolComparisonClass { s.comparison_class() };
    let pairs = pair_entities(before, after, bucket, &[heuristic], &mut progress)?;

    let mut factory = DiffFactory::new(identity);
    let mut seen = HashSet::new();
    let mut diffs = Vec::with_capacity(pairs.len());
    for (before, after) in pairs {
        let diff = factory.create_symbol_diff(before.as_ref(), after.as_ref())?;
        // A block already paired through its function comes back as that
        // diff, which may also cover a symbol later in the list
        if seen.insert(Arc::as_ptr(&diff)) {
            diffs.push(diff);
        }
    }

    progress.finish(diffs.len());
    Ok(diffs)
}

/// The canonical diff of whatever symbols sit at the given RVAs.
///
/// Returns `Ok(None)` when neither binary has a symbol there.
pub async fn load_symbol_diff_by_rvas<FB, FA>(
    identity: &mut DiffIdentityCache,
    ctx: &TaskContext<'_>,
    before: FB,
    after: FA,
) -> Result<Option<Arc<SymbolDiff>>>
where
    FB: Future<Output = Result<Option<Arc<Symbol>>>>,
    FA: Future<Output = Result<Option<Arc<Symbol>>>>,
{
    let (before, after) = load_both(ctx, before, after)
        .instrument(diff_span!("load_symbol_diff_by_rvas", task = ctx.name))
        .await?;

    if before.is_none() && after.is_none() {
        debug!("no symbol on either side");
        return Ok(None);
    }
    DiffFactory::new(identity)
        .create_symbol_diff(before.as_ref(), after.as_ref())
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::DiffConfig;
    use crate::core::symbol::{BlockLayout, Function, SymbolId};

    fn data(id: u32, name: &str, rva: u32, size: u32) -> Arc<Symbol> {
        Arc::new(Symbol::data(SymbolId(id), name, rva, size))
    }

    #[tokio::test]
    async fn test_symbols_pair_by_class_and_name() {
        let cancel = CancellationToken::new();
        let config = DiffConfig::default();
        let ctx = TaskContext::new("symbols", &cancel, &config);
        let mut cache = DiffSessionCache::new();

        let before = vec![data(1, "g_a", 0x100, 8), data(2, "g_gone", 0x108, 4)];
        let after = vec![
            Arc::new(Symbol::public_symbol(SymbolId(5), "g_a", 0x200, 8)),
            data(6, "g_a", 0x208, 16),
        ];

        let key = SymbolListKey::Section(".data".into());
        let diffs = symbol_diffs(&mut cache, &ctx, key.clone(), async { Ok(before) }, async {
            Ok(after)
        })
        .await
        .unwrap();

        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0].size_diff(), 8);
        assert_eq!(diffs[0].after().unwrap().id, SymbolId(6));
        assert!(diffs[1].after().is_none());
        assert_eq!(diffs[2].after().unwrap().id, SymbolId(5));
        assert!(Arc::ptr_eq(cache.symbol_list(&key).unwrap(), &diffs));
    }

    #[tokio::test]
    async fn test_renamed_string_literal_pairs_on_canonical_name() {
        let cancel = CancellationToken::new();
        let config = DiffConfig::default();
        let ctx = TaskContext::new("symbols", &cancel, &config);
        let mut cache = DiffSessionCache::new();

        let literal = |id, name: &str, rva| {
            Arc::new(Symbol::data(SymbolId(id), name, rva, 12).with_canonical_name("??_C@_0M@abc"))
        };
        let before = vec![literal(1, "`string'::1", 0x500)];
        let after = vec![literal(2, "`string'::7", 0x540)];

        let key = SymbolListKey::Section(".rdata".into());
        let diffs = symbol_diffs(&mut cache, &ctx, key, async { Ok(before) }, async { Ok(after) })
            .await
            .unwrap();

        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].before().unwrap().id, SymbolId(1));
        assert_eq!(diffs[0].after().unwrap().id, SymbolId(2));
    }

    #[tokio::test]
    async fn test_code_blocks_come_from_function_diffs() {
        let cancel = CancellationToken::new();
        let config = DiffConfig::default();
        let ctx = TaskContext::new("symbols", &cancel, &config);
        let mut cache = DiffSessionCache::new();

        let before_fn = Function::new(
            "Run",
            &[BlockLayout::new(SymbolId(1), 0x1000, 32), BlockLayout::new(SymbolId(2), 0x9000, 8)],
        )
        .unwrap();
        let after_fn = Function::new(
            "Run",
            &[BlockLayout::new(SymbolId(1), 0x1000, 40), BlockLayout::new(SymbolId(2), 0x9100, 8)],
        )
        .unwrap();

        let before = before_fn.blocks().to_vec();
        let after = after_fn.blocks().to_vec();
        let diffs = symbol_diffs(
            &mut cache,
            &ctx,
            SymbolListKey::Section(".text".into()),
            async { Ok(before) },
            async { Ok(after) },
        )
        .await
        .unwrap();

        assert_eq!(diffs.len(), 2);
        let function = cache.identity().function(diffs[0].function_id().unwrap()).unwrap();
        assert_eq!(function.size_diff(), 8);
        for diff in diffs.iter() {
            assert!(function.block_diffs().iter().any(|b| Arc::ptr_eq(b, diff)));
        }
    }

    #[tokio::test]
    async fn test_load_by_rvas() {
        let cancel = CancellationToken::new();
        let config = DiffConfig::default();
        let ctx = TaskContext::new("rva", &cancel, &config);
        let mut identity = DiffIdentityCache::new();

        let none =
            load_symbol_diff_by_rvas(&mut identity, &ctx, async { Ok(None) }, async { Ok(None) })
                .await
                .unwrap();
        assert!(none.is_none());

        let symbol = data(3, "g_new", 0x300, 4);
        let lookup = symbol.clone();
        let diff = load_symbol_diff_by_rvas(&mut identity, &ctx, async { Ok(None) }, async {
            Ok(Some(lookup))
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(diff.size_diff(), 4);

        let again = load_symbol_diff_by_rvas(&mut identity, &ctx, async { Ok(None) }, async {
            Ok(Some(symbol))
        })
        .await
        .unwrap()
        .unwrap();
        assert!(Arc::ptr_eq(&diff, &again));
    }
}
