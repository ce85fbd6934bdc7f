//! Duplicate data reconciliation.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::core::items::DuplicateDataItem;
use crate::diff::entity::DuplicateDataItemDiff;
use crate::diff::factory::DiffFactory;
use crate::diff_span;
use crate::error::Result;
use crate::session::cache::{DiffList, DiffSessionCache};
use crate::tasks::{load_both, pair_entities, Matcher, PairingProgress, TaskContext};

/// Duplicate data diffs for the session, computed once.
///
/// Items pair when their symbols are very likely the same. Each diff carries
/// the canonical diff of those symbols.
pub async fn duplicate_data_diffs<FB, FA>(
    cache: &mut DiffSessionCache,
    ctx: &TaskContext<'_>,
    before: FB,
    after: FA,
) -> Result<DiffList<DuplicateDataItemDiff>>
where
    FB: Future<Output = Result<Vec<Arc<DuplicateDataItem>>>>,
    FA: Future<Output = Result<Vec<Arc<DuplicateDataItem>>>>,
{
    if let Some(cached) = &cache.duplicate_data {
        debug!("duplicate data diffs served from cache");
        return Ok(Arc::clone(cached));
    }

    let span = diff_span!("duplicate_data_diffs", task = ctx.name);
    async {
        let (before, after) = load_both(ctx, before, after).await?;

        let interval = ctx.config.progress.entity_interval;
        let mut progress =
            PairingProgress::new(ctx, "duplicate data items", interval, before.len() + after.len());
        let same_symbol: Matcher<Arc<DuplicateDataItem>> =
            &|b, a| b.symbol.is_very_likely_the_same_as(&a.symbol);
        let pairs = pair_entities(
            &before,
            &after,
            |item| item.symbol.comparison_class(),
            &[same_symbol],
            &mut progress,
        )?;

        let mut factory = DiffFactory::new(&mut cache.identity);
        let mut diffs = Vec::with_capacity(pairs.len());
        for (before, after) in pairs {
            let symbol = factory.create_symbol_diff(
                before.as_ref().map(|i| &i.symbol),
                after.as_ref().map(|i| &i.symbol),
            )?;
            diffs.push(Arc::new(DuplicateDataItemDiff::new(before, after, symbol)?));
        }
        progress.finish(diffs.len());
        info!(diffs = diffs.len(), "duplicate data diffs ready");

        let diffs = Arc::new(diffs);
        cache.duplicate_data = Some(Arc::clone(&diffs));
        Ok(diffs)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::DiffConfig;
    use crate::core::symbol::{Side, Symbol, SymbolId};
    use crate::diff::entity::EntityDiff;

    fn item(id: u32, name: &str, total: u32, wasted: u32) -> Arc<DuplicateDataItem> {
        let symbol = Arc::new(Symbol::data(SymbolId(id), name, 0x4000 + id * 0x10, total / 2));
        Arc::new(DuplicateDataItem::new(symbol, total, wasted))
    }

    #[tokio::test]
    async fn test_duplicate_data_pairs_and_shares_symbol_diffs() {
        let cancel = CancellationToken::new();
        let config = DiffConfig::default();
        let ctx = TaskContext::new("duplicate data", &cancel, &config);
        let mut cache = DiffSessionCache::new();

        let kept_before = item(1, "s_table", 64, 32);
        let kept_after = item(1, "s_table", 32, 16);
        let before = vec![kept_before.clone(), item(2, "s_fixed", 8, 4)];
        let after = vec![kept_after.clone()];

        let diffs =
            duplicate_data_diffs(&mut cache, &ctx, async { Ok(before) }, async { Ok(after) })
            .await
            .unwrap();

        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].wasted_size_diff(), -16);
        assert_eq!(diffs[0].wasted_size_remaining(), 16);
        assert_eq!(diffs[1].wasted_size_remaining(), 0);
        assert_eq!(diffs[1].size_diff(), -8);

        let factory = DiffFactory::new(&mut cache.identity);
        let canonical = factory.symbol_diff_for(&kept_after.symbol, Side::After).unwrap();
        assert!(Arc::ptr_eq(diffs[0].symbol_diff(), &canonical));
    }
}
