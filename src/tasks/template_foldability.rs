//! Template foldability reconciliation, paired by exact template name.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::core::items::TemplateFoldabilityItem;
use crate::diff::entity::TemplateFoldabilityItemDiff;
use crate::diff_span;
use crate::error::Result;
use crate::session::cache::{DiffList, DiffSessionCache};
use crate::tasks::{load_both, pair_entities, Matcher, PairingProgress, TaskContext};

pub async fn template_foldability_diffs<FB, FA>(
    cache: &mut DiffSessionCache,
    ctx: &TaskContext<'_>,
    before: FB,
    after: FA,
) -> Result<DiffList<TemplateFoldabilityItemDiff>>
where
    FB: Future<Output = Result<Vec<Arc<TemplateFoldabilityItem>>>>,
    FA: Future<Output = Result<Vec<Arc<TemplateFoldabilityItem>>>>,
{
    if let Some(cached) = &cache.template_foldability {
        debug!("template foldability diffs served from cache");
        return Ok(Arc::clone(cached));
    }

    let span = diff_span!("template_foldability_diffs", task = ctx.name);
    async {
        let (before, after) = load_both(ctx, before, after).await?;

        let interval = ctx.config.progress.entity_interval;
        let total = before.len() + after.len();
        let mut progress =
            PairingProgress::new(ctx, "template foldability items", interval, total);
        let same_name: Matcher<Arc<TemplateFoldabilityItem>> = &|_, _| true;
        let diffs = pair_entities(
            &before,
            &after,
            |item| item.template_name.clone(),
            &[same_name],
            &mut progress,
        )?
        .into_iter()
        .map(|(before, after)| TemplateFoldabilityItemDiff::new(before, after).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;
        progress.finish(diffs.len());
        info!(diffs = diffs.len(), "template foldability diffs ready");

        let diffs = Arc::new(diffs);
        cache.template_foldability = Some(Arc::clone(&diffs));
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
    use crate::diff::entity::EntityDiff;

    #[tokio::test]
    async fn test_template_items_pair_by_name() {
        let cancel = CancellationToken::new();
        let config = DiffConfig::default();
        let ctx = TaskContext::new("templates", &cancel, &config);
        let mut cache = DiffSessionCache::new();

        let before = vec![
            Arc::new(TemplateFoldabilityItem::new("std::vector<T>::push_back", 400, 300)),
            Arc::new(TemplateFoldabilityItem::new("Wrapper<T>::get", 40, 20)),
        ];
        let after = vec![
            Arc::new(TemplateFoldabilityItem::new("Holder<T>::set", 60, 30)),
            Arc::new(TemplateFoldabilityItem::new("std::vector<T>::push_back", 200, 100)),
        ];

        let diffs =
            template_foldability_diffs(&mut cache, &ctx, async { Ok(before) }, async { Ok(after) })
                .await
                .unwrap();

        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0].name(), "std::vector<T>::push_back");
        assert_eq!(diffs[0].wasted_size_diff(), -200);
        assert!(diffs[1].after().is_none());
        assert_eq!(diffs[2].name(), "Holder<T>::set");
        assert!(Arc::ptr_eq(cache.template_foldability().unwrap(), &diffs));
    }
}
