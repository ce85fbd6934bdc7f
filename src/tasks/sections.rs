//! Section and COFF group reconciliation.
//!
//! Sections pair by exact name. Each section diff pairs its COFF groups the
//! same way, and the flattened COFF group diffs fill their own cache slot.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::core::section::{BinarySection, CoffGroup};
use crate::diff::entity::{CoffGroupDiff, SectionDiff};
use crate::diff_span;
use crate::error::Result;
use crate::session::cache::{DiffList, DiffSessionCache};
use crate::tasks::{load_both, pair_entities, Matcher, PairingProgress, TaskContext};

/// Section diffs for the session, computed once.
///
/// Also fills the COFF group slot of `cache`.
pub async fn section_diffs<FB, FA>(
    cache: &mut DiffSessionCache,
    ctx: &TaskContext<'_>,
    before: FB,
    after: FA,
) -> Result<DiffList<SectionDiff>>
where
    FB: Future<Output = Result<Vec<Arc<BinarySection>>>>,
    FA: Future<Output = Result<Vec<Arc<BinarySection>>>>,
{
    if let Some(cached) = &cache.sections {
        debug!("section diffs served from cache");
        return Ok(Arc::clone(cached));
    }

    let span = diff_span!("section_diffs", task = ctx.name);
    async {
        let (before, after) = load_both(ctx, before, after).await?;
        let sections = pair_sections(ctx, &before, &after)?;

        let coff_groups: Vec<Arc<CoffGroupDiff>> = sections
            .iter()
            .flat_map(|s| s.coff_group_diffs().iter().cloned())
            .collect();
        info!(
            sections = sections.len(),
            coff_groups = coff_groups.len(),
            "section diffs ready"
        );

        let sections = Arc::new(sections);
        cache.coff_groups.get_or_insert_with(|| Arc::new(coff_groups));
        cache.sections = Some(Arc::clone(&sections));
        Ok(sections)
    }
    .instrument(span)
    .await
}

fn pair_sections(
    ctx: &TaskContext<'_>,
    before: &[Arc<BinarySection>],
    after: &[Arc<BinarySection>],
) -> Result<Vec<Arc<SectionDiff>>> {
    let interval = ctx.config.progress.entity_interval;
    let mut progress = PairingProgress::new(ctx, "sections", interval, before.len() + after.len());
    let same_name: Matcher<Arc<BinarySection>> = &|_, _| true;

    let pairs = pair_entities(before, after, |s| s.name.clone(), &[same_name], &mut progress)?;
    let mut diffs = Vec::with_capacity(pairs.len());
    for (before, after) in pairs {
        let name = before
            .as_ref()
            .or(after.as_ref())
            .map(|s| s.name.clone())
            .unwrap_or_default();

        let no_groups = Vec::new();
        let coff_groups = pair_coff_groups(
            ctx,
            &name,
            before.as_ref().map_or(&no_groups, |s| &s.coff_groups),
            after.as_ref().map_or(&no_groups, |s| &s.coff_groups),
        )?;
        diffs.push(Arc::new(SectionDiff::new(before, after, coff_groups)?));
    }

    progress.finish(diffs.len());
    Ok(diffs)
}

fn pair_coff_groups(
    ctx: &TaskContext<'_>,
    section_name: &str,
    before: &[Arc<CoffGroup>],
    after: &[Arc<CoffGroup>],
) -> Result<Vec<Arc<CoffGroupDiff>>> {
    let interval = ctx.config.progress.entity_interval;
    let total = before.len() + after.len();
    let mut progress = PairingProgress::new(ctx, "COFF groups", interval, total);
    let same_name: Matcher<Arc<CoffGroup>> = &|_, _| true;

    pair_entities(before, after, |g| g.name.clone(), &[same_name], &mut progress)?
        .into_iter()
        .map(|(before, after)| CoffGroupDiff::new(before, after, section_name).map(Arc::new))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::DiffConfig;
    use crate::diff::entity::EntityDiff;

    fn text(size: u32) -> Arc<BinarySection> {
        Arc::new(
            BinarySection::new(".text", 0x1000, size, size)
                .with_coff_group(CoffGroup::new(".text$mn", 0x1000, size - 0x10, size - 0x10))
                .with_coff_group(CoffGroup::new(".text$x", 0x1000 + size - 0x10, 0x10, 0x10)),
        )
    }

    #[tokio::test]
    async fn test_coff_groups_pair_within_sections() {
        let cancel = CancellationToken::new();
        let config = DiffConfig::default();
        let ctx = TaskContext::new("sections", &cancel, &config);
        let mut cache = DiffSessionCache::new();

        let before = vec![text(0x200)];
        let after = vec![Arc::new(
            BinarySection::new(".text", 0x1000, 0x300, 0x300)
                .with_coff_group(CoffGroup::new(".text$mn", 0x1000, 0x2f0, 0x2f0))
                .with_coff_group(CoffGroup::new(".text$di", 0x12f0, 0x10, 0x10)),
        )];

        let sections = section_diffs(&mut cache, &ctx, async { Ok(before) }, async { Ok(after) })
            .await
            .unwrap();
        assert_eq!(sections.len(), 1);

        let groups = sections[0].coff_group_diffs();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].name(), ".text$mn");
        assert_eq!(groups[0].size_diff(), 0x100);
        assert!(groups[1].after().is_none());
        assert!(groups[2].before().is_none());
        assert!(groups.iter().all(|g| g.section_name() == ".text"));

        let slot = cache.coff_groups().unwrap();
        assert_eq!(slot.len(), 3);
        assert!(Arc::ptr_eq(&slot[0], &groups[0]));
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let cancel = CancellationToken::new();
        let config = DiffConfig::default();
        let ctx = TaskContext::new("sections", &cancel, &config);
        let mut cache = DiffSessionCache::new();

        let first = section_diffs(&mut cache, &ctx, async { Ok(vec![text(0x100)]) }, async {
            Ok(vec![text(0x180)])
        })
        .await
        .unwrap();
        // Suppliers of the second call would fail if they were awaited
        let second = section_diffs(
            &mut cache,
            &ctx,
            async { Err(crate::error::DiffError::Source("not again".into())) },
            async { Ok(Vec::new()) },
        )
        .await
        .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
