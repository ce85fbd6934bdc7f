//! Library and compiland reconciliation.
//!
//! Libraries are bucketed by lowercased filename. Within a bucket an exact
//! (case-insensitive) path match wins; otherwise the first path that is very
//! similar is taken, which pairs libraries that moved between build
//! directories.
//!
//! Each library and compiland diff also pairs its section and COFF group
//! contributions by exact section or group name.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::core::contribution::Contribution;
use crate::core::library::{Compiland, Library};
use crate::diff::entity::{
    CompilandDiff, ContributionDiff, ContributionDiffs, ContributionKind, LibraryDiff,
};
use crate::diff_span;
use crate::error::Result;
use crate::session::cache::{DiffList, DiffSessionCache};
use crate::similarity::PathSimilarity;
use crate::tasks::{load_both, pair_entities, Matcher, PairingProgress, TaskContext};

/// Library diffs for the session, computed once.
///
/// Also fills the compiland slot of `cache`.
pub async fn library_diffs<FB, FA>(
    cache: &mut DiffSessionCache,
    ctx: &TaskContext<'_>,
    before: FB,
    after: FA,
) -> Result<DiffList<LibraryDiff>>
where
    FB: Future<Output = Result<Vec<Arc<Library>>>>,
    FA: Future<Output = Result<Vec<Arc<Library>>>>,
{
    if let Some(cached) = &cache.libraries {
        debug!("library diffs served from cache");
        return Ok(Arc::clone(cached));
    }

    let span = diff_span!("library_diffs", task = ctx.name);
    async {
        let (before, after) = load_both(ctx, before, after).await?;
        let similarity = PathSimilarity::new(ctx.config.path_similarity.clone());
        let libraries = pair_libraries(ctx, &similarity, &before, &after)?;

        let compilands: Vec<Arc<CompilandDiff>> = libraries
            .iter()
            .flat_map(|l| l.compiland_diffs().iter().cloned())
            .collect();
        info!(
            libraries = libraries.len(),
            compilands = compilands.len(),
            "library diffs ready"
        );

        let libraries = Arc::new(libraries);
        cache.compilands.get_or_insert_with(|| Arc::new(compilands));
        cache.libraries = Some(Arc::clone(&libraries));
        Ok(libraries)
    }
    .instrument(span)
    .await
}

fn pair_libraries(
    ctx: &TaskContext<'_>,
    similarity: &PathSimilarity,
    before: &[Arc<Library>],
    after: &[Arc<Library>],
) -> Result<Vec<Arc<LibraryDiff>>> {
    let interval = ctx.config.progress.entity_interval;
    let mut progress = PairingProgress::new(ctx, "libraries", interval, before.len() + after.len());
    let exact: Matcher<Arc<Library>> = &|b, a| b.name.eq_ignore_ascii_case(&a.name);
    let similar: Matcher<Arc<Library>> = &|b, a| similarity.are_very_similar(&b.name, &a.name);

    let pairs = pair_entities(
        before,
        after,
        |l| l.short_name().to_lowercase(),
        &[exact, similar],
        &mut progress,
    )?;

    let mut diffs = Vec::with_capacity(pairs.len());
    for (before, after) in pairs {
        let name = before
            .as_ref()
            .or(after.as_ref())
            .map(|l| l.name.clone())
            .unwrap_or_default();

        let no_compilands = Vec::new();
        let compilands = pair_compilands(
            ctx,
            similarity,
            &name,
            before.as_ref().map_or(&no_compilands, |l| &l.compilands),
            after.as_ref().map_or(&no_compilands, |l| &l.compilands),
        )?;
        let contributions = pair_all_contributions(
            ctx,
            &name,
            before.as_deref().map(|l| (&l.section_contributions, &l.coff_group_contributions)),
            after.as_deref().map(|l| (&l.section_contributions, &l.coff_group_contributions)),
        )?;
        let diff = LibraryDiff::new(before, after, compilands)?.with_contributions(contributions);
        diffs.push(Arc::new(diff));
    }

    progress.finish(diffs.len());
    Ok(diffs)
}

fn pair_compilands(
    ctx: &TaskContext<'_>,
    similarity: &PathSimilarity,
    library_name: &str,
    before: &[Arc<Compiland>],
    after: &[Arc<Compiland>],
) -> Result<Vec<Arc<CompilandDiff>>> {
    let interval = ctx.config.progress.entity_interval;
    let total = before.len() + after.len();
    let mut progress = PairingProgress::new(ctx, "compilands", interval, total);
    let exact: Matcher<Arc<Compiland>> = &|b, a| b.name.eq_ignore_ascii_case(&a.name);
    let similar: Matcher<Arc<Compiland>> = &|b, a| similarity.are_very_similar(&b.name, &a.name);

    let pairs = pair_entities(
        before,
        after,
        |c| c.short_name().to_lowercase(),
        &[exact, similar],
        &mut progress,
    )?;

    let mut diffs = Vec::with_capacity(pairs.len());
    for (before, after) in pairs {
        let name = before
            .as_ref()
            .or(after.as_ref())
            .map(|c| c.name.as_str())
            .unwrap_or_default();
        let contributions = pair_all_contributions(
            ctx,
            &format!("{library_name}:{name}"),
            before.as_deref().map(|c| (&c.section_contributions, &c.coff_group_contributions)),
            after.as_deref().map(|c| (&c.section_contributions, &c.coff_group_contributions)),
        )?;
        let diff =
            CompilandDiff::new(before, after, library_name)?.with_contributions(contributions);
        diffs.push(Arc::new(diff));
    }
    Ok(diffs)
}

/// Section and COFF group contributions of one side of a library or
/// compiland pairing.
type ContributionLists<'a> = (&'a Vec<Arc<Contribution>>, &'a Vec<Arc<Contribution>>);

fn pair_all_contributions(
    ctx: &TaskContext<'_>,
    owner: &str,
    before: Option<ContributionLists<'_>>,
    after: Option<ContributionLists<'_>>,
) -> Result<ContributionDiffs> {
    let none = Vec::new();
    let sections = pair_contributions(
        ctx,
        owner,
        ContributionKind::Section,
        before.map_or(&none, |(s, _)| s),
        after.map_or(&none, |(s, _)| s),
    )?;
    let coff_groups = pair_contributions(
        ctx,
        owner,
        ContributionKind::CoffGroup,
        before.map_or(&none, |(_, g)| g),
        after.map_or(&none, |(_, g)| g),
    )?;
    Ok(ContributionDiffs {
        sections,
        coff_groups,
    })
}

fn pair_contributions(
    ctx: &TaskContext<'_>,
    owner: &str,
    kind: ContributionKind,
    before: &[Arc<Contribution>],
    after: &[Arc<Contribution>],
) -> Result<Vec<Arc<ContributionDiff>>> {
    let interval = ctx.config.progress.entity_interval;
    let total = before.len() + after.len();
    let mut progress = PairingProgress::new(ctx, "contributions", interval, total);
    let same_name: Matcher<Arc<Contribution>> = &|_, _| true;

    pair_entities(before, after, |c| c.name.clone(), &[same_name], &mut progress)?
        .into_iter()
        .map(|(before, after)| ContributionDiff::new(before, after, kind, owner).map(Arc::new))
        .collect()
}
