//! Reconciliation tasks: pairing before and after entity lists into diffs.
//!
//! Every task follows the same shape. Both suppliers are awaited together
//! and raced against cancellation, the lists are paired by
//! [`pair_entities`], and the resulting diff list is memoized in its
//! [`DiffSessionCache`](crate::session::DiffSessionCache) slot so a second
//! call returns the same `Arc`.

pub mod duplicate_data;
pub mod libraries;
pub mod sections;
pub mod symbols;
pub mod template_foldability;

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use tracing::debug;

use crate::cancel::{with_cancellation, CancellationToken};
use crate::config::DiffConfig;
use crate::error::Result;

/// Coarse progress of a running task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub message: String,
    pub items_complete: u64,
    pub items_total: Option<u64>,
}

/// Receives progress reports. Reporting never affects results.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: TaskProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(TaskProgress) + Send + Sync,
{
    fn report(&self, progress: TaskProgress) {
        self(progress)
    }
}

/// Everything a task needs besides the cache and its suppliers.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    pub name: &'a str,
    pub cancel: &'a CancellationToken,
    pub config: &'a DiffConfig,
    pub progress: Option<&'a dyn ProgressSink>,
}

impl<'a> TaskContext<'a> {
    pub fn new(name: &'a str, cancel: &'a CancellationToken, config: &'a DiffConfig) -> Self {
        Self {
            name,
            cancel,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub(crate) fn report(&self, message: String, items_complete: u64, items_total: Option<u64>) {
        if let Some(sink) = self.progress {
            sink.report(TaskProgress {
                message,
                items_complete,
                items_total,
            });
        }
    }
}

/// Await the before and after suppliers together, unless cancelled.
pub(crate) async fn load_both<TB, TA, FB, FA>(
    ctx: &TaskContext<'_>,
    before: FB,
    after: FA,
) -> Result<(TB, TA)>
where
    FB: Future<Output = Result<TB>>,
    FA: Future<Output = Result<TA>>,
{
    ctx.report(format!("{}: loading 'before' and 'after'", ctx.name), 0, None);
    with_cancellation(ctx.cancel, ctx.name, async { tokio::try_join!(before, after) }).await
}

/// Per-iteration cancellation and progress for pairing loops.
pub(crate) struct PairingProgress<'a> {
    ctx: &'a TaskContext<'a>,
    what: &'a str,
    interval: usize,
    total: usize,
    processed: usize,
}

impl<'a> PairingProgress<'a> {
    pub(crate) fn new(
        ctx: &'a TaskContext<'a>,
        what: &'a str,
        interval: usize,
        total: usize,
    ) -> Self {
        Self {
            ctx,
            what,
            interval: interval.max(1),
            total,
            processed: 0,
        }
    }

    /// Called once per entity: fails fast on cancellation and reports
    /// progress every `interval` entities.
    pub(crate) fn step(&mut self) -> Result<()> {
        self.ctx.cancel.check()?;
        self.processed += 1;
        if self.processed % self.interval == 0 {
            self.ctx.report(
                format!("Paired {}/{} {}", self.processed, self.total, self.what),
                self.processed as u64,
                Some(self.total as u64),
            );
        }
        Ok(())
    }

    pub(crate) fn finish(&self, diffs: usize) {
        self.ctx.report(
            format!("Paired {} {} into {} diffs", self.total, self.what, diffs),
            self.total as u64,
            Some(self.total as u64),
        );
        debug!(task = self.ctx.name, entities = self.total, diffs, "pairing finished");
    }
}

/// Decides whether two entities of the same bucket are the same thing.
pub(crate) type Matcher<'m, T> = &'m dyn Fn(&T, &T) -> bool;

/// Pair two entity lists.
///
/// Entities are only compared within the same bucket. For each before entity
/// the matchers are tried in order against the still-unmatched after
/// entities; the first hit is taken and removed. Output lists every before
/// entity in order, then every unmatched after entity in after order.
pub(crate) fn pair_entities<T, K>(
    before: &[T],
    after: &[T],
    bucket: impl Fn(&T) -> K,
    matchers: &[Matcher<'_, T>],
    progress: &mut PairingProgress<'_>,
) -> Result<Vec<(Option<T>, Option<T>)>>
where
    T: Clone,
    K: Eq + Hash,
{
    let mut buckets: HashMap<K, Vec<usize>> = HashMap::new();
    for (idx, entity) in after.iter().enumerate() {
        buckets.entry(bucket(entity)).or_default().push(idx);
    }

    let mut matched = vec![false; after.len()];
    let mut pairs = Vec::with_capacity(before.len() + after.len());

    for entity in before {
        progress.step()?;

        let found = buckets.get_mut(&bucket(entity)).and_then(|candidates| {
            matchers.iter().find_map(|matches| {
                candidates
                    .iter()
                    .position(|&idx| matches(entity, &after[idx]))
                    .map(|pos| candidates.remove(pos))
            })
        });

        if let Some(idx) = found {
            matched[idx] = true;
        }
        pairs.push((Some(entity.clone()), found.map(|idx| after[idx].clone())));
    }

    for (idx, entity) in after.iter().enumerate() {
        if !matched[idx] {
            progress.step()?;
            pairs.push((None, Some(entity.clone())));
        }
    }

    Ok(pairs)
}
