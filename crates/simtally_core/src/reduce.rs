//! Reduction of per-worker partial results.
//!
//! Each worker runs a share of the repetitions for the same grid and
//! returns its own collection; the partials are folded together with
//! [`ResultCollection::merge_all`]. With the `parallel` feature the fold
//! runs as a rayon tree reduction.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Result;
use crate::model::ResultCollection;
use crate::params::ParameterGrid;

/// Merge independent partial results for the same grid into one collection.
///
/// Repetition counts are summed and the grid of the first partial is kept.
/// Empty partials contribute only their repetition count.
pub fn reduce_partials<P>(partials: Vec<ResultCollection<P>>) -> Result<ResultCollection<P>>
where
    P: ParameterGrid + Send,
{
    let Some(parameters) = partials.first().map(|p| p.parameters().clone()) else {
        return Ok(ResultCollection::default());
    };
    tracing::debug!(partials = partials.len(), "reducing partial results");

    #[cfg(feature = "parallel")]
    let mut reduced = partials
        .into_par_iter()
        .map(Ok::<_, crate::error::CollectionError>)
        .try_reduce(ResultCollection::default, merge_partial)?;

    #[cfg(not(feature = "parallel"))]
    let mut reduced = partials
        .into_iter()
        .try_fold(ResultCollection::default(), merge_partial)?;

    reduced.set_parameters(parameters);
    Ok(reduced)
}

fn merge_partial<P: ParameterGrid>(
    mut acc: ResultCollection<P>,
    next: ResultCollection<P>,
) -> Result<ResultCollection<P>> {
    let repetition_count = match (acc.repetition_count, next.repetition_count) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    };
    let elapsed = acc.elapsed.max(next.elapsed);

    let mut merged = if next.is_empty() {
        acc
    } else if acc.is_empty() {
        next
    } else {
        acc.merge_all(&next)?;
        acc
    };
    merged.repetition_count = repetition_count;
    merged.elapsed = elapsed;
    Ok(merged)
}
