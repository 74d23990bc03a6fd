//! Union of two result collections over different parameter values

use crate::error::{CollectionError, Result};
use crate::model::ResultCollection;
use crate::params::ParameterGrid;

/// Combine two collections whose grids differ only in the values of their
/// unpacked parameters.
///
/// The result is laid out over the union grid. Every point takes the entry
/// of whichever input covers it; points covered by both inputs hold the
/// merge of the two entries, and points covered by neither hold an empty
/// accumulator. A last-value metric present at the same point in both
/// inputs cannot be combined.
///
/// # Example
///
/// With `p2 = [1, 2, 3]` in `first` and `p2 = [2, 4, 6]` in `second`, the
/// combined grid has `p2 = [1, 2, 3, 4, 6]` and only the `p2 = 2` entries
/// are merged.
pub fn combine_simulation_results<P: ParameterGrid>(
    first: &ResultCollection<P>,
    second: &ResultCollection<P>,
) -> Result<ResultCollection<P>> {
    let grid = first.parameters().union(second.parameters())?;

    let mut left: Vec<String> = first.names().map(str::to_string).collect();
    let mut right: Vec<String> = second.names().map(str::to_string).collect();
    left.sort();
    right.sort();
    if left != right {
        return Err(CollectionError::MetricNameMismatch { left, right });
    }

    // Position of every union point in each input grid
    let lookups = grid
        .combinations()
        .iter()
        .map(|point| {
            let a = first.parameters().positions_matching(point)?.first().copied();
            let b = second.parameters().positions_matching(point)?.first().copied();
            Ok((a, b))
        })
        .collect::<Result<Vec<(Option<usize>, Option<usize>)>>>()?;

    tracing::debug!(
        points = lookups.len(),
        metrics = first.len(),
        "combining result collections"
    );

    let mut union = ResultCollection::with_parameters(grid);
    for name in first.names() {
        let series1 = first.series(name).unwrap_or_default();
        let series2 = second.series(name).unwrap_or_default();
        warn_if_partial(name, series1.len(), first.parameters().len());
        warn_if_partial(name, series2.len(), second.parameters().len());

        let Some(template) = series1.first().or(series2.first()) else {
            continue;
        };
        for &(i1, i2) in &lookups {
            let a = i1.and_then(|i| series1.get(i));
            let b = i2.and_then(|i| series2.get(i));
            let accumulator = match (a, b) {
                (Some(a), Some(b)) => {
                    let mut merged = a.clone();
                    merged.merge(b)?;
                    merged
                }
                (Some(only), None) | (None, Some(only)) => only.clone(),
                (None, None) => template.empty_like(),
            };
            union.append(accumulator)?;
        }
    }
    Ok(union)
}

fn warn_if_partial(name: &str, len: usize, grid_len: usize) {
    if len < grid_len {
        tracing::warn!(
            metric = name,
            entries = len,
            grid_points = grid_len,
            "partial series, missing points are treated as empty"
        );
    }
}

