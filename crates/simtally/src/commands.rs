//! Subcommand implementations.
//!
//! Each command writes its report to the given writer so it can be driven
//! from tests as well as from `main`.

use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;
use simtally_core::{
    FixedParams, ParamValue, ParameterGrid, ResultCollection, combine_simulation_results,
    reduce_partials,
};

use crate::storage::{self, StorageFormat};

/// Parse a `name=value` filter for a grid parameter
pub fn parse_fixed(s: &str) -> Result<(String, ParamValue), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{s}'"));
    }
    let value = value.parse().map_err(|e| format!("{e:?}"))?;
    Ok((name.to_string(), value))
}

fn load(path: &Path, format: Option<StorageFormat>) -> color_eyre::Result<ResultCollection> {
    storage::load(path, format).wrap_err_with(|| format!("loading {}", path.display()))
}

fn save(
    out: &mut impl Write,
    collection: &mut ResultCollection,
    output: &Path,
    format: Option<StorageFormat>,
) -> color_eyre::Result<PathBuf> {
    let path = storage::save(collection, output, format)
        .wrap_err_with(|| format!("saving {}", output.display()))?;
    writeln!(out, "wrote {}", path.display())?;
    Ok(path)
}

/// Print the grid and every metric series of a results file
pub fn inspect(
    out: &mut impl Write,
    input: &Path,
    format: Option<StorageFormat>,
) -> color_eyre::Result<()> {
    let collection = load(input, format)?;
    writeln!(out, "{collection}")?;
    if let Some(origin) = &collection.origin_filename {
        writeln!(out, "origin: {origin}")?;
    }
    if let Some(elapsed) = collection.elapsed {
        writeln!(out, "elapsed: {:.3}s", elapsed.as_secs_f64())?;
    }

    writeln!(out, "parameters ({} grid points):", collection.parameters().len())?;
    for parameter in collection.parameters().iter() {
        let values: Vec<String> = parameter.values.iter().map(ToString::to_string).collect();
        let marker = if parameter.unpacked { " (unpacked)" } else { "" };
        writeln!(out, "  {} = [{}]{marker}", parameter.name, values.join(", "))?;
    }

    writeln!(out, "metrics:")?;
    for (name, series) in collection.iter() {
        let kind = series.first().map(|acc| acc.kind().label()).unwrap_or("-");
        writeln!(out, "  {name} {kind} x{}", series.len())?;
        for (position, acc) in series.iter().enumerate() {
            writeln!(out, "    [{position}] {acc} (updates: {})", acc.update_count())?;
        }
    }
    Ok(())
}

/// Print the values and confidence intervals of one metric, optionally
/// restricted to the grid points matching `fixed`
pub fn values(
    out: &mut impl Write,
    input: &Path,
    metric: &str,
    fixed: &FixedParams,
    confidence: f64,
    format: Option<StorageFormat>,
) -> color_eyre::Result<()> {
    let collection = load(input, format)?;
    let fixed = (!fixed.is_empty()).then_some(fixed);
    let positions = collection
        .positions(metric, fixed)
        .wrap_err_with(|| format!("querying {}", input.display()))?;
    let results = collection.get_values(metric, fixed)?;
    let intervals = match collection.get_confidence_intervals(metric, confidence, fixed) {
        Ok(intervals) => Some(intervals),
        Err(e) => {
            tracing::debug!(metric, error = %e, "reporting values without intervals");
            None
        }
    };

    let combinations = collection.parameters().combinations();
    for (i, (position, result)) in positions.iter().zip(&results).enumerate() {
        let label = combinations
            .get(*position)
            .map(|point| {
                point
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_else(|| format!("#{position}"));
        let value = result
            .as_ref()
            .map_or_else(|| "no data".to_string(), ToString::to_string);
        match intervals.as_ref().and_then(|all| all.get(i)) {
            Some(ci) => writeln!(
                out,
                "{label}\t{value}\t[{:.6}, {:.6}] @ {confidence}%",
                ci.lower, ci.upper
            )?,
            None => writeln!(out, "{label}\t{value}")?,
        }
    }
    Ok(())
}

/// Reduce partial results of the same grid into one file
pub fn merge(
    out: &mut impl Write,
    inputs: &[PathBuf],
    output: &Path,
    format: Option<StorageFormat>,
) -> color_eyre::Result<()> {
    let partials = inputs
        .iter()
        .map(|path| load(path, None))
        .collect::<color_eyre::Result<Vec<_>>>()?;
    tracing::info!(partials = partials.len(), "merging partial results");

    let mut merged = reduce_partials(partials)?;
    save(out, &mut merged, output, format)?;
    Ok(())
}

/// Union two result files computed over different parameter values
pub fn combine(
    out: &mut impl Write,
    first: &Path,
    second: &Path,
    output: &Path,
    format: Option<StorageFormat>,
) -> color_eyre::Result<()> {
    let (a, b) = (load(first, None)?, load(second, None)?);
    let mut union = combine_simulation_results(&a, &b).wrap_err_with(|| {
        format!("combining {} with {}", first.display(), second.display())
    })?;
    tracing::info!(points = union.parameters().len(), "combined result grids");
    save(out, &mut union, output, format)?;
    Ok(())
}

/// Re-encode a results file
pub fn convert(
    out: &mut impl Write,
    input: &Path,
    output: &Path,
    format: Option<StorageFormat>,
) -> color_eyre::Result<()> {
    let mut collection = load(input, None)?;
    save(out, &mut collection, output, format)?;
    Ok(())
}
