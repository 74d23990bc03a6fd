//! Monte Carlo result accumulation
//!
//! This crate accumulates the outcomes of repeated simulation runs into
//! compact per-metric statistics and merges partial results produced by
//! independent workers or by runs over different parameter values.
//! It provides:
//! - Metric accumulators of four kinds (additive, ratio, last value, categorical)
//! - Mean, variance and confidence intervals from accumulated moments
//! - Named result series laid out over a grid of parameter combinations
//! - Rep-wise merging of partial results and union of result grids
//! - A plain dictionary form for JSON and YAML persistence
//!
//! # Example
//!
//! ```
//! use simtally_core::{MetricAccumulator, MetricKind, ResultCollection, SimulationParameters};
//!
//! let mut ber = MetricAccumulator::ratio("ber");
//! ber.update(4.0, Some(10.0))?;
//! ber.update(3.0, Some(4.0))?;
//!
//! let mut results = ResultCollection::with_parameters(
//!     SimulationParameters::new().with_fixed("snr", 10),
//! );
//! results.add(ber);
//! results.add_new("errors", MetricKind::Additive, 7.0, None)?;
//!
//! let values = results.get_values("ber", None)?;
//! assert_eq!(values[0].as_ref().and_then(|v| v.as_scalar()), Some(0.5));
//! # Ok::<(), simtally_core::CollectionError>(())
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod combine;
pub mod error;
pub mod model;
pub mod params;
pub mod reduce;
pub mod stats;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use combine::combine_simulation_results;
pub use error::{CollectionError, GridError, MetricError, RecordError, StatsError};
pub use model::{
    CollectionRecord, MetricAccumulator, MetricKind, MetricRecord, ResultCollection, ResultValue,
};
pub use params::{FixedParams, ParamValue, ParameterGrid, SimulationParameters, fixed_params};
pub use reduce::reduce_partials;
pub use stats::ConfidenceInterval;
