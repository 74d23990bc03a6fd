//! Parameter grids.
//!
//! Result series are laid out over a flattened grid of parameter
//! combinations. The accumulation engine only needs two things from a grid:
//! the positions matching a set of fixed values, and the union of two grids.
//! Both are expressed by the [`ParameterGrid`] trait; [`SimulationParameters`]
//! is the stock implementation.

mod grid;
mod value;

use std::collections::BTreeMap;

use crate::error::GridError;

pub use grid::{Parameter, SimulationParameters, combine_parameters};
pub use value::ParamValue;

/// Parameter name to value, used both to filter grid points and to describe
/// a single point.
pub type FixedParams = BTreeMap<String, ParamValue>;

/// Build a [`FixedParams`] from `(name, value)` pairs
pub fn fixed_params<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> FixedParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A flattened grid of parameter combinations
pub trait ParameterGrid: Clone + Default {
    /// Positions of the grid points whose unpacked values match `fixed`.
    ///
    /// Fails if a key is not an unpacked dimension of the grid. A value that
    /// does not occur along its dimension yields no positions.
    fn positions_matching(&self, fixed: &FixedParams) -> Result<Vec<usize>, GridError>;

    /// Grid covering the points of both `self` and `other`
    fn union(&self, other: &Self) -> Result<Self, GridError>;

    /// The unpacked values of every grid point, in grid order
    fn combinations(&self) -> Vec<FixedParams>;

    /// Number of grid points
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
