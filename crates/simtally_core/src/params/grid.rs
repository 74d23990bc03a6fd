//! Fixed + unpacked simulation parameters.
//!
//! A [`SimulationParameters`] holds named parameters. Parameters marked as
//! unpacked span a dimension of the combination grid; every other parameter
//! is held fixed. Grid points are enumerated in row-major order over the
//! unpacked parameters (in insertion order), so the last unpacked parameter
//! varies fastest.

use serde::{Deserialize, Serialize};

use crate::error::GridError;

use super::{FixedParams, ParamValue, ParameterGrid};

/// A named parameter and its values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<ParamValue>,
    /// Whether each value spans its own grid point
    #[serde(default)]
    pub unpacked: bool,
}

impl Parameter {
    fn render(&self) -> String {
        match self.values.as_slice() {
            [single] if !self.unpacked => single.to_string(),
            values => {
                let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
                format!("[{}]", joined.join("_"))
            }
        }
    }
}

/// Parameter set describing the combination grid a result series covers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationParameters {
    parameters: Vec<Parameter>,
}

impl SimulationParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed parameter (builder form of [`insert`](Self::insert))
    #[must_use]
    pub fn with_fixed(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, vec![value.into()]);
        self
    }

    /// Add an unpacked parameter spanning one grid dimension
    #[must_use]
    pub fn with_unpacked<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let name = name.into();
        self.insert(name.clone(), values.into_iter().map(Into::into).collect());
        if let Some(parameter) = self.get_mut(&name) {
            parameter.unpacked = true;
        }
        self
    }

    /// Insert or replace a parameter. A replaced parameter keeps its position
    /// and its unpacked flag.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<ParamValue>) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => existing.values = values,
            None => self.parameters.push(Parameter {
                name,
                values,
                unpacked: false,
            }),
        }
    }

    /// Mark an existing parameter as unpacked
    pub fn set_unpacked(&mut self, name: &str) -> Result<(), GridError> {
        let parameter = self
            .get_mut(name)
            .ok_or_else(|| GridError::UnknownParameter(name.to_string()))?;
        parameter.unpacked = true;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }

    /// All parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    pub fn unpacked(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.unpacked)
    }

    /// Number of values along each unpacked dimension
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.unpacked().map(|p| p.values.len()).collect()
    }

    fn sorted_names(&self, unpacked_only: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .parameters
            .iter()
            .filter(|p| !unpacked_only || p.unpacked)
            .map(|p| p.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Substitute `{name}` placeholders in `template` with parameter values.
    ///
    /// Unpacked (or list-valued) parameters render as `[a_b_c]`. Returns
    /// `None` if the template references a parameter that does not exist.
    #[must_use]
    pub fn render_template(&self, template: &str) -> Option<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let close = open + rest[open..].find('}')?;
            let key = &rest[open + 1..close];
            out.push_str(&rest[..open]);
            out.push_str(&self.get(key)?.render());
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Some(out)
    }
}

/// Grids are equal when they hold the same parameters, irrespective of
/// insertion order.
impl PartialEq for SimulationParameters {
    fn eq(&self, other: &Self) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .all(|p| other.get(&p.name).is_some_and(|o| o == p))
    }
}

impl ParameterGrid for SimulationParameters {
    fn positions_matching(&self, fixed: &FixedParams) -> Result<Vec<usize>, GridError> {
        let dims: Vec<&Parameter> = self.unpacked().collect();

        // Required index along each constrained dimension
        let mut required: Vec<Option<usize>> = vec![None; dims.len()];
        for (name, value) in fixed {
            let dim = dims
                .iter()
                .position(|p| &p.name == name)
                .ok_or_else(|| GridError::NotUnpacked(name.clone()))?;
            match dims[dim].values.iter().position(|v| v == value) {
                Some(index) => required[dim] = Some(index),
                None => return Ok(Vec::new()),
            }
        }

        Ok(GridIndices::new(&self.shape())
            .enumerate()
            .filter(|(_, indices)| {
                indices
                    .iter()
                    .zip(&required)
                    .all(|(idx, req)| req.is_none_or(|r| r == *idx))
            })
            .map(|(position, _)| position)
            .collect())
    }

    fn union(&self, other: &Self) -> Result<Self, GridError> {
        combine_parameters(self, other)
    }

    fn combinations(&self) -> Vec<FixedParams> {
        let dims: Vec<&Parameter> = self.unpacked().collect();
        GridIndices::new(&self.shape())
            .map(|indices| {
                dims.iter()
                    .zip(indices)
                    .map(|(p, i)| (p.name.clone(), p.values[i].clone()))
                    .collect()
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.shape().iter().product()
    }
}

/// Union of two parameter sets that differ only in the values of their
/// unpacked parameters.
///
/// Both sets must hold the same parameter names, unpack the same ones, and
/// agree on every fixed value. Unpacked values are merged, deduplicated and
/// sorted.
pub fn combine_parameters(
    first: &SimulationParameters,
    second: &SimulationParameters,
) -> Result<SimulationParameters, GridError> {
    let (left, right) = (first.sorted_names(false), second.sorted_names(false));
    if left != right {
        return Err(GridError::ParameterNameMismatch { left, right });
    }
    let (left, right) = (first.sorted_names(true), second.sorted_names(true));
    if left != right {
        return Err(GridError::UnpackedMismatch { left, right });
    }

    let mut union = SimulationParameters::new();
    for parameter in first.iter() {
        let theirs = second
            .get(&parameter.name)
            .ok_or_else(|| GridError::UnknownParameter(parameter.name.clone()))?;

        if parameter.unpacked {
            let mut values: Vec<ParamValue> = parameter
                .values
                .iter()
                .chain(&theirs.values)
                .cloned()
                .collect();
            values.sort_by(ParamValue::total_cmp);
            values.dedup();
            union = union.with_unpacked(parameter.name.clone(), values);
        } else if parameter.values == theirs.values {
            union.parameters.push(parameter.clone());
        } else {
            return Err(GridError::FixedValueMismatch(parameter.name.clone()));
        }
    }
    Ok(union)
}

/// Row-major walk over every multi-index of a grid shape
struct GridIndices {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl GridIndices {
    fn new(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            current: vec![0; shape.len()],
            done: shape.contains(&0),
        }
    }
}

impl Iterator for GridIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current.clone();

        // Last dimension varies fastest; a zero-dimensional grid has one point
        self.done = true;
        for i in (0..self.shape.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.shape[i] {
                self.done = false;
                break;
            }
            self.current[i] = 0;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::fixed_params;

    fn grid() -> SimulationParameters {
        SimulationParameters::new()
            .with_fixed("p1", 10)
            .with_unpacked("snr", [0, 5, 10])
            .with_unpacked("modulation", ["bpsk", "qpsk"])
    }

    #[test]
    fn test_len_and_shape() {
        let params = grid();
        assert_eq!(params.shape(), vec![3, 2]);
        assert_eq!(params.len(), 6);

        let trivial = SimulationParameters::new().with_fixed("p1", 1);
        assert_eq!(trivial.len(), 1);
        assert_eq!(trivial.combinations(), vec![FixedParams::new()]);
    }

    #[test]
    fn test_combinations_row_major() {
        let combos = grid().combinations();
        assert_eq!(combos.len(), 6);
        assert_eq!(
            combos[0],
            fixed_params([("snr", ParamValue::from(0)), ("modulation", "bpsk".into())])
        );
        assert_eq!(
            combos[1],
            fixed_params([("snr", ParamValue::from(0)), ("modulation", "qpsk".into())])
        );
        assert_eq!(
            combos[5],
            fixed_params([("snr", ParamValue::from(10)), ("modulation", "qpsk".into())])
        );
    }

    #[test]
    fn test_positions_matching() {
        let params = grid();

        let positions = params
            .positions_matching(&fixed_params([("snr", 5)]))
            .unwrap();
        assert_eq!(positions, vec![2, 3]);

        let positions = params
            .positions_matching(&fixed_params([("modulation", "qpsk")]))
            .unwrap();
        assert_eq!(positions, vec![1, 3, 5]);

        let positions = params
            .positions_matching(&fixed_params([
                ("snr", ParamValue::from(10)),
                ("modulation", "bpsk".into()),
            ]))
            .unwrap();
        assert_eq!(positions, vec![4]);

        let all = params.positions_matching(&FixedParams::new()).unwrap();
        assert_eq!(all, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_positions_matching_absent_value_is_empty() {
        let positions = grid()
            .positions_matching(&fixed_params([("snr", 7)]))
            .unwrap();
        assert!(positions.is_empty());
    }

    #[test]
    fn test_positions_matching_rejects_non_unpacked_key() {
        let params = grid();
        assert_eq!(
            params.positions_matching(&fixed_params([("p1", 10)])),
            Err(GridError::NotUnpacked("p1".to_string()))
        );
        assert_eq!(
            params.positions_matching(&fixed_params([("bogus", 1)])),
            Err(GridError::NotUnpacked("bogus".to_string()))
        );
    }

    #[test]
    fn test_union_merges_sorted_values() {
        let first = SimulationParameters::new()
            .with_fixed("p1", 10)
            .with_unpacked("p2", [1, 2, 3]);
        let second = SimulationParameters::new()
            .with_fixed("p1", 10)
            .with_unpacked("p2", [2, 4, 6]);

        let union = first.union(&second).unwrap();
        let p2 = union.get("p2").unwrap();
        assert!(p2.unpacked);
        assert_eq!(
            p2.values,
            [1, 2, 3, 4, 6].map(ParamValue::from).to_vec()
        );
        assert_eq!(union.get("p1").unwrap().values, vec![ParamValue::Int(10)]);
    }

    #[test]
    fn test_union_mismatches() {
        let base = SimulationParameters::new()
            .with_fixed("p1", 10)
            .with_unpacked("p2", [1, 2]);

        let renamed = SimulationParameters::new()
            .with_fixed("p3", 10)
            .with_unpacked("p2", [1, 2]);
        assert!(matches!(
            base.union(&renamed),
            Err(GridError::ParameterNameMismatch { .. })
        ));

        let repacked = SimulationParameters::new()
            .with_unpacked("p1", [10])
            .with_unpacked("p2", [1, 2]);
        assert!(matches!(
            base.union(&repacked),
            Err(GridError::UnpackedMismatch { .. })
        ));

        let refixed = SimulationParameters::new()
            .with_fixed("p1", 11)
            .with_unpacked("p2", [1, 2]);
        assert_eq!(
            base.union(&refixed),
            Err(GridError::FixedValueMismatch("p1".to_string()))
        );
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = SimulationParameters::new()
            .with_fixed("p1", 1)
            .with_unpacked("p2", [1, 2]);
        let b = SimulationParameters::new()
            .with_unpacked("p2", [1, 2])
            .with_fixed("p1", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_unpacked() {
        let mut params = SimulationParameters::new();
        params.insert("snr", vec![0.into(), 3.into()]);
        assert_eq!(params.len(), 1);

        params.set_unpacked("snr").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(
            params.set_unpacked("missing"),
            Err(GridError::UnknownParameter("missing".to_string()))
        );
    }

    #[test]
    fn test_render_template() {
        let params = grid();
        assert_eq!(
            params.render_template("ber_p1_{p1}_snr_{snr}").as_deref(),
            Some("ber_p1_10_snr_[0_5_10]")
        );
        assert_eq!(params.render_template("plain").as_deref(), Some("plain"));
        assert_eq!(params.render_template("{nope}"), None);
    }
}
