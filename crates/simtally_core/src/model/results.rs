use std::fmt;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CollectionError, MetricError, Result};
use crate::params::{FixedParams, ParameterGrid, SimulationParameters};
use crate::stats::ConfidenceInterval;

use super::metric::{MetricAccumulator, MetricKind, ResultValue};

/// Counter of repetitions skipped by the runner. It may be absent on either
/// side of a rep-wise merge.
pub const SKIPPED_REPS_METRIC: &str = "num_skipped_reps";

/// Wall-clock diagnostic that never takes part in collection equality
pub const ELAPSED_TIME_METRIC: &str = "elapsed_time";

/// Accumulators of one metric, indexed by grid position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MetricSeries {
    name: String,
    accumulators: Vec<MetricAccumulator>,
}

/// Named result series laid out over a parameter grid.
///
/// Series keep the order in which their names were first added. Each entry
/// of a series corresponds to one grid position; partially filled series
/// are valid while a sweep is still running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    from = "Snapshot<P>",
    into = "Snapshot<P>",
    bound(
        serialize = "P: ParameterGrid + Serialize",
        deserialize = "P: ParameterGrid + Deserialize<'de>"
    )
)]
pub struct ResultCollection<P = SimulationParameters> {
    parameters: P,
    series: Vec<MetricSeries>,
    index: FxHashMap<String, usize>,
    /// Number of repetitions that produced these results
    pub repetition_count: Option<u64>,
    /// File name template this collection was saved under
    pub origin_filename: Option<String>,
    pub elapsed: Option<Duration>,
}

/// Serialized layout; the name index is rebuilt on load
#[derive(Serialize, Deserialize)]
struct Snapshot<P> {
    parameters: P,
    series: Vec<MetricSeries>,
    repetition_count: Option<u64>,
    origin_filename: Option<String>,
    elapsed: Option<Duration>,
}

impl<P: ParameterGrid> From<ResultCollection<P>> for Snapshot<P> {
    fn from(collection: ResultCollection<P>) -> Self {
        Self {
            parameters: collection.parameters,
            series: collection.series,
            repetition_count: collection.repetition_count,
            origin_filename: collection.origin_filename,
            elapsed: collection.elapsed,
        }
    }
}

impl<P: ParameterGrid> From<Snapshot<P>> for ResultCollection<P> {
    fn from(snapshot: Snapshot<P>) -> Self {
        let index = snapshot
            .series
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        Self {
            parameters: snapshot.parameters,
            series: snapshot.series,
            index,
            repetition_count: snapshot.repetition_count,
            origin_filename: snapshot.origin_filename,
            elapsed: snapshot.elapsed,
        }
    }
}

impl<P: ParameterGrid> Default for ResultCollection<P> {
    fn default() -> Self {
        Self::with_parameters(P::default())
    }
}

impl<P: ParameterGrid> ResultCollection<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parameters(parameters: P) -> Self {
        Self {
            parameters,
            series: Vec::new(),
            index: FxHashMap::default(),
            repetition_count: None,
            origin_filename: None,
            elapsed: None,
        }
    }

    #[must_use]
    pub fn parameters(&self) -> &P {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: P) {
        self.parameters = parameters;
    }

    // === Insertion ===

    /// Make `accumulator` the only entry for its name.
    ///
    /// An existing series of that name is replaced in place.
    pub fn add(&mut self, accumulator: MetricAccumulator) {
        match self.index.get(accumulator.name()) {
            Some(&i) => self.series[i].accumulators = vec![accumulator],
            None => self.push_series(accumulator),
        }
    }

    /// Create an accumulator from one update and [`add`](Self::add) it
    pub fn add_new(
        &mut self,
        name: impl Into<String>,
        kind: MetricKind,
        value: f64,
        total: Option<f64>,
    ) -> Result<()> {
        self.add(MetricAccumulator::create(name, kind, value, total, false)?);
        Ok(())
    }

    /// Append `accumulator` to the series of its name, starting the series
    /// if it does not exist yet
    pub fn append(&mut self, accumulator: MetricAccumulator) -> Result<()> {
        let Some(&i) = self.index.get(accumulator.name()) else {
            self.push_series(accumulator);
            return Ok(());
        };
        let series = &mut self.series[i];
        if let Some(existing) = series.accumulators.first()
            && existing.kind() != accumulator.kind()
        {
            return Err(MetricError::KindMismatch {
                name: series.name.clone(),
                left: existing.kind(),
                right: accumulator.kind(),
            }
            .into());
        }
        series.accumulators.push(accumulator);
        Ok(())
    }

    /// Append every accumulator of `other`, series by series.
    ///
    /// Kinds are checked for all series before anything is appended.
    pub fn append_all(&mut self, other: &Self) -> Result<()> {
        for theirs in &other.series {
            let ours = self.kind_of(&theirs.name);
            let (Some(ours), Some(first)) = (ours, theirs.accumulators.first()) else {
                continue;
            };
            if ours != first.kind() {
                return Err(MetricError::KindMismatch {
                    name: theirs.name.clone(),
                    left: ours,
                    right: first.kind(),
                }
                .into());
            }
        }
        for theirs in &other.series {
            for accumulator in &theirs.accumulators {
                self.append(accumulator.clone())?;
            }
        }
        Ok(())
    }

    /// Merge the results of another run over the same grid into `self`.
    ///
    /// An empty collection takes a copy of `other`. Otherwise the last entry
    /// of every series of `self` absorbs the last entry of the same series
    /// in `other`; only the last entries are merged, so this is meant for
    /// collections holding one entry per series. The skipped-repetitions
    /// counter may be missing from either side. Every pair is validated
    /// before any entry is modified.
    pub fn merge_all(&mut self, other: &Self) -> Result<()> {
        if self.is_empty() {
            for theirs in &other.series {
                for accumulator in &theirs.accumulators {
                    self.append(accumulator.clone())?;
                }
            }
            return Ok(());
        }

        tracing::debug!(
            metrics = self.len(),
            other_metrics = other.len(),
            "merging repetitions"
        );
        let skipped = other.last(SKIPPED_REPS_METRIC);
        let mut pairs = Vec::with_capacity(self.series.len());
        for (i, ours) in self.series.iter().enumerate() {
            if ours.name == SKIPPED_REPS_METRIC {
                continue;
            }
            let theirs = other
                .last(&ours.name)
                .ok_or_else(|| CollectionError::MissingMetric(ours.name.clone()))?;
            if let Some(last) = ours.accumulators.last() {
                last.check_mergeable(theirs)?;
                pairs.push((i, theirs));
            }
        }
        if let (Some(theirs), Some(ours)) = (skipped, self.last(SKIPPED_REPS_METRIC)) {
            ours.check_mergeable(theirs)?;
        }

        for (i, theirs) in pairs {
            if let Some(last) = self.series[i].accumulators.last_mut() {
                last.merge(theirs)?;
            }
        }
        if let Some(theirs) = skipped {
            if !self.contains(SKIPPED_REPS_METRIC) {
                tracing::debug!("starting skipped repetitions counter");
                self.add(theirs.empty_like());
            }
            if let Some(ours) = self.last_mut(SKIPPED_REPS_METRIC) {
                ours.merge(theirs)?;
            }
        }
        Ok(())
    }

    fn push_series(&mut self, accumulator: MetricAccumulator) {
        let name = accumulator.name().to_string();
        self.index.insert(name.clone(), self.series.len());
        self.series.push(MetricSeries {
            name,
            accumulators: vec![accumulator],
        });
    }

    fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.series(name)?.first().map(MetricAccumulator::kind)
    }

    // === Lookup ===

    /// Metric names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.name.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn series(&self, name: &str) -> Option<&[MetricAccumulator]> {
        self.index
            .get(name)
            .map(|&i| self.series[i].accumulators.as_slice())
    }

    #[must_use]
    pub fn last(&self, name: &str) -> Option<&MetricAccumulator> {
        self.series(name)?.last()
    }

    pub fn last_mut(&mut self, name: &str) -> Option<&mut MetricAccumulator> {
        let &i = self.index.get(name)?;
        self.series[i].accumulators.last_mut()
    }

    /// `(name, series)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MetricAccumulator])> {
        self.series
            .iter()
            .map(|s| (s.name.as_str(), s.accumulators.as_slice()))
    }

    /// Number of metric names
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    // === Queries ===

    /// Grid positions selected by `fixed` (every position when `None`) that
    /// the series of `name` already holds an entry for, in grid order.
    pub fn positions(&self, name: &str, fixed: Option<&FixedParams>) -> Result<Vec<usize>> {
        let available = self
            .series(name)
            .ok_or_else(|| CollectionError::UnknownMetric(name.to_string()))?
            .len();
        let Some(fixed) = fixed else {
            return Ok((0..available).collect());
        };

        let matched = self.parameters.positions_matching(fixed)?;
        let positions: Vec<usize> = matched.iter().copied().filter(|&p| p < available).collect();
        if positions.len() < matched.len() {
            tracing::warn!(
                metric = name,
                matched = matched.len(),
                available = positions.len(),
                "series shorter than the grid, skipping missing positions"
            );
        }
        Ok(positions)
    }

    fn selected<'a>(
        &'a self,
        name: &str,
        fixed: Option<&FixedParams>,
    ) -> Result<Vec<&'a MetricAccumulator>> {
        let positions = self.positions(name, fixed)?;
        let series = self.series(name).unwrap_or_default();
        Ok(positions.into_iter().filter_map(|p| series.get(p)).collect())
    }

    /// Results of a metric at every grid position, or only at the positions
    /// matching `fixed`. Entries without data are `None`.
    pub fn get_values(
        &self,
        name: &str,
        fixed: Option<&FixedParams>,
    ) -> Result<Vec<Option<ResultValue>>> {
        Ok(self
            .selected(name, fixed)?
            .into_iter()
            .map(MetricAccumulator::get_result)
            .collect())
    }

    /// Confidence intervals of a metric, selected like
    /// [`get_values`](Self::get_values)
    pub fn get_confidence_intervals(
        &self,
        name: &str,
        confidence_percent: f64,
        fixed: Option<&FixedParams>,
    ) -> Result<Vec<ConfidenceInterval>> {
        self.selected(name, fixed)?
            .into_iter()
            .map(|acc| {
                acc.get_confidence_interval(confidence_percent)
                    .map_err(CollectionError::from)
            })
            .collect()
    }
}

impl ResultCollection<SimulationParameters> {
    /// Expand `{param}` placeholders of a file name template.
    ///
    /// A template naming an unknown parameter is returned unchanged.
    #[must_use]
    pub fn filename_with_params(&self, template: &str) -> String {
        self.parameters
            .render_template(template)
            .unwrap_or_else(|| template.to_string())
    }
}

/// Collections compare grids, repetition counts and series. The origin
/// file name, elapsed time and the elapsed-time metric are ignored.
impl<P: ParameterGrid + PartialEq> PartialEq for ResultCollection<P> {
    fn eq(&self, other: &Self) -> bool {
        if self.parameters != other.parameters || self.repetition_count != other.repetition_count {
            return false;
        }
        let compared = |c: &Self| c.names().filter(|n| *n != ELAPSED_TIME_METRIC).count();
        compared(self) == compared(other)
            && self
                .iter()
                .filter(|(name, _)| *name != ELAPSED_TIME_METRIC)
                .all(|(name, series)| other.series(name) == Some(series))
    }
}

impl<P: ParameterGrid> fmt::Display for ResultCollection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultCollection: {} metrics", self.len())?;
        if let Some(reps) = self.repetition_count {
            write!(f, ", {reps} repetitions")?;
        }
        for (name, series) in self.iter() {
            write!(f, "\n  {name} ({} entries)", series.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_replaces_in_place() {
        let mut collection = ResultCollection::<SimulationParameters>::new();
        collection.add(MetricAccumulator::additive("a"));
        collection.add(MetricAccumulator::ratio("b"));
        collection
            .append(MetricAccumulator::additive("a"))
            .unwrap();
        assert_eq!(collection.series("a").unwrap().len(), 2);

        collection.add(MetricAccumulator::additive("a"));
        assert_eq!(collection.series("a").unwrap().len(), 1);
        assert_eq!(collection.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_snapshot_rebuilds_index() {
        let mut collection = ResultCollection::<SimulationParameters>::new();
        collection.add_new("errors", MetricKind::Additive, 2.0, None).unwrap();
        collection.add_new("ber", MetricKind::Ratio, 1.0, Some(8.0)).unwrap();

        let snapshot: Snapshot<SimulationParameters> = collection.clone().into();
        let rebuilt = ResultCollection::from(snapshot);
        assert!(rebuilt.contains("ber"));
        assert_eq!(rebuilt.names().collect::<Vec<_>>(), vec!["errors", "ber"]);
        assert_eq!(rebuilt, collection);
    }

    #[test]
    fn test_display() {
        let mut collection = ResultCollection::<SimulationParameters>::new();
        collection.add_new("errors", MetricKind::Additive, 2.0, None).unwrap();
        collection.repetition_count = Some(5);
        assert_eq!(
            collection.to_string(),
            "ResultCollection: 1 metrics, 5 repetitions\n  errors (1 entries)"
        );
    }
}
