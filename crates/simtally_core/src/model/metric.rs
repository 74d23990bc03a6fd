//! Single-metric accumulators
//!
//! A [`MetricAccumulator`] keeps the sufficient statistics of one named
//! metric across many update events: the kind-specific running value, the
//! number of updates, and the sum and sum of squares of the per-update
//! result. Those are enough to report the current value, the mean and
//! variance across updates, and a confidence interval, without keeping the
//! samples themselves.
//!
//! Accumulators built by independent workers are combined with
//! [`MetricAccumulator::merge`], which only adds sums and counts and is
//! therefore commutative and associative. Merging is not idempotent: merging
//! the same partial result twice counts it twice, so callers must merge each
//! partial exactly once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MetricError;
use crate::stats::{self, ConfidenceInterval};

/// How a metric combines successive updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    /// Summed counter (e.g. number of bit errors)
    Additive,
    /// Numerator/denominator pair (e.g. bit error rate)
    Ratio,
    /// Replace-on-update diagnostic; cannot be merged
    LastValue,
    /// Per-category tally
    Categorical,
}

impl MetricKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Additive => "ADDITIVE",
            Self::Ratio => "RATIO",
            Self::LastValue => "LAST_VALUE",
            Self::Categorical => "CATEGORICAL",
        }
    }

    #[must_use]
    pub fn is_mergeable(&self) -> bool {
        !matches!(self, Self::LastValue)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind-specific running value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricState {
    Additive { value: f64 },
    Ratio { value: f64, total: f64 },
    LastValue { value: f64 },
    Categorical { counts: Vec<u64>, total: u64 },
}

impl MetricState {
    fn empty(kind: MetricKind, categories: usize) -> Self {
        match kind {
            MetricKind::Additive => Self::Additive { value: 0.0 },
            MetricKind::Ratio => Self::Ratio {
                value: 0.0,
                total: 0.0,
            },
            MetricKind::LastValue => Self::LastValue { value: 0.0 },
            MetricKind::Categorical => Self::Categorical {
                counts: vec![0; categories],
                total: 0,
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Additive { .. } => MetricKind::Additive,
            Self::Ratio { .. } => MetricKind::Ratio,
            Self::LastValue { .. } => MetricKind::LastValue,
            Self::Categorical { .. } => MetricKind::Categorical,
        }
    }
}

/// Raw update inputs, kept only when value accumulation is enabled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHistory {
    pub values: Vec<f64>,
    /// Denominators of ratio updates (empty for other kinds)
    pub totals: Vec<f64>,
}

/// Current value of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultValue {
    Scalar(f64),
    /// Share of updates that fell in each category
    Proportions(Vec<f64>),
}

impl ResultValue {
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Proportions(_) => None,
        }
    }

    #[must_use]
    pub fn as_proportions(&self) -> Option<&[f64]> {
        match self {
            Self::Scalar(_) => None,
            Self::Proportions(p) => Some(p),
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Proportions(p) => write!(f, "{p:?}"),
        }
    }
}

/// Named, typed accumulator for one metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricAccumulator {
    name: String,
    state: MetricState,
    update_count: u64,
    sum_of_results: f64,
    sum_of_squared_results: f64,
    history: Option<RawHistory>,
}

impl MetricAccumulator {
    /// Create an empty accumulator.
    ///
    /// `categories` is required for [`MetricKind::Categorical`] and ignored
    /// otherwise.
    pub fn new(
        name: impl Into<String>,
        kind: MetricKind,
        categories: Option<usize>,
    ) -> Result<Self, MetricError> {
        let name = name.into();
        let categories = match (kind, categories) {
            (MetricKind::Categorical, Some(n)) if n > 0 => n,
            (MetricKind::Categorical, _) => return Err(MetricError::MissingCategoryCount { name }),
            _ => 0,
        };
        Ok(Self::from_state(name, MetricState::empty(kind, categories)))
    }

    fn from_state(name: String, state: MetricState) -> Self {
        Self {
            name,
            state,
            update_count: 0,
            sum_of_results: 0.0,
            sum_of_squared_results: 0.0,
            history: None,
        }
    }

    #[must_use]
    pub fn additive(name: impl Into<String>) -> Self {
        Self::from_state(name.into(), MetricState::Additive { value: 0.0 })
    }

    #[must_use]
    pub fn ratio(name: impl Into<String>) -> Self {
        Self::from_state(
            name.into(),
            MetricState::Ratio {
                value: 0.0,
                total: 0.0,
            },
        )
    }

    #[must_use]
    pub fn last_value(name: impl Into<String>) -> Self {
        Self::from_state(name.into(), MetricState::LastValue { value: 0.0 })
    }

    /// Categorical accumulator over `categories` choices (at least one)
    pub fn categorical(name: impl Into<String>, categories: usize) -> Result<Self, MetricError> {
        Self::new(name, MetricKind::Categorical, Some(categories))
    }

    /// Keep every raw update input. Call on a fresh accumulator.
    #[must_use]
    pub fn with_history(mut self) -> Self {
        debug_assert_eq!(self.update_count, 0, "history enabled after updates");
        self.history.get_or_insert_with(RawHistory::default);
        self
    }

    /// Create an accumulator and apply one update.
    ///
    /// For ratio metrics `total` is the denominator of that update. For
    /// categorical metrics `total` is the number of categories and `value`
    /// the index of the chosen one.
    pub fn create(
        name: impl Into<String>,
        kind: MetricKind,
        value: f64,
        total: Option<f64>,
        accumulate_values: bool,
    ) -> Result<Self, MetricError> {
        let name = name.into();
        let mut accumulator = match kind {
            MetricKind::Categorical => {
                let categories = total
                    .filter(|t| *t >= 1.0 && t.fract() == 0.0)
                    .map(|t| t as usize);
                Self::new(name, kind, categories)?
            }
            _ => Self::new(name, kind, None)?,
        };
        if accumulate_values {
            accumulator = accumulator.with_history();
        }
        let update_total = if kind == MetricKind::Categorical {
            None
        } else {
            total
        };
        accumulator.update(value, update_total)?;
        Ok(accumulator)
    }

    /// Empty accumulator with the same name, kind, category count and
    /// history setting
    #[must_use]
    pub fn empty_like(&self) -> Self {
        let state = MetricState::empty(self.kind(), self.categories().unwrap_or(0));
        let mut fresh = Self::from_state(self.name.clone(), state);
        if self.history.is_some() {
            fresh.history = Some(RawHistory::default());
        }
        fresh
    }

    // === Accessors ===

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> MetricKind {
        self.state.kind()
    }

    #[must_use]
    pub fn state(&self) -> &MetricState {
        &self.state
    }

    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Accumulated denominator (ratio) or number of tallies (categorical);
    /// zero for the other kinds
    #[must_use]
    pub fn total(&self) -> f64 {
        match &self.state {
            MetricState::Ratio { total, .. } => *total,
            MetricState::Categorical { total, .. } => *total as f64,
            MetricState::Additive { .. } | MetricState::LastValue { .. } => 0.0,
        }
    }

    #[must_use]
    pub fn categories(&self) -> Option<usize> {
        match &self.state {
            MetricState::Categorical { counts, .. } => Some(counts.len()),
            _ => None,
        }
    }

    #[must_use]
    pub fn sum_of_results(&self) -> f64 {
        self.sum_of_results
    }

    #[must_use]
    pub fn sum_of_squared_results(&self) -> f64 {
        self.sum_of_squared_results
    }

    #[must_use]
    pub fn accumulates_values(&self) -> bool {
        self.history.is_some()
    }

    /// Raw update values, when accumulation is enabled
    #[must_use]
    pub fn raw_values(&self) -> Option<&[f64]> {
        self.history.as_ref().map(|h| h.values.as_slice())
    }

    /// Raw ratio denominators, when accumulation is enabled
    #[must_use]
    pub fn raw_totals(&self) -> Option<&[f64]> {
        self.history.as_ref().map(|h| h.totals.as_slice())
    }

    // === Updates ===

    /// Apply one update event.
    ///
    /// Ratio metrics require `total`. Categorical metrics take the category
    /// index as `value` and ignore `total`. A rejected update leaves the
    /// accumulator unchanged.
    pub fn update(&mut self, value: f64, total: Option<f64>) -> Result<(), MetricError> {
        let mut recorded_total = None;
        match &mut self.state {
            MetricState::Additive { value: acc } => {
                *acc += value;
                self.sum_of_results += value;
                self.sum_of_squared_results += value * value;
            }
            MetricState::Ratio {
                value: acc,
                total: acc_total,
            } => {
                let total = total.ok_or_else(|| MetricError::IncompleteUpdate {
                    name: self.name.clone(),
                })?;
                if total == 0.0 {
                    return Err(MetricError::ZeroDenominator {
                        name: self.name.clone(),
                    });
                }
                *acc += value;
                *acc_total += total;
                let result = value / total;
                self.sum_of_results += result;
                self.sum_of_squared_results += result * result;
                recorded_total = Some(total);
            }
            MetricState::LastValue { value: acc } => *acc = value,
            MetricState::Categorical {
                counts,
                total: acc_total,
            } => {
                let index = category_index(value, counts.len()).ok_or_else(|| {
                    MetricError::InvalidCategory {
                        name: self.name.clone(),
                        value,
                        categories: counts.len(),
                    }
                })?;
                counts[index] += 1;
                *acc_total += 1;
            }
        }

        self.update_count += 1;
        if let Some(history) = &mut self.history {
            history.values.push(value);
            if let Some(total) = recorded_total {
                history.totals.push(total);
            }
        }
        Ok(())
    }

    /// Tally one observation of category `index`
    pub fn update_choice(&mut self, index: usize) -> Result<(), MetricError> {
        if self.kind() != MetricKind::Categorical {
            return Err(MetricError::KindMismatch {
                name: self.name.clone(),
                left: self.kind(),
                right: MetricKind::Categorical,
            });
        }
        self.update(index as f64, None)
    }

    // === Merging ===

    /// Check that `other` can be merged into `self` without changing either
    pub fn check_mergeable(&self, other: &Self) -> Result<(), MetricError> {
        if self.name != other.name {
            return Err(MetricError::NameMismatch {
                left: self.name.clone(),
                right: other.name.clone(),
            });
        }
        if self.kind() != other.kind() {
            return Err(MetricError::KindMismatch {
                name: self.name.clone(),
                left: self.kind(),
                right: other.kind(),
            });
        }
        if !self.kind().is_mergeable() {
            return Err(MetricError::Unmergeable {
                name: self.name.clone(),
            });
        }
        if let (Some(left), Some(right)) = (self.categories(), other.categories())
            && left != right
        {
            return Err(MetricError::CategoryCountMismatch {
                name: self.name.clone(),
                left,
                right,
            });
        }
        if self.history.is_some() != other.history.is_some() {
            return Err(MetricError::HistoryMismatch {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Fold the statistics of `other` into `self`.
    ///
    /// Both must share name, kind and history setting; last-value metrics
    /// cannot be merged. On error neither side is modified.
    pub fn merge(&mut self, other: &Self) -> Result<(), MetricError> {
        self.check_mergeable(other)?;

        match (&mut self.state, &other.state) {
            (MetricState::Additive { value }, MetricState::Additive { value: theirs }) => {
                *value += theirs;
            }
            (
                MetricState::Ratio { value, total },
                MetricState::Ratio {
                    value: their_value,
                    total: their_total,
                },
            ) => {
                *value += their_value;
                *total += their_total;
            }
            (
                MetricState::Categorical { counts, total },
                MetricState::Categorical {
                    counts: their_counts,
                    total: their_total,
                },
            ) => {
                for (count, theirs) in counts.iter_mut().zip(their_counts) {
                    *count += theirs;
                }
                *total += their_total;
            }
            (MetricState::LastValue { .. }, _) => {
                return Err(MetricError::Unmergeable {
                    name: self.name.clone(),
                });
            }
            (state, theirs) => {
                return Err(MetricError::KindMismatch {
                    name: self.name.clone(),
                    left: state.kind(),
                    right: theirs.kind(),
                });
            }
        }

        self.update_count += other.update_count;
        self.sum_of_results += other.sum_of_results;
        self.sum_of_squared_results += other.sum_of_squared_results;
        if let (Some(history), Some(theirs)) = (&mut self.history, &other.history) {
            history.values.extend_from_slice(&theirs.values);
            history.totals.extend_from_slice(&theirs.totals);
        }
        Ok(())
    }

    // === Queries ===

    /// Current value, or `None` before the first update
    #[must_use]
    pub fn get_result(&self) -> Option<ResultValue> {
        if self.update_count == 0 {
            return None;
        }
        Some(match &self.state {
            MetricState::Additive { value } | MetricState::LastValue { value } => {
                ResultValue::Scalar(*value)
            }
            MetricState::Ratio { value, total } => ResultValue::Scalar(value / total),
            MetricState::Categorical { counts, total } => ResultValue::Proportions(
                counts
                    .iter()
                    .map(|c| *c as f64 / *total as f64)
                    .collect(),
            ),
        })
    }

    /// Mean of the per-update results
    #[must_use]
    pub fn get_result_mean(&self) -> Option<f64> {
        (self.update_count > 0).then(|| self.sum_of_results / self.update_count as f64)
    }

    /// Population variance of the per-update results
    #[must_use]
    pub fn get_result_variance(&self) -> Option<f64> {
        let mean = self.get_result_mean()?;
        Some(self.sum_of_squared_results / self.update_count as f64 - mean * mean)
    }

    /// Two-sided confidence interval of the per-update mean
    pub fn get_confidence_interval(
        &self,
        confidence_percent: f64,
    ) -> Result<ConfidenceInterval, MetricError> {
        if self.kind() == MetricKind::LastValue {
            return Err(MetricError::NotApplicable {
                name: self.name.clone(),
                kind: self.kind(),
            });
        }
        let (Some(mean), Some(variance)) = (self.get_result_mean(), self.get_result_variance())
        else {
            return Err(MetricError::NoData {
                name: self.name.clone(),
            });
        };
        // Rounding can push a zero variance slightly negative
        let std_dev = variance.max(0.0).sqrt();
        Ok(stats::confidence_interval(
            mean,
            std_dev,
            self.update_count,
            confidence_percent,
        )?)
    }

    pub(crate) fn restore_counters(
        &mut self,
        update_count: u64,
        sum_of_results: f64,
        sum_of_squared_results: f64,
    ) {
        self.update_count = update_count;
        self.sum_of_results = sum_of_results;
        self.sum_of_squared_results = sum_of_squared_results;
    }

    /// Overwrite the running value (and ratio denominator) as stored
    pub(crate) fn restore_scalar(&mut self, stored_value: f64, stored_total: f64) {
        match &mut self.state {
            MetricState::Additive { value } | MetricState::LastValue { value } => {
                *value = stored_value;
            }
            MetricState::Ratio { value, total } => {
                *value = stored_value;
                *total = stored_total;
            }
            MetricState::Categorical { .. } => {}
        }
    }

    pub(crate) fn restore_history(&mut self, history: Option<RawHistory>) {
        self.history = history;
    }
}

fn category_index(value: f64, categories: usize) -> Option<usize> {
    (value >= 0.0 && value.fract() == 0.0 && value < categories as f64).then_some(value as usize)
}

/// Accumulators compare equal regardless of how many update calls produced
/// their totals: `update_count` is not part of the comparison.
impl PartialEq for MetricAccumulator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.state == other.state
            && self.sum_of_results == other.sum_of_results
            && self.sum_of_squared_results == other.sum_of_squared_results
            && self.history == other.history
    }
}

impl fmt::Display for MetricAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let MetricState::Ratio { value, total } = &self.state {
            return if *total != 0.0 {
                write!(f, "{}: {value}/{total} -> {}", self.name, value / total)
            } else {
                write!(f, "{}: {value}/{total} -> NaN", self.name)
            };
        }
        match self.get_result() {
            Some(result) => write!(f, "{}: {result}", self.name),
            None => write!(f, "{}: no data", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_categorical_requires_count() {
        assert_eq!(
            MetricAccumulator::new("choice", MetricKind::Categorical, None).unwrap_err(),
            MetricError::MissingCategoryCount {
                name: "choice".to_string()
            }
        );
        assert!(MetricAccumulator::categorical("choice", 0).is_err());
        assert_eq!(
            MetricAccumulator::categorical("choice", 4)
                .unwrap()
                .categories(),
            Some(4)
        );
    }

    #[test]
    fn test_create_categorical_uses_total_as_category_count() {
        let acc =
            MetricAccumulator::create("choice", MetricKind::Categorical, 2.0, Some(3.0), false)
                .unwrap();
        assert_eq!(
            acc.state(),
            &MetricState::Categorical {
                counts: vec![0, 0, 1],
                total: 1
            }
        );

        assert!(
            MetricAccumulator::create("choice", MetricKind::Categorical, 0.0, None, false).is_err()
        );
    }

    #[test]
    fn test_rejected_update_leaves_state_untouched() {
        let mut acc = MetricAccumulator::ratio("ber");
        acc.update(1.0, Some(10.0)).unwrap();
        let before = acc.clone();

        assert!(acc.update(1.0, None).is_err());
        assert!(acc.update(1.0, Some(0.0)).is_err());
        assert_eq!(acc, before);
        assert_eq!(acc.update_count(), 1);

        let mut choice = MetricAccumulator::categorical("choice", 2).unwrap();
        for bad in [2.0, -1.0, 0.5] {
            assert!(matches!(
                choice.update(bad, None),
                Err(MetricError::InvalidCategory { .. })
            ));
        }
        assert_eq!(choice.update_count(), 0);
    }

    #[test]
    fn test_update_choice_on_wrong_kind() {
        let mut acc = MetricAccumulator::additive("errors");
        assert!(matches!(
            acc.update_choice(0),
            Err(MetricError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_like() {
        let mut acc = MetricAccumulator::categorical("choice", 3)
            .unwrap()
            .with_history();
        acc.update_choice(1).unwrap();

        let fresh = acc.empty_like();
        assert_eq!(fresh.name(), "choice");
        assert_eq!(fresh.categories(), Some(3));
        assert!(fresh.accumulates_values());
        assert_eq!(fresh.update_count(), 0);
        assert!(fresh.get_result().is_none());
    }

    #[test]
    fn test_display() {
        let mut ber = MetricAccumulator::ratio("ber");
        assert_eq!(ber.to_string(), "ber: 0/0 -> NaN");
        ber.update(1.0, Some(4.0)).unwrap();
        assert_eq!(ber.to_string(), "ber: 1/4 -> 0.25");

        let mut errors = MetricAccumulator::additive("errors");
        assert_eq!(errors.to_string(), "errors: no data");
        errors.update(3.0, None).unwrap();
        assert_eq!(errors.to_string(), "errors: 3");
    }
}
