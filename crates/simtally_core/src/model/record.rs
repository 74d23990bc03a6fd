//! Dictionary form of accumulators and collections.
//!
//! These are the plain serde structs written to JSON and YAML. They carry
//! every field needed to rebuild an equal in-memory object, and the
//! per-metric map keeps its insertion order in both directions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::params::ParameterGrid;

use super::metric::{MetricAccumulator, MetricKind, MetricState, RawHistory};
use super::results::ResultCollection;

/// Stored running value: a scalar, or per-category counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Scalar(#[serde(with = "float_text")] f64),
    Counts(Vec<u64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub kind: MetricKind,
    pub value: RecordValue,
    #[serde(with = "float_text")]
    pub total: f64,
    #[serde(with = "float_text")]
    pub sum_of_results: f64,
    #[serde(with = "float_text")]
    pub sum_of_squared_results: f64,
    pub update_count: u64,
    #[serde(default)]
    pub raw_value_history_enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "float_text::seq")]
    pub raw_values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "float_text::seq")]
    pub raw_totals: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord<P> {
    pub parameters: P,
    #[serde(default)]
    pub repetition_count: Option<u64>,
    #[serde(default)]
    pub origin_filename: Option<String>,
    #[serde(with = "ordered_results")]
    pub results: Vec<(String, Vec<MetricRecord>)>,
}

impl MetricAccumulator {
    #[must_use]
    pub fn to_record(&self) -> MetricRecord {
        let value = match self.state() {
            MetricState::Additive { value }
            | MetricState::Ratio { value, .. }
            | MetricState::LastValue { value } => RecordValue::Scalar(*value),
            MetricState::Categorical { counts, .. } => RecordValue::Counts(counts.clone()),
        };
        MetricRecord {
            name: self.name().to_string(),
            kind: self.kind(),
            value,
            total: self.total(),
            sum_of_results: self.sum_of_results(),
            sum_of_squared_results: self.sum_of_squared_results(),
            update_count: self.update_count(),
            raw_value_history_enabled: self.accumulates_values(),
            raw_values: self.raw_values().map(<[f64]>::to_vec).unwrap_or_default(),
            raw_totals: self.raw_totals().map(<[f64]>::to_vec).unwrap_or_default(),
        }
    }

    /// Rebuild an accumulator from its dictionary form.
    ///
    /// Categorical counts are replayed one tally at a time; other kinds take
    /// the stored value and total as is, so an accumulated ratio total of
    /// zero still loads. Counters and raw history are then restored.
    pub fn from_record(record: MetricRecord) -> Result<Self, RecordError> {
        let MetricRecord {
            name,
            kind,
            value,
            total,
            sum_of_results,
            sum_of_squared_results,
            update_count,
            raw_value_history_enabled,
            raw_values,
            raw_totals,
        } = record;

        let mut accumulator = match (kind, value) {
            (MetricKind::Categorical, RecordValue::Counts(counts)) => {
                let mut accumulator = Self::categorical(name, counts.len())?;
                for (index, count) in counts.iter().enumerate() {
                    for _ in 0..*count {
                        accumulator.update_choice(index)?;
                    }
                }
                accumulator
            }
            (MetricKind::Categorical, RecordValue::Scalar(_))
            | (_, RecordValue::Counts(_)) => {
                return Err(RecordError::ValueShape { name, kind });
            }
            (kind, RecordValue::Scalar(value)) => {
                let mut accumulator = Self::new(name, kind, None)?;
                accumulator.restore_scalar(value, total);
                accumulator
            }
        };

        accumulator.restore_counters(update_count, sum_of_results, sum_of_squared_results);
        accumulator.restore_history(raw_value_history_enabled.then(|| RawHistory {
            values: raw_values,
            totals: raw_totals,
        }));
        Ok(accumulator)
    }
}

impl<P: ParameterGrid> ResultCollection<P> {
    #[must_use]
    pub fn to_record(&self) -> CollectionRecord<P> {
        CollectionRecord {
            parameters: self.parameters().clone(),
            repetition_count: self.repetition_count,
            origin_filename: self.origin_filename.clone(),
            results: self
                .iter()
                .map(|(name, series)| {
                    (
                        name.to_string(),
                        series.iter().map(MetricAccumulator::to_record).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Rebuild a collection, keeping the metric order of the record
    pub fn from_record(record: CollectionRecord<P>) -> Result<Self, RecordError> {
        let mut collection = Self::with_parameters(record.parameters);
        collection.repetition_count = record.repetition_count;
        collection.origin_filename = record.origin_filename;

        for (key, records) in record.results {
            for record in records {
                if record.name != key {
                    return Err(RecordError::MisplacedMetric {
                        key,
                        name: record.name,
                    });
                }
                collection.append(MetricAccumulator::from_record(record)?)?;
            }
        }
        Ok(collection)
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Counts(c) => write!(f, "{c:?}"),
        }
    }
}

/// Floats that stay readable in formats without infinities or NaN.
///
/// Finite values are plain numbers. `inf`, `-inf` and `NaN` are written as
/// strings and parsed back; any other string is rejected.
mod float_text {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, \"inf\", \"-inf\" or \"NaN\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v.parse::<f64>() {
                Ok(parsed) if !parsed.is_finite() => Ok(parsed),
                _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
            }
        }
    }

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct Item(#[serde(with = "super::float_text")] f64);

    pub mod seq {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::Item;

        pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(values.iter().map(|v| Item(*v)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<f64>, D::Error> {
            let items = Vec::<Item>::deserialize(deserializer)?;
            Ok(items.into_iter().map(|Item(v)| v).collect())
        }
    }
}

/// `results` as a map that keeps document order and rejects duplicate keys
mod ordered_results {
    use std::fmt;

    use serde::de::{self, MapAccess, Visitor};
    use serde::{Deserializer, Serializer};

    use super::MetricRecord;

    type Results = Vec<(String, Vec<MetricRecord>)>;

    pub fn serialize<S: Serializer>(results: &Results, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(results.iter().map(|(name, records)| (name, records)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Results, D::Error> {
        deserializer.deserialize_map(ResultsVisitor)
    }

    struct ResultsVisitor;

    impl<'de> Visitor<'de> for ResultsVisitor {
        type Value = Results;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of metric names to lists of metric records")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut results = Results::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, records)) = map.next_entry::<String, Vec<MetricRecord>>()? {
                if results.iter().any(|(existing, _)| *existing == name) {
                    return Err(de::Error::custom(format!("duplicate metric '{name}'")));
                }
                results.push((name, records));
            }
            Ok(results)
        }
    }
}
