//! Metric accumulators and the collections that hold them

mod metric;
mod record;
mod results;

pub use metric::{MetricAccumulator, MetricKind, MetricState, RawHistory, ResultValue};
pub use record::{CollectionRecord, MetricRecord, RecordValue};
pub use results::{ELAPSED_TIME_METRIC, ResultCollection, SKIPPED_REPS_METRIC};
