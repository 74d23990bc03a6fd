use crate::model::MetricKind;

/// Errors raised by a single [`MetricAccumulator`](crate::model::MetricAccumulator)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    /// A ratio update was missing its denominator
    #[error("metric '{name}': a ratio update requires both a value and a total")]
    IncompleteUpdate { name: String },

    #[error("metric '{name}': a ratio update cannot have a zero total")]
    ZeroDenominator { name: String },

    #[error("metric '{name}': {value} is not a valid category index (categories: {categories})")]
    InvalidCategory {
        name: String,
        value: f64,
        categories: usize,
    },

    /// Categorical accumulators need a positive category count at construction
    #[error("metric '{name}': a categorical metric requires a positive category count")]
    MissingCategoryCount { name: String },

    #[error("cannot merge metric '{left}' with metric '{right}'")]
    NameMismatch { left: String, right: String },

    #[error("metric '{name}': kind mismatch ({left} vs {right})")]
    KindMismatch {
        name: String,
        left: MetricKind,
        right: MetricKind,
    },

    #[error("metric '{name}': category count mismatch ({left} vs {right})")]
    CategoryCountMismatch {
        name: String,
        left: usize,
        right: usize,
    },

    /// Last-value metrics have no combination semantics
    #[error("metric '{name}': {kind} metrics cannot be merged", kind = MetricKind::LastValue)]
    Unmergeable { name: String },

    /// Exactly one side of a merge keeps a raw value history
    #[error("metric '{name}': both sides of a merge must agree on raw value accumulation")]
    HistoryMismatch { name: String },

    #[error("metric '{name}' has no data yet")]
    NoData { name: String },

    #[error("metric '{name}': confidence intervals are not defined for {kind} metrics")]
    NotApplicable { name: String, kind: MetricKind },

    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// Errors from confidence interval computations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatsError {
    #[error("confidence level must lie strictly between 0 and 100, got {0}")]
    InvalidConfidence(f64),

    #[error("a confidence interval needs at least one sample")]
    NoSamples,
}

/// Errors raised by the parameter grid collaborator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("parameter '{0}' does not exist")]
    UnknownParameter(String),

    #[error("parameter '{0}' is not an unpacked parameter")]
    NotUnpacked(String),

    #[error("parameter sets differ: {left:?} vs {right:?}")]
    ParameterNameMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },

    #[error("unpacked parameter sets differ: {left:?} vs {right:?}")]
    UnpackedMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },

    #[error("fixed parameter '{0}' has different values in the two grids")]
    FixedValueMismatch(String),
}

/// Errors raised by [`ResultCollection`](crate::model::ResultCollection) operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectionError {
    #[error("no metric named '{0}'")]
    UnknownMetric(String),

    /// The other side of a rep-wise merge lacks a metric this side has
    #[error("metric '{0}' is missing from the collection being merged")]
    MissingMetric(String),

    #[error("collections hold different metrics: {left:?} vs {right:?}")]
    MetricNameMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Errors from rebuilding accumulators or collections out of their dictionary form
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("metric '{name}': value shape does not match kind {kind}")]
    ValueShape { name: String, kind: MetricKind },

    #[error("record stored under '{key}' describes metric '{name}'")]
    MisplacedMetric { key: String, name: String },

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}

pub type Result<T> = std::result::Result<T, CollectionError>;
