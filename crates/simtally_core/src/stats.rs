//! Confidence intervals from accumulated moments.
//!
//! Intervals are two-sided, `mean ± c·σ/√n`, with `c` the standard normal
//! critical value for the requested confidence level (the large-sample row
//! of the Student t table).

use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Tabulated two-sided critical values, keyed by confidence percent
const CRITICAL_VALUES: [(f64, f64); 11] = [
    (50.0, 0.674),
    (60.0, 0.842),
    (70.0, 1.036),
    (80.0, 1.282),
    (90.0, 1.645),
    (95.0, 1.960),
    (98.0, 2.326),
    (99.0, 2.576),
    (99.5, 2.807),
    (99.8, 3.090),
    (99.9, 3.291),
];

/// Closed interval `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    #[must_use]
    pub fn center(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    #[must_use]
    pub fn half_width(&self) -> f64 {
        0.5 * (self.upper - self.lower)
    }

    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

/// Two-sided critical value for `confidence_percent` (e.g. `95.0`).
///
/// Common levels come from the table; any other level in `(0, 100)` falls
/// back to a rational approximation of the normal quantile.
pub fn critical_value(confidence_percent: f64) -> Result<f64, StatsError> {
    if !(confidence_percent > 0.0 && confidence_percent < 100.0) {
        return Err(StatsError::InvalidConfidence(confidence_percent));
    }
    if let Some(&(_, c)) = CRITICAL_VALUES
        .iter()
        .find(|(level, _)| (level - confidence_percent).abs() < 1e-9)
    {
        return Ok(c);
    }
    Ok(normal_quantile(0.5 + confidence_percent / 200.0))
}

/// Interval of `confidence_percent` around `mean` given the sample standard
/// deviation and sample count.
pub fn confidence_interval(
    mean: f64,
    std_dev: f64,
    n: u64,
    confidence_percent: f64,
) -> Result<ConfidenceInterval, StatsError> {
    if n == 0 {
        return Err(StatsError::NoSamples);
    }
    let c = critical_value(confidence_percent)?;
    let half_width = c * std_dev / (n as f64).sqrt();
    Ok(ConfidenceInterval {
        lower: mean - half_width,
        upper: mean + half_width,
    })
}

/// Inverse standard normal CDF for `p ∈ (0, 1)`.
///
/// Abramowitz & Stegun 26.2.23, absolute error below 4.5e-4.
fn normal_quantile(p: f64) -> f64 {
    const C0: f64 = 2.515517;
    const C1: f64 = 0.802853;
    const C2: f64 = 0.010328;
    const D1: f64 = 1.432788;
    const D2: f64 = 0.189269;
    const D3: f64 = 0.001308;

    let (q, sign) = if p > 0.5 { (1.0 - p, 1.0) } else { (p, -1.0) };
    let t = (-2.0 * q.ln()).sqrt();
    let z = t - (C0 + C1 * t + C2 * t * t) / (1.0 + D1 * t + D2 * t * t + D3 * t * t * t);
    sign * z
}
