//! Statistics accumulators and their cross-replication merge rules.
//!
//! Every accumulator is a small `Copy` value. Merging never mutates its inputs: it returns a new
//! accumulator computed from the pooled sufficient statistics (counts, sums, sums of squares,
//! integrals), so estimators of pooled results are never averages of per-replication estimators.

use serde::{Deserialize, Serialize};

/// Monotonic event counter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    count: u64,
}

impl Counter {
    /// Increments the counter by one.
    pub fn add(&mut self) {
        self.count += 1;
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Pools two counters.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            count: self.count + other.count,
        }
    }
}

/// Sample-based (not time-weighted) statistic, such as waiting times of individual clients.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Values {
    count: u64,
    sum: f64,
    sum2: f64,
    min: f64,
    max: f64,
}

impl Values {
    /// Records one sample.
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.sum2 += value * value;
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of the recorded samples.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Smallest recorded sample, or 0 if none.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest recorded sample, or 0 if none.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Sample mean, or 0 if nothing has been recorded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Sample variance with the `n - 1` denominator. Never negative.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        ((self.sum2 - self.sum * self.sum / n) / (n - 1.0)).max(0.0)
    }

    /// Sample standard deviation.
    #[must_use]
    pub fn sd(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Coefficient of variation; 0 when the mean is 0.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn cv(&self) -> f64 {
        let mean = self.mean();
        if mean == 0.0 {
            0.0
        } else {
            self.sd() / mean
        }
    }

    /// Pools the samples of two accumulators.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        match (self.count, other.count) {
            (0, _) => *other,
            (_, 0) => *self,
            _ => Self {
                count: self.count + other.count,
                sum: self.sum + other.sum,
                sum2: self.sum2 + other.sum2,
                min: self.min.min(other.min),
                max: self.max.max(other.max),
            },
        }
    }
}

/// Time-weighted statistic of a piecewise-constant level, such as the queue length.
///
/// Observation begins at the first call to [`States::set`]; time before that is not counted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct States {
    level: f64,
    last_change: Option<f64>,
    elapsed: f64,
    integral: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl States {
    /// Changes the level at `time`, integrating the previous level over the time since the
    /// previous change.
    pub fn set(&mut self, time: f64, level: f64) {
        if let Some(last) = self.last_change {
            let dt = (time - last).max(0.0);
            self.integral += self.level * dt;
            self.elapsed += dt;
        }
        self.min = Some(self.min.map_or(level, |min| min.min(level)));
        self.max = Some(self.max.map_or(level, |max| max.max(level)));
        self.last_change = Some(time.max(self.last_change.unwrap_or(time)));
        self.level = level;
    }

    /// Level set by the most recent change.
    #[must_use]
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Observed time span.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Time integral of the level over the observed span.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Smallest level observed, or 0 if none.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min.unwrap_or(0.0)
    }

    /// Largest level observed, or 0 if none.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max.unwrap_or(0.0)
    }

    /// Time-average level, or 0 if no time has elapsed.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.elapsed > 0.0 {
            self.integral / self.elapsed
        } else {
            0.0
        }
    }

    /// Pools two observations. This is the elapsed-weighted average of the means.
    ///
    /// The pooled accumulator is closed: it has no current level and a subsequent `set`
    /// starts a new observation span.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let pick = |a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64| match (a, b) {
            (Some(a), Some(b)) => Some(f(a, b)),
            (a, b) => a.or(b),
        };
        Self {
            level: 0.0,
            last_change: None,
            elapsed: self.elapsed + other.elapsed,
            integral: self.integral + other.integral,
            min: pick(self.min, other.min, f64::min),
            max: pick(self.max, other.max, f64::max),
        }
    }
}

/// Single overwritten scalar, such as a rate derived at the end of a run.
///
/// When `occurrences` is known, pooling weights each value by it; otherwise values are
/// averaged over the number of pooled replications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Value {
    value: f64,
    occurrences: Option<u64>,
    samples: u64,
}

impl Default for Value {
    fn default() -> Self {
        Self {
            value: 0.0,
            occurrences: None,
            samples: 1,
        }
    }
}

impl Value {
    /// Overwrites the value.
    pub fn set(&mut self, value: f64) {
        self.value = value;
    }

    /// Overwrites the value together with the number of occurrences it was derived from.
    pub fn set_weighted(&mut self, value: f64, occurrences: u64) {
        self.value = value;
        self.occurrences = Some(occurrences);
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Occurrence weight, if any.
    #[must_use]
    pub fn occurrences(&self) -> Option<u64> {
        self.occurrences
    }

    /// Pools two values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn merge(&self, other: &Self) -> Self {
        let samples = self.samples + other.samples;
        match (self.occurrences, other.occurrences) {
            (Some(a), Some(b)) if a + b > 0 => Self {
                value: (self.value * a as f64 + other.value * b as f64) / (a + b) as f64,
                occurrences: Some(a + b),
                samples,
            },
            _ => Self {
                value: (self.value * self.samples as f64 + other.value * other.samples as f64)
                    / samples as f64,
                occurrences: self.occurrences.and(other.occurrences).map(|_| 0),
                samples,
            },
        }
    }
}

/// Named statistic of a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    /// See [`Counter`].
    Counter(Counter),
    /// See [`Values`].
    Values(Values),
    /// See [`States`].
    States(States),
    /// See [`Value`].
    Value(Value),
}

/// Full description of a record, as exported in the full result form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Summary {
    /// Sample-based statistic.
    Values {
        /// Number of samples.
        count: u64,
        /// Mean.
        mean: f64,
        /// Standard deviation.
        sd: f64,
        /// Coefficient of variation.
        cv: f64,
        /// Minimum.
        min: f64,
        /// Maximum.
        max: f64,
    },
    /// Time-weighted statistic.
    States {
        /// Observed time span.
        time: f64,
        /// Time-average level.
        mean: f64,
        /// Minimum level.
        min: f64,
        /// Maximum level.
        max: f64,
    },
    /// Counter.
    Counter {
        /// Count.
        count: u64,
    },
    /// Derived scalar.
    Value {
        /// The value.
        value: f64,
    },
}

impl Record {
    /// Pools two records of the same kind. Returns `None` if the kinds differ.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Counter(a), Self::Counter(b)) => Some(Self::Counter(a.merge(b))),
            (Self::Values(a), Self::Values(b)) => Some(Self::Values(a.merge(b))),
            (Self::States(a), Self::States(b)) => Some(Self::States(a.merge(b))),
            (Self::Value(a), Self::Value(b)) => Some(Self::Value(a.merge(b))),
            _ => None,
        }
    }

    /// The scalar reported in the short result form: the count for counters, the mean for
    /// values and states, and the value itself otherwise.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn scalar(&self) -> f64 {
        match self {
            Self::Counter(c) => c.count() as f64,
            Self::Values(v) => v.mean(),
            Self::States(s) => s.mean(),
            Self::Value(v) => v.value(),
        }
    }

    /// The description reported in the full result form.
    #[must_use]
    pub fn summary(&self) -> Summary {
        match self {
            Self::Counter(c) => Summary::Counter { count: c.count() },
            Self::Values(v) => Summary::Values {
                count: v.count(),
                mean: v.mean(),
                sd: v.sd(),
                cv: v.cv(),
                min: v.min(),
                max: v.max(),
            },
            Self::States(s) => Summary::States {
                time: s.elapsed(),
                mean: s.mean(),
                min: s.min(),
                max: s.max(),
            },
            Self::Value(v) => Summary::Value { value: v.value() },
        }
    }

    /// Returns `true` for the sample-based and time-weighted kinds, which are reported as
    /// expected values.
    #[must_use]
    pub fn is_expectation(&self) -> bool {
        matches!(self, Self::Values(_) | Self::States(_))
    }
}
