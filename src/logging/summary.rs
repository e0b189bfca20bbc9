use super::{LogError, LogValue};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

/// Online mean and variance of a stream of scalars (Welford's algorithm).
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ScalarStats {
    count: u64,
    mean: f64,
    sum_sq_dev: f64,
}

impl ScalarStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            sum_sq_dev: 0.0,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_sq_dev += delta * (value - self.mean);
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }

    /// Population standard deviation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stddev(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some((self.sum_sq_dev / self.count as f64).sqrt())
        }
    }
}

/// Summary of the values logged under one identifier since the last flush.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Counter { increment: u64, initial_value: u64 },
    Duration { stats: ScalarStats },
    Scalar { stats: ScalarStats },
    Message { counts: BTreeMap<Cow<'static, str>, usize> },
}

impl From<LogValue> for Summary {
    fn from(value: LogValue) -> Self {
        match value {
            LogValue::CounterIncrement(i) => Self::Counter {
                increment: i,
                initial_value: 0,
            },
            LogValue::Duration(d) => {
                let mut stats = ScalarStats::new();
                stats.push(d.as_secs_f64());
                Self::Duration { stats }
            }
            LogValue::Scalar(v) => {
                let mut stats = ScalarStats::new();
                stats.push(v);
                Self::Scalar { stats }
            }
            LogValue::Message(s) => {
                let mut counts = BTreeMap::new();
                counts.insert(s, 1);
                Self::Message { counts }
            }
        }
    }
}

impl Summary {
    /// Add a value to the summary.
    ///
    /// The value is not inserted if it is a different variant than the summary was created from.
    pub fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        match (self, value) {
            (Self::Counter { increment, .. }, LogValue::CounterIncrement(i)) => *increment += i,
            (Self::Duration { stats }, LogValue::Duration(d)) => stats.push(d.as_secs_f64()),
            (Self::Scalar { stats }, LogValue::Scalar(v)) => stats.push(v),
            (Self::Message { counts }, LogValue::Message(s)) => {
                *counts.entry(s).or_insert(0) += 1;
            }
            (summary, value) => {
                return Err(LogError::IncompatibleValue {
                    prev: summary.variant_name(),
                    now: value.variant_name(),
                })
            }
        }
        Ok(())
    }

    /// Reset for the start of the next summary period.
    ///
    /// Counters keep their running total.
    pub fn reset(&mut self) {
        match self {
            Self::Counter {
                increment,
                initial_value,
            } => {
                *initial_value += *increment;
                *increment = 0;
            }
            Self::Duration { stats } | Self::Scalar { stats } => *stats = ScalarStats::new(),
            Self::Message { counts } => counts.clear(),
        }
    }

    /// Mean duration, if this is a non-empty duration summary.
    #[must_use]
    pub fn mean_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration { stats } => stats.mean().map(Duration::from_secs_f64),
            _ => None,
        }
    }

    const fn variant_name(&self) -> &'static str {
        match self {
            Self::Counter { .. } => "CounterIncrement",
            Self::Duration { .. } => "Duration",
            Self::Scalar { .. } => "Scalar",
            Self::Message { .. } => "Message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_stats() {
        let mut stats = ScalarStats::new();
        assert_eq!(stats.mean(), None);
        for x in [1.0, 2.0, 3.0, 4.0] {
            stats.push(x);
        }
        assert_eq!(stats.count(), 4);
        assert!((stats.mean().unwrap() - 2.5).abs() < 1e-12);
        assert!((stats.stddev().unwrap() - 1.25_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn counter_keeps_total_across_reset() {
        let mut summary = Summary::from(LogValue::CounterIncrement(2));
        summary.push(LogValue::CounterIncrement(3)).unwrap();
        summary.reset();
        summary.push(LogValue::CounterIncrement(1)).unwrap();
        assert_eq!(
            summary,
            Summary::Counter {
                increment: 1,
                initial_value: 5
            }
        );
    }

    #[test]
    fn message_counts() {
        let mut summary = Summary::from(LogValue::Message("a".into()));
        summary.push(LogValue::Message("b".into())).unwrap();
        summary.push(LogValue::Message("a".into())).unwrap();
        match summary {
            Summary::Message { counts } => {
                assert_eq!(counts.get("a"), Some(&2));
                assert_eq!(counts.get("b"), Some(&1));
            }
            _ => panic!("expected a message summary"),
        }
    }

    #[test]
    fn incompatible_value() {
        let mut summary = Summary::from(LogValue::Scalar(1.0));
        assert_eq!(
            summary.push(LogValue::CounterIncrement(1)),
            Err(LogError::IncompatibleValue {
                prev: "Scalar",
                now: "CounterIncrement"
            })
        );
    }

    #[test]
    fn mean_duration() {
        let mut summary = Summary::from(LogValue::Duration(Duration::from_millis(10)));
        summary
            .push(LogValue::Duration(Duration::from_millis(30)))
            .unwrap();
        let mean = summary.mean_duration().unwrap();
        assert!((mean.as_secs_f64() - 0.02).abs() < 1e-9);
    }
}
