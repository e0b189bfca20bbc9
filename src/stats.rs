//! Importance weight statistics
use crate::error::NumericInstabilityWarning;

/// Counts describing a batch of aligned importance weights.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct WeightStats {
    /// Number of weights.
    pub total: u64,
    /// Number of log ratios greater than 0, cut to a weight of 1.
    pub clipped: u64,
    /// Number of log ratios that were infinite or NaN.
    pub non_finite: u64,
    /// Number of finite log ratios clamped up to the log of the smallest positive weight.
    pub underflowed: u64,
}

impl WeightStats {
    /// Fraction of traces that were cut by the clip at 1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn clipped_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.clipped as f64 / self.total as f64
        }
    }

    /// Warning if any log importance ratio was not finite or underflowed.
    #[must_use]
    pub const fn warning(&self) -> Option<NumericInstabilityWarning> {
        if self.non_finite == 0 && self.underflowed == 0 {
            None
        } else {
            Some(NumericInstabilityWarning {
                non_finite: self.non_finite,
                underflowed: self.underflowed,
                total: self.total,
            })
        }
    }
}
