//! Truncated importance weights
use super::{align, tensor_shape};
use crate::error::{RetraceError, ShapeError};
use crate::stats::WeightStats;
use tch::{Kind, Tensor};

/// Trace-cut importance weights `min(1, π(a|s) / μ(a|s))` aligned with bootstrap timesteps.
///
/// Computed in the log domain and clipped before exponentiation so that large likelihood
/// ratios cannot overflow. Finite log ratios are also clamped from below at the log of the
/// smallest positive value of the tensor kind so that every finite ratio gives a weight in
/// `(0, 1]`; these are counted in [`WeightStats::underflowed`].
/// Non-finite log ratios are clamped: `+inf` gives a weight of 1 while `-inf` and `NaN` cut
/// the trace completely (weight 0). These are counted in [`WeightStats::non_finite`].
///
/// Carries no gradient.
#[derive(Debug)]
pub struct ImportanceWeights {
    /// Weights for timesteps `1 ..= T-1`. `[B, T-1, D]`
    weights: Tensor,
    stats: WeightStats,
}

impl ImportanceWeights {
    /// Compute importance weights from action log probabilities.
    ///
    /// # Args
    /// * `behavior_log_probs` - Log probabilities under the behavior policy. `[B, T]`
    /// * `target_log_probs` - Log probabilities under the target policy. `[B, T, D]`
    ///
    /// # Returns
    /// Weights for bootstrap timesteps `1 ..= T-1`, with shape `[B, T-1, D]`.
    #[allow(clippy::cast_sign_loss)]
    pub fn from_log_probs(
        behavior_log_probs: &Tensor,
        target_log_probs: &Tensor,
    ) -> Result<Self, RetraceError> {
        let behavior_shape = tensor_shape(behavior_log_probs);
        let target_shape = tensor_shape(target_log_probs);
        if behavior_shape.len() != 2 {
            return Err(ShapeError::WrongDims {
                name: "behavior_log_probs",
                expected: 2,
                actual: behavior_shape,
            }
            .into());
        }
        if target_shape.len() != 3 {
            return Err(ShapeError::WrongDims {
                name: "target_log_probs",
                expected: 3,
                actual: target_shape,
            }
            .into());
        }
        if target_shape[..2] != behavior_shape[..] {
            return Err(ShapeError::Mismatch {
                name: "target_log_probs",
                expected: vec![behavior_shape[0], behavior_shape[1], target_shape[2]],
                actual: target_shape,
            }
            .into());
        }

        tch::no_grad(|| -> Result<Self, RetraceError> {
            let log_ratios = align::drop_first(
                &target_log_probs.f_sub(&behavior_log_probs.f_unsqueeze(-1)?)?,
            )?;

            let min_log_weight = min_log_weight(log_ratios.kind());
            let finite = log_ratios.isfinite();
            let count = |mask: Tensor| mask.sum(Kind::Int64).int64_value(&[]) as u64;
            let stats = WeightStats {
                total: log_ratios.numel() as u64,
                clipped: count(log_ratios.gt(0.0)),
                non_finite: count(finite.logical_not()),
                underflowed: count(log_ratios.lt(min_log_weight).logical_and(&finite)),
            };

            let cut = log_ratios
                .eq(f64::NEG_INFINITY)
                .logical_or(&log_ratios.isnan());
            let weights = log_ratios
                .clamp(min_log_weight, 0.0)
                .exp()
                .masked_fill(&cut, 0.0)
                .detach();
            Ok(Self { weights, stats })
        })
    }

    /// Importance weights for bootstrap timesteps. `[B, T-1, D]`
    #[inline]
    pub const fn tensor(&self) -> &Tensor {
        &self.weights
    }

    #[inline]
    pub const fn stats(&self) -> &WeightStats {
        &self.stats
    }

    /// Mean importance weight.
    pub fn mean(&self) -> f64 {
        self.weights.mean(Kind::Double).double_value(&[])
    }
}

/// Log of the smallest positive normal value of a floating-point kind.
fn min_log_weight(kind: Kind) -> f64 {
    match kind {
        Kind::Half => 6.103_515_625e-5_f64.ln(),
        Kind::Float | Kind::BFloat16 => f64::from(f32::MIN_POSITIVE.ln()),
        _ => f64::MIN_POSITIVE.ln(),
    }
}
