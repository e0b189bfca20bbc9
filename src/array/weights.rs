//! Truncated importance weights
use super::drop_first;
use crate::error::ShapeError;
use crate::stats::WeightStats;
use ndarray::{Array3, ArrayView2, ArrayView3, Axis, Zip};
use num_traits::Float;

/// Trace-cut importance weights `min(1, exp(target - behavior))` for bootstrap timesteps.
///
/// # Args
/// * `behavior_log_probs` - Log probabilities under the behavior policy. `[B, T]`
/// * `target_log_probs` - Log probabilities under the target policy. `[B, T, D]`
///
/// # Returns
/// Weights for timesteps `1 ..= T-1` with shape `[B, T-1, D]`, and their statistics.
/// Finite log ratios give weights in `(0, 1]`: those below the log of the smallest positive
/// value of `F` are clamped up to it. `-inf` and `NaN` log ratios give a weight of 0.
///
/// # Errors
/// If the leading dimensions differ or `T < 2`.
pub fn importance_weights<F: Float>(
    behavior_log_probs: ArrayView2<F>,
    target_log_probs: ArrayView3<F>,
) -> Result<(Array3<F>, WeightStats), ShapeError> {
    let target_shape = target_log_probs.shape();
    if target_shape[..2] != *behavior_log_probs.shape() {
        return Err(ShapeError::Mismatch {
            name: "target_log_probs",
            expected: vec![
                behavior_log_probs.nrows(),
                behavior_log_probs.ncols(),
                target_shape[2],
            ],
            actual: target_shape.to_vec(),
        });
    }
    let behavior_per_head = behavior_log_probs.insert_axis(Axis(2));
    let behavior = behavior_per_head
        .broadcast(target_log_probs.raw_dim())
        .ok_or_else(|| ShapeError::Mismatch {
            name: "behavior_log_probs",
            expected: target_shape.to_vec(),
            actual: behavior_per_head.shape().to_vec(),
        })?;

    let min_log_weight = F::min_positive_value().ln();
    let mut stats = WeightStats::default();
    let weights = Zip::from(drop_first(target_log_probs)?)
        .and(drop_first(behavior)?)
        .map_collect(|&target, &behavior| {
            let log_ratio = target - behavior;
            stats.total += 1;
            if log_ratio > F::zero() {
                stats.clipped += 1;
            }
            if !log_ratio.is_finite() {
                stats.non_finite += 1;
            }
            if log_ratio.is_nan() || log_ratio == F::neg_infinity() {
                F::zero()
            } else if log_ratio < min_log_weight {
                stats.underflowed += 1;
                min_log_weight.exp()
            } else {
                log_ratio.min(F::zero()).exp()
            }
        });
    Ok((weights, stats))
}
