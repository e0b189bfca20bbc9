//! Retrace targets
use crate::error::ShapeError;
use ndarray::{s, Array3, ArrayView3, Axis, Zip};
use num_traits::Float;

/// Aligned per-step inputs to the Retrace recursion. All have shape `[B, N, D]`.
///
/// See [`crate::torch::AlignedSteps`].
#[derive(Debug, Clone)]
pub struct AlignedSteps<'a, F> {
    pub rewards: ArrayView3<'a, F>,
    pub expected_values: ArrayView3<'a, F>,
    pub bootstrap_values: ArrayView3<'a, F>,
    pub weights: ArrayView3<'a, F>,
}

/// Compute Retrace targets by a single backward scan over time.
///
/// ```text
/// target[N-1] = r[N-1] + γ (E[N-1] + c[N-1] Q[N-1])
/// target[j]   = r[j]   + γ (E[j]   + c[j] (target[j+1] - Q[j]))
/// ```
///
/// # Errors
/// If the inputs do not all have the same shape with `N >= 1`.
pub fn retrace_targets<F: Float>(
    gamma: F,
    steps: &AlignedSteps<F>,
) -> Result<Array3<F>, ShapeError> {
    let shape = steps.rewards.raw_dim();
    let num_steps = shape[1];
    if num_steps == 0 {
        return Err(ShapeError::TooFewSteps { steps: 1 });
    }
    for (name, array) in [
        ("expected_values", &steps.expected_values),
        ("bootstrap_values", &steps.bootstrap_values),
        ("weights", &steps.weights),
    ] {
        if array.raw_dim() != shape {
            return Err(ShapeError::Mismatch {
                name,
                expected: steps.rewards.shape().to_vec(),
                actual: array.shape().to_vec(),
            });
        }
    }

    let step = |j: usize| {
        (
            steps.rewards.index_axis(Axis(1), j),
            steps.expected_values.index_axis(Axis(1), j),
            steps.bootstrap_values.index_axis(Axis(1), j),
            steps.weights.index_axis(Axis(1), j),
        )
    };

    let mut targets = Array3::zeros(shape);
    let last = num_steps - 1;
    let (reward, expected, bootstrap, weight) = step(last);
    Zip::from(targets.index_axis_mut(Axis(1), last))
        .and(reward)
        .and(expected)
        .and(bootstrap)
        .and(weight)
        .for_each(|t, &r, &e, &q, &c| *t = r + gamma * (e + c * q));

    for j in (0..last).rev() {
        let (current, successor) = targets.multi_slice_mut((s![.., j, ..], s![.., j + 1, ..]));
        let (reward, expected, bootstrap, weight) = step(j);
        Zip::from(current)
            .and(&successor)
            .and(reward)
            .and(expected)
            .and(bootstrap)
            .and(weight)
            .for_each(|t, &next, &r, &e, &q, &c| *t = r + gamma * (e + c * (next - q)));
    }
    Ok(targets)
}
