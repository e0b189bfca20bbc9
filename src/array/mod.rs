//! Retrace targets and loss on ndarray arrays
//!
//! A gradient-free implementation for callers holding plain arrays.
//! Computes the same values as the [torch backend](crate::torch).
mod targets;
mod weights;

pub use targets::{retrace_targets, AlignedSteps};
pub use weights::importance_weights;

use crate::error::ShapeError;
use crate::loss::{Distance, RetraceLoss};
use crate::shape::{HeadBroadcast, TrajectoryShape};
use crate::stats::WeightStats;
use ndarray::{Array3, ArrayView, ArrayView2, ArrayView3, Axis, CowArray, Dimension, Ix3, Slice};
use num_traits::Float;

/// Index of the time axis.
pub const TIME_AXIS: Axis = Axis(1);

/// Inputs to the Retrace loss for a batch of trajectories, as array views.
///
/// Same layout as [`RetraceInputs`](crate::torch::RetraceInputs).
#[derive(Debug, Clone)]
pub struct ArrayInputs<'a, F> {
    /// Action value predictions. `[B, T, D]`
    pub predicted: ArrayView3<'a, F>,
    /// Target-network action values of the taken actions. `[B, T, D]`
    pub target_values: ArrayView3<'a, F>,
    /// Target-network expected state values under the target policy. `[B, T, D]`
    pub expected_values: ArrayView3<'a, F>,
    /// Observed rewards. `[B, T, D]` or `[B, T, 1]`
    pub rewards: ArrayView3<'a, F>,
    /// Log probability of each taken action under the behavior policy. `[B, T]`
    pub behavior_log_probs: ArrayView2<'a, F>,
    /// Log probability of each taken action under the target policy. `[B, T, D]` or `[B, T, 1]`
    pub target_log_probs: ArrayView3<'a, F>,
}

impl<'a, F> ArrayInputs<'a, F> {
    /// Validate the input shapes.
    ///
    /// # Errors
    /// If the shapes are mutually inconsistent or `T < 2`.
    pub fn shape(&self) -> Result<TrajectoryShape, ShapeError> {
        let shape = TrajectoryShape::from_predicted(self.predicted.shape())?;
        shape.check("target_values", self.target_values.shape())?;
        shape.check("expected_values", self.expected_values.shape())?;
        shape.head_broadcast("rewards", self.rewards.shape())?;
        shape.check_steps("behavior_log_probs", self.behavior_log_probs.shape())?;
        shape.head_broadcast("target_log_probs", self.target_log_probs.shape())?;
        Ok(shape)
    }
}

/// View of the first `T - 1` timesteps (indices `0 ..= T-2`).
///
/// # Errors
/// If the array has no time axis or fewer than 2 timesteps.
#[allow(clippy::cast_possible_wrap)]
pub fn drop_last<A, D: Dimension>(
    mut x: ArrayView<A, D>,
) -> Result<ArrayView<A, D>, ShapeError> {
    let num_steps = num_steps(x.shape())?;
    x.slice_axis_inplace(TIME_AXIS, Slice::new(0, Some(num_steps as isize - 1), 1));
    Ok(x)
}

/// View of the last `T - 1` timesteps (indices `1 ..= T-1`).
///
/// # Errors
/// If the array has no time axis or fewer than 2 timesteps.
pub fn drop_first<A, D: Dimension>(
    mut x: ArrayView<A, D>,
) -> Result<ArrayView<A, D>, ShapeError> {
    num_steps(x.shape())?;
    x.slice_axis_inplace(TIME_AXIS, Slice::new(1, None, 1));
    Ok(x)
}

fn num_steps(shape: &[usize]) -> Result<usize, ShapeError> {
    let num_steps = *shape
        .get(TIME_AXIS.index())
        .ok_or(ShapeError::MissingTimeAxis { dims: shape.len() })?;
    if num_steps < 2 {
        return Err(ShapeError::TooFewSteps { steps: num_steps });
    }
    Ok(num_steps)
}

/// Bring a `[B, T, D]` or `[B, T, 1]` array to the full trajectory shape.
///
/// # Errors
/// If the array has neither shape.
pub fn broadcast_heads<'a, F: Clone>(
    shape: &TrajectoryShape,
    name: &'static str,
    x: ArrayView3<'a, F>,
) -> Result<CowArray<'a, F, Ix3>, ShapeError> {
    match shape.head_broadcast(name, x.shape())? {
        HeadBroadcast::Exact => Ok(x.into()),
        HeadBroadcast::Expand => {
            let expanded = x.broadcast(shape.dims()).ok_or_else(|| ShapeError::Mismatch {
                name,
                expected: shape.dims().to_vec(),
                actual: x.shape().to_vec(),
            })?;
            Ok(expanded.to_owned().into())
        }
    }
}

impl Distance {
    /// Mean distance between predicted values and their targets.
    ///
    /// # Errors
    /// If the arrays have different shapes or are empty.
    pub fn array_loss<F: Float>(
        self,
        predicted: ArrayView3<F>,
        targets: ArrayView3<F>,
    ) -> Result<F, ShapeError> {
        if predicted.shape() != targets.shape() {
            return Err(ShapeError::Mismatch {
                name: "predicted",
                expected: targets.shape().to_vec(),
                actual: predicted.shape().to_vec(),
            });
        }
        if predicted.is_empty() {
            return Err(ShapeError::Empty {
                shape: predicted.shape().to_vec(),
            });
        }
        let total = predicted
            .iter()
            .zip(&targets)
            .fold(F::zero(), |sum, (&p, &t)| sum + self.penalty(p - t));
        let count = F::from(predicted.len()).unwrap_or_else(F::nan);
        Ok(total / count)
    }
}

impl RetraceLoss {
    /// Retrace targets for the predicted values of timesteps `0 ..= T-2`. `[B, T-1, D]`
    ///
    /// Also returns statistics of the importance weights.
    ///
    /// # Errors
    /// If the input shapes are inconsistent or `T < 2`.
    pub fn array_targets<F: Float>(
        &self,
        inputs: &ArrayInputs<F>,
    ) -> Result<(Array3<F>, WeightStats), ShapeError> {
        let shape = inputs.shape()?;

        let target_log_probs =
            broadcast_heads(&shape, "target_log_probs", inputs.target_log_probs.view())?;
        let (weights, stats) =
            importance_weights(inputs.behavior_log_probs.view(), target_log_probs.view())?;

        let rewards = broadcast_heads(&shape, "rewards", inputs.rewards.view())?;
        let targets = retrace_targets(
            self.gamma_as(),
            &AlignedSteps {
                rewards: drop_last(rewards.view())?,
                expected_values: drop_first(inputs.expected_values.view())?,
                bootstrap_values: drop_first(inputs.target_values.view())?,
                weights: weights.view(),
            },
        )?;
        Ok((targets, stats))
    }

    /// Retrace loss of the predicted values.
    ///
    /// # Errors
    /// If the input shapes are inconsistent or `T < 2`.
    pub fn array_loss<F: Float>(&self, inputs: &ArrayInputs<F>) -> Result<F, ShapeError> {
        let (targets, _) = self.array_targets(inputs)?;
        self.distance
            .array_loss(drop_last(inputs.predicted.view())?, targets.view())
    }
}

#[cfg(test)]
#[allow(clippy::needless_pass_by_value)]
mod tests {
    use super::*;
    use crate::torch::RetraceInputs;
    use ndarray::{arr2, arr3, Array2};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use rstest::{fixture, rstest};
    use tch::Tensor;

    /// Owned input arrays.
    struct Batch {
        predicted: Array3<f64>,
        target_values: Array3<f64>,
        expected_values: Array3<f64>,
        rewards: Array3<f64>,
        behavior_log_probs: Array2<f64>,
        target_log_probs: Array3<f64>,
    }

    impl Batch {
        fn inputs(&self) -> ArrayInputs<f64> {
            ArrayInputs {
                predicted: self.predicted.view(),
                target_values: self.target_values.view(),
                expected_values: self.expected_values.view(),
                rewards: self.rewards.view(),
                behavior_log_probs: self.behavior_log_probs.view(),
                target_log_probs: self.target_log_probs.view(),
            }
        }
    }

    fn seq(values: &[f64]) -> Array3<f64> {
        Array3::from_shape_vec((1, values.len(), 1), values.to_vec()).unwrap()
    }

    #[fixture]
    fn concrete() -> Batch {
        Batch {
            predicted: seq(&[0.5, 2.0, 100.0]),
            target_values: seq(&[5.0, 0.0, 0.0]),
            expected_values: seq(&[5.0, 0.0, 0.0]),
            rewards: seq(&[1.0, 1.0, 1.0]),
            behavior_log_probs: arr2(&[[0.0, 0.0, 0.0]]),
            target_log_probs: seq(&[0.0, f64::NEG_INFINITY, f64::NEG_INFINITY]),
        }
    }

    const UNDISCOUNTED: RetraceLoss = RetraceLoss::new(1.0, Distance::SmoothL1);

    #[test]
    fn drop_last_and_first() {
        let x = arr2(&[[0, 1, 2], [10, 11, 12]]);
        assert_eq!(drop_last(x.view()).unwrap(), arr2(&[[0, 1], [10, 11]]));
        assert_eq!(drop_first(x.view()).unwrap(), arr2(&[[1, 2], [11, 12]]));
    }

    #[test]
    fn drop_first_3d() {
        let x = arr3(&[[[0, 100], [1, 101], [2, 102]]]);
        assert_eq!(drop_first(x.view()).unwrap(), arr3(&[[[1, 101], [2, 102]]]));
    }

    #[test]
    fn align_errors() {
        let single = arr2(&[[1.0], [2.0]]);
        assert_eq!(
            drop_last(single.view()),
            Err(ShapeError::TooFewSteps { steps: 1 })
        );
        let flat = ndarray::arr1(&[1.0, 2.0]);
        assert_eq!(
            drop_first(flat.view()),
            Err(ShapeError::MissingTimeAxis { dims: 1 })
        );
    }

    #[rstest]
    fn concrete_targets(concrete: Batch) {
        let (targets, stats) = UNDISCOUNTED.array_targets(&concrete.inputs()).unwrap();
        assert_eq!(targets, seq(&[1.0, 1.0]));
        assert_eq!(stats.non_finite, 2);
    }

    #[rstest]
    fn concrete_loss(concrete: Batch) {
        let loss = UNDISCOUNTED.array_loss(&concrete.inputs()).unwrap();
        assert!((loss - 0.3125).abs() < 1e-12);
    }

    #[rstest]
    fn concrete_loss_f32(concrete: Batch) {
        let cast = |x: &Array3<f64>| x.mapv(|v| v as f32);
        let predicted = cast(&concrete.predicted);
        let target_values = cast(&concrete.target_values);
        let expected_values = cast(&concrete.expected_values);
        let rewards = cast(&concrete.rewards);
        let behavior_log_probs = concrete.behavior_log_probs.mapv(|v| v as f32);
        let target_log_probs = cast(&concrete.target_log_probs);
        let inputs = ArrayInputs {
            predicted: predicted.view(),
            target_values: target_values.view(),
            expected_values: expected_values.view(),
            rewards: rewards.view(),
            behavior_log_probs: behavior_log_probs.view(),
            target_log_probs: target_log_probs.view(),
        };
        let loss: f32 = UNDISCOUNTED.array_loss(&inputs).unwrap();
        assert!((loss - 0.3125).abs() < 1e-6);
    }

    #[test]
    fn broadcast_rewards_and_log_probs() {
        let batch = Batch {
            predicted: Array3::zeros((1, 3, 2)),
            target_values: arr3(&[[[0.0, 0.0], [1.0, 2.0], [3.0, 4.0]]]),
            expected_values: Array3::zeros((1, 3, 2)),
            rewards: seq(&[1.0, 2.0, 3.0]),
            behavior_log_probs: Array2::zeros((1, 3)),
            target_log_probs: seq(&[0.0, 0.0, 0.0]),
        };
        let (targets, _) = UNDISCOUNTED.array_targets(&batch.inputs()).unwrap();
        assert_eq!(targets, arr3(&[[[5.0, 5.0], [5.0, 6.0]]]));
    }

    #[rstest]
    fn squared_error(concrete: Batch) {
        let loss = RetraceLoss::new(1.0, Distance::SquaredError)
            .array_loss(&concrete.inputs())
            .unwrap();
        assert!((loss - 0.625).abs() < 1e-12);
    }

    #[test]
    fn single_step_fails() {
        let x = seq(&[1.0]);
        let behavior = arr2(&[[0.0]]);
        let inputs = ArrayInputs {
            predicted: x.view(),
            target_values: x.view(),
            expected_values: x.view(),
            rewards: x.view(),
            behavior_log_probs: behavior.view(),
            target_log_probs: x.view(),
        };
        assert_eq!(
            RetraceLoss::default().array_loss(&inputs),
            Err(ShapeError::TooFewSteps { steps: 1 })
        );
    }

    #[rstest]
    fn rewards_wrong_heads(concrete: Batch) {
        let batch = Batch {
            rewards: Array3::zeros((1, 3, 2)),
            ..concrete
        };
        assert!(matches!(
            batch.inputs().shape(),
            Err(ShapeError::Mismatch {
                name: "rewards",
                ..
            })
        ));
    }

    fn uniform(rng: &mut ChaCha8Rng, len: usize, low: f64, high: f64) -> Vec<f64> {
        (0..len).map(|_| rng.gen_range(low..high)).collect()
    }

    #[rstest]
    #[case(Distance::SmoothL1, 1)]
    #[case(Distance::SmoothL1, 2)]
    #[case(Distance::SquaredError, 3)]
    #[allow(clippy::cast_possible_wrap)]
    fn matches_torch_backend(#[case] distance: Distance, #[case] seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (b, t, d) = (3, 7, 2);
        let predicted = uniform(&mut rng, b * t * d, -5.0, 5.0);
        let target_values = uniform(&mut rng, b * t * d, -5.0, 5.0);
        let expected_values = uniform(&mut rng, b * t * d, -5.0, 5.0);
        let rewards = uniform(&mut rng, b * t, -1.0, 1.0);
        let behavior_log_probs = uniform(&mut rng, b * t, -3.0, 0.0);
        let target_log_probs = uniform(&mut rng, b * t * d, -3.0, 0.0);

        let full = |x: &[f64]| Array3::from_shape_vec((b, t, d), x.to_vec()).unwrap();
        let batch = Batch {
            predicted: full(&predicted),
            target_values: full(&target_values),
            expected_values: full(&expected_values),
            rewards: Array3::from_shape_vec((b, t, 1), rewards.clone()).unwrap(),
            behavior_log_probs: Array2::from_shape_vec((b, t), behavior_log_probs.clone())
                .unwrap(),
            target_log_probs: full(&target_log_probs),
        };

        let dims = (b as i64, t as i64, d as i64);
        let tensor = |x: &[f64]| Tensor::of_slice(x).view(dims);
        let predicted = tensor(&predicted);
        let target_values = tensor(&target_values);
        let expected_values = tensor(&expected_values);
        let rewards = Tensor::of_slice(&rewards).view((dims.0, dims.1, 1));
        let behavior_log_probs = Tensor::of_slice(&behavior_log_probs).view((dims.0, dims.1));
        let target_log_probs = tensor(&target_log_probs);
        let tensor_inputs = RetraceInputs {
            predicted: &predicted,
            target_values: &target_values,
            expected_values: &expected_values,
            rewards: &rewards,
            behavior_log_probs: &behavior_log_probs,
            target_log_probs: &target_log_probs,
        };

        let loss_fn = RetraceLoss::new(0.9, distance);
        let (array_targets, stats) = loss_fn.array_targets(&batch.inputs()).unwrap();
        let tensor_targets = loss_fn.targets(&tensor_inputs).unwrap();
        assert_eq!(stats.total, (b * (t - 1) * d) as u64);
        for ((i, j, k), &expected) in array_targets.indexed_iter() {
            let actual = tensor_targets
                .tensor()
                .double_value(&[i as i64, j as i64, k as i64]);
            assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
        }

        let array_loss = loss_fn.array_loss(&batch.inputs()).unwrap();
        let tensor_loss = loss_fn
            .loss(&tensor_inputs, &mut ())
            .unwrap()
            .double_value(&[]);
        assert!((array_loss - tensor_loss).abs() < 1e-9);
    }

    #[test]
    fn distance_shape_mismatch() {
        let a = Array3::<f64>::zeros((1, 2, 1));
        let b = Array3::<f64>::zeros((1, 3, 1));
        assert!(matches!(
            Distance::SmoothL1.array_loss(a.view(), b.view()),
            Err(ShapeError::Mismatch { .. })
        ));
    }
}
