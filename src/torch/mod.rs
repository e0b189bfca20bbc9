//! Differentiable Retrace loss on torch tensors
pub mod align;
mod distance;
mod loss;
mod targets;
mod weights;

pub use targets::{AlignedSteps, RetraceTargets};
pub use weights::ImportanceWeights;

use crate::error::{RetraceError, ShapeError};
use crate::shape::{HeadBroadcast, TrajectoryShape};
use tch::Tensor;

/// Inputs to the Retrace loss for a batch of trajectories.
///
/// All per-head tensors are batch-first and time-second: `[B, T, D]`.
/// The fields are named so that the differently-shifted inputs cannot be silently transposed.
#[derive(Debug, Copy, Clone)]
pub struct RetraceInputs<'a> {
    /// Action value predictions being trained. `[B, T, D]`
    pub predicted: &'a Tensor,
    /// Target-network action values of the taken actions. `[B, T, D]`
    pub target_values: &'a Tensor,
    /// Target-network expected state values under the target policy. `[B, T, D]`
    pub expected_values: &'a Tensor,
    /// Observed rewards. `[B, T, D]` or `[B, T, 1]`
    pub rewards: &'a Tensor,
    /// Log probability of each taken action under the behavior policy. `[B, T]`
    pub behavior_log_probs: &'a Tensor,
    /// Log probability of each taken action under the target policy. `[B, T, D]` or `[B, T, 1]`
    pub target_log_probs: &'a Tensor,
}

impl<'a> RetraceInputs<'a> {
    /// Validate the input shapes and devices.
    ///
    /// # Errors
    /// * [`RetraceError::Shape`] if the shapes are mutually inconsistent or `T < 2`.
    /// * [`RetraceError::DeviceMismatch`] if any input is on a different device than `predicted`.
    pub fn shape(&self) -> Result<TrajectoryShape, RetraceError> {
        let shape = TrajectoryShape::from_predicted(&tensor_shape(self.predicted))?;
        shape.check("target_values", &tensor_shape(self.target_values))?;
        shape.check("expected_values", &tensor_shape(self.expected_values))?;
        shape.head_broadcast("rewards", &tensor_shape(self.rewards))?;
        shape.check_steps("behavior_log_probs", &tensor_shape(self.behavior_log_probs))?;
        shape.head_broadcast("target_log_probs", &tensor_shape(self.target_log_probs))?;

        let device = self.predicted.device();
        for (name, tensor) in [
            ("target_values", self.target_values),
            ("expected_values", self.expected_values),
            ("rewards", self.rewards),
            ("behavior_log_probs", self.behavior_log_probs),
            ("target_log_probs", self.target_log_probs),
        ] {
            if tensor.device() != device {
                return Err(RetraceError::DeviceMismatch {
                    name,
                    expected: device,
                    actual: tensor.device(),
                });
            }
        }
        Ok(shape)
    }
}

/// Shape of a tensor as unsigned sizes.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn tensor_shape(tensor: &Tensor) -> Vec<usize> {
    tensor.size().into_iter().map(|d| d as usize).collect()
}

/// Expand a `[B, T, 1]` tensor to the full `[B, T, D]` trajectory shape.
///
/// Returns a view; tensors that already have the full shape are returned as is.
#[allow(clippy::cast_possible_wrap)]
pub fn broadcast_heads(
    shape: &TrajectoryShape,
    name: &'static str,
    tensor: &Tensor,
) -> Result<Tensor, ShapeError> {
    match shape.head_broadcast(name, &tensor_shape(tensor))? {
        HeadBroadcast::Exact => Ok(tensor.shallow_clone()),
        HeadBroadcast::Expand => {
            let dims: Vec<i64> = shape.dims().iter().map(|&d| d as i64).collect();
            Ok(tensor.expand(&dims, false))
        }
    }
}
