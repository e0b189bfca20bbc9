//! Retrace targets
use super::tensor_shape;
use crate::error::ShapeError;
use tch::Tensor;

/// Aligned per-step inputs to the Retrace recursion. All have shape `[B, N, D]`.
///
/// Index `j` refers to the update of the prediction at timestep `j`:
/// `rewards` hold timesteps `0 ..= N-1` while the bootstrap tensors hold timesteps `1 ..= N`.
#[derive(Debug, Copy, Clone)]
pub struct AlignedSteps<'a> {
    /// Rewards of the predicted timesteps.
    pub rewards: &'a Tensor,
    /// Target-network expected values of the following timesteps.
    pub expected_values: &'a Tensor,
    /// Target-network action values of the following timesteps.
    pub bootstrap_values: &'a Tensor,
    /// Trace-cut importance weights of the following timesteps.
    pub weights: &'a Tensor,
}

/// Retrace targets for predicted action values. `[B, N, D]`
///
/// A plain value: the tensor is built without gradient tracking and has no connection to the
/// computation graph of the predictions it is compared against.
#[derive(Debug, PartialEq)]
pub struct RetraceTargets(Tensor);

impl RetraceTargets {
    /// Compute Retrace targets by a backward pass over time.
    ///
    /// ```text
    /// target[N-1] = r[N-1] + γ (E[N-1] + c[N-1] Q[N-1])
    /// target[j]   = r[j]   + γ (E[j]   + c[j] (target[j+1] - Q[j]))
    /// ```
    /// Each step depends on its successor so the steps are evaluated strictly from last to
    /// first. Within a step all trajectories and heads are updated together.
    ///
    /// # Errors
    /// If the inputs are not all `[B, N, D]` with `N >= 1`.
    #[allow(clippy::cast_possible_wrap)]
    pub fn from_aligned(gamma: f64, steps: &AlignedSteps) -> Result<Self, ShapeError> {
        let shape = tensor_shape(steps.rewards);
        let num_steps = match *shape {
            [_, n, _] if n >= 1 => n as i64,
            [_, n, _] => return Err(ShapeError::TooFewSteps { steps: n + 1 }),
            _ => {
                return Err(ShapeError::WrongDims {
                    name: "rewards",
                    expected: 3,
                    actual: shape,
                })
            }
        };
        for (name, tensor) in [
            ("expected_values", steps.expected_values),
            ("bootstrap_values", steps.bootstrap_values),
            ("weights", steps.weights),
        ] {
            let actual = tensor_shape(tensor);
            if actual != shape {
                return Err(ShapeError::Mismatch {
                    name,
                    expected: shape,
                    actual,
                });
            }
        }

        let targets = tch::no_grad(|| {
            let step = |j: i64| {
                (
                    steps.rewards.select(1, j),
                    steps.expected_values.select(1, j),
                    steps.bootstrap_values.select(1, j),
                    steps.weights.select(1, j),
                )
            };

            let last = num_steps - 1;
            let (reward, expected, bootstrap, weight) = step(last);
            let mut rev_targets = Vec::with_capacity(num_steps as usize);
            rev_targets.push(reward + (expected + weight * bootstrap) * gamma);

            for j in (0..last).rev() {
                let (reward, expected, bootstrap, weight) = step(j);
                let successor = &rev_targets[rev_targets.len() - 1];
                let target = reward + (expected + weight * (successor - bootstrap)) * gamma;
                rev_targets.push(target);
            }

            rev_targets.reverse();
            Tensor::stack(&rev_targets, 1).detach()
        });
        Ok(Self(targets))
    }

    /// Retrace target tensor. `[B, N, D]`
    #[inline]
    pub const fn tensor(&self) -> &Tensor {
        &self.0
    }

    #[inline]
    pub fn into_tensor(self) -> Tensor {
        self.0
    }
}
