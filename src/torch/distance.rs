//! Distance between predicted values and targets
use super::RetraceTargets;
use crate::loss::Distance;
use tch::{Reduction, TchError, Tensor};

impl Distance {
    /// Mean distance between predicted values and their targets.
    ///
    /// Differentiable with respect to `predicted` only.
    ///
    /// # Args
    /// * `predicted` - Predicted values aligned with the targets. `[B, N, D]`
    /// * `targets` - Retrace targets. `[B, N, D]`
    ///
    /// # Returns
    /// A 0-dimensional tensor.
    pub fn tensor_loss(
        self,
        predicted: &Tensor,
        targets: &RetraceTargets,
    ) -> Result<Tensor, TchError> {
        match self {
            Self::SmoothL1 => predicted.f_smooth_l1_loss(targets.tensor(), Reduction::Mean, 1.0),
            Self::SquaredError => predicted.f_mse_loss(targets.tensor(), Reduction::Mean),
        }
    }
}
