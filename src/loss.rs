//! Retrace loss configuration
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Distance between predicted values and their Retrace targets.
///
/// Both distances are reduced by taking the mean over all elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distance {
    /// Huber penalty with a threshold of 1 (smooth L1).
    ///
    /// `0.5 * r^2` if `|r| < 1` and `|r| - 0.5` otherwise.
    /// Quadratic near zero and linear in the tails so that a single badly wrong return estimate
    /// does not dominate the gradient.
    SmoothL1,
    /// Squared error `r^2`.
    SquaredError,
}

impl Default for Distance {
    #[inline]
    fn default() -> Self {
        Self::SmoothL1
    }
}

impl Distance {
    /// Penalty of a single residual `r = predicted - target`.
    pub fn penalty<F: Float>(self, residual: F) -> F {
        let half = F::one() / (F::one() + F::one());
        match self {
            Self::SmoothL1 => {
                let abs = residual.abs();
                if abs < F::one() {
                    half * residual * residual
                } else {
                    abs - half
                }
            }
            Self::SquaredError => residual * residual,
        }
    }
}

/// Retrace loss for off-policy action value estimation.
///
/// Regresses predicted action values towards Retrace targets: corrected multi-step returns
/// built by a backward recursion over each trajectory in which the bootstrap trace is cut by
/// the target/behavior importance weight `min(1, π(a|s) / μ(a|s))`.
///
/// For aligned steps `j = 0 .. N-1` (where `N = T - 1`):
/// ```text
/// target[N-1] = r[N-1] + γ (E[N-1] + c[N-1] Q[N-1])
/// target[j]   = r[j]   + γ (E[j]   + c[j] (target[j+1] - Q[j]))
/// ```
/// where `r` are the rewards of steps `0 .. T-2` and the expected values `E`,
/// target-network action values `Q` and weights `c` are taken from steps `1 .. T-1`.
///
/// The targets are constants: no gradient flows through their construction.
///
/// # Reference
/// "[Safe and Efficient Off-Policy Reinforcement Learning][retrace]" by Munos et al.
///
/// [retrace]: https://arxiv.org/abs/1606.02647
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetraceLoss {
    /// Discount factor on future rewards. In `[0, 1]`.
    pub gamma: f64,
    /// Distance between predictions and targets.
    pub distance: Distance,
}

impl Default for RetraceLoss {
    #[inline]
    fn default() -> Self {
        Self {
            gamma: 0.99,
            distance: Distance::default(),
        }
    }
}

impl RetraceLoss {
    #[must_use]
    #[inline]
    pub const fn new(gamma: f64, distance: Distance) -> Self {
        Self { gamma, distance }
    }

    /// Discount factor converted to the element type `F`.
    pub(crate) fn gamma_as<F: Float>(&self) -> F {
        F::from(self.gamma).unwrap_or_else(F::nan)
    }
}
