//! Error types
use tch::{Device, TchError};
use thiserror::Error;

/// Invalid tensor or array shape.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeError {
    #[error("trajectories have {steps} timesteps; at least 2 are required")]
    TooFewSteps { steps: usize },
    #[error("trajectories have shape {shape:?}; batch and head dimensions must be nonempty")]
    Empty { shape: Vec<usize> },
    #[error("input has {dims} dimension(s); a time axis at dimension 1 is required")]
    MissingTimeAxis { dims: usize },
    #[error("\"{name}\" has shape {actual:?}; expected {expected} dimensions")]
    WrongDims {
        name: &'static str,
        expected: usize,
        actual: Vec<usize>,
    },
    #[error("\"{name}\" has shape {actual:?}; expected {expected:?}")]
    Mismatch {
        name: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Error computing a Retrace loss.
#[derive(Error, Debug)]
pub enum RetraceError {
    #[error("invalid input shape")]
    Shape(#[from] ShapeError),
    #[error("\"{name}\" is on device {actual:?}; expected {expected:?}")]
    DeviceMismatch {
        name: &'static str,
        expected: Device,
        actual: Device,
    },
    #[error("torch error")]
    Torch(#[from] TchError),
}

/// Advisory warning: some log importance ratios were outside the representable weight range.
///
/// These ratios are clamped rather than rejected:
/// `+inf` gives a weight of 1, `-inf` and `NaN` give a weight of 0,
/// and finite ratios too negative to exponentiate give the smallest positive weight.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[error(
    "{non_finite} non-finite and {underflowed} underflowing of {total} log importance ratios \
     have been clamped"
)]
pub struct NumericInstabilityWarning {
    pub non_finite: u64,
    pub underflowed: u64,
    pub total: u64,
}
