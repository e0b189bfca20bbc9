//! Retrace off-policy action value targets and losses.
//!
//! [`RetraceLoss`] regresses predicted action values towards Retrace targets built from
//! batches of trajectories collected by a behavior policy.
//! The [`torch`] backend is differentiable with respect to the predictions.
//! The [`array`] backend computes the same values on ndarray arrays.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::for_kv_map)] // part of warn(clippy::all), specifically style?
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
pub mod array;
mod error;
pub mod logging;
mod loss;
mod shape;
mod stats;
pub mod torch;

pub use array::ArrayInputs;
pub use error::{NumericInstabilityWarning, RetraceError, ShapeError};
pub use logging::StatsLogger;
pub use loss::{Distance, RetraceLoss};
pub use shape::{HeadBroadcast, TrajectoryShape};
pub use stats::WeightStats;
pub use torch::{RetraceInputs, RetraceTargets};
