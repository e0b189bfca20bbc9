//! Timestep alignment
//!
//! The value prediction at step `t` is trained against a target that bootstraps from
//! step `t + 1`. Tensors on the prediction side are viewed with [`drop_last`] and tensors on
//! the bootstrap side with [`drop_first`] so that index `j` of both refers to the same update.
use crate::error::ShapeError;
use tch::Tensor;

/// Index of the time dimension.
pub const TIME_DIM: i64 = 1;

/// View of the first `T - 1` timesteps (indices `0 ..= T-2`).
///
/// # Errors
/// If the tensor has no time dimension or fewer than 2 timesteps.
pub fn drop_last(x: &Tensor) -> Result<Tensor, ShapeError> {
    let num_steps = num_steps(x)?;
    Ok(x.narrow(TIME_DIM, 0, num_steps - 1))
}

/// View of the last `T - 1` timesteps (indices `1 ..= T-1`).
///
/// # Errors
/// If the tensor has no time dimension or fewer than 2 timesteps.
pub fn drop_first(x: &Tensor) -> Result<Tensor, ShapeError> {
    let num_steps = num_steps(x)?;
    Ok(x.narrow(TIME_DIM, 1, num_steps - 1))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn num_steps(x: &Tensor) -> Result<i64, ShapeError> {
    let size = x.size();
    let num_steps = *size
        .get(TIME_DIM as usize)
        .ok_or(ShapeError::MissingTimeAxis { dims: size.len() })?;
    if num_steps < 2 {
        return Err(ShapeError::TooFewSteps {
            steps: num_steps as usize,
        });
    }
    Ok(num_steps)
}
