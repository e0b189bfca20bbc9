//! Trajectory batch shapes
use crate::error::ShapeError;

/// Shape of a batch of trajectories: `[batch_size, num_steps, num_heads]`.
///
/// Every per-head input is validated against the shape of the predicted values.
/// Inputs that are constant across heads may be supplied with a head dimension of 1 and are
/// explicitly [broadcast][TrajectoryShape::head_broadcast] to `num_heads`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TrajectoryShape {
    pub batch_size: usize,
    pub num_steps: usize,
    pub num_heads: usize,
}

/// How an input is brought to the full `[B, T, D]` trajectory shape.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HeadBroadcast {
    /// Already has shape `[B, T, D]`.
    Exact,
    /// Has shape `[B, T, 1]`; expand along the head dimension.
    Expand,
}

impl TrajectoryShape {
    /// Shape of a batch given the shape of its predicted values.
    ///
    /// # Errors
    /// * [`ShapeError::WrongDims`] if `shape` is not 3-dimensional.
    /// * [`ShapeError::TooFewSteps`] if there are fewer than 2 timesteps.
    /// * [`ShapeError::Empty`] if the batch or head dimension is empty.
    pub fn from_predicted(shape: &[usize]) -> Result<Self, ShapeError> {
        match *shape {
            [batch_size, num_steps, num_heads] => {
                if num_steps < 2 {
                    return Err(ShapeError::TooFewSteps { steps: num_steps });
                }
                if batch_size == 0 || num_heads == 0 {
                    return Err(ShapeError::Empty {
                        shape: shape.to_vec(),
                    });
                }
                Ok(Self {
                    batch_size,
                    num_steps,
                    num_heads,
                })
            }
            _ => Err(ShapeError::WrongDims {
                name: "predicted",
                expected: 3,
                actual: shape.to_vec(),
            }),
        }
    }

    #[must_use]
    pub const fn dims(&self) -> [usize; 3] {
        [self.batch_size, self.num_steps, self.num_heads]
    }

    /// Check that a per-head input has exactly this shape.
    pub fn check(&self, name: &'static str, shape: &[usize]) -> Result<(), ShapeError> {
        if shape.len() != 3 {
            return Err(ShapeError::WrongDims {
                name,
                expected: 3,
                actual: shape.to_vec(),
            });
        }
        if shape != self.dims() {
            return Err(self.mismatch(name, shape));
        }
        Ok(())
    }

    /// Check that a per-step input (no head dimension) has shape `[B, T]`.
    pub fn check_steps(&self, name: &'static str, shape: &[usize]) -> Result<(), ShapeError> {
        if shape.len() != 2 {
            return Err(ShapeError::WrongDims {
                name,
                expected: 2,
                actual: shape.to_vec(),
            });
        }
        if shape != [self.batch_size, self.num_steps] {
            return Err(ShapeError::Mismatch {
                name,
                expected: vec![self.batch_size, self.num_steps],
                actual: shape.to_vec(),
            });
        }
        Ok(())
    }

    /// Determine how a per-head input with shape `[B, T, D]` or `[B, T, 1]` is broadcast.
    pub fn head_broadcast(
        &self,
        name: &'static str,
        shape: &[usize],
    ) -> Result<HeadBroadcast, ShapeError> {
        match *shape {
            [b, t, d] if b == self.batch_size && t == self.num_steps => {
                if d == self.num_heads {
                    Ok(HeadBroadcast::Exact)
                } else if d == 1 {
                    Ok(HeadBroadcast::Expand)
                } else {
                    Err(self.mismatch(name, shape))
                }
            }
            [_, _, _] => Err(self.mismatch(name, shape)),
            _ => Err(ShapeError::WrongDims {
                name,
                expected: 3,
                actual: shape.to_vec(),
            }),
        }
    }

    fn mismatch(&self, name: &'static str, shape: &[usize]) -> ShapeError {
        ShapeError::Mismatch {
            name,
            expected: self.dims().to_vec(),
            actual: shape.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SHAPE: TrajectoryShape = TrajectoryShape {
        batch_size: 2,
        num_steps: 5,
        num_heads: 3,
    };

    #[test]
    fn from_predicted() {
        assert_eq!(TrajectoryShape::from_predicted(&[2, 5, 3]), Ok(SHAPE));
    }

    #[test]
    fn from_predicted_min_steps() {
        let shape = TrajectoryShape::from_predicted(&[1, 2, 1]).unwrap();
        assert_eq!(shape.dims(), [1, 2, 1]);
    }

    #[rstest]
    #[case::one_step(&[2, 1, 3], ShapeError::TooFewSteps { steps: 1 })]
    #[case::no_steps(&[2, 0, 3], ShapeError::TooFewSteps { steps: 0 })]
    #[case::empty_batch(&[0, 5, 3], ShapeError::Empty { shape: vec![0, 5, 3] })]
    #[case::no_heads(
        &[2, 5],
        ShapeError::WrongDims { name: "predicted", expected: 3, actual: vec![2, 5] }
    )]
    fn from_predicted_invalid(#[case] shape: &[usize], #[case] expected: ShapeError) {
        assert_eq!(TrajectoryShape::from_predicted(shape), Err(expected));
    }

    #[test]
    fn check_exact() {
        assert!(SHAPE.check("x", &[2, 5, 3]).is_ok());
        assert!(matches!(
            SHAPE.check("x", &[2, 5, 1]),
            Err(ShapeError::Mismatch { name: "x", .. })
        ));
    }

    #[test]
    fn check_steps() {
        assert!(SHAPE.check_steps("behavior", &[2, 5]).is_ok());
        assert!(matches!(
            SHAPE.check_steps("behavior", &[2, 5, 3]),
            Err(ShapeError::WrongDims { expected: 2, .. })
        ));
        assert!(matches!(
            SHAPE.check_steps("behavior", &[2, 4]),
            Err(ShapeError::Mismatch { .. })
        ));
    }

    #[rstest]
    #[case(&[2, 5, 3], Ok(HeadBroadcast::Exact))]
    #[case(&[2, 5, 1], Ok(HeadBroadcast::Expand))]
    #[case(&[2, 5, 2], Err(()))]
    #[case(&[2, 4, 1], Err(()))]
    #[case(&[2, 5], Err(()))]
    fn head_broadcast(#[case] shape: &[usize], #[case] expected: Result<HeadBroadcast, ()>) {
        assert_eq!(
            SHAPE.head_broadcast("rewards", shape).map_err(|_| ()),
            expected
        );
    }
}
