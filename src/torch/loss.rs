//! Retrace loss on tensors
use super::{
    align, broadcast_heads, AlignedSteps, ImportanceWeights, RetraceInputs, RetraceTargets,
};
use crate::error::RetraceError;
use crate::logging::{ScopedLogger, StatsLogger};
use crate::loss::RetraceLoss;
use crate::shape::TrajectoryShape;
use std::time::Instant;
use tch::{Kind, Tensor};

impl RetraceLoss {
    /// Retrace targets for the predicted values of timesteps `0 ..= T-2`.
    ///
    /// # Returns
    /// Targets with shape `[B, T-1, D]`. They carry no gradient.
    ///
    /// # Errors
    /// If the input shapes are inconsistent, `T < 2`, or the inputs are on different devices.
    pub fn targets(&self, inputs: &RetraceInputs) -> Result<RetraceTargets, RetraceError> {
        let shape = inputs.shape()?;
        let (targets, _) = self.targets_and_weights(inputs, &shape)?;
        Ok(targets)
    }

    /// Retrace loss of the predicted values.
    ///
    /// Compares the predictions of timesteps `0 ..= T-2` with their Retrace targets
    /// using [`Self::distance`]. The prediction of the final timestep has no target.
    ///
    /// Loss statistics are logged to `logger` under the `retrace` scope.
    ///
    /// # Returns
    /// A 0-dimensional tensor, differentiable with respect to `inputs.predicted` only.
    ///
    /// # Errors
    /// If the input shapes are inconsistent, `T < 2`, or the inputs are on different devices.
    pub fn loss(
        &self,
        inputs: &RetraceInputs,
        logger: &mut dyn StatsLogger,
    ) -> Result<Tensor, RetraceError> {
        let shape = inputs.shape()?;

        let targets_start = Instant::now();
        let (targets, weights) = self.targets_and_weights(inputs, &shape)?;
        let targets_time = targets_start.elapsed();

        let predicted = align::drop_last(inputs.predicted)?;
        let loss = self.distance.tensor_loss(&predicted, &targets)?;

        let mut logger = ScopedLogger::new(logger, "retrace");
        logger.group_start();
        logger.log_scalar("loss", loss.double_value(&[]));
        logger.log_scalar(
            "target_mean",
            targets.tensor().mean(Kind::Double).double_value(&[]),
        );
        logger.log_scalar("weight_mean", weights.mean());
        logger.log_scalar("trace_cut_fraction", weights.stats().clipped_fraction());
        logger.log_duration("time", targets_time);
        if let Some(warning) = weights.stats().warning() {
            logger.log_counter_increment("non_finite_log_ratios", warning.non_finite);
            logger.log_counter_increment("underflowed_log_ratios", warning.underflowed);
            logger.log_message("numeric_instability", warning.to_string().into());
        }
        logger.group_end();

        Ok(loss)
    }

    fn targets_and_weights(
        &self,
        inputs: &RetraceInputs,
        shape: &TrajectoryShape,
    ) -> Result<(RetraceTargets, ImportanceWeights), RetraceError> {
        let target_log_probs =
            broadcast_heads(shape, "target_log_probs", inputs.target_log_probs)?;
        let weights =
            ImportanceWeights::from_log_probs(inputs.behavior_log_probs, &target_log_probs)?;

        let rewards = broadcast_heads(shape, "rewards", inputs.rewards)?;
        let targets = RetraceTargets::from_aligned(
            self.gamma,
            &AlignedSteps {
                rewards: &align::drop_last(&rewards)?,
                expected_values: &align::drop_first(inputs.expected_values)?,
                bootstrap_values: &align::drop_first(inputs.target_values)?,
                weights: weights.tensor(),
            },
        )?;
        Ok((targets, weights))
    }
}
