//! Emission (observation) probability distributions
//!
//! Every state of a model owns an [`Opdf`]: something that can evaluate the
//! likelihood of an observation, refit itself from weighted observations and
//! draw new observations.

use crate::error::{HmmError, Result};
use rand::Rng;

mod discrete;
pub use discrete::OpdfDiscrete;

mod gaussian;
pub use gaussian::OpdfGaussian;

mod multi_gaussian;
pub use multi_gaussian::OpdfMultiGaussian;

/// Floor applied to fitted variances so a refit never yields a singular
/// distribution.
pub const MIN_VARIANCE: f64 = 1E-10;

/// Observation probability distribution attached to a state.
pub trait Opdf: Clone + Send + Sync {
    /// Type of the observations this distribution is defined over.
    type Observation: Clone + Send + Sync;

    /// Probability (mass or density) of `o`.
    fn probability(&self, o: &Self::Observation) -> f64;

    /// Natural log of [`Opdf::probability`].
    fn ln_probability(&self, o: &Self::Observation) -> f64 {
        self.probability(o).ln()
    }

    /// Check that `o` can be evaluated by this distribution.
    ///
    /// # Errors
    /// `InvalidArgument` when `o` is outside the support's shape (bad
    /// dimension, symbol out of range).
    fn validate(&self, _o: &Self::Observation) -> Result<()> {
        Ok(())
    }

    /// Replace the parameters with the maximum weighted likelihood estimate.
    ///
    /// Weights need not be normalized but must have a positive finite sum.
    ///
    /// # Errors
    /// `InvalidArgument` on empty input, length mismatch, invalid weights or
    /// observations this distribution cannot represent.
    fn fit(
        &mut self,
        observations: &[Self::Observation],
        weights: &[f64],
    ) -> Result<()>;

    /// [`Opdf::fit`] with every observation weighted equally.
    ///
    /// # Errors
    /// Same as [`Opdf::fit`].
    fn fit_uniform(&mut self, observations: &[Self::Observation]) -> Result<()> {
        let w = vec![1.0; observations.len()];
        self.fit(observations, &w)
    }

    /// Draw a random observation.
    fn draw<R: Rng>(&self, rng: &mut R) -> Self::Observation;
}

/// Validate fit arguments and return the weights scaled to sum to one.
pub(crate) fn normalized_weights(
    nb_observations: usize,
    weights: &[f64],
) -> Result<Vec<f64>> {
    if nb_observations == 0 {
        return Err(HmmError::invalid("cannot fit on an empty observation set"));
    }
    if weights.len() != nb_observations {
        return Err(HmmError::invalid(format!(
            "{} weights given for {} observations",
            weights.len(),
            nb_observations
        )));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(HmmError::invalid(format!("invalid weight {w}")));
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return Err(HmmError::invalid("weights must have a positive sum"));
    }
    Ok(weights.iter().map(|w| w / sum).collect())
}
