//! Accessor contract shared by the plain and the input-driven models

use crate::error::{HmmError, Result};
use crate::opdf::Opdf;
use approx::abs_diff_eq;
use ndarray::{Array2, ArrayView1};

/// Tolerance used when checking that probability vectors sum to one.
pub const STOCHASTIC_TOLERANCE: f64 = 1E-6;

/// Read access to the parameters of a hidden Markov model.
///
/// Transitions are grouped in *buckets*: a plain model has a single bucket,
/// an input-driven model has one per input value. The bucket of a step is
/// selected by the item observed at that step.
pub trait MarkovModel: Clone + Send + Sync {
    /// One element of an observation sequence.
    type Item: Clone + Send + Sync;

    /// Number of hidden states.
    fn nb_states(&self) -> usize;

    /// Number of transition buckets.
    fn nb_buckets(&self) -> usize;

    /// Bucket selected by `item`.
    ///
    /// # Errors
    /// `InvalidArgument` when the item refers to an unknown input.
    fn bucket(&self, item: &Self::Item) -> Result<usize>;

    /// Probability of starting in state `i`.
    fn pi(&self, i: usize) -> f64;

    /// Probability of moving from `i` to `j` within `bucket`.
    fn transition(&self, i: usize, bucket: usize, j: usize) -> f64;

    /// Probability that state `i` emits `item`.
    ///
    /// # Errors
    /// `InvalidArgument` when the emission distribution cannot evaluate the
    /// item.
    fn emission(&self, i: usize, item: &Self::Item) -> Result<f64>;
}

/// Write access used by the learners between iterations.
pub trait Trainable: MarkovModel {
    /// Replace the initial probability of state `i`.
    fn set_pi(&mut self, i: usize, value: f64);

    /// Replace the transition probability from `i` to `j` within `bucket`.
    fn set_transition(&mut self, i: usize, bucket: usize, j: usize, value: f64);

    /// Refit every emission distribution from the state posteriors.
    ///
    /// Each entry pairs a sequence with its `T x nb_states` posterior matrix.
    ///
    /// # Errors
    /// Propagates the errors of [`Opdf::fit`].
    fn refit_emissions(
        &mut self,
        sequences: &[(&[Self::Item], &Array2<f64>)],
    ) -> Result<()>;
}

/// Check that `row` is a probability vector.
pub(crate) fn check_stochastic(row: ArrayView1<f64>, what: &str) -> Result<()> {
    if let Some(p) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(HmmError::invalid(format!("{what} has invalid entry {p}")));
    }
    let sum = row.sum();
    if abs_diff_eq!(sum, 1.0, epsilon = STOCHASTIC_TOLERANCE) {
        Ok(())
    } else {
        Err(HmmError::invalid(format!("{what} sums to {sum}, not 1")))
    }
}

/// Refit `opdf` on `observations`; skipped when the weights carry no mass.
///
/// Returns whether the distribution was refit.
pub(crate) fn refit_opdf<D: Opdf>(
    opdf: &mut D,
    observations: &[D::Observation],
    mut weights: Vec<f64>,
) -> Result<bool> {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return Ok(false);
    }
    weights.iter_mut().for_each(|w| *w /= sum);
    opdf.fit(observations, &weights)?;
    Ok(true)
}
