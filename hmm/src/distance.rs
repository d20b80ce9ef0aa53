//! Distance between two models
use crate::error::{HmmError, Result};
use crate::generator::MarkovGenerator;
use crate::hmm::Hmm;
use crate::opdf::Opdf;
use rand::Rng;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Monte-Carlo estimate of the Kullback-Leibler distance between two
/// [`Hmm`]s.
///
/// Sequences are sampled from the first model and the per-observation
/// log-likelihood ratio is averaged over them. The estimate is not
/// symmetric.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct KullbackLeiblerDistance {
    nb_sequences: usize,
    sequence_length: usize,
}

impl Default for KullbackLeiblerDistance {
    fn default() -> Self {
        Self {
            nb_sequences: 10,
            sequence_length: 1000,
        }
    }
}

impl KullbackLeiblerDistance {
    /// Create a new estimator.
    ///
    /// # Errors
    /// `InvalidArgument` when either count is zero.
    pub fn new(nb_sequences: usize, sequence_length: usize) -> Result<Self> {
        if nb_sequences == 0 || sequence_length == 0 {
            return Err(HmmError::invalid(
                "number and length of sampled sequences must be positive",
            ));
        }
        Ok(Self {
            nb_sequences,
            sequence_length,
        })
    }

    /// Number of sampled sequences.
    #[must_use]
    pub fn nb_sequences(&self) -> usize {
        self.nb_sequences
    }

    /// Length of each sampled sequence.
    #[must_use]
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Estimate D(`hmm1` || `hmm2`) in nats per observation.
    ///
    /// The result is infinite when `hmm2` cannot produce a sequence drawn
    /// from `hmm1`.
    ///
    /// # Errors
    /// `InvalidArgument` when a sampled observation cannot be evaluated by
    /// either model.
    pub fn distance<D: Opdf, R: Rng>(
        &self,
        hmm1: &Hmm<D>,
        hmm2: &Hmm<D>,
        rng: &mut R,
    ) -> Result<f64> {
        let mut generator = MarkovGenerator::new(hmm1, rng);
        let mut total = 0.0;
        for _ in 0..self.nb_sequences {
            let seq = generator.observation_sequence(self.sequence_length, rng);
            let ln_p1 = hmm1.ln_probability(&seq)?;
            let ln_p2 = hmm2.ln_probability(&seq)?;
            total += (ln_p1 - ln_p2) / self.sequence_length as f64;
        }
        Ok(total / self.nb_sequences as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opdf::OpdfDiscrete;
    use ndarray::array;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn biased(p: f64) -> Hmm<OpdfDiscrete> {
        Hmm::from_parts(
            array![1.0],
            array![[1.0]],
            vec![OpdfDiscrete::new(&[p, 1.0 - p]).unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn identical_models_are_at_distance_zero() {
        let mut rng = SmallRng::seed_from_u64(0x1234);
        let kl = KullbackLeiblerDistance::new(3, 200).unwrap();
        let hmm = biased(0.3);
        assert::close(kl.distance(&hmm, &hmm, &mut rng).unwrap(), 0.0, 1E-12);
    }

    #[test]
    fn single_state_matches_closed_form() {
        let mut rng = SmallRng::seed_from_u64(0x1234);
        let kl = KullbackLeiblerDistance::default();
        let (p, q) = (0.2_f64, 0.6_f64);
        let expected = p * (p / q).ln() + (1.0 - p) * ((1.0 - p) / (1.0 - q)).ln();
        let d = kl.distance(&biased(p), &biased(q), &mut rng).unwrap();
        assert::close(d, expected, 0.02);
    }

    #[test]
    fn zero_counts_rejected() {
        assert!(KullbackLeiblerDistance::new(0, 10).is_err());
        assert!(KullbackLeiblerDistance::new(10, 0).is_err());
    }
}
