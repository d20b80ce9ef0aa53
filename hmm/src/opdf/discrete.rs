use super::{normalized_weights, Opdf};
use crate::error::{HmmError, Result};
use rand::Rng;
use rv::prelude::{Categorical, Rv};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Distribution over the symbols `0..nb_entries`.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct OpdfDiscrete {
    probabilities: Vec<f64>,
    dist: Categorical,
}

impl OpdfDiscrete {
    /// Create a distribution from the probability of each symbol.
    ///
    /// # Errors
    /// Fails if `probabilities` is empty, has a negative entry or does not sum
    /// to one.
    pub fn new(probabilities: &[f64]) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(HmmError::invalid("a discrete distribution needs symbols"));
        }
        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > 1E-6 {
            return Err(HmmError::invalid(format!(
                "probabilities sum to {sum}, not 1"
            )));
        }
        let dist = Categorical::new(probabilities)
            .map_err(|e| HmmError::invalid(e.to_string()))?;
        Ok(Self {
            probabilities: probabilities.to_vec(),
            dist,
        })
    }

    /// Uniform distribution over `nb_entries` symbols.
    ///
    /// # Errors
    /// Fails if `nb_entries` is 0.
    pub fn uniform(nb_entries: usize) -> Result<Self> {
        Self::new(&vec![1.0 / nb_entries as f64; nb_entries])
    }

    /// Number of symbols.
    #[must_use]
    pub fn nb_entries(&self) -> usize {
        self.probabilities.len()
    }

    /// Probability of each symbol.
    #[must_use]
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }
}

impl Opdf for OpdfDiscrete {
    type Observation = usize;

    fn probability(&self, o: &usize) -> f64 {
        self.probabilities.get(*o).copied().unwrap_or(0.0)
    }

    fn validate(&self, o: &usize) -> Result<()> {
        if *o < self.nb_entries() {
            Ok(())
        } else {
            Err(HmmError::invalid(format!(
                "symbol {o} outside of 0..{}",
                self.nb_entries()
            )))
        }
    }

    fn fit(&mut self, observations: &[usize], weights: &[f64]) -> Result<()> {
        let weights = normalized_weights(observations.len(), weights)?;
        let mut counts = vec![0.0; self.nb_entries()];
        for (o, w) in observations.iter().zip(weights.iter()) {
            self.validate(o)?;
            counts[*o] += w;
        }
        let total: f64 = counts.iter().sum();
        counts.iter_mut().for_each(|c| *c /= total);
        *self = Self::new(&counts)?;
        Ok(())
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> usize {
        let symbol: usize = self.dist.draw(rng);
        symbol
    }
}

impl fmt::Display for OpdfDiscrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Discrete distribution ---")?;
        for p in &self.probabilities {
            write!(f, " {p:.3}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn rejects_unnormalized() {
        assert!(OpdfDiscrete::new(&[0.5, 0.6]).is_err());
        assert!(OpdfDiscrete::new(&[]).is_err());
        assert!(OpdfDiscrete::uniform(0).is_err());
    }

    #[test]
    fn weighted_fit() {
        let mut opdf = OpdfDiscrete::uniform(3).unwrap();
        opdf.fit(&[0, 1, 1, 2], &[1.0, 1.0, 1.0, 1.0]).unwrap();
        for (p, e) in opdf.probabilities().iter().zip([0.25, 0.5, 0.25]) {
            assert::close(*p, e, 1E-12);
        }

        opdf.fit(&[0, 2], &[3.0, 1.0]).unwrap();
        assert::close(opdf.probability(&0), 0.75, 1E-12);
        assert::close(opdf.probability(&1), 0.0, 1E-12);
        assert::close(opdf.probability(&7), 0.0, 1E-12);
    }

    #[test]
    fn out_of_range_symbol_fails_fit() {
        let mut opdf = OpdfDiscrete::uniform(2).unwrap();
        assert!(matches!(
            opdf.fit(&[0, 4], &[0.5, 0.5]),
            Err(HmmError::InvalidArgument(_))
        ));
    }

    #[test]
    fn draws_follow_probabilities() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        let opdf = OpdfDiscrete::new(&[0.1, 0.9]).unwrap();
        let ones = (0..5_000).filter(|_| opdf.draw(&mut rng) == 1).count();
        assert::close(ones as f64 / 5_000.0, 0.9, 0.03);
    }
}
