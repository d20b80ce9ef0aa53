use super::{normalized_weights, Opdf, MIN_VARIANCE};
use crate::error::{HmmError, Result};
use rand::Rng;
use rv::prelude::{Gaussian, Rv};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Univariate Gaussian distribution over real observations.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct OpdfGaussian {
    mean: f64,
    variance: f64,
    dist: Gaussian,
}

impl OpdfGaussian {
    /// Create a Gaussian with the given mean and variance.
    ///
    /// # Errors
    /// Fails unless `variance` is positive and both parameters are finite.
    pub fn new(mean: f64, variance: f64) -> Result<Self> {
        if variance <= 0.0 || !variance.is_finite() {
            return Err(HmmError::invalid(format!(
                "variance must be positive, got {variance}"
            )));
        }
        let dist = Gaussian::new(mean, variance.sqrt())
            .map_err(|e| HmmError::invalid(e.to_string()))?;
        Ok(Self {
            mean,
            variance,
            dist,
        })
    }

    /// Mean of the distribution.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Variance of the distribution.
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Default for OpdfGaussian {
    /// The standard normal distribution.
    fn default() -> Self {
        Self {
            mean: 0.0,
            variance: 1.0,
            dist: Gaussian::standard(),
        }
    }
}

impl Opdf for OpdfGaussian {
    type Observation = f64;

    fn probability(&self, o: &f64) -> f64 {
        self.dist.f(o)
    }

    fn ln_probability(&self, o: &f64) -> f64 {
        self.dist.ln_f(o)
    }

    fn fit(&mut self, observations: &[f64], weights: &[f64]) -> Result<()> {
        let weights = normalized_weights(observations.len(), weights)?;
        let mean: f64 = observations
            .iter()
            .zip(weights.iter())
            .map(|(x, w)| x * w)
            .sum();
        let variance: f64 = observations
            .iter()
            .zip(weights.iter())
            .map(|(x, w)| w * (x - mean) * (x - mean))
            .sum();
        *self = Self::new(mean, variance.max(MIN_VARIANCE))?;
        Ok(())
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        self.dist.draw(rng)
    }
}

impl fmt::Display for OpdfGaussian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Gaussian distribution --- Mean: {:.3} Variance {:.3}",
            self.mean, self.variance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_variance() {
        assert!(OpdfGaussian::new(0.0, 0.0).is_err());
        assert!(OpdfGaussian::new(0.0, -1.0).is_err());
        assert!(OpdfGaussian::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn density_matches_normal() {
        let opdf = OpdfGaussian::new(1.0, 4.0).unwrap();
        let expected = (-0.5_f64 * 0.25).exp() / (2.0 * std::f64::consts::PI * 4.0).sqrt();
        assert::close(opdf.probability(&2.0), expected, 1E-12);
    }

    #[test]
    fn weighted_fit() {
        let mut opdf = OpdfGaussian::default();
        opdf.fit(&[1.0, 3.0, 100.0], &[0.5, 0.5, 0.0]).unwrap();
        assert::close(opdf.mean(), 2.0, 1E-12);
        assert::close(opdf.variance(), 1.0, 1E-12);
    }

    #[test]
    fn single_point_fit_keeps_positive_variance() {
        let mut opdf = OpdfGaussian::default();
        opdf.fit_uniform(&[5.0, 5.0]).unwrap();
        assert::close(opdf.mean(), 5.0, 1E-12);
        assert!(opdf.variance() > 0.0);
        assert!(opdf.probability(&5.0).is_finite());
    }
}
