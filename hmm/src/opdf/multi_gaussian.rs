use super::{normalized_weights, Opdf, MIN_VARIANCE};
use crate::error::{HmmError, Result};
use crate::observation::ObservationVector;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rv::dist::MvGaussian;
use rv::traits::Rv;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Multivariate Gaussian distribution over [`ObservationVector`]s.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct OpdfMultiGaussian {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    dist: MvGaussian,
}

impl OpdfMultiGaussian {
    /// Create a multivariate Gaussian.
    ///
    /// # Errors
    /// Fails if the dimension is 0, the shapes disagree, or `covariance` is
    /// not symmetric positive definite.
    pub fn new(mean: &[f64], covariance: DMatrix<f64>) -> Result<Self> {
        if mean.is_empty() {
            return Err(HmmError::invalid("dimension must be strictly positive"));
        }
        if covariance.nrows() != mean.len() || covariance.ncols() != mean.len()
        {
            return Err(HmmError::invalid(format!(
                "covariance must be {0}x{0}, got {1}x{2}",
                mean.len(),
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        let mean = DVector::from_column_slice(mean);
        let dist = MvGaussian::new(mean.clone(), covariance.clone())
            .map_err(|e| HmmError::invalid(e.to_string()))?;
        Ok(Self {
            mean,
            covariance,
            dist,
        })
    }

    /// Zero-mean, identity-covariance Gaussian of the given dimension.
    ///
    /// # Errors
    /// Fails if `dimension` is 0.
    pub fn standard(dimension: usize) -> Result<Self> {
        Self::new(&vec![0.0; dimension], DMatrix::identity(dimension, dimension))
    }

    /// Dimension of the observations.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Mean vector.
    #[must_use]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Covariance matrix.
    #[must_use]
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }
}

impl Opdf for OpdfMultiGaussian {
    type Observation = ObservationVector;

    fn probability(&self, o: &ObservationVector) -> f64 {
        self.ln_probability(o).exp()
    }

    fn ln_probability(&self, o: &ObservationVector) -> f64 {
        if o.dimension() == self.dimension() {
            self.dist.ln_f(o.as_vector())
        } else {
            f64::NEG_INFINITY
        }
    }

    fn validate(&self, o: &ObservationVector) -> Result<()> {
        if o.dimension() == self.dimension() {
            Ok(())
        } else {
            Err(HmmError::invalid(format!(
                "observation of dimension {} given to a {}-dimensional Gaussian",
                o.dimension(),
                self.dimension()
            )))
        }
    }

    fn fit(
        &mut self,
        observations: &[ObservationVector],
        weights: &[f64],
    ) -> Result<()> {
        let weights = normalized_weights(observations.len(), weights)?;
        observations.iter().try_for_each(|o| self.validate(o))?;

        let d = self.dimension();
        let mean = observations
            .iter()
            .zip(weights.iter())
            .fold(DVector::zeros(d), |acc, (o, w)| acc + o.as_vector() * *w);
        let covariance = observations.iter().zip(weights.iter()).fold(
            DMatrix::identity(d, d) * MIN_VARIANCE,
            |acc, (o, w)| {
                let centered = o.as_vector() - &mean;
                acc + &centered * centered.transpose() * *w
            },
        );

        *self = Self::new(mean.as_slice(), covariance)?;
        Ok(())
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> ObservationVector {
        let x: DVector<f64> = self.dist.draw(rng);
        ObservationVector::from_vector(x)
    }
}

impl fmt::Display for OpdfMultiGaussian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multi-variate Gaussian distribution --- Mean: [")?;
        for m in self.mean.iter() {
            write!(f, " {m:.3}")?;
        }
        write!(f, " ]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(xs: &[f64]) -> ObservationVector {
        ObservationVector::new(xs).unwrap()
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        assert!(OpdfMultiGaussian::new(&[0.0, 0.0], DMatrix::identity(3, 3)).is_err());
        assert!(OpdfMultiGaussian::standard(0).is_err());
    }

    #[test]
    fn standard_density_at_origin() {
        let opdf = OpdfMultiGaussian::standard(2).unwrap();
        let expected = 1.0 / (2.0 * std::f64::consts::PI);
        assert::close(opdf.probability(&vector(&[0.0, 0.0])), expected, 1E-10);
    }

    #[test]
    fn wrong_dimension_fails_at_the_boundary() {
        let mut opdf = OpdfMultiGaussian::standard(2).unwrap();
        let bad = vector(&[1.0, 2.0, 3.0]);
        assert!(opdf.validate(&bad).is_err());
        assert::close(opdf.probability(&bad), 0.0, 1E-300);
        assert!(matches!(
            opdf.fit(&[vector(&[0.0, 0.0]), bad], &[0.5, 0.5]),
            Err(HmmError::InvalidArgument(_))
        ));
    }

    #[test]
    fn weighted_fit() {
        let mut opdf = OpdfMultiGaussian::standard(2).unwrap();
        let obs = [
            vector(&[1.0, 0.0]),
            vector(&[-1.0, 0.0]),
            vector(&[0.0, 2.0]),
            vector(&[0.0, -2.0]),
        ];
        opdf.fit_uniform(&obs).unwrap();
        assert::close(opdf.mean()[0], 0.0, 1E-12);
        assert::close(opdf.mean()[1], 0.0, 1E-12);
        assert::close(opdf.covariance()[(0, 0)], 0.5, 1E-8);
        assert::close(opdf.covariance()[(1, 1)], 2.0, 1E-8);
        assert::close(opdf.covariance()[(0, 1)], 0.0, 1E-8);
    }
}
