//! Observation types consumed by the models

use crate::error::{HmmError, Result};
use derive_more::{Constructor, Into};
use nalgebra::DVector;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// An observation described by a fixed-length vector of reals.
///
/// # Example
/// ```rust
/// use hmm::ObservationVector;
///
/// let a = ObservationVector::new(&[1.0, 2.0]).unwrap();
/// let b = ObservationVector::new(&[0.5, 0.5]).unwrap();
/// let c = a.plus(&b).unwrap().times(2.0);
/// assert_eq!(c.values(), vec![3.0, 5.0]);
/// ```
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Into)]
pub struct ObservationVector(DVector<f64>);

impl ObservationVector {
    /// Create an observation from its components.
    ///
    /// # Errors
    /// Fails if `values` is empty.
    pub fn new(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(HmmError::invalid("dimension must be strictly positive"));
        }
        Ok(Self(DVector::from_column_slice(values)))
    }

    /// An observation of the given dimension whose components are 0.
    ///
    /// # Errors
    /// Fails if `dimension` is 0.
    pub fn zeros(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(HmmError::invalid("dimension must be strictly positive"));
        }
        Ok(Self(DVector::zeros(dimension)))
    }

    /// Wrap a vector already known to be non-empty.
    pub(crate) fn from_vector(values: DVector<f64>) -> Self {
        debug_assert!(!values.is_empty(), "observations cannot be empty");
        Self(values)
    }

    /// Number of components.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// The `i`-th component.
    #[must_use]
    pub fn value(&self, i: usize) -> f64 {
        self.0[i]
    }

    /// Copy of the components.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.0.iter().copied().collect()
    }

    /// Raw components, used for centroid computation.
    #[must_use]
    pub fn tag(&self) -> &[f64] {
        self.0.as_slice()
    }

    /// Underlying `nalgebra` vector.
    #[must_use]
    pub fn as_vector(&self) -> &DVector<f64> {
        &self.0
    }

    fn check_dimension(&self, other: &Self) -> Result<()> {
        if self.dimension() == other.dimension() {
            Ok(())
        } else {
            Err(HmmError::invalid(format!(
                "dimension mismatch ({} instead of {})",
                other.dimension(),
                self.dimension()
            )))
        }
    }

    /// Component-wise sum.
    ///
    /// # Errors
    /// Fails when the dimensions differ.
    pub fn plus(&self, other: &Self) -> Result<Self> {
        self.check_dimension(other)?;
        Ok(Self(&self.0 + &other.0))
    }

    /// Component-wise difference.
    ///
    /// # Errors
    /// Fails when the dimensions differ.
    pub fn minus(&self, other: &Self) -> Result<Self> {
        self.check_dimension(other)?;
        Ok(Self(&self.0 - &other.0))
    }

    /// Product with a scalar.
    #[must_use]
    pub fn times(&self, c: f64) -> Self {
        Self(&self.0 * c)
    }
}

impl fmt::Display for ObservationVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for x in self.0.iter() {
            write!(f, " {x}")?;
        }
        write!(f, " ]")
    }
}

/// An exogenous input paired with the observation made under it.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Constructor)]
pub struct InputObservationTuple<I, O> {
    /// Input driving the transition into this step.
    pub input: I,
    /// Observation emitted at this step.
    pub observation: O,
}

impl TryFrom<DVector<f64>> for ObservationVector {
    type Error = HmmError;

    fn try_from(values: DVector<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(HmmError::invalid("dimension must be strictly positive"));
        }
        Ok(Self(values))
    }
}
