//! Running means of observations, used by the k-means learner

use crate::error::Result;
use crate::observation::ObservationVector;
use nalgebra::DVector;

/// A mutable running mean of a set of observations.
///
/// The value always equals the mean of the current members. Removing the last
/// member leaves the centroid where it was, with no members.
pub trait Centroid<O> {
    /// Add `o` to the member set.
    fn add(&mut self, o: &O);
    /// Remove `o` from the member set; `o` must currently be a member.
    fn remove(&mut self, o: &O);
    /// Euclidean distance between the centroid and `o`.
    fn distance(&self, o: &O) -> f64;
    /// Number of members.
    fn len(&self) -> usize;
    /// Whether the member set is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Observations able to seed a [`Centroid`].
pub trait CentroidFactory: Sized {
    /// Centroid type for this observation.
    type Centroid: Centroid<Self> + Clone + Send + Sync;

    /// A memberless centroid located at `self`.
    fn centroid(&self) -> Self::Centroid;

    /// Check that `other` lives in the same space as `self`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` on mismatched dimensions.
    fn check_compatible(&self, _other: &Self) -> Result<()> {
        Ok(())
    }
}

/// Centroid of real observations.
#[derive(Clone, Debug, PartialEq)]
pub struct RealCentroid {
    value: f64,
    members: usize,
}

impl RealCentroid {
    /// Current mean.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Centroid<f64> for RealCentroid {
    fn add(&mut self, o: &f64) {
        let n = self.members as f64;
        self.value = (self.value * n + o) / (n + 1.0);
        self.members += 1;
    }

    fn remove(&mut self, o: &f64) {
        if self.members <= 1 {
            self.members = 0;
            return;
        }
        let n = self.members as f64;
        self.value = (self.value * n - o) / (n - 1.0);
        self.members -= 1;
    }

    fn distance(&self, o: &f64) -> f64 {
        (self.value - o).abs()
    }

    fn len(&self) -> usize {
        self.members
    }
}

impl CentroidFactory for f64 {
    type Centroid = RealCentroid;

    fn centroid(&self) -> RealCentroid {
        RealCentroid {
            value: *self,
            members: 0,
        }
    }
}

/// Centroid of [`ObservationVector`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorCentroid {
    value: DVector<f64>,
    members: usize,
}

impl VectorCentroid {
    /// Current mean.
    #[must_use]
    pub fn value(&self) -> ObservationVector {
        ObservationVector::from_vector(self.value.clone())
    }
}

impl Centroid<ObservationVector> for VectorCentroid {
    fn add(&mut self, o: &ObservationVector) {
        let n = self.members as f64;
        self.value
            .iter_mut()
            .zip(o.tag())
            .for_each(|(v, e)| *v = (*v * n + e) / (n + 1.0));
        self.members += 1;
    }

    fn remove(&mut self, o: &ObservationVector) {
        if self.members <= 1 {
            self.members = 0;
            return;
        }
        let n = self.members as f64;
        self.value
            .iter_mut()
            .zip(o.tag())
            .for_each(|(v, e)| *v = (*v * n - e) / (n - 1.0));
        self.members -= 1;
    }

    fn distance(&self, o: &ObservationVector) -> f64 {
        (&self.value - o.as_vector()).norm()
    }

    fn len(&self) -> usize {
        self.members
    }
}

impl CentroidFactory for ObservationVector {
    type Centroid = VectorCentroid;

    fn centroid(&self) -> VectorCentroid {
        VectorCentroid {
            value: self.as_vector().clone(),
            members: 0,
        }
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        self.minus(other).map(|_| ())
    }
}
