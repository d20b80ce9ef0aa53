//! K-means clustering and the k-means model initializer
//!
//! Empty clusters are never kept: a cluster that loses its last member is
//! re-seeded with the observation lying farthest from its own centroid, taken
//! from a cluster that still has more than one member. Clustering fewer
//! observations (or fewer distinct observations) than clusters is an error.

use crate::centroid::{Centroid, CentroidFactory};
use crate::error::{HmmError, Result};
use crate::hmm::Hmm;
use crate::opdf::Opdf;
use crate::viterbi::ViterbiCalculator;
use ndarray::{Array1, Array2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::debug;

/// Default cap on the number of reassignment passes.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Lloyd-style k-means over a pool of observations.
#[derive(Clone, Debug)]
pub struct KMeansCalculator<O: CentroidFactory> {
    observations: Vec<O>,
    centroids: Vec<O::Centroid>,
    assignments: Vec<usize>,
    iterations: usize,
}

impl<O> KMeansCalculator<O>
where
    O: CentroidFactory + Clone,
{
    /// Partition `observations` in `k` clusters.
    ///
    /// # Example
    /// ```rust
    /// use hmm::KMeansCalculator;
    /// use rand::{rngs::SmallRng, SeedableRng};
    ///
    /// let mut rng = SmallRng::seed_from_u64(0xABCD);
    /// let data = [0.1, -0.2, 0.0, 9.8, 10.1, 10.3];
    /// let km = KMeansCalculator::new(2, &data, &mut rng).unwrap();
    /// let a = km.assignments();
    /// assert_eq!(a[0], a[1]);
    /// assert_ne!(a[0], a[3]);
    /// ```
    ///
    /// # Errors
    /// `InvalidArgument` if `k` is 0, there are fewer distinct observations
    /// than clusters, or the observations do not share a dimension.
    pub fn new<R: Rng>(k: usize, observations: &[O], rng: &mut R) -> Result<Self> {
        Self::with_max_iterations(k, observations, rng, DEFAULT_MAX_ITERATIONS)
    }

    /// [`KMeansCalculator::new`] with an explicit pass cap.
    ///
    /// # Errors
    /// See [`KMeansCalculator::new`].
    pub fn with_max_iterations<R: Rng>(
        k: usize,
        observations: &[O],
        rng: &mut R,
        max_iterations: usize,
    ) -> Result<Self> {
        check_pool(k, observations)?;
        let centroids = seed(k, observations, rng)?;
        let mut km = Self {
            observations: observations.to_vec(),
            centroids,
            assignments: Vec::with_capacity(observations.len()),
            iterations: 0,
        };

        for o in &km.observations {
            let c = nearest(&km.centroids, o);
            km.centroids[c].add(o);
            km.assignments.push(c);
        }
        km.fill_empty_clusters()?;

        while km.iterations < max_iterations {
            km.iterations += 1;
            let moved = km.reassign();
            km.fill_empty_clusters()?;
            debug!(iteration = km.iterations, moved, "k-means pass");
            if moved == 0 {
                break;
            }
        }
        Ok(km)
    }

    /// Build the clusters implied by explicit labels, without iterating.
    ///
    /// # Errors
    /// `InvalidArgument` if the lengths differ or a label is not below `k`.
    pub fn from_assignments(
        k: usize,
        observations: &[O],
        assignments: Vec<usize>,
    ) -> Result<Self> {
        check_pool(k, observations)?;
        if assignments.len() != observations.len() {
            return Err(HmmError::invalid("one label per observation expected"));
        }
        if let Some(bad) = assignments.iter().find(|&&c| c >= k) {
            return Err(HmmError::invalid(format!("label {bad} is not below {k}")));
        }
        let mut centroids: Vec<O::Centroid> = (0..k)
            .map(|c| {
                let seed = assignments
                    .iter()
                    .position(|&a| a == c)
                    .map_or(&observations[0], |p| &observations[p]);
                seed.centroid()
            })
            .collect();
        for (o, &c) in observations.iter().zip(assignments.iter()) {
            centroids[c].add(o);
        }
        Ok(Self {
            observations: observations.to_vec(),
            centroids,
            assignments,
            iterations: 0,
        })
    }

    /// Move every observation to its nearest centroid; returns how many moved.
    fn reassign(&mut self) -> usize {
        let mut moved = 0;
        for (p, o) in self.observations.iter().enumerate() {
            let old = self.assignments[p];
            let new = nearest(&self.centroids, o);
            if new != old
                && self.centroids[new].distance(o) < self.centroids[old].distance(o)
            {
                self.centroids[old].remove(o);
                self.centroids[new].add(o);
                self.assignments[p] = new;
                moved += 1;
            }
        }
        moved
    }

    fn fill_empty_clusters(&mut self) -> Result<()> {
        while let Some(empty) = self.centroids.iter().position(|c| c.is_empty()) {
            let donor = self
                .observations
                .iter()
                .enumerate()
                .filter(|(p, _)| self.centroids[self.assignments[*p]].len() > 1)
                .map(|(p, o)| (p, self.centroids[self.assignments[p]].distance(o)))
                .fold(None, |best: Option<(usize, f64)>, x| match best {
                    Some(b) if b.1 >= x.1 => Some(b),
                    _ => Some(x),
                });
            let Some((p, _)) = donor else {
                return Err(HmmError::invalid("cannot refill an empty cluster"));
            };
            let o = &self.observations[p];
            self.centroids[self.assignments[p]].remove(o);
            let mut centroid = o.centroid();
            centroid.add(o);
            self.centroids[empty] = centroid;
            self.assignments[p] = empty;
            debug!(cluster = empty, observation = p, "empty cluster re-seeded");
        }
        Ok(())
    }

    /// Number of clusters.
    #[must_use]
    pub fn nb_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Members of cluster `i`.
    #[must_use]
    pub fn cluster(&self, i: usize) -> Vec<O> {
        self.observations
            .iter()
            .zip(self.assignments.iter())
            .filter(|(_, &c)| c == i)
            .map(|(o, _)| o.clone())
            .collect()
    }

    /// Members of every cluster.
    #[must_use]
    pub fn clusters(&self) -> Vec<Vec<O>> {
        (0..self.nb_clusters()).map(|i| self.cluster(i)).collect()
    }

    /// Centroid of every cluster.
    #[must_use]
    pub fn centroids(&self) -> &[O::Centroid] {
        &self.centroids
    }

    /// Cluster of every observation, in input order.
    #[must_use]
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    /// Number of reassignment passes performed.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

fn check_pool<O: CentroidFactory>(k: usize, observations: &[O]) -> Result<()> {
    if k == 0 {
        return Err(HmmError::invalid("number of clusters must be positive"));
    }
    if observations.len() < k {
        return Err(HmmError::invalid(format!(
            "{} observations cannot fill {k} clusters",
            observations.len()
        )));
    }
    observations
        .iter()
        .skip(1)
        .try_for_each(|o| observations[0].check_compatible(o))
}

fn nearest<O, C: Centroid<O>>(centroids: &[C], o: &O) -> usize {
    centroids
        .iter()
        .map(|c| c.distance(o))
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
        .0
}

/// k-means++ seeding: each new seed is drawn with probability proportional to
/// its squared distance to the closest seed so far.
fn seed<O, R>(k: usize, observations: &[O], rng: &mut R) -> Result<Vec<O::Centroid>>
where
    O: CentroidFactory,
    R: Rng,
{
    let first = rng.gen_range(0..observations.len());
    let mut seeds = vec![observations[first].centroid()];
    while seeds.len() < k {
        let weights: Vec<f64> = observations
            .iter()
            .map(|o| {
                let d = seeds
                    .iter()
                    .map(|c| c.distance(o))
                    .fold(f64::INFINITY, f64::min);
                d * d
            })
            .collect();
        let dist = WeightedIndex::new(&weights).map_err(|_| {
            HmmError::invalid("fewer distinct observations than clusters")
        })?;
        seeds.push(observations[dist.sample(rng)].centroid());
    }
    Ok(seeds)
}

/// Builds an initial [`Hmm`] by clustering the observations of all sequences,
/// then refines the clusters with Viterbi segmentation.
pub struct KMeansLearner<'a, D, F>
where
    D: Opdf,
{
    nb_states: usize,
    opdf_factory: F,
    sequences: &'a [Vec<D::Observation>],
    labels: Vec<Vec<usize>>,
    max_iterations: usize,
    terminated: bool,
}

impl<'a, D, F> KMeansLearner<'a, D, F>
where
    D: Opdf,
    D::Observation: CentroidFactory,
    F: Fn() -> D,
{
    /// Cluster the observations of `sequences` into `nb_states` groups.
    ///
    /// # Errors
    /// See [`KMeansCalculator::new`].
    pub fn new<R: Rng>(
        nb_states: usize,
        opdf_factory: F,
        sequences: &'a [Vec<D::Observation>],
        rng: &mut R,
    ) -> Result<Self> {
        let pool: Vec<D::Observation> = sequences.iter().flatten().cloned().collect();
        let km = KMeansCalculator::new(nb_states, &pool, rng)?;
        let mut flat = km.assignments().iter().copied();
        let labels = sequences
            .iter()
            .map(|seq| flat.by_ref().take(seq.len()).collect::<Vec<usize>>())
            .collect();
        Ok(Self {
            nb_states,
            opdf_factory,
            sequences,
            labels,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            terminated: false,
        })
    }

    /// Cap the number of refinement iterations of [`KMeansLearner::learn`].
    #[must_use]
    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Current state label of every observation.
    #[must_use]
    pub fn labels(&self) -> &[Vec<usize>] {
        &self.labels
    }

    /// Whether the last iteration left every label unchanged.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Model implied by the current labels.
    ///
    /// Emission distributions are fit on their cluster (a fresh factory value
    /// for empty states); initial and transition probabilities are empirical
    /// label frequencies, states never left get uniform rows.
    ///
    /// # Errors
    /// Propagates emission fitting errors.
    pub fn model(&self) -> Result<Hmm<D>> {
        let n = self.nb_states;
        let opdfs = (0..n)
            .map(|i| {
                let members: Vec<D::Observation> = self
                    .sequences
                    .iter()
                    .zip(self.labels.iter())
                    .flat_map(|(seq, lab)| seq.iter().zip(lab.iter()))
                    .filter(|(_, &l)| l == i)
                    .map(|(o, _)| o.clone())
                    .collect();
                let mut opdf = (self.opdf_factory)();
                if !members.is_empty() {
                    opdf.fit_uniform(&members)?;
                }
                Ok(opdf)
            })
            .collect::<Result<Vec<D>>>()?;

        let mut pi = Array1::<f64>::zeros(n);
        let mut a = Array2::<f64>::zeros((n, n));
        for lab in self.labels.iter().filter(|l| !l.is_empty()) {
            pi[lab[0]] += 1.0;
            for w in lab.windows(2) {
                a[[w[0], w[1]]] += 1.0;
            }
        }
        let z = pi.sum();
        if z > 0.0 {
            pi /= z;
        } else {
            pi.fill(1.0 / n as f64);
        }
        a.axis_iter_mut(Axis(0)).for_each(|mut row| {
            let z = row.sum();
            if z > 0.0 {
                row /= z;
            } else {
                row.fill(1.0 / n as f64);
            }
        });

        Hmm::from_parts(pi, a, opdfs)
    }

    /// Build the model from the current labels, then relabel every sequence
    /// with its Viterbi path under that model.
    ///
    /// # Errors
    /// Propagates model building and decoding errors.
    pub fn iterate(&mut self) -> Result<Hmm<D>> {
        let hmm = self.model()?;
        let mut changed = false;
        for (seq, lab) in self.sequences.iter().zip(self.labels.iter_mut()) {
            if seq.is_empty() {
                continue;
            }
            let path = ViterbiCalculator::new(&hmm, seq)?;
            if path.state_sequence() != lab.as_slice() {
                *lab = path.state_sequence().to_vec();
                changed = true;
            }
        }
        self.terminated = !changed;
        Ok(hmm)
    }

    /// Iterate until the labels are stable or the cap is reached.
    ///
    /// # Errors
    /// See [`KMeansLearner::iterate`].
    pub fn learn(&mut self) -> Result<Hmm<D>> {
        for _ in 0..self.max_iterations {
            let hmm = self.iterate()?;
            if self.terminated {
                return Ok(hmm);
            }
        }
        self.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centroid::VectorCentroid;
    use crate::observation::ObservationVector;
    use crate::opdf::{OpdfGaussian, OpdfMultiGaussian};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use rv::dist::Gaussian;
    use rv::traits::Rv;

    fn blob<R: Rng>(rng: &mut R, cx: f64, cy: f64, n: usize) -> Vec<ObservationVector> {
        let noise = Gaussian::new(0.0, 1.0).unwrap();
        (0..n)
            .map(|_| {
                let dx: f64 = noise.draw(rng);
                let dy: f64 = noise.draw(rng);
                ObservationVector::new(&[cx + dx, cy + dy]).unwrap()
            })
            .collect()
    }

    fn close_to(c: &VectorCentroid, x: f64, y: f64) -> bool {
        let v = c.value();
        (v.value(0) - x).abs() < 0.5 && (v.value(1) - y).abs() < 0.5
    }

    #[test]
    fn two_separated_clusters() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        let mut data = blob(&mut rng, 0.0, 0.0, 200);
        data.extend(blob(&mut rng, 10.0, 10.0, 200));

        let km = KMeansCalculator::new(2, &data, &mut rng).unwrap();
        let c = km.centroids();
        assert!(
            (close_to(&c[0], 0.0, 0.0) && close_to(&c[1], 10.0, 10.0))
                || (close_to(&c[1], 0.0, 0.0) && close_to(&c[0], 10.0, 10.0))
        );
        assert_eq!(km.cluster(0).len() + km.cluster(1).len(), 400);
        assert!(km.iterations() >= 1);
    }

    #[test]
    fn centroids_are_cluster_means() {
        let mut rng = SmallRng::seed_from_u64(0x1234);
        let data = [1.0, 1.2, 0.8, 5.0, 5.5, 4.5, 9.0];
        let km = KMeansCalculator::new(3, &data, &mut rng).unwrap();
        for (i, members) in km.clusters().iter().enumerate() {
            assert!(!members.is_empty());
            let mean = members.iter().sum::<f64>() / members.len() as f64;
            assert::close(km.centroids()[i].value(), mean, 1E-9);
        }
    }

    #[test]
    fn too_few_observations() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        assert!(matches!(
            KMeansCalculator::new(3, &[1.0, 2.0], &mut rng),
            Err(HmmError::InvalidArgument(_))
        ));
        assert!(matches!(
            KMeansCalculator::new(2, &[1.0, 1.0, 1.0], &mut rng),
            Err(HmmError::InvalidArgument(_))
        ));
        assert!(KMeansCalculator::new(0, &[1.0], &mut rng).is_err());
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        let data = [
            ObservationVector::new(&[1.0, 2.0]).unwrap(),
            ObservationVector::new(&[1.0]).unwrap(),
        ];
        assert!(KMeansCalculator::new(1, &data, &mut rng).is_err());
    }

    #[test]
    fn empty_cluster_is_refilled() {
        // Cluster 1 starts empty; the farthest member of cluster 0 moves there.
        let data = [0.0, 0.1, 0.2, 8.0];
        let mut km =
            KMeansCalculator::from_assignments(2, &data, vec![0, 0, 0, 0]).unwrap();
        assert!(km.centroids()[1].is_empty());
        km.fill_empty_clusters().unwrap();
        assert_eq!(km.assignments(), &[0, 0, 0, 1]);
        assert::close(km.centroids()[1].value(), 8.0, 1E-12);
        assert::close(km.centroids()[0].value(), 0.1, 1E-12);
    }

    #[test]
    fn learner_builds_a_valid_model() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        let sequences = vec![
            vec![0.0, 0.1, -0.1, 5.0, 5.2, 4.9, 0.2, 0.0],
            vec![5.1, 5.0, 0.1, -0.2, 4.8, 5.3],
        ];
        let mut learner =
            KMeansLearner::new(2, OpdfGaussian::default, &sequences, &mut rng).unwrap();
        let hmm = learner.learn().unwrap();
        assert!(learner.is_terminated());

        assert::close(hmm.pis().sum(), 1.0, 1E-12);
        for row in hmm.transitions().rows() {
            assert::close(row.sum(), 1.0, 1E-12);
        }
        let means: Vec<f64> = (0..2).map(|i| hmm.opdf(i).mean()).collect();
        let (lo, hi) = if means[0] < means[1] {
            (means[0], means[1])
        } else {
            (means[1], means[0])
        };
        assert::close(lo, 0.0, 0.2);
        assert::close(hi, 5.0, 0.2);
    }

    #[test]
    fn learner_on_vectors() {
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        let mut seq = blob(&mut rng, 0.0, 0.0, 30);
        seq.extend(blob(&mut rng, 10.0, 10.0, 30));
        let sequences = vec![seq];
        let factory = || OpdfMultiGaussian::standard(2).unwrap();
        let hmm = KMeansLearner::new(2, factory, &sequences, &mut rng)
            .unwrap()
            .learn()
            .unwrap();
        // One switch in 59 transitions.
        let stay: f64 = (0..2).map(|i| hmm.aij(i, i)).sum();
        assert!(stay > 1.9);
    }
}
