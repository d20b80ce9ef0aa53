//! Plain hidden Markov model

use crate::calculator::{ForwardBackwardCalculator, RegularCalculator};
use crate::error::{HmmError, Result};
use crate::model::{check_stochastic, refit_opdf, MarkovModel, Trainable};
use crate::opdf::Opdf;
use crate::viterbi::ViterbiCalculator;
use ndarray::{Array1, Array2};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Hidden Markov model with one emission distribution per state.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct Hmm<D> {
    /// Initial state probabilities.
    pi: Array1<f64>,
    /// Transition matrix, `a[[i, j]]` is the probability of `i -> j`.
    a: Array2<f64>,
    /// Emission distribution of each state.
    opdfs: Vec<D>,
}

impl<D: Opdf> Hmm<D> {
    /// Create a model with uniform initial and transition probabilities, every
    /// state starting from a copy of `opdf`.
    ///
    /// # Example
    /// ```rust
    /// use hmm::{Hmm, OpdfDiscrete};
    ///
    /// let hmm = Hmm::new(2, OpdfDiscrete::uniform(4).unwrap()).unwrap();
    /// assert_eq!(hmm.nb_states(), 2);
    /// assert_eq!(hmm.aij(0, 1), 0.5);
    /// ```
    ///
    /// # Errors
    /// Fails if `nb_states` is 0.
    pub fn new(nb_states: usize, opdf: D) -> Result<Self> {
        if nb_states == 0 {
            return Err(HmmError::invalid("number of states must be positive"));
        }
        let p = 1.0 / nb_states as f64;
        Ok(Self {
            pi: Array1::from_elem(nb_states, p),
            a: Array2::from_elem((nb_states, nb_states), p),
            opdfs: vec![opdf; nb_states],
        })
    }

    /// Create a model from its parameters.
    ///
    /// # Errors
    /// Fails if the shapes disagree, there are no states, or `pi` and the
    /// rows of `a` are not probability vectors.
    pub fn from_parts(
        pi: Array1<f64>,
        a: Array2<f64>,
        opdfs: Vec<D>,
    ) -> Result<Self> {
        let n = pi.len();
        if n == 0 {
            return Err(HmmError::invalid("number of states must be positive"));
        }
        if a.dim() != (n, n) || opdfs.len() != n {
            return Err(HmmError::invalid(format!(
                "{n} states but a {:?} transition matrix and {} opdfs",
                a.dim(),
                opdfs.len()
            )));
        }
        check_stochastic(pi.view(), "pi")?;
        a.rows()
            .into_iter()
            .enumerate()
            .try_for_each(|(i, row)| {
                check_stochastic(row, &format!("transition row {i}"))
            })?;
        Ok(Self { pi, a, opdfs })
    }

    /// Number of states.
    #[must_use]
    pub fn nb_states(&self) -> usize {
        self.pi.len()
    }

    /// Probability of starting in state `i`.
    #[must_use]
    pub fn pi(&self, i: usize) -> f64 {
        self.pi[i]
    }

    /// All initial probabilities.
    #[must_use]
    pub fn pis(&self) -> &Array1<f64> {
        &self.pi
    }

    /// Set the probability of starting in state `i`.
    pub fn set_pi(&mut self, i: usize, value: f64) {
        self.pi[i] = value;
    }

    /// Probability of going from state `i` to state `j`.
    #[must_use]
    pub fn aij(&self, i: usize, j: usize) -> f64 {
        self.a[[i, j]]
    }

    /// The transition matrix.
    #[must_use]
    pub fn transitions(&self) -> &Array2<f64> {
        &self.a
    }

    /// Set the probability of going from state `i` to state `j`.
    pub fn set_aij(&mut self, i: usize, j: usize, value: f64) {
        self.a[[i, j]] = value;
    }

    /// Emission distribution of state `i`.
    #[must_use]
    pub fn opdf(&self, i: usize) -> &D {
        &self.opdfs[i]
    }

    /// Mutable emission distribution of state `i`.
    pub fn opdf_mut(&mut self, i: usize) -> &mut D {
        &mut self.opdfs[i]
    }

    /// Natural log of the probability of `sequence`.
    ///
    /// # Errors
    /// Fails on an empty sequence or observations the opdfs cannot evaluate.
    pub fn ln_probability(&self, sequence: &[D::Observation]) -> Result<f64> {
        RegularCalculator
            .forward_backward(self, sequence)
            .map(|fb| fb.ln_probability())
    }

    /// Most likely state sequence given `sequence`.
    ///
    /// # Errors
    /// Fails on an empty sequence or observations the opdfs cannot evaluate.
    pub fn most_likely_state_sequence(
        &self,
        sequence: &[D::Observation],
    ) -> Result<Vec<usize>> {
        ViterbiCalculator::new(self, sequence).map(|v| v.state_sequence().to_vec())
    }
}

impl<D: Opdf> MarkovModel for Hmm<D> {
    type Item = D::Observation;

    fn nb_states(&self) -> usize {
        self.pi.len()
    }

    fn nb_buckets(&self) -> usize {
        1
    }

    fn bucket(&self, _item: &D::Observation) -> Result<usize> {
        Ok(0)
    }

    fn pi(&self, i: usize) -> f64 {
        self.pi[i]
    }

    fn transition(&self, i: usize, _bucket: usize, j: usize) -> f64 {
        self.a[[i, j]]
    }

    fn emission(&self, i: usize, item: &D::Observation) -> Result<f64> {
        let opdf = &self.opdfs[i];
        opdf.validate(item)?;
        Ok(opdf.probability(item))
    }
}

impl<D: Opdf> Trainable for Hmm<D> {
    fn set_pi(&mut self, i: usize, value: f64) {
        self.pi[i] = value;
    }

    fn set_transition(&mut self, i: usize, _bucket: usize, j: usize, value: f64) {
        self.a[[i, j]] = value;
    }

    fn refit_emissions(
        &mut self,
        sequences: &[(&[D::Observation], &Array2<f64>)],
    ) -> Result<()> {
        let observations: Vec<D::Observation> = sequences
            .iter()
            .flat_map(|(seq, _)| seq.iter().cloned())
            .collect();

        for (i, opdf) in self.opdfs.iter_mut().enumerate() {
            let weights: Vec<f64> = sequences
                .iter()
                .flat_map(|(_, gamma)| gamma.column(i).to_vec())
                .collect();
            if !refit_opdf(opdf, &observations, weights)? {
                tracing::trace!(state = i, "no posterior mass, opdf kept");
            }
        }
        Ok(())
    }
}
