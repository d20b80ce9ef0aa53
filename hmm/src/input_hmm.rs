//! Input-driven hidden Markov model
//!
//! Each step of a sequence carries an exogenous input along with the
//! observation. The input selects the transition matrix used to enter that
//! step and, in [`EmissionMode::PerInput`], the emission distribution.

use crate::calculator::{ForwardBackwardCalculator, InputCalculator};
use crate::error::{HmmError, Result};
use crate::model::{check_stochastic, refit_opdf, MarkovModel, Trainable};
use crate::observation::InputObservationTuple;
use crate::opdf::Opdf;
use ndarray::{Array1, Array2, Array3};
use std::fmt::Debug;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// How emissions relate to inputs.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmissionMode {
    /// One distribution per state, whatever the input.
    Shared,
    /// One distribution per state and input.
    PerInput,
}

/// Hidden Markov model whose transitions depend on an observed input.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct InputHmm<I, D> {
    /// Input alphabet; the position of an input is its bucket.
    inputs: Vec<I>,
    /// Initial state probabilities.
    pi: Array1<f64>,
    /// `a[[i, k, j]]` is the probability of `i -> j` under input `k`.
    a: Array3<f64>,
    /// `opdfs[i]` holds one distribution (shared) or one per input.
    opdfs: Vec<Vec<D>>,
    mode: EmissionMode,
}

/// Item of an input-driven sequence.
pub type InputItem<I, D> = InputObservationTuple<I, <D as Opdf>::Observation>;

impl<I, D> InputHmm<I, D>
where
    I: Clone + PartialEq + Debug + Send + Sync,
    D: Opdf,
{
    /// Create a model with uniform initial and transition probabilities.
    ///
    /// # Example
    /// ```rust
    /// use hmm::{EmissionMode, InputHmm, OpdfDiscrete};
    ///
    /// let hmm = InputHmm::new(
    ///     2,
    ///     vec!['l', 'r'],
    ///     OpdfDiscrete::uniform(3).unwrap(),
    ///     EmissionMode::PerInput,
    /// )
    /// .unwrap();
    /// assert_eq!(hmm.input_index(&'r'), Some(1));
    /// assert_eq!(hmm.aixj(0, 1, 1), 0.5);
    /// ```
    ///
    /// # Errors
    /// Fails with no states, no inputs, or duplicated inputs.
    pub fn new(
        nb_states: usize,
        inputs: Vec<I>,
        opdf: D,
        mode: EmissionMode,
    ) -> Result<Self> {
        if nb_states == 0 {
            return Err(HmmError::invalid("number of states must be positive"));
        }
        check_inputs(&inputs)?;
        let p = 1.0 / nb_states as f64;
        let per_state = match mode {
            EmissionMode::Shared => 1,
            EmissionMode::PerInput => inputs.len(),
        };
        Ok(Self {
            pi: Array1::from_elem(nb_states, p),
            a: Array3::from_elem((nb_states, inputs.len(), nb_states), p),
            opdfs: vec![vec![opdf; per_state]; nb_states],
            inputs,
            mode,
        })
    }

    /// Create a model from its parameters.
    ///
    /// `opdfs[i]` must hold one distribution when `mode` is
    /// [`EmissionMode::Shared`] and one per input otherwise.
    ///
    /// # Errors
    /// Fails on inconsistent shapes or non-stochastic parameters.
    pub fn from_parts(
        inputs: Vec<I>,
        pi: Array1<f64>,
        a: Array3<f64>,
        opdfs: Vec<Vec<D>>,
        mode: EmissionMode,
    ) -> Result<Self> {
        check_inputs(&inputs)?;
        let n = pi.len();
        let m = inputs.len();
        if n == 0 {
            return Err(HmmError::invalid("number of states must be positive"));
        }
        if a.dim() != (n, m, n) {
            return Err(HmmError::invalid(format!(
                "expected a {:?} transition tensor, got {:?}",
                (n, m, n),
                a.dim()
            )));
        }
        let per_state = match mode {
            EmissionMode::Shared => 1,
            EmissionMode::PerInput => m,
        };
        if opdfs.len() != n || opdfs.iter().any(|o| o.len() != per_state) {
            return Err(HmmError::invalid(format!(
                "expected {n} states with {per_state} opdfs each"
            )));
        }
        check_stochastic(pi.view(), "pi")?;
        for i in 0..n {
            for k in 0..m {
                check_stochastic(
                    a.slice(ndarray::s![i, k, ..]),
                    &format!("transition row {i} under input {k}"),
                )?;
            }
        }
        Ok(Self {
            inputs,
            pi,
            a,
            opdfs,
            mode,
        })
    }

    /// Number of states.
    #[must_use]
    pub fn nb_states(&self) -> usize {
        self.pi.len()
    }

    /// Number of distinct inputs.
    #[must_use]
    pub fn nb_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// The input alphabet.
    #[must_use]
    pub fn inputs(&self) -> &[I] {
        &self.inputs
    }

    /// Statistics bucket of `input`, if it belongs to the alphabet.
    pub fn input_index(&self, input: &I) -> Option<usize> {
        self.inputs.iter().position(|x| x == input)
    }

    /// Emission layout.
    #[must_use]
    pub fn emission_mode(&self) -> EmissionMode {
        self.mode
    }

    /// Probability of starting in state `i`.
    #[must_use]
    pub fn pi(&self, i: usize) -> f64 {
        self.pi[i]
    }

    /// Set the probability of starting in state `i`.
    pub fn set_pi(&mut self, i: usize, value: f64) {
        self.pi[i] = value;
    }

    /// Probability of going from `i` to `j` under input index `k`.
    #[must_use]
    pub fn aixj(&self, i: usize, k: usize, j: usize) -> f64 {
        self.a[[i, k, j]]
    }

    /// Set the probability of going from `i` to `j` under input index `k`.
    pub fn set_aixj(&mut self, i: usize, k: usize, j: usize, value: f64) {
        self.a[[i, k, j]] = value;
    }

    /// The transition tensor, indexed `[from, input, to]`.
    #[must_use]
    pub fn transitions(&self) -> &Array3<f64> {
        &self.a
    }

    fn opdf_slot(&self, k: usize) -> usize {
        match self.mode {
            EmissionMode::Shared => 0,
            EmissionMode::PerInput => k,
        }
    }

    /// Emission distribution of state `i` under input index `k`.
    #[must_use]
    pub fn opdf(&self, i: usize, k: usize) -> &D {
        &self.opdfs[i][self.opdf_slot(k)]
    }

    /// Mutable emission distribution of state `i` under input index `k`.
    pub fn opdf_mut(&mut self, i: usize, k: usize) -> &mut D {
        let slot = self.opdf_slot(k);
        &mut self.opdfs[i][slot]
    }

    /// Natural log of the probability of `sequence`.
    ///
    /// # Errors
    /// Fails on an empty sequence, unknown inputs or observations the opdfs
    /// cannot evaluate.
    pub fn ln_probability(&self, sequence: &[InputItem<I, D>]) -> Result<f64> {
        InputCalculator
            .forward_backward(self, sequence)
            .map(|fb| fb.ln_probability())
    }

    pub(crate) fn required_index(&self, input: &I) -> Result<usize> {
        self.input_index(input)
            .ok_or_else(|| HmmError::invalid(format!("unknown input {input:?}")))
    }
}

fn check_inputs<I: PartialEq>(inputs: &[I]) -> Result<()> {
    if inputs.is_empty() {
        return Err(HmmError::invalid("the input alphabet is empty"));
    }
    let duplicated = inputs
        .iter()
        .enumerate()
        .any(|(k, x)| inputs[..k].contains(x));
    if duplicated {
        return Err(HmmError::invalid("the input alphabet has duplicates"));
    }
    Ok(())
}

impl<I, D> MarkovModel for InputHmm<I, D>
where
    I: Clone + PartialEq + Debug + Send + Sync,
    D: Opdf,
{
    type Item = InputItem<I, D>;

    fn nb_states(&self) -> usize {
        self.pi.len()
    }

    fn nb_buckets(&self) -> usize {
        self.inputs.len()
    }

    fn bucket(&self, item: &Self::Item) -> Result<usize> {
        self.required_index(&item.input)
    }

    fn pi(&self, i: usize) -> f64 {
        self.pi[i]
    }

    fn transition(&self, i: usize, bucket: usize, j: usize) -> f64 {
        self.a[[i, bucket, j]]
    }

    fn emission(&self, i: usize, item: &Self::Item) -> Result<f64> {
        let opdf = self.opdf(i, self.required_index(&item.input)?);
        opdf.validate(&item.observation)?;
        Ok(opdf.probability(&item.observation))
    }
}

impl<I, D> Trainable for InputHmm<I, D>
where
    I: Clone + PartialEq + Debug + Send + Sync,
    D: Opdf,
{
    fn set_pi(&mut self, i: usize, value: f64) {
        self.pi[i] = value;
    }

    fn set_transition(&mut self, i: usize, bucket: usize, j: usize, value: f64) {
        self.a[[i, bucket, j]] = value;
    }

    fn refit_emissions(
        &mut self,
        sequences: &[(&[Self::Item], &Array2<f64>)],
    ) -> Result<()> {
        let observations: Vec<D::Observation> = sequences
            .iter()
            .flat_map(|(seq, _)| seq.iter().map(|x| x.observation.clone()))
            .collect();
        let buckets: Vec<usize> = sequences
            .iter()
            .flat_map(|(seq, _)| seq.iter())
            .map(|x| self.required_index(&x.input))
            .collect::<Result<_>>()?;

        let mode = self.mode;
        for (i, slots) in self.opdfs.iter_mut().enumerate() {
            for (k, opdf) in slots.iter_mut().enumerate() {
                let weights: Vec<f64> = sequences
                    .iter()
                    .flat_map(|(_, gamma)| gamma.column(i).to_vec())
                    .zip(buckets.iter())
                    .map(|(g, &b)| match mode {
                        EmissionMode::PerInput if b != k => 0.0,
                        _ => g,
                    })
                    .collect();
                if !refit_opdf(opdf, &observations, weights)? {
                    tracing::trace!(
                        state = i,
                        input = k,
                        "no posterior mass, opdf kept"
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opdf::OpdfDiscrete;

    fn item(input: u8, observation: usize) -> InputObservationTuple<u8, usize> {
        InputObservationTuple::new(input, observation)
    }

    #[test]
    fn input_alphabet_is_validated() {
        let opdf = OpdfDiscrete::uniform(2).unwrap();
        assert!(InputHmm::<u8, _>::new(2, vec![], opdf.clone(), EmissionMode::Shared)
            .is_err());
        assert!(
            InputHmm::new(2, vec![1_u8, 1], opdf.clone(), EmissionMode::Shared)
                .is_err()
        );
        assert!(InputHmm::new(0, vec![1_u8], opdf, EmissionMode::Shared).is_err());
    }

    #[test]
    fn unknown_input_is_invalid() {
        let hmm = InputHmm::new(
            2,
            vec![0_u8, 1],
            OpdfDiscrete::uniform(2).unwrap(),
            EmissionMode::Shared,
        )
        .unwrap();
        assert_eq!(hmm.input_index(&7), None);
        assert!(matches!(
            hmm.ln_probability(&[item(0, 0), item(7, 1)]),
            Err(HmmError::InvalidArgument(_))
        ));
    }

    #[test]
    fn per_input_opdfs_are_independent() {
        let mut hmm = InputHmm::new(
            1,
            vec![0_u8, 1],
            OpdfDiscrete::uniform(2).unwrap(),
            EmissionMode::PerInput,
        )
        .unwrap();
        *hmm.opdf_mut(0, 1) = OpdfDiscrete::new(&[0.9, 0.1]).unwrap();
        assert::close(hmm.opdf(0, 0).probability(&0), 0.5, 1E-12);
        assert::close(hmm.opdf(0, 1).probability(&0), 0.9, 1E-12);
        assert::close(
            hmm.emission(0, &item(1, 0)).unwrap(),
            0.9,
            1E-12,
        );
    }

    #[test]
    fn from_parts_checks_every_row() {
        let mut a = Array3::from_elem((2, 2, 2), 0.5);
        a[[1, 1, 0]] = 0.7;
        let opdfs = vec![vec![OpdfDiscrete::uniform(2).unwrap()]; 2];
        assert!(InputHmm::from_parts(
            vec!['a', 'b'],
            Array1::from_elem(2, 0.5),
            a,
            opdfs,
            EmissionMode::Shared
        )
        .is_err());
    }
}
