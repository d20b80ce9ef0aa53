//! Random sequence generation from a model

use crate::error::Result;
use crate::hmm::Hmm;
use crate::input_hmm::{InputHmm, InputItem};
use crate::observation::InputObservationTuple;
use crate::opdf::Opdf;
use ndarray::ArrayView1;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::fmt::Debug;

/// Draw an index with probability proportional to `weights`, the last index
/// when no weight is positive.
fn draw_index<R: Rng>(weights: ArrayView1<f64>, rng: &mut R) -> usize {
    WeightedIndex::new(weights.iter())
        .map_or(weights.len() - 1, |dist| dist.sample(rng))
}

/// Generates observation sequences from an [`Hmm`].
///
/// # Example
/// ```rust
/// use hmm::{Hmm, MarkovGenerator, OpdfGaussian};
/// use rand::{rngs::SmallRng, SeedableRng};
///
/// let mut rng = SmallRng::seed_from_u64(0xABCD);
/// let hmm = Hmm::new(2, OpdfGaussian::default()).unwrap();
/// let mut generator = MarkovGenerator::new(&hmm, &mut rng);
/// let seq = generator.observation_sequence(100, &mut rng);
/// assert_eq!(seq.len(), 100);
/// ```
#[derive(Clone, Debug)]
pub struct MarkovGenerator<'a, D> {
    hmm: &'a Hmm<D>,
    state: usize,
    started: bool,
}

impl<'a, D: Opdf> MarkovGenerator<'a, D> {
    /// Create a generator positioned at the start of a sequence.
    pub fn new<R: Rng>(hmm: &'a Hmm<D>, rng: &mut R) -> Self {
        let mut generator = Self {
            hmm,
            state: 0,
            started: false,
        };
        generator.new_sequence(rng);
        generator
    }

    /// The model sampled from.
    #[must_use]
    pub fn hmm(&self) -> &Hmm<D> {
        self.hmm
    }

    /// Current hidden state.
    #[must_use]
    pub fn state_nb(&self) -> usize {
        self.state
    }

    /// Restart: draw a new initial state from the initial probabilities.
    pub fn new_sequence<R: Rng>(&mut self, rng: &mut R) {
        self.state = draw_index(self.hmm.pis().view(), rng);
        self.started = false;
    }

    /// Emit the next observation.
    pub fn observation<R: Rng>(&mut self, rng: &mut R) -> D::Observation {
        if self.started {
            let row = self.hmm.transitions().row(self.state);
            self.state = draw_index(row, rng);
        }
        self.started = true;
        self.hmm.opdf(self.state).draw(rng)
    }

    /// A fresh sequence of `len` observations.
    pub fn observation_sequence<R: Rng>(
        &mut self,
        len: usize,
        rng: &mut R,
    ) -> Vec<D::Observation> {
        self.new_sequence(rng);
        (0..len).map(|_| self.observation(rng)).collect()
    }

    /// A fresh sequence along with the hidden states that produced it.
    pub fn state_observation_sequence<R: Rng>(
        &mut self,
        len: usize,
        rng: &mut R,
    ) -> (Vec<usize>, Vec<D::Observation>) {
        self.new_sequence(rng);
        (0..len)
            .map(|_| {
                let o = self.observation(rng);
                (self.state, o)
            })
            .unzip()
    }
}

/// Generates observation sequences from an [`InputHmm`] driven by a given
/// input sequence.
#[derive(Clone, Debug)]
pub struct InputMarkovGenerator<'a, I, D> {
    hmm: &'a InputHmm<I, D>,
    state: usize,
    started: bool,
}

impl<'a, I, D> InputMarkovGenerator<'a, I, D>
where
    I: Clone + PartialEq + Debug + Send + Sync,
    D: Opdf,
{
    /// Create a generator positioned at the start of a sequence.
    pub fn new<R: Rng>(hmm: &'a InputHmm<I, D>, rng: &mut R) -> Self {
        let mut generator = Self {
            hmm,
            state: 0,
            started: false,
        };
        generator.new_sequence(rng);
        generator
    }

    /// Current hidden state.
    #[must_use]
    pub fn state_nb(&self) -> usize {
        self.state
    }

    /// Restart: draw a new initial state from the initial probabilities.
    pub fn new_sequence<R: Rng>(&mut self, rng: &mut R) {
        let pi: Vec<f64> = (0..self.hmm.nb_states()).map(|i| self.hmm.pi(i)).collect();
        self.state = draw_index(ArrayView1::from(&pi), rng);
        self.started = false;
    }

    /// Emit the next observation under `input`.
    ///
    /// # Errors
    /// `InvalidArgument` if `input` is not in the model's alphabet.
    pub fn observation<R: Rng>(
        &mut self,
        input: &I,
        rng: &mut R,
    ) -> Result<InputItem<I, D>> {
        let k = self.hmm.required_index(input)?;
        if self.started {
            let row = self.hmm.transitions().slice(ndarray::s![self.state, k, ..]);
            self.state = draw_index(row, rng);
        }
        self.started = true;
        let observation = self.hmm.opdf(self.state, k).draw(rng);
        Ok(InputObservationTuple::new(input.clone(), observation))
    }

    /// A fresh sequence with one observation per input.
    ///
    /// # Errors
    /// `InvalidArgument` if an input is not in the model's alphabet.
    pub fn observation_sequence<R: Rng>(
        &mut self,
        inputs: &[I],
        rng: &mut R,
    ) -> Result<Vec<InputItem<I, D>>> {
        self.new_sequence(rng);
        inputs.iter().map(|x| self.observation(x, rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_hmm::EmissionMode;
    use crate::opdf::OpdfDiscrete;
    use ndarray::array;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn transition_frequencies_follow_the_model() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        let hmm = Hmm::from_parts(
            array![1.0, 0.0],
            array![[0.8, 0.2], [0.4, 0.6]],
            vec![
                OpdfDiscrete::new(&[1.0, 0.0]).unwrap(),
                OpdfDiscrete::new(&[0.0, 1.0]).unwrap(),
            ],
        )
        .unwrap();
        let mut generator = MarkovGenerator::new(&hmm, &mut rng);
        let (states, obs) = generator.state_observation_sequence(20_000, &mut rng);
        assert_eq!(states[0], 0);
        assert_eq!(states, obs);

        let from_zero = states.windows(2).filter(|w| w[0] == 0).count();
        let zero_one = states.windows(2).filter(|w| w[0] == 0 && w[1] == 1).count();
        assert::close(zero_one as f64 / from_zero as f64, 0.2, 0.02);
    }

    #[test]
    fn inputs_drive_the_states() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        let mut hmm = InputHmm::new(
            2,
            vec![false, true],
            OpdfDiscrete::uniform(2).unwrap(),
            EmissionMode::Shared,
        )
        .unwrap();
        for i in 0..2 {
            hmm.set_aixj(i, 0, 0, 1.0);
            hmm.set_aixj(i, 0, 1, 0.0);
            hmm.set_aixj(i, 1, 0, 0.0);
            hmm.set_aixj(i, 1, 1, 1.0);
        }
        let mut generator = InputMarkovGenerator::new(&hmm, &mut rng);
        generator
            .observation_sequence(&[false, true, true], &mut rng)
            .unwrap();
        assert_eq!(generator.state_nb(), 1);
        generator.observation(&false, &mut rng).unwrap();
        assert_eq!(generator.state_nb(), 0);
        assert!(generator.observation(&true, &mut rng).is_ok());
    }
}
