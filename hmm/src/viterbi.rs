//! Most likely hidden state sequence

use crate::calculator::emission_matrix;
use crate::error::Result;
use crate::model::MarkovModel;
use ndarray::Array2;

/// Viterbi decoding of one sequence, computed in log space.
#[derive(Clone, Debug, PartialEq)]
pub struct ViterbiCalculator {
    states: Vec<usize>,
    ln_probability: f64,
}

impl ViterbiCalculator {
    /// Decode `sequence` under `model`.
    ///
    /// # Errors
    /// `InvalidArgument` on an empty sequence or items the model cannot
    /// evaluate.
    pub fn new<M: MarkovModel>(model: &M, sequence: &[M::Item]) -> Result<Self> {
        let ln_b = emission_matrix(model, sequence)?.mapv(f64::ln);
        let buckets: Vec<usize> = sequence
            .iter()
            .map(|x| model.bucket(x))
            .collect::<Result<_>>()?;
        let (len, n) = ln_b.dim();

        let mut delta = Array2::from_elem((len, n), f64::NEG_INFINITY);
        let mut psi = Array2::<usize>::zeros((len, n));
        for i in 0..n {
            delta[[0, i]] = model.pi(i).ln() + ln_b[[0, i]];
        }

        for t in 1..len {
            for j in 0..n {
                let (best, score) = (0..n)
                    .map(|i| {
                        let ln_a = model.transition(i, buckets[t], j).ln();
                        (i, delta[[t - 1, i]] + ln_a)
                    })
                    .fold((0, f64::NEG_INFINITY), |acc, x| {
                        if x.1 > acc.1 {
                            x
                        } else {
                            acc
                        }
                    });
                delta[[t, j]] = score + ln_b[[t, j]];
                psi[[t, j]] = best;
            }
        }

        let (last, ln_probability) = delta.row(len - 1).iter().enumerate().fold(
            (0, f64::NEG_INFINITY),
            |acc, (i, &d)| if d > acc.1 { (i, d) } else { acc },
        );

        let mut states = vec![last; len];
        for t in (0..len - 1).rev() {
            states[t] = psi[[t + 1, states[t + 1]]];
        }

        Ok(Self {
            states,
            ln_probability,
        })
    }

    /// Most likely state of each step.
    #[must_use]
    pub fn state_sequence(&self) -> &[usize] {
        &self.states
    }

    /// Natural log of the joint probability of the sequence and the path.
    #[must_use]
    pub fn ln_probability(&self) -> f64 {
        self.ln_probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HmmError;
    use crate::hmm::Hmm;
    use crate::opdf::OpdfDiscrete;
    use ndarray::array;

    fn sticky() -> Hmm<OpdfDiscrete> {
        Hmm::from_parts(
            array![0.5, 0.5],
            array![[0.95, 0.05], [0.05, 0.95]],
            vec![
                OpdfDiscrete::new(&[0.9, 0.1]).unwrap(),
                OpdfDiscrete::new(&[0.1, 0.9]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn decodes_obvious_path() {
        let hmm = sticky();
        let seq = [0, 0, 0, 1, 1, 1, 1, 0, 0];
        let v = ViterbiCalculator::new(&hmm, &seq).unwrap();
        assert_eq!(v.state_sequence(), &[0, 0, 0, 1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn isolated_outlier_is_smoothed() {
        let hmm = sticky();
        let v = ViterbiCalculator::new(&hmm, &[0, 0, 1, 0, 0]).unwrap();
        assert_eq!(v.state_sequence(), &[0, 0, 0, 0, 0]);

        let expected = 0.5_f64.ln()
            + 4.0 * 0.9_f64.ln()
            + 0.1_f64.ln()
            + 4.0 * 0.95_f64.ln();
        assert::close(v.ln_probability(), expected, 1E-10);
    }

    #[test]
    fn empty_sequence_is_invalid() {
        assert!(matches!(
            ViterbiCalculator::new(&sticky(), &[]),
            Err(HmmError::InvalidArgument(_))
        ));
    }
}
