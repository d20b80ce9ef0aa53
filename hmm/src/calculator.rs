//! Scaled forward-backward computation
//!
//! The forward variables are normalized at every step so long sequences do not
//! underflow. With `n_t` the normalizer of step `t`:
//!
//! * `alpha[[t, i]]` is the probability of being in `i` at `t` given the
//!   observations up to `t`;
//! * `beta[[t, i]]` is the backward variable divided by `n_{t+1} ... n_{T-1}`,
//!   so that `sum_i alpha[[t, i]] * beta[[t, i]] == 1`;
//! * `ln P(O) = sum_t ln n_t`.
//!
//! The caller picks the calculator matching its model: [`RegularCalculator`]
//! for [`Hmm`], [`InputCalculator`] for [`InputHmm`].

use crate::error::{HmmError, Result};
use crate::hmm::Hmm;
use crate::input_hmm::InputHmm;
use crate::model::MarkovModel;
use crate::opdf::Opdf;
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use std::fmt::Debug;

/// Result of a forward-backward pass over one sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardBackward {
    alpha: Array2<f64>,
    beta: Array2<f64>,
    emissions: Array2<f64>,
    scale: Array1<f64>,
    degenerate: bool,
}

impl ForwardBackward {
    /// Scaled forward probabilities, `T x nb_states`.
    #[must_use]
    pub fn alpha(&self) -> &Array2<f64> {
        &self.alpha
    }

    /// Scaled backward probabilities, `T x nb_states`.
    #[must_use]
    pub fn beta(&self) -> &Array2<f64> {
        &self.beta
    }

    /// Emission probability of each observation under each state.
    #[must_use]
    pub fn emissions(&self) -> &Array2<f64> {
        &self.emissions
    }

    /// Per-step normalizers `n_t`.
    #[must_use]
    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Sequence length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alpha.nrows()
    }

    /// Whether the sequence is empty (never true for a computed result).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the sequence has zero probability under the model.
    ///
    /// A degenerate result holds no usable statistics.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Natural log of the sequence probability.
    #[must_use]
    pub fn ln_probability(&self) -> f64 {
        if self.degenerate {
            f64::NEG_INFINITY
        } else {
            self.scale.iter().map(|n| n.ln()).sum()
        }
    }

    /// Sequence probability; underflows to 0 for long sequences.
    #[must_use]
    pub fn probability(&self) -> f64 {
        self.ln_probability().exp()
    }

    /// State posteriors, `gamma[[t, i]] = P(q_t = i | O)`.
    ///
    /// Every row sums to one unless the result is degenerate, in which case
    /// all entries are zero.
    #[must_use]
    pub fn gamma(&self) -> Array2<f64> {
        let mut gamma = &self.alpha * &self.beta;
        if self.degenerate {
            gamma.fill(0.0);
            return gamma;
        }
        gamma.axis_iter_mut(Axis(0)).for_each(|mut row| {
            let z = row.sum();
            if z > 0.0 && z.is_finite() {
                row /= z;
            }
        });
        gamma
    }
}

/// Strategy computing forward-backward results for a model variant.
pub trait ForwardBackwardCalculator<M: MarkovModel>: Send + Sync {
    /// Run the scaled forward-backward algorithm on `sequence`.
    ///
    /// # Errors
    /// `InvalidArgument` when the sequence is empty, the model has no state,
    /// or an item cannot be evaluated by the model.
    fn forward_backward(
        &self,
        model: &M,
        sequence: &[M::Item],
    ) -> Result<ForwardBackward>;
}

/// Calculator for plain [`Hmm`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegularCalculator;

/// Calculator for [`InputHmm`]s, transitions into step `t` use the input of
/// step `t`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputCalculator;

impl<D: Opdf> ForwardBackwardCalculator<Hmm<D>> for RegularCalculator {
    fn forward_backward(
        &self,
        hmm: &Hmm<D>,
        sequence: &[D::Observation],
    ) -> Result<ForwardBackward> {
        let emissions = emission_matrix(hmm, sequence)?;
        let a = hmm.transitions().view();
        Ok(scaled_forward_backward(hmm.pis(), emissions, move |_| a))
    }
}

impl<I, D> ForwardBackwardCalculator<InputHmm<I, D>> for InputCalculator
where
    I: Clone + PartialEq + Debug + Send + Sync,
    D: Opdf,
{
    fn forward_backward(
        &self,
        hmm: &InputHmm<I, D>,
        sequence: &[<InputHmm<I, D> as MarkovModel>::Item],
    ) -> Result<ForwardBackward> {
        let emissions = emission_matrix(hmm, sequence)?;
        let buckets: Vec<usize> = sequence
            .iter()
            .map(|x| hmm.bucket(x))
            .collect::<Result<_>>()?;
        let pi = Array1::from_shape_fn(hmm.nb_states(), |i| hmm.pi(i));
        let a = hmm.transitions();
        Ok(scaled_forward_backward(&pi, emissions, move |t| {
            a.slice(s![.., buckets[t], ..])
        }))
    }
}

/// `b[[t, j]]`, the probability that state `j` emits the `t`-th item.
pub(crate) fn emission_matrix<M: MarkovModel>(
    model: &M,
    sequence: &[M::Item],
) -> Result<Array2<f64>> {
    if sequence.is_empty() {
        return Err(HmmError::invalid("empty observation sequence"));
    }
    let n = model.nb_states();
    if n == 0 {
        return Err(HmmError::invalid("model has no state"));
    }
    let mut b = Array2::zeros((sequence.len(), n));
    for (t, item) in sequence.iter().enumerate() {
        for j in 0..n {
            b[[t, j]] = model.emission(j, item)?;
        }
    }
    Ok(b)
}

/// Core recursion; `transition(t)` is the matrix used to enter step `t`.
fn scaled_forward_backward<'a, F>(
    pi: &Array1<f64>,
    emissions: Array2<f64>,
    transition: F,
) -> ForwardBackward
where
    F: Fn(usize) -> ArrayView2<'a, f64>,
{
    let (len, n) = emissions.dim();
    let mut alpha = Array2::zeros((len, n));
    let mut beta = Array2::zeros((len, n));
    let mut scale = Array1::zeros(len);

    for t in 0..len {
        let mut next = if t == 0 {
            pi * &emissions.row(0)
        } else {
            alpha.row(t - 1).dot(&transition(t)) * &emissions.row(t)
        };
        let z = next.sum();
        if z <= 0.0 || !z.is_finite() {
            // The sequence cannot be produced by the model.
            alpha.fill(0.0);
            return ForwardBackward {
                alpha,
                beta,
                emissions,
                scale,
                degenerate: true,
            };
        }
        next /= z;
        alpha.row_mut(t).assign(&next);
        scale[t] = z;
    }

    beta.row_mut(len - 1).fill(1.0);
    for t in (0..len - 1).rev() {
        let weighted = &emissions.row(t + 1) * &beta.row(t + 1);
        let prev = transition(t + 1).dot(&weighted) / scale[t + 1];
        beta.row_mut(t).assign(&prev);
    }

    debug_assert!(
        !alpha.iter().chain(beta.iter()).any(|x| x.is_nan()),
        "forward-backward variables cannot contain NaNs"
    );
    ForwardBackward {
        alpha,
        beta,
        emissions,
        scale,
        degenerate: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_hmm::EmissionMode;
    use crate::observation::InputObservationTuple;
    use crate::opdf::{OpdfDiscrete, OpdfGaussian};
    use ndarray::{array, Array3};

    fn coin_hmm() -> Hmm<OpdfDiscrete> {
        Hmm::from_parts(
            array![0.6, 0.4],
            array![[0.7, 0.3], [0.4, 0.6]],
            vec![
                OpdfDiscrete::new(&[0.5, 0.4, 0.1]).unwrap(),
                OpdfDiscrete::new(&[0.1, 0.3, 0.6]).unwrap(),
            ],
        )
        .unwrap()
    }

    /// Sum over every hidden path, feasible for tiny problems only.
    fn brute_force(hmm: &Hmm<OpdfDiscrete>, seq: &[usize]) -> f64 {
        let n = hmm.nb_states();
        let paths = n.pow(seq.len() as u32);
        (0..paths)
            .map(|mut code| {
                let mut states = Vec::with_capacity(seq.len());
                for _ in 0..seq.len() {
                    states.push(code % n);
                    code /= n;
                }
                let mut p = hmm.pi(states[0]) * hmm.opdf(states[0]).probability(&seq[0]);
                for t in 1..seq.len() {
                    p *= hmm.aij(states[t - 1], states[t])
                        * hmm.opdf(states[t]).probability(&seq[t]);
                }
                p
            })
            .sum()
    }

    #[test]
    fn likelihood_matches_brute_force() {
        let hmm = coin_hmm();
        let seq = [0, 1, 2, 2, 0];
        let fb = RegularCalculator.forward_backward(&hmm, &seq).unwrap();
        assert::close(fb.probability(), brute_force(&hmm, &seq), 1E-12);
        assert!(!fb.is_degenerate());
    }

    #[test]
    fn gamma_rows_sum_to_one() {
        let hmm = coin_hmm();
        let seq = [0, 1, 2, 2, 0, 1, 1, 2];
        let fb = RegularCalculator.forward_backward(&hmm, &seq).unwrap();
        for row in fb.gamma().rows() {
            assert::close(row.sum(), 1.0, 1E-12);
        }
        for row in fb.alpha().rows() {
            assert::close(row.sum(), 1.0, 1E-12);
        }
    }

    #[test]
    fn long_sequences_do_not_underflow() {
        let hmm = Hmm::new(2, OpdfGaussian::new(0.0, 1.0).unwrap()).unwrap();
        let seq: Vec<f64> = (0..5_000).map(|t| (t as f64).sin() * 3.0).collect();
        let fb = RegularCalculator.forward_backward(&hmm, &seq).unwrap();
        assert_eq!(fb.probability(), 0.0);
        assert!(fb.ln_probability().is_finite());
        assert!(fb.ln_probability() < -5_000.0);
    }

    #[test]
    fn empty_sequence_is_invalid() {
        let hmm = coin_hmm();
        assert!(matches!(
            RegularCalculator.forward_backward(&hmm, &[]),
            Err(HmmError::InvalidArgument(_))
        ));
    }

    #[test]
    fn impossible_sequence_is_degenerate() {
        let hmm = Hmm::new(2, OpdfDiscrete::new(&[1.0, 0.0]).unwrap()).unwrap();
        let fb = RegularCalculator.forward_backward(&hmm, &[0, 1, 0]).unwrap();
        assert!(fb.is_degenerate());
        assert_eq!(fb.ln_probability(), f64::NEG_INFINITY);
        assert!(fb.gamma().iter().all(|g| *g == 0.0));
    }

    #[test]
    fn input_calculator_uses_the_current_input() {
        // Input 's' always leads to state 0, input 'g' to state 1.
        let a = Array3::from_shape_vec(
            (2, 2, 2),
            vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0],
        )
        .unwrap();
        let hmm = InputHmm::from_parts(
            vec!['s', 'g'],
            array![1.0, 0.0],
            a,
            vec![
                vec![OpdfDiscrete::new(&[0.9, 0.1]).unwrap()],
                vec![OpdfDiscrete::new(&[0.2, 0.8]).unwrap()],
            ],
            EmissionMode::Shared,
        )
        .unwrap();
        let seq = [
            InputObservationTuple::new('s', 0),
            InputObservationTuple::new('g', 1),
            InputObservationTuple::new('s', 0),
        ];
        let fb = InputCalculator.forward_backward(&hmm, &seq).unwrap();
        // The path is forced: 0 -> 1 -> 0.
        assert::close(fb.probability(), 0.9 * 0.8 * 0.9, 1E-12);
        let gamma = fb.gamma();
        assert::close(gamma[[1, 1]], 1.0, 1E-12);
        assert::close(gamma[[2, 0]], 1.0, 1E-12);
    }
}
