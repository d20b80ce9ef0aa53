//! Baum-Welch (expectation-maximization) estimation
//!
//! One iteration runs the forward-backward calculator on every sequence,
//! accumulates the expected transition counts and state occupancies of all
//! sequences, then re-estimates the whole model at once.
//!
//! The per-sequence pass only reads the model, so it is spread over the rayon
//! thread pool; the reduction and the model update happen afterwards on the
//! calling thread.

use crate::calculator::ForwardBackwardCalculator;
use crate::error::{HmmError, Result};
use crate::model::{MarkovModel, Trainable};
use crate::utils::parameter_change;
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;
use tracing::{debug, trace, warn};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// When [`BaumWelchLearner::learn`] stops.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Convergence {
    max_iterations: usize,
    tolerance: Option<f64>,
}

impl Convergence {
    /// Run exactly `max_iterations` iterations.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            tolerance: None,
        }
    }

    /// Also stop once the log-likelihood improves by less than `tolerance`.
    #[must_use]
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self {
            tolerance: Some(tolerance),
            ..self
        }
    }

    /// Iteration cap.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Log-likelihood tolerance, if any.
    #[must_use]
    pub fn tolerance(&self) -> Option<f64> {
        self.tolerance
    }

    fn is_converged(&self, previous: f64, current: f64) -> bool {
        self.tolerance
            .map_or(false, |eps| (current - previous).abs() < eps)
    }
}

impl Default for Convergence {
    fn default() -> Self {
        Self::new(9)
    }
}

/// Summary of one EM iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationReport {
    /// 0-based iteration number.
    pub iteration: usize,
    /// Total log-likelihood of the sequences under the model *entering* the
    /// iteration.
    pub ln_likelihood: f64,
    /// Number of sequences that contributed statistics.
    pub nb_sequences: usize,
    /// Largest change of an initial or transition probability made by the
    /// iteration.
    pub parameter_change: f64,
}

/// Expected counts gathered from one sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceStatistics {
    gamma: Array2<f64>,
    xi: Array3<f64>,
    denominator: Array2<f64>,
    ln_probability: f64,
}

impl SequenceStatistics {
    /// State posteriors, `T x nb_states`.
    #[must_use]
    pub fn gamma(&self) -> &Array2<f64> {
        &self.gamma
    }

    /// Summed transition posteriors indexed `[from, bucket, to]`.
    #[must_use]
    pub fn xi(&self) -> &Array3<f64> {
        &self.xi
    }

    /// Summed occupancies of the source states indexed `[from, bucket]`.
    #[must_use]
    pub fn denominator(&self) -> &Array2<f64> {
        &self.denominator
    }

    /// Log-probability of the sequence.
    #[must_use]
    pub fn ln_probability(&self) -> f64 {
        self.ln_probability
    }

    /// Whether the sequence has zero probability and carries no statistics.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.ln_probability == f64::NEG_INFINITY
    }
}

/// Sums of the statistics of every contributing sequence.
struct Accumulator {
    xi: Array3<f64>,
    denominator: Array2<f64>,
    pi: Array1<f64>,
    ln_likelihood: f64,
    nb_sequences: usize,
}

impl Accumulator {
    fn new(nb_states: usize, nb_buckets: usize) -> Self {
        Self {
            xi: Array3::zeros((nb_states, nb_buckets, nb_states)),
            denominator: Array2::zeros((nb_states, nb_buckets)),
            pi: Array1::zeros(nb_states),
            ln_likelihood: 0.0,
            nb_sequences: 0,
        }
    }

    fn add(&mut self, stats: &SequenceStatistics) {
        self.xi += &stats.xi;
        self.denominator += &stats.denominator;
        self.pi += &stats.gamma.row(0);
        self.ln_likelihood += stats.ln_probability;
        self.nb_sequences += 1;
    }
}

/// Baum-Welch learner using the calculator strategy `C`.
///
/// # Example
/// ```rust
/// use hmm::{BaumWelchLearner, Convergence, Hmm, OpdfDiscrete, RegularCalculator};
/// use ndarray::array;
///
/// let hmm = Hmm::from_parts(
///     array![0.5, 0.5],
///     array![[0.8, 0.2], [0.3, 0.7]],
///     vec![
///         OpdfDiscrete::new(&[0.7, 0.3]).unwrap(),
///         OpdfDiscrete::new(&[0.2, 0.8]).unwrap(),
///     ],
/// )
/// .unwrap();
/// let sequences = vec![vec![0, 0, 1, 1, 1, 0], vec![1, 1, 0, 0, 0, 1, 1]];
///
/// let learner = BaumWelchLearner::new(RegularCalculator)
///     .with_convergence(Convergence::new(20).with_tolerance(1E-8));
/// let fitted = learner.learn(&hmm, &sequences).unwrap();
///
/// let before = hmm.ln_probability(&sequences[0]).unwrap()
///     + hmm.ln_probability(&sequences[1]).unwrap();
/// let after = fitted.ln_probability(&sequences[0]).unwrap()
///     + fitted.ln_probability(&sequences[1]).unwrap();
/// assert!(after >= before);
/// ```
#[derive(Clone, Debug)]
pub struct BaumWelchLearner<C> {
    calculator: C,
    convergence: Convergence,
    parallel: bool,
}

impl<C> BaumWelchLearner<C> {
    /// Create a learner computing forward-backward values with `calculator`.
    pub fn new(calculator: C) -> Self {
        Self {
            calculator,
            convergence: Convergence::default(),
            parallel: true,
        }
    }

    /// Replace the stopping policy of [`BaumWelchLearner::learn`].
    #[must_use]
    pub fn with_convergence(self, convergence: Convergence) -> Self {
        Self {
            convergence,
            ..self
        }
    }

    /// Enable or disable the parallel per-sequence pass.
    #[must_use]
    pub fn with_parallel(self, parallel: bool) -> Self {
        Self { parallel, ..self }
    }

    /// The stopping policy.
    pub fn convergence(&self) -> &Convergence {
        &self.convergence
    }

    /// The calculator strategy.
    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    /// Expected counts of one sequence under `model`.
    ///
    /// This only reads `model` and may be called concurrently.
    ///
    /// # Errors
    /// `InvalidArgument` if the sequence has fewer than two items or the model
    /// cannot evaluate it.
    pub fn statistics<M>(
        &self,
        model: &M,
        sequence: &[M::Item],
    ) -> Result<SequenceStatistics>
    where
        M: MarkovModel,
        C: ForwardBackwardCalculator<M>,
    {
        if sequence.len() < 2 {
            return Err(HmmError::invalid("sequence too short"));
        }
        let n = model.nb_states();
        let nb_buckets = model.nb_buckets();
        let fb = self.calculator.forward_backward(model, sequence)?;

        let mut xi = Array3::zeros((n, nb_buckets, n));
        let mut denominator = Array2::zeros((n, nb_buckets));
        let gamma = fb.gamma();
        if fb.is_degenerate() {
            return Ok(SequenceStatistics {
                gamma,
                xi,
                denominator,
                ln_probability: f64::NEG_INFINITY,
            });
        }

        let (alpha, beta, b, scale) =
            (fb.alpha(), fb.beta(), fb.emissions(), fb.scale());
        for t in 0..sequence.len() - 1 {
            // The item entering step t + 1 selects the transition bucket.
            let k = model.bucket(&sequence[t + 1])?;
            for i in 0..n {
                denominator[[i, k]] += gamma[[t, i]];
                for j in 0..n {
                    xi[[i, k, j]] += alpha[[t, i]]
                        * model.transition(i, k, j)
                        * b[[t + 1, j]]
                        * beta[[t + 1, j]]
                        / scale[t + 1];
                }
            }
        }

        Ok(SequenceStatistics {
            gamma,
            xi,
            denominator,
            ln_probability: fb.ln_probability(),
        })
    }

    /// Perform one EM iteration and return the re-estimated model.
    ///
    /// # Errors
    /// `InvalidArgument` when `sequences` is empty, a sequence is shorter than
    /// two items, or an emission refit rejects its input.
    pub fn iterate<M>(&self, model: &M, sequences: &[Vec<M::Item>]) -> Result<M>
    where
        M: Trainable,
        C: ForwardBackwardCalculator<M>,
    {
        self.step(model, sequences, 0).map(|(next, _)| next)
    }

    /// Iterate according to the configured [`Convergence`].
    ///
    /// # Errors
    /// See [`BaumWelchLearner::iterate`].
    pub fn learn<M>(&self, model: &M, sequences: &[Vec<M::Item>]) -> Result<M>
    where
        M: Trainable,
        C: ForwardBackwardCalculator<M>,
    {
        let convergence = self.convergence;
        if convergence.max_iterations == 0 {
            return Ok(model.clone());
        }
        let mut previous: Option<f64> = None;
        self.learn_until(model, sequences, |report| {
            let converged = previous.map_or(false, |p| {
                convergence.is_converged(p, report.ln_likelihood)
            });
            previous = Some(report.ln_likelihood);
            converged || report.iteration + 1 >= convergence.max_iterations
        })
    }

    /// Iterate until `stop` returns `true`; `stop` is consulted after every
    /// iteration and must eventually return `true`.
    ///
    /// # Errors
    /// See [`BaumWelchLearner::iterate`].
    pub fn learn_until<M, F>(
        &self,
        model: &M,
        sequences: &[Vec<M::Item>],
        mut stop: F,
    ) -> Result<M>
    where
        M: Trainable,
        C: ForwardBackwardCalculator<M>,
        F: FnMut(&IterationReport) -> bool,
    {
        let mut current = model.clone();
        for iteration in 0.. {
            let (next, report) = self.step(&current, sequences, iteration)?;
            debug!(
                iteration,
                ln_likelihood = report.ln_likelihood,
                nb_sequences = report.nb_sequences,
                parameter_change = report.parameter_change,
                "baum-welch iteration"
            );
            current = next;
            if stop(&report) {
                break;
            }
        }
        Ok(current)
    }

    fn step<M>(
        &self,
        model: &M,
        sequences: &[Vec<M::Item>],
        iteration: usize,
    ) -> Result<(M, IterationReport)>
    where
        M: Trainable,
        C: ForwardBackwardCalculator<M>,
    {
        if sequences.is_empty() {
            return Err(HmmError::invalid("no observation sequence"));
        }

        let stats: Vec<SequenceStatistics> = if self.parallel {
            sequences
                .par_iter()
                .map(|seq| self.statistics(model, seq))
                .collect::<Result<_>>()?
        } else {
            sequences
                .iter()
                .map(|seq| self.statistics(model, seq))
                .collect::<Result<_>>()?
        };

        let n = model.nb_states();
        let nb_buckets = model.nb_buckets();
        let mut acc = Accumulator::new(n, nb_buckets);
        let mut contributing = Vec::with_capacity(sequences.len());
        for (index, (seq, st)) in sequences.iter().zip(stats.iter()).enumerate() {
            if st.is_degenerate() {
                warn!(sequence = index, "zero probability sequence skipped");
                continue;
            }
            acc.add(st);
            contributing.push((seq.as_slice(), &st.gamma));
        }

        let mut report = IterationReport {
            iteration,
            ln_likelihood: f64::NEG_INFINITY,
            nb_sequences: acc.nb_sequences,
            parameter_change: 0.0,
        };
        if acc.nb_sequences == 0 {
            warn!("no sequence has a positive probability, model unchanged");
            return Ok((model.clone(), report));
        }
        report.ln_likelihood = acc.ln_likelihood;

        let mut next = model.clone();

        let nb = acc.nb_sequences as f64;
        for i in 0..n {
            let p = acc.pi[i] / nb;
            if p.is_finite() {
                next.set_pi(i, p);
            }
        }

        for i in 0..n {
            for k in 0..nb_buckets {
                let den = acc.denominator[[i, k]];
                let row: Vec<f64> =
                    (0..n).map(|j| acc.xi[[i, k, j]] / den).collect();
                if den > 0.0 && row.iter().all(|x| x.is_finite()) {
                    row.into_iter()
                        .enumerate()
                        .for_each(|(j, a)| next.set_transition(i, k, j, a));
                } else {
                    trace!(state = i, bucket = k, "unreachable, row kept");
                }
            }
        }

        next.refit_emissions(&contributing)?;
        report.parameter_change =
            parameter_change(model, &next).unwrap_or(f64::NAN);
        Ok((next, report))
    }
}
