//! General Utilities

use crate::model::MarkovModel;
use num_traits::Float;

/// The max-norm or max-error between two sequences.
///
/// Returns `None` if the sequences are empty or of unequal length. A `NaN`
/// on either side makes the result `NaN`.
///
/// # Example
/// ```rust
/// use hmm::utils::max_error;
///
/// let err = max_error(&[1.0_f32, 2.0, 3.0], &[1.5, 2.0, 1.0]).unwrap();
/// assert_eq!(err, 2.0);
/// assert!(max_error::<f64>(&[], &[]).is_none());
/// ```
pub fn max_error<T: Float>(predicted: &[T], expected: &[T]) -> Option<T> {
    if predicted.is_empty() || predicted.len() != expected.len() {
        return None;
    }
    Some(predicted.iter().zip(expected.iter()).fold(
        T::zero(),
        |acc, (&a, &b)| {
            let d = (a - b).abs();
            if d.is_nan() || d > acc {
                d
            } else {
                acc
            }
        },
    ))
}

/// Initial and transition probabilities of `model`, flattened in a fixed
/// order.
pub fn markov_parameters<M: MarkovModel>(model: &M) -> Vec<f64> {
    let n = model.nb_states();
    let buckets = model.nb_buckets();
    let mut params = Vec::with_capacity(n + n * n * buckets);
    params.extend((0..n).map(|i| model.pi(i)));
    for i in 0..n {
        for k in 0..buckets {
            params.extend((0..n).map(|j| model.transition(i, k, j)));
        }
    }
    params
}

/// Largest absolute difference between the initial and transition
/// probabilities of two models of the same shape, `None` if the shapes
/// differ.
pub fn parameter_change<M: MarkovModel>(a: &M, b: &M) -> Option<f64> {
    max_error(&markov_parameters(a), &markov_parameters(b))
}
