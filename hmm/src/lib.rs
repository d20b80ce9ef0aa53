//! Hidden Markov Models and their training.
//!
//! This library provides
//!  * Plain HMMs as [`Hmm`] and input-driven HMMs as [`InputHmm`]
//!  * Emission distributions: [`OpdfDiscrete`], [`OpdfGaussian`] and
//!    [`OpdfMultiGaussian`]
//!  * A scaled forward-backward calculator ([`RegularCalculator`],
//!    [`InputCalculator`]) and Viterbi decoding ([`ViterbiCalculator`])
//!  * Baum-Welch training as [`BaumWelchLearner`] and k-means
//!    initialization as [`KMeansLearner`]
//!
//! # Example
//! ```rust
//! use hmm::{BaumWelchLearner, Hmm, KMeansLearner, OpdfGaussian, RegularCalculator};
//! use rand::{rngs::SmallRng, SeedableRng};
//!
//! let mut rng = SmallRng::seed_from_u64(0x1234);
//! let sequences = vec![
//!     vec![0.1, -0.2, 0.05, 5.1, 4.9, 5.2, 0.0],
//!     vec![5.0, 5.3, 4.8, -0.1, 0.2, 0.1],
//! ];
//!
//! let initial = KMeansLearner::new(2, OpdfGaussian::default, &sequences, &mut rng)
//!     .unwrap()
//!     .learn()
//!     .unwrap();
//! let hmm: Hmm<OpdfGaussian> = BaumWelchLearner::new(RegularCalculator)
//!     .learn(&initial, &sequences)
//!     .unwrap();
//! assert!(hmm.ln_probability(&sequences[0]).unwrap().is_finite());
//! ```
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]

mod error;
pub use error::{HmmError, Result};

mod observation;
pub use observation::{InputObservationTuple, ObservationVector};

pub mod centroid;

pub mod opdf;
pub use opdf::{Opdf, OpdfDiscrete, OpdfGaussian, OpdfMultiGaussian};

mod model;
pub use model::{MarkovModel, Trainable, STOCHASTIC_TOLERANCE};

mod hmm;
pub use crate::hmm::Hmm;

mod input_hmm;
pub use input_hmm::{EmissionMode, InputHmm, InputItem};

pub mod calculator;
pub use calculator::{
    ForwardBackward, ForwardBackwardCalculator, InputCalculator,
    RegularCalculator,
};

mod viterbi;
pub use viterbi::ViterbiCalculator;

pub mod learn;
pub use learn::{
    BaumWelchLearner, Convergence, IterationReport, KMeansCalculator,
    KMeansLearner,
};

mod generator;
pub use generator::{InputMarkovGenerator, MarkovGenerator};

mod distance;
pub use distance::KullbackLeiblerDistance;

pub mod draw;
pub use draw::{DotDrawer, DotGraph};

pub mod io;

pub mod utils;

pub use rv;
