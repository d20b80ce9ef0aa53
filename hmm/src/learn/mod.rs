//! Learners: Baum-Welch refinement and k-means initialization

mod baum_welch;
pub use baum_welch::{
    BaumWelchLearner, Convergence, IterationReport, SequenceStatistics,
};

mod kmeans;
pub use kmeans::{KMeansCalculator, KMeansLearner, DEFAULT_MAX_ITERATIONS};
