//! Fit a two-regime Gaussian model to synthetic data and print it as a
//! Graphviz digraph.

use hmm::io::{read_sequences, write_sequences, RealReader};
use hmm::{
    BaumWelchLearner, Convergence, DotDrawer, Hmm, KMeansLearner,
    KullbackLeiblerDistance, MarkovGenerator, OpdfGaussian, RegularCalculator,
};
use ndarray::array;
use rand::{rngs::SmallRng, SeedableRng};

fn main() -> hmm::Result<()> {
    let mut rng = SmallRng::seed_from_u64(0xABCD);
    let truth = Hmm::from_parts(
        array![0.8, 0.2],
        array![[0.97, 0.03], [0.05, 0.95]],
        vec![OpdfGaussian::new(0.0, 1.0)?, OpdfGaussian::new(4.0, 2.0)?],
    )?;

    // Round-trip the data through the text format
    let mut generator = MarkovGenerator::new(&truth, &mut rng);
    let generated: Vec<Vec<f64>> = (0..20)
        .map(|_| generator.observation_sequence(300, &mut rng))
        .collect();
    let mut text = Vec::new();
    write_sequences(&mut text, &generated)?;
    let sequences = read_sequences(&RealReader, text.as_slice())?;

    let initial = KMeansLearner::new(
        2,
        OpdfGaussian::default,
        &sequences,
        &mut rng,
    )?
    .learn()?;
    let fitted = BaumWelchLearner::new(RegularCalculator)
        .with_convergence(Convergence::new(50).with_tolerance(1E-6))
        .learn(&initial, &sequences)?;

    for i in 0..fitted.nb_states() {
        println!("state {i}: {}", fitted.opdf(i));
    }
    let kl = KullbackLeiblerDistance::default().distance(
        &truth,
        &fitted,
        &mut rng,
    )?;
    println!("KL distance to the generating model: {kl}");
    print!("{}", DotDrawer::default().draw(&fitted));
    Ok(())
}
