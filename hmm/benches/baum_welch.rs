use criterion::*;
use hmm::*;
use ndarray::array;
use rand::{rngs::SmallRng, SeedableRng};

fn bench_baum_welch_iteration(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(0x1234);
    let truth = Hmm::from_parts(
        array![0.5, 0.5],
        array![[0.95, 0.05], [0.1, 0.9]],
        vec![
            OpdfGaussian::new(-2.0, 1.0).unwrap(),
            OpdfGaussian::new(2.0, 0.5).unwrap(),
        ],
    )
    .unwrap();
    let initial = Hmm::new(2, OpdfGaussian::default()).unwrap();
    let mut generator = MarkovGenerator::new(&truth, &mut rng);

    let mut group = c.benchmark_group("BaumWelch");
    for nseqs in [1_usize, 4, 16, 64] {
        let sequences: Vec<Vec<f64>> = (0..nseqs)
            .map(|_| generator.observation_sequence(500, &mut rng))
            .collect();

        group.throughput(Throughput::Elements((nseqs * 500) as u64));
        for parallel in [false, true] {
            let learner =
                BaumWelchLearner::new(RegularCalculator).with_parallel(parallel);
            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(
                BenchmarkId::new(label, nseqs),
                &sequences,
                |b, sequences| {
                    b.iter(|| {
                        // One EM iteration over every sequence
                        let _next = learner.iterate(&initial, sequences).unwrap();
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_baum_welch_iteration);
criterion_main!(benches);
