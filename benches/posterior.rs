use criterion::{black_box, criterion_group, criterion_main, Criterion};
use grn_mcmc::dataset::{Observation, Track, TrackDataset};
use grn_mcmc::model::BoundaryInputs;
use grn_mcmc::posterior::{NoiseModel, Posterior, Prior};
use grn_mcmc::simulation::{Simulate, TrackSimulator};
use grn_mcmc::{GrnParameters, LogPosterior, NB_PARAMETERS};
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use rand_pcg::Pcg64Mcg;

/// Ten tracks of 40 observations, one observation missing every ten.
fn synthetic_dataset(rng: &mut Pcg64Mcg) -> TrackDataset {
    let unit = Uniform::new(0., 1.);
    let tracks = (0..10)
        .map(|id| {
            let observations = (0..44)
                .filter(|t| t % 10 != 9)
                .map(|t| Observation {
                    time: t as f64,
                    bio_time: t as f64,
                    inputs: BoundaryInputs::new(
                        unit.sample(rng),
                        unit.sample(rng),
                    ),
                    expression: [
                        unit.sample(rng),
                        unit.sample(rng),
                        unit.sample(rng),
                    ],
                })
                .collect();
            Track::new(id.to_string(), observations).unwrap()
        })
        .collect();
    TrackDataset::new(tracks)
}

fn posterior_benchmark(c: &mut Criterion) {
    let mut rng = Pcg64Mcg::seed_from_u64(26);
    let dataset = synthetic_dataset(&mut rng);
    let prior = Prior::default();
    let theta = prior.sample_ensemble(1, &mut rng).remove(0);
    assert_eq!(theta.len(), NB_PARAMETERS);
    let parameters = GrnParameters::try_from(theta.as_slice()).unwrap();
    let posterior = Posterior::new(
        &dataset,
        TrackSimulator::default(),
        prior,
        NoiseModel::default(),
    );

    let mut group = c.benchmark_group("posterior_benchmark");
    group.bench_function("simulate one track", |b| {
        b.iter(|| {
            TrackSimulator::default()
                .simulate_track(black_box(&dataset.tracks()[0]), &parameters)
        })
    });
    group.bench_function("log-posterior ten tracks", |b| {
        b.iter(|| posterior.ln_posterior(black_box(&theta)))
    });
    group.finish();
}

criterion_group!(benches, posterior_benchmark);
criterion_main!(benches);
