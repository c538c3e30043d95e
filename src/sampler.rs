//! Affine invariant ensemble sampler with the stretch move of Goodman and
//! Weare (2010).
//!
//! The ensemble is split in two halves updated in turn: each walker of the
//! active half proposes `y = c + z (x - c)`, where `c` is a random walker of
//! the other half and `z` is drawn from `g(z) ~ 1 / sqrt(z)` on `[1/a, a]`.
//!
//! All random numbers are drawn serially from one seeded generator before the
//! proposals of a half are evaluated in parallel, hence a run depends on the
//! seed only, not on the number of threads.
use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::chain::Chain;
use crate::error::{EvaluationError, SamplerError};
use crate::posterior::LogPosterior;

/// What to do when the evaluation of a proposal fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log a warning, count the failure and reject the proposal as if its
    /// log-posterior was minus infinity.
    #[default]
    Reject,
    /// Stop the run with an error.
    Abort,
}

#[derive(Builder, Debug, Clone, PartialEq)]
pub struct SamplerOptions {
    /// Number of walkers, even and at least twice the number of dimensions.
    #[builder(default = "48")]
    pub walkers: usize,
    /// Number of ensemble updates.
    pub steps: usize,
    #[builder(default = "26")]
    pub seed: u64,
    /// Scale `a` of the stretch move, greater than one.
    #[builder(default = "2.")]
    pub stretch: f64,
    #[builder(default)]
    pub failure: FailurePolicy,
    /// Size of the worker pool, rayon's default when `None`.
    #[builder(default, setter(strip_option))]
    pub threads: Option<usize>,
    #[builder(default)]
    pub progress: bool,
}

/// One stretch move proposal with the random numbers deciding its fate.
struct Proposal {
    walker: usize,
    position: Vec<f64>,
    ln_z: f64,
    ln_u: f64,
}

pub struct EnsembleSampler<'a, P: LogPosterior> {
    posterior: &'a P,
    options: SamplerOptions,
}

impl<'a, P: LogPosterior> EnsembleSampler<'a, P> {
    pub fn new(posterior: &'a P, options: SamplerOptions) -> Self {
        EnsembleSampler { posterior, options }
    }

    pub fn options(&self) -> &SamplerOptions {
        &self.options
    }

    fn check_setup(&self, initial: &[Vec<f64>]) -> Result<(), SamplerError> {
        let dims = self.posterior.nb_dimensions();
        let walkers = self.options.walkers;
        if walkers % 2 != 0 || walkers < 2 * dims {
            return Err(SamplerError::Setup(format!(
                "the number of walkers must be even and at least {}, found {}",
                2 * dims,
                walkers
            )));
        }
        if !(self.options.stretch > 1.) {
            return Err(SamplerError::Setup(format!(
                "the stretch scale must be greater than 1, found {}",
                self.options.stretch
            )));
        }
        if self.options.threads == Some(0) {
            return Err(SamplerError::Setup(
                "the pool needs at least one thread".to_string(),
            ));
        }
        if initial.len() != walkers {
            return Err(SamplerError::Setup(format!(
                "found {} initial positions for {} walkers",
                initial.len(),
                walkers
            )));
        }
        if let Some(position) = initial.iter().find(|p| p.len() != dims) {
            return Err(SamplerError::Setup(format!(
                "found an initial position with {} dimensions instead of {}",
                position.len(),
                dims
            )));
        }
        Ok(())
    }

    fn handle(
        &self,
        result: Result<f64, EvaluationError>,
        walker: usize,
        step: usize,
        failures: &mut usize,
    ) -> Result<f64, SamplerError> {
        match result {
            Ok(ln_prob) => Ok(ln_prob),
            Err(source) => match self.options.failure {
                FailurePolicy::Abort => {
                    Err(SamplerError::Evaluation { walker, step, source })
                }
                FailurePolicy::Reject => {
                    let cause = std::error::Error::source(&source)
                        .map(|cause| format!(": {}", cause))
                        .unwrap_or_default();
                    log::warn!(
                        "rejecting walker {} at step {}, {}{}",
                        walker,
                        step,
                        source,
                        cause
                    );
                    *failures += 1;
                    Ok(f64::NEG_INFINITY)
                }
            },
        }
    }

    fn propose(
        &self,
        rng: &mut ChaCha8Rng,
        positions: &[Vec<f64>],
        active: std::ops::Range<usize>,
        complementary: std::ops::Range<usize>,
    ) -> Vec<Proposal> {
        let a = self.options.stretch;
        active
            .map(|walker| {
                let u: f64 = rng.gen();
                let z = ((a - 1.) * u + 1.).powi(2) / a;
                let partner = &positions[rng.gen_range(complementary.clone())];
                let position = positions[walker]
                    .iter()
                    .zip(partner)
                    .map(|(x, c)| c + z * (x - c))
                    .collect();
                // in (0, 1]
                let ln_u = (1. - rng.gen::<f64>()).ln();
                Proposal { walker, position, ln_z: z.ln(), ln_u }
            })
            .collect()
    }

    pub fn run(&self, initial: Vec<Vec<f64>>) -> Result<Chain, SamplerError> {
        //! Evolve the ensemble from `initial`, one position per walker, and
        //! record every step.
        self.check_setup(&initial)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads.unwrap_or(0))
            .build()?;
        let walkers = self.options.walkers;
        let dims = self.posterior.nb_dimensions();
        let half = walkers / 2;
        let mut rng = ChaCha8Rng::seed_from_u64(self.options.seed);
        let mut chain = Chain::with_capacity(walkers, dims, self.options.steps);
        let mut failures = 0;

        log::info!(
            "sampling {} dimensions with {} walkers for {} steps in {} threads",
            dims,
            walkers,
            self.options.steps,
            pool.current_num_threads()
        );

        let mut positions = initial;
        let evaluated: Vec<Result<f64, EvaluationError>> = pool.install(|| {
            positions
                .par_iter()
                .map(|p| self.posterior.ln_posterior(p))
                .collect()
        });
        let mut ln_probs = Vec::with_capacity(walkers);
        for (walker, result) in evaluated.into_iter().enumerate() {
            ln_probs.push(self.handle(result, walker, 0, &mut failures)?);
        }
        if ln_probs.iter().all(|lp| *lp == f64::NEG_INFINITY) {
            log::warn!("no walker starts with a positive posterior");
        }

        let pb = if self.options.progress {
            let pb = ProgressBar::new(self.options.steps as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{elapsed_precise} [{bar:40}] {pos}/{len} steps ({eta})",
            ) {
                pb.set_style(style);
            }
            Some(pb)
        } else {
            None
        };

        for step in 0..self.options.steps {
            for (active, complementary) in
                [(0..half, half..walkers), (half..walkers, 0..half)]
            {
                let proposals =
                    self.propose(&mut rng, &positions, active, complementary);
                let evaluated: Vec<Result<f64, EvaluationError>> = pool
                    .install(|| {
                        proposals
                            .par_iter()
                            .map(|p| self.posterior.ln_posterior(&p.position))
                            .collect()
                    });
                for (proposal, result) in proposals.into_iter().zip(evaluated)
                {
                    let walker = proposal.walker;
                    let ln_prob = self.handle(
                        result,
                        walker,
                        step + 1,
                        &mut failures,
                    )?;
                    let ln_q = (dims as f64 - 1.) * proposal.ln_z + ln_prob
                        - ln_probs[walker];
                    // false for NaN, i.e. when both are minus infinity
                    if ln_q > proposal.ln_u {
                        positions[walker] = proposal.position;
                        ln_probs[walker] = ln_prob;
                        chain.accept(walker);
                    }
                }
            }
            chain.push_step(&positions, &ln_probs);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }
        if let Some(pb) = pb {
            pb.finish();
        }

        chain.add_failures(failures);
        if failures > 0 {
            log::warn!("{} evaluations failed and were rejected", failures);
        }
        log::info!(
            "mean acceptance fraction {:.3}",
            chain.acceptance_fraction().iter().sum::<f64>() / walkers as f64
        );
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParameterError, SimulationError};
    use rand_distr::{Distribution, Uniform};

    /// Independent normals with means `mu` and standard deviations `sigma`.
    struct Gaussian {
        mu: Vec<f64>,
        sigma: Vec<f64>,
    }

    impl LogPosterior for Gaussian {
        fn nb_dimensions(&self) -> usize {
            self.mu.len()
        }

        fn ln_posterior(&self, theta: &[f64]) -> Result<f64, EvaluationError> {
            Ok(theta
                .iter()
                .zip(&self.mu)
                .zip(&self.sigma)
                .map(|((x, mu), sigma)| -0.5 * ((x - mu) / sigma).powi(2))
                .sum())
        }
    }

    /// A standard normal that cannot be evaluated beyond `threshold` along
    /// the first dimension.
    struct FailsBeyond {
        threshold: f64,
    }

    impl LogPosterior for FailsBeyond {
        fn nb_dimensions(&self) -> usize {
            2
        }

        fn ln_posterior(&self, theta: &[f64]) -> Result<f64, EvaluationError> {
            if theta[0] > self.threshold {
                return Err(EvaluationError::Simulation {
                    parameters: theta.to_vec(),
                    source: SimulationError::NonFinite {
                        track: "t".to_string(),
                        observation: 1,
                        bio_time: 1.,
                        state: [f64::INFINITY; 3],
                    },
                });
            }
            Ok(-0.5 * theta.iter().map(|x| x * x).sum::<f64>())
        }
    }

    fn uniform_ensemble(walkers: usize, dims: usize) -> Vec<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let uniform = Uniform::new(-1., 1.);
        (0..walkers)
            .map(|_| (0..dims).map(|_| uniform.sample(&mut rng)).collect())
            .collect()
    }

    fn options(walkers: usize, steps: usize) -> SamplerOptions {
        SamplerOptionsBuilder::default()
            .walkers(walkers)
            .steps(steps)
            .build()
            .unwrap()
    }

    #[test]
    fn default_options_test() {
        let options = SamplerOptionsBuilder::default().steps(10).build().unwrap();
        assert_eq!(options.walkers, 48);
        assert_eq!(options.seed, 26);
        assert_eq!(options.stretch, 2.);
        assert_eq!(options.failure, FailurePolicy::Reject);
        assert_eq!(options.threads, None);
        assert!(!options.progress);
        assert!(SamplerOptionsBuilder::default().build().is_err());
    }

    #[test]
    fn gaussian_recovery_test() {
        let target = Gaussian { mu: vec![1., -2.], sigma: vec![1., 2.] };
        let sampler = EnsembleSampler::new(&target, options(16, 6000));
        let chain = sampler.run(uniform_ensemble(16, 2)).unwrap();
        assert_eq!(chain.nb_steps(), 6000);
        assert_eq!(chain.failures(), 0);

        let samples = chain.flat_samples(1000, 1);
        let n = samples.len() as f64;
        for dim in 0..2 {
            let mean = samples.iter().map(|s| s[dim]).sum::<f64>() / n;
            let var = samples
                .iter()
                .map(|s| (s[dim] - mean).powi(2))
                .sum::<f64>()
                / n;
            let expected_var = target.sigma[dim].powi(2);
            assert!(
                (mean - target.mu[dim]).abs() < 0.2 * target.sigma[dim],
                "mean {} along {}",
                mean,
                dim
            );
            assert!(
                (var - expected_var).abs() < 0.2 * expected_var,
                "variance {} along {}",
                var,
                dim
            );
        }
        let acceptance = chain.acceptance_fraction();
        assert!(acceptance.iter().all(|&f| 0.2 < f && f < 0.95));
        let best = chain.best().unwrap();
        assert!(best.log_posterior <= 0.);
        assert!(best.log_posterior > -0.1);
    }

    #[test]
    fn same_chain_for_any_pool_size_test() {
        let target = Gaussian { mu: vec![0., 3., -1.], sigma: vec![1., 0.5, 2.] };
        let mut opts = options(12, 200);
        opts.threads = Some(1);
        let sequential =
            EnsembleSampler::new(&target, opts.clone()).run(uniform_ensemble(12, 3));
        opts.threads = Some(4);
        let parallel =
            EnsembleSampler::new(&target, opts).run(uniform_ensemble(12, 3));
        assert_eq!(sequential.unwrap(), parallel.unwrap());
    }

    #[test]
    fn seed_changes_the_chain_test() {
        let target = Gaussian { mu: vec![0., 0.], sigma: vec![1., 1.] };
        let mut opts = options(8, 50);
        let first =
            EnsembleSampler::new(&target, opts.clone()).run(uniform_ensemble(8, 2));
        opts.seed = 27;
        let second = EnsembleSampler::new(&target, opts).run(uniform_ensemble(8, 2));
        assert_ne!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn always_failing_is_rejected_test() {
        let target = FailsBeyond { threshold: f64::NEG_INFINITY };
        let initial = uniform_ensemble(8, 2);
        let chain = EnsembleSampler::new(&target, options(8, 20))
            .run(initial.clone())
            .unwrap();
        assert!(chain.log_probs().iter().all(|lp| *lp == f64::NEG_INFINITY));
        assert_eq!(chain.failures(), 8 * 21);
        assert_eq!(chain.acceptance_fraction(), vec![0.; 8]);
        assert_eq!(chain.get(19, 3), initial[3].as_slice());
        assert!(chain.best().is_none());
    }

    #[test]
    fn always_failing_aborts_test() {
        let target = FailsBeyond { threshold: f64::NEG_INFINITY };
        let mut opts = options(8, 20);
        opts.failure = FailurePolicy::Abort;
        match EnsembleSampler::new(&target, opts).run(uniform_ensemble(8, 2)) {
            Err(SamplerError::Evaluation { walker, step, source }) => {
                assert_eq!((walker, step), (0, 0));
                assert!(matches!(source, EvaluationError::Simulation { .. }));
            }
            other => panic!("expected an evaluation error, found {:?}", other),
        }
    }

    #[test]
    fn failures_are_never_accepted_test() {
        let target = FailsBeyond { threshold: 0.5 };
        let initial: Vec<Vec<f64>> = uniform_ensemble(8, 2)
            .into_iter()
            .map(|p| vec![p[0] - 1., p[1]])
            .collect();
        let chain =
            EnsembleSampler::new(&target, options(8, 500)).run(initial).unwrap();
        assert!(chain.failures() > 0);
        assert!(chain.samples().iter().all(|s| s[0] <= 0.5));
        assert!(chain.log_probs().iter().all(|lp| lp.is_finite()));
    }

    #[test]
    fn setup_is_validated_test() {
        let target = Gaussian { mu: vec![0.; 3], sigma: vec![1.; 3] };
        let run = |opts: SamplerOptions, initial: Vec<Vec<f64>>| {
            EnsembleSampler::new(&target, opts).run(initial)
        };
        // odd
        assert!(matches!(
            run(options(7, 1), uniform_ensemble(7, 3)),
            Err(SamplerError::Setup(_))
        ));
        // fewer than twice the dimensions
        assert!(matches!(
            run(options(4, 1), uniform_ensemble(4, 3)),
            Err(SamplerError::Setup(_))
        ));
        assert!(matches!(
            run(options(6, 1), uniform_ensemble(8, 3)),
            Err(SamplerError::Setup(_))
        ));
        assert!(matches!(
            run(options(6, 1), uniform_ensemble(6, 2)),
            Err(SamplerError::Setup(_))
        ));
        let mut opts = options(6, 1);
        opts.stretch = 1.;
        assert!(matches!(
            run(opts, uniform_ensemble(6, 3)),
            Err(SamplerError::Setup(_))
        ));
        assert!(run(options(6, 0), uniform_ensemble(6, 3)).unwrap().samples().is_empty());
    }

    #[test]
    fn wrong_dimension_is_a_failure_test() {
        struct Strict;
        impl LogPosterior for Strict {
            fn nb_dimensions(&self) -> usize {
                1
            }

            fn ln_posterior(&self, theta: &[f64]) -> Result<f64, EvaluationError> {
                Err(ParameterError::Dimension { expected: 2, found: theta.len() }
                    .into())
            }
        }
        let mut opts = options(2, 1);
        opts.failure = FailurePolicy::Abort;
        assert!(EnsembleSampler::new(&Strict, opts)
            .run(vec![vec![0.], vec![1.]])
            .is_err());
    }
}
