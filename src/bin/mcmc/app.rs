use anyhow::Context;
use grn_mcmc::chain::AUTOCORR_WINDOW;
use grn_mcmc::config::InferenceConfig;
use grn_mcmc::dataset::TrackDataset;
use grn_mcmc::posterior::Posterior;
use grn_mcmc::sampler::{EnsembleSampler, SamplerOptions};
use grn_mcmc::simulation::save_simulated;
use grn_mcmc::PARAMETER_NAMES;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use std::fs;
use std::path::PathBuf;

pub struct Mcmc {
    pub path2data: PathBuf,
    pub path2dir: PathBuf,
    pub config: InferenceConfig,
    pub options: SamplerOptions,
    pub verbose: u8,
}

impl Mcmc {
    pub fn run(&self) -> anyhow::Result<()> {
        //! Load the tracks once, sample the posterior and save the chain, the
        //! configuration used and the tracks simulated with the best fit.
        let dataset = TrackDataset::load(&self.path2data, &self.config.time_scale)
            .with_context(|| format!("Cannot load the tracks from {:#?}", self.path2data))?
            .select(&self.config.selection)
            .with_context(|| "Cannot select the tracks".to_string())?;
        if self.verbose > 0 {
            println!(
                "Loaded {} tracks with {} observations",
                dataset.len(),
                dataset.nb_observations()
            );
        }

        let prior = self.config.prior()?;
        let posterior = Posterior::new(
            &dataset,
            self.config.simulator(),
            prior.clone(),
            self.config.noise()?,
        );
        let mut rng = Pcg64Mcg::seed_from_u64(self.options.seed);
        let initial = prior.sample_ensemble(self.options.walkers, &mut rng);

        let chain = EnsembleSampler::new(&posterior, self.options.clone())
            .run(initial)
            .with_context(|| "Cannot sample the posterior".to_string())?;

        fs::create_dir_all(&self.path2dir)
            .with_context(|| format!("Cannot create dir {:#?}", self.path2dir))?;
        chain.save(&self.path2dir, &PARAMETER_NAMES)?;
        fs::write(self.path2dir.join("config.toml"), self.config.to_toml()?)
            .with_context(|| "Cannot save the configuration".to_string())?;

        println!(
            "{} failed evaluations out of {}",
            chain.failures(),
            self.options.walkers * (self.options.steps + 1)
        );
        if self.verbose > 0 {
            for (name, tau) in PARAMETER_NAMES
                .iter()
                .zip(chain.autocorr_time(AUTOCORR_WINDOW))
            {
                println!("autocorrelation time of {}: {:.1}", name, tau);
            }
        }
        match chain.best() {
            Some(best) => {
                println!("Best log-posterior {}", best.log_posterior);
                let simulated = posterior.simulate(&best.parameters)?;
                save_simulated(&simulated, &self.path2dir.join("best_fit_tracks.csv"))?;
            }
            None => println!("No sample with a finite log-posterior"),
        }
        Ok(())
    }
}
