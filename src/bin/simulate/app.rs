use anyhow::Context;
use grn_mcmc::chain::PosteriorSample;
use grn_mcmc::config::InferenceConfig;
use grn_mcmc::dataset::TrackDataset;
use grn_mcmc::posterior::Posterior;
use grn_mcmc::simulation::save_simulated;
use grn_mcmc::GrnParameters;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The parameter file, either written by mcmc or by hand.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParameterFile {
    Sample(PosteriorSample),
    Flat(Vec<f64>),
}

pub fn load_parameters(path2file: &Path) -> anyhow::Result<Vec<f64>> {
    let content = fs::read_to_string(path2file)
        .with_context(|| format!("Cannot read {:#?}", path2file))?;
    let parameters = match serde_json::from_str(&content)
        .with_context(|| format!("Cannot parse the parameters {:#?}", path2file))?
    {
        ParameterFile::Sample(sample) => sample.parameters,
        ParameterFile::Flat(parameters) => parameters,
    };
    // fails on the wrong number of parameters
    GrnParameters::try_from(parameters.as_slice())?;
    Ok(parameters)
}

pub struct Simulate {
    pub path2data: PathBuf,
    pub path2parameters: PathBuf,
    pub path2output: PathBuf,
    pub config: InferenceConfig,
    pub verbose: u8,
}

impl Simulate {
    pub fn run(&self) -> anyhow::Result<()> {
        //! Simulate the selected tracks, save them next to the observations
        //! and print the terms of the log-posterior.
        let dataset = TrackDataset::load(&self.path2data, &self.config.time_scale)
            .with_context(|| format!("Cannot load the tracks from {:#?}", self.path2data))?
            .select(&self.config.selection)
            .with_context(|| "Cannot select the tracks".to_string())?;
        let theta = load_parameters(&self.path2parameters)?;
        if self.verbose > 0 {
            println!("{:#?}", GrnParameters::try_from(theta.as_slice())?);
        }

        let posterior = Posterior::new(
            &dataset,
            self.config.simulator(),
            self.config.prior()?,
            self.config.noise()?,
        );
        let evaluation = posterior.evaluate(&theta)?;
        save_simulated(&evaluation.simulated, &self.path2output)?;

        println!("log-prior: {}", evaluation.ln_prior);
        println!("log-likelihood: {}", evaluation.ln_likelihood);
        println!("log-posterior: {}", evaluation.ln_posterior());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_parameters_test() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let flat: Vec<f64> = (0..24).map(|i| i as f64).collect();
        let sample = PosteriorSample { parameters: flat.clone(), log_posterior: -3. };
        file.write_all(serde_json::to_string(&sample).unwrap().as_bytes())
            .unwrap();
        assert_eq!(load_parameters(file.path()).unwrap(), flat);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&flat).unwrap().as_bytes())
            .unwrap();
        assert_eq!(load_parameters(file.path()).unwrap(), flat);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[1.0, 2.0]").unwrap();
        assert!(load_parameters(file.path()).is_err());
    }
}
