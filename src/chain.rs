//! The samples generated by the ensemble sampler and their diagnostics.
use std::fs;
use std::path::Path;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

/// Factor of the automatic windowing of the autocorrelation time.
pub const AUTOCORR_WINDOW: f64 = 5.;

/// One point of the chain with its log-posterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSample {
    pub parameters: Vec<f64>,
    pub log_posterior: f64,
}

impl PosteriorSample {
    pub fn load(path2file: &Path) -> anyhow::Result<Self> {
        let file = fs::File::open(path2file)
            .with_context(|| format!("Cannot open {:#?}", path2file))?;
        serde_json::from_reader(file)
            .with_context(|| format!("Cannot parse {:#?}", path2file))
    }

    pub fn save(&self, path2file: &Path) -> anyhow::Result<()> {
        let file = fs::File::create(path2file)
            .with_context(|| format!("Cannot create {:#?}", path2file))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("Cannot write {:#?}", path2file))
    }
}

/// The positions of all walkers at each step, stored step-major: the row
/// `step * nb_walkers + walker` is the position of `walker` after `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    nb_walkers: usize,
    nb_dimensions: usize,
    samples: Vec<Vec<f64>>,
    log_probs: Vec<f64>,
    accepted: Vec<usize>,
    failures: usize,
}

impl Chain {
    pub fn new(nb_walkers: usize, nb_dimensions: usize) -> Self {
        Chain {
            nb_walkers,
            nb_dimensions,
            samples: Vec::new(),
            log_probs: Vec::new(),
            accepted: vec![0; nb_walkers],
            failures: 0,
        }
    }

    pub fn with_capacity(
        nb_walkers: usize,
        nb_dimensions: usize,
        steps: usize,
    ) -> Self {
        let mut chain = Chain::new(nb_walkers, nb_dimensions);
        chain.samples.reserve(steps * nb_walkers);
        chain.log_probs.reserve(steps * nb_walkers);
        chain
    }

    pub fn push_step(&mut self, positions: &[Vec<f64>], log_probs: &[f64]) {
        //! Record the positions of the whole ensemble after one step.
        assert_eq!(positions.len(), self.nb_walkers);
        assert_eq!(log_probs.len(), self.nb_walkers);
        for position in positions {
            assert_eq!(position.len(), self.nb_dimensions);
            self.samples.push(position.clone());
        }
        self.log_probs.extend_from_slice(log_probs);
    }

    pub fn accept(&mut self, walker: usize) {
        self.accepted[walker] += 1;
    }

    pub fn add_failures(&mut self, failures: usize) {
        self.failures += failures;
    }

    pub fn nb_walkers(&self) -> usize {
        self.nb_walkers
    }

    pub fn nb_dimensions(&self) -> usize {
        self.nb_dimensions
    }

    pub fn nb_steps(&self) -> usize {
        if self.nb_walkers == 0 {
            return 0;
        }
        self.samples.len() / self.nb_walkers
    }

    /// Number of evaluations that failed and were rejected.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// All positions, step-major.
    pub fn samples(&self) -> &[Vec<f64>] {
        &self.samples
    }

    /// The log-posterior of each row of [`Chain::samples`].
    pub fn log_probs(&self) -> &[f64] {
        &self.log_probs
    }

    pub fn get(&self, step: usize, walker: usize) -> &[f64] {
        &self.samples[step * self.nb_walkers + walker]
    }

    pub fn flat_samples(&self, discard: usize, thin: usize) -> Vec<&[f64]> {
        //! Positions of all walkers after dropping the first `discard` steps
        //! and keeping one step every `thin`.
        (discard..self.nb_steps())
            .step_by(thin.max(1))
            .flat_map(|step| {
                (0..self.nb_walkers).map(move |walker| self.get(step, walker))
            })
            .collect()
    }

    pub fn best(&self) -> Option<PosteriorSample> {
        //! The maximum a posteriori sample, `None` when no sample has a finite
        //! log-posterior.
        self.log_probs
            .iter()
            .enumerate()
            .filter(|(_, lp)| lp.is_finite())
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, &log_posterior)| PosteriorSample {
                parameters: self.samples[idx].clone(),
                log_posterior,
            })
    }

    pub fn acceptance_fraction(&self) -> Vec<f64> {
        let steps = self.nb_steps();
        self.accepted
            .iter()
            .map(|&accepted| {
                if steps == 0 {
                    0.
                } else {
                    accepted as f64 / steps as f64
                }
            })
            .collect()
    }

    fn walker_series(&self, walker: usize, dim: usize) -> Vec<f64> {
        (0..self.nb_steps())
            .map(|step| self.get(step, walker)[dim])
            .collect()
    }

    pub fn autocorr_time(&self, c: f64) -> Vec<f64> {
        //! Integrated autocorrelation time of each dimension, estimated from
        //! the autocorrelation function averaged over the walkers and
        //! truncated at the first lag `t >= c * tau(t)`.
        //!
        //! NaN when the chain is too short or no walker moved along a
        //! dimension.
        (0..self.nb_dimensions)
            .map(|dim| {
                let series: Vec<Vec<f64>> = (0..self.nb_walkers)
                    .map(|walker| self.walker_series(walker, dim))
                    .collect();
                integrated_time(&series, c)
            })
            .collect()
    }

    pub fn save(&self, path2dir: &Path, names: &[&str]) -> anyhow::Result<()> {
        //! Write `chain.csv`, `log_posterior.csv`, `acceptance.csv`,
        //! `autocorrelation.csv` and, when it exists, `best_fit.json` into
        //! `path2dir`.
        ensure!(
            names.len() == self.nb_dimensions,
            "Found {} names for {} dimensions",
            names.len(),
            self.nb_dimensions
        );
        fs::create_dir_all(path2dir)
            .with_context(|| format!("Cannot create dir {:#?}", path2dir))?;

        let path2file = path2dir.join("chain.csv");
        let mut wtr = csv::Writer::from_path(&path2file)
            .with_context(|| format!("Cannot create {:#?}", path2file))?;
        let mut header = vec!["step".to_string(), "walker".to_string()];
        header.extend(names.iter().map(|name| name.to_string()));
        wtr.write_record(&header)?;
        for (row, sample) in self.samples.iter().enumerate() {
            let mut record = vec![
                (row / self.nb_walkers).to_string(),
                (row % self.nb_walkers).to_string(),
            ];
            record.extend(sample.iter().map(|x| x.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;

        let path2file = path2dir.join("log_posterior.csv");
        let mut wtr = csv::Writer::from_path(&path2file)
            .with_context(|| format!("Cannot create {:#?}", path2file))?;
        wtr.write_record(["step", "walker", "log_posterior"])?;
        for (row, lp) in self.log_probs.iter().enumerate() {
            wtr.write_record(&[
                (row / self.nb_walkers).to_string(),
                (row % self.nb_walkers).to_string(),
                lp.to_string(),
            ])?;
        }
        wtr.flush()?;

        let path2file = path2dir.join("acceptance.csv");
        let mut wtr = csv::Writer::from_path(&path2file)
            .with_context(|| format!("Cannot create {:#?}", path2file))?;
        wtr.write_record(["walker", "acceptance"])?;
        for (walker, fraction) in
            self.acceptance_fraction().iter().enumerate()
        {
            wtr.write_record(&[walker.to_string(), fraction.to_string()])?;
        }
        wtr.flush()?;

        let path2file = path2dir.join("autocorrelation.csv");
        let mut wtr = csv::Writer::from_path(&path2file)
            .with_context(|| format!("Cannot create {:#?}", path2file))?;
        wtr.write_record(["parameter", "tau"])?;
        for (name, tau) in
            names.iter().zip(self.autocorr_time(AUTOCORR_WINDOW))
        {
            wtr.write_record(&[name.to_string(), tau.to_string()])?;
        }
        wtr.flush()?;

        match self.best() {
            Some(best) => best.save(&path2dir.join("best_fit.json"))?,
            None => log::warn!("no finite log-posterior, no best fit saved"),
        }
        Ok(())
    }
}

/// Autocovariance at `lag` of a series already centered on its mean.
fn autocovariance(centered: &[f64], lag: usize) -> f64 {
    centered
        .iter()
        .zip(&centered[lag..])
        .map(|(x, y)| x * y)
        .sum::<f64>()
        / centered.len() as f64
}

fn integrated_time(series: &[Vec<f64>], c: f64) -> f64 {
    // each walker is centered once, constant walkers are skipped
    let moving: Vec<(Vec<f64>, f64)> = series
        .iter()
        .filter(|s| s.len() > 1)
        .map(|s| {
            let mean = s.iter().sum::<f64>() / s.len() as f64;
            let centered: Vec<f64> = s.iter().map(|x| x - mean).collect();
            let var = autocovariance(&centered, 0);
            (centered, var)
        })
        .filter(|(_, var)| *var > 0.)
        .collect();
    if moving.is_empty() {
        return f64::NAN;
    }
    let n = moving[0].0.len();
    let mut tau = f64::NAN;
    let mut sum = 0.;
    for lag in 0..n {
        let acf = moving
            .iter()
            .map(|(centered, var)| autocovariance(centered, lag) / var)
            .sum::<f64>()
            / moving.len() as f64;
        sum += acf;
        tau = 2. * sum - 1.;
        if lag as f64 >= c * tau {
            break;
        }
    }
    tau
}
