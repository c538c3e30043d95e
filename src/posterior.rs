//! The log-posterior of the network parameters given the tracks: a bounded
//! uniform prior and an independent Gaussian likelihood.
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dataset::TrackDataset;
use crate::error::{EvaluationError, ParameterError};
use crate::parameters::{
    parameter_index, Gene, GrnParameters, NB_GENES, NB_PARAMETERS,
    PARAMETER_NAMES,
};
use crate::simulation::{Simulate, SimulatedTrack, TrackSimulator};

/// The function explored by the sampler.
///
/// `Ok(f64::NEG_INFINITY)` means zero posterior probability, whereas `Err`
/// reports a numerical failure that must not be confused with a rejection.
/// Implementations must be pure: equal inputs give bit-identical outputs,
/// also when called concurrently.
pub trait LogPosterior: Sync {
    fn nb_dimensions(&self) -> usize;

    fn ln_posterior(&self, theta: &[f64]) -> Result<f64, EvaluationError>;
}

/// An open interval `(lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Bounds { lower, upper }
    }

    /// Strictly inside, false for NaN.
    pub fn contains(&self, x: f64) -> bool {
        self.lower < x && x < self.upper
    }
}

/// Independent uniform priors over open intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct Prior {
    bounds: [Bounds; NB_PARAMETERS],
}

impl Default for Prior {
    fn default() -> Self {
        Prior::try_from(&default_bounds()).expect("valid default bounds")
    }
}

/// The bounds used when the configuration does not override them.
pub fn default_bounds() -> BTreeMap<String, (f64, f64)> {
    let mut bounds = BTreeMap::new();
    for (idx, name) in PARAMETER_NAMES.iter().enumerate() {
        let interval = match *name {
            // self-regulation is activating only
            "w11" | "w22" | "w33" => (0., 10.),
            "r1" | "r2" => (0., 10.),
            "r3" => (0., 30.),
            "lambda1" | "lambda2" | "lambda3" => (0., 10.),
            // cross-regulation, external weights and biases
            _ => {
                debug_assert!(idx < 9 || idx >= 15);
                (-10., 10.)
            }
        };
        bounds.insert(name.to_string(), interval);
    }
    bounds
}

impl TryFrom<&BTreeMap<String, (f64, f64)>> for Prior {
    type Error = ParameterError;

    fn try_from(
        intervals: &BTreeMap<String, (f64, f64)>,
    ) -> Result<Self, Self::Error> {
        //! Every parameter must have a non-empty interval, and every name
        //! must be a parameter.
        let mut bounds = [None; NB_PARAMETERS];
        for (name, &(lower, upper)) in intervals {
            let idx = parameter_index(name)
                .ok_or_else(|| ParameterError::Unknown(name.clone()))?;
            // also rejects NaN
            if !(lower < upper) {
                return Err(ParameterError::EmptyInterval {
                    name: name.clone(),
                    lower,
                    upper,
                });
            }
            bounds[idx] = Some(Bounds::new(lower, upper));
        }
        let mut checked = [Bounds::new(0., 0.); NB_PARAMETERS];
        for (idx, b) in bounds.into_iter().enumerate() {
            checked[idx] = b.ok_or_else(|| {
                ParameterError::MissingBounds(PARAMETER_NAMES[idx].to_string())
            })?;
        }
        Ok(Prior { bounds: checked })
    }
}

impl Prior {
    pub fn bounds(&self) -> &[Bounds; NB_PARAMETERS] {
        &self.bounds
    }

    pub fn ln_prob(&self, theta: &[f64]) -> f64 {
        //! Zero when every component is strictly inside its interval, minus
        //! infinity otherwise (also for a vector of the wrong length).
        let inside = theta.len() == NB_PARAMETERS
            && self.bounds.iter().zip(theta).all(|(b, &x)| b.contains(x));
        if inside {
            0.
        } else {
            f64::NEG_INFINITY
        }
    }

    pub fn sample_ensemble(
        &self,
        walkers: usize,
        rng: &mut impl Rng,
    ) -> Vec<Vec<f64>> {
        //! One uniform draw per walker and per parameter from the prior
        //! intervals.
        let uniforms: Vec<Uniform<f64>> = self
            .bounds
            .iter()
            .map(|b| Uniform::new(b.lower, b.upper))
            .collect();
        (0..walkers)
            .map(|_| uniforms.iter().map(|u| u.sample(&mut *rng)).collect())
            .collect()
    }
}

/// Fixed standard deviation of the observation noise of each gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseModel {
    sigma: [f64; NB_GENES],
}

impl Default for NoiseModel {
    fn default() -> Self {
        NoiseModel { sigma: [0.2, 0.2, 0.1] }
    }
}

pub fn default_noise() -> BTreeMap<String, f64> {
    let noise = NoiseModel::default();
    Gene::ALL
        .iter()
        .map(|gene| (gene.name().to_string(), noise.sigma[gene.index()]))
        .collect()
}

impl TryFrom<&BTreeMap<String, f64>> for NoiseModel {
    type Error = ParameterError;

    fn try_from(scales: &BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut sigma = [0.; NB_GENES];
        for (name, &scale) in scales {
            let gene = Gene::ALL
                .iter()
                .find(|g| g.name() == name)
                .ok_or_else(|| ParameterError::Unknown(name.clone()))?;
            sigma[gene.index()] = scale;
        }
        for gene in Gene::ALL {
            let scale = sigma[gene.index()];
            if !(scale > 0. && scale.is_finite()) {
                return Err(ParameterError::NoiseScale {
                    gene: gene.name().to_string(),
                    sigma: scale,
                });
            }
        }
        Ok(NoiseModel { sigma })
    }
}

impl NoiseModel {
    pub fn sigma(&self, gene: Gene) -> f64 {
        self.sigma[gene.index()]
    }

    pub fn ln_likelihood(&self, simulated: &[SimulatedTrack]) -> f64 {
        //! `-0.5 sum ((sim - obs) / sigma)^2` summed over all observations of
        //! all tracks, for each gene, then over the genes.
        let mut sum_squares = [0f64; NB_GENES];
        for residuals in simulated.iter().flat_map(|sim| sim.residuals()) {
            for (i, r) in residuals.iter().enumerate() {
                sum_squares[i] += (r / self.sigma[i]).powi(2);
            }
        }
        sum_squares.iter().map(|s| -0.5 * s).sum()
    }
}

/// The terms of the log-posterior at one parameter vector, all computed from
/// the same simulation of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation<'a> {
    pub simulated: Vec<SimulatedTrack<'a>>,
    pub ln_prior: f64,
    pub ln_likelihood: f64,
}

impl Evaluation<'_> {
    pub fn ln_posterior(&self) -> f64 {
        self.ln_prior + self.ln_likelihood
    }
}

/// The log-posterior over a dataset loaded once and shared by reference.
#[derive(Debug, Clone)]
pub struct Posterior<'a, S = TrackSimulator> {
    dataset: &'a TrackDataset,
    simulator: S,
    prior: Prior,
    noise: NoiseModel,
}

impl<'a, S: Simulate> Posterior<'a, S> {
    pub fn new(
        dataset: &'a TrackDataset,
        simulator: S,
        prior: Prior,
        noise: NoiseModel,
    ) -> Self {
        Posterior { dataset, simulator, prior, noise }
    }

    pub fn prior(&self) -> &Prior {
        &self.prior
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    pub fn dataset(&self) -> &TrackDataset {
        self.dataset
    }

    pub fn ln_prior(&self, theta: &[f64]) -> f64 {
        self.prior.ln_prob(theta)
    }

    pub fn simulate(
        &self,
        theta: &[f64],
    ) -> Result<Vec<SimulatedTrack<'a>>, EvaluationError> {
        let parameters = GrnParameters::try_from(theta)?;
        self.simulator.simulate_dataset(self.dataset, &parameters).map_err(
            |source| EvaluationError::Simulation {
                parameters: theta.to_vec(),
                source,
            },
        )
    }

    pub fn ln_likelihood(&self, theta: &[f64]) -> Result<f64, EvaluationError> {
        //! Simulate the whole dataset and compare it against the observations.
        //! A non-finite result is an error.
        let simulated = self.simulate(theta)?;
        self.finite_likelihood(theta, &simulated)
    }

    pub fn evaluate(
        &self,
        theta: &[f64],
    ) -> Result<Evaluation<'a>, EvaluationError> {
        //! Simulate the dataset once and return the simulation together with
        //! the log-prior and the log-likelihood. Unlike
        //! [`LogPosterior::ln_posterior`], parameters outside the prior
        //! support are simulated too.
        let simulated = self.simulate(theta)?;
        let ln_likelihood = self.finite_likelihood(theta, &simulated)?;
        Ok(Evaluation {
            simulated,
            ln_prior: self.ln_prior(theta),
            ln_likelihood,
        })
    }

    fn finite_likelihood(
        &self,
        theta: &[f64],
        simulated: &[SimulatedTrack],
    ) -> Result<f64, EvaluationError> {
        let ln_likelihood = self.noise.ln_likelihood(simulated);
        if ln_likelihood.is_finite() {
            Ok(ln_likelihood)
        } else {
            Err(EvaluationError::NonFiniteLikelihood {
                parameters: theta.to_vec(),
                value: ln_likelihood,
            })
        }
    }
}

impl<S: Simulate> LogPosterior for Posterior<'_, S> {
    fn nb_dimensions(&self) -> usize {
        NB_PARAMETERS
    }

    fn ln_posterior(&self, theta: &[f64]) -> Result<f64, EvaluationError> {
        //! Does not simulate out-of-support parameters.
        if theta.len() != NB_PARAMETERS {
            return Err(ParameterError::Dimension {
                expected: NB_PARAMETERS,
                found: theta.len(),
            }
            .into());
        }
        let ln_prior = self.ln_prior(theta);
        if ln_prior == f64::NEG_INFINITY {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(ln_prior + self.ln_likelihood(theta)?)
    }
}
