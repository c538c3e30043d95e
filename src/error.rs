//! Errors raised while loading the tracks, simulating the network and
//! evaluating the posterior.
use std::path::PathBuf;

use thiserror::Error;

/// Failure to load or select the observed tracks. Always fatal: sampling
/// never starts without a valid dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot read the tracks from {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse the csv tracks")]
    Csv(#[from] csv::Error),

    #[error("cannot parse the json tracks")]
    Json(#[from] serde_json::Error),

    #[error("do not recognize the extension of {0:?}, expected csv or json")]
    Extension(PathBuf),

    #[error("invalid track {track}: {reason}")]
    Invalid { track: String, reason: String },

    #[error("found {found} tracks, cannot select tracks {offset}..{end}")]
    NotEnoughTracks { found: usize, offset: usize, end: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("expected {expected} parameters, found {found}")]
    Dimension { expected: usize, found: usize },

    #[error("unknown parameter {0}")]
    Unknown(String),

    #[error("missing bounds for parameter {0}")]
    MissingBounds(String),

    #[error("empty interval ({lower}, {upper}) for {name}")]
    EmptyInterval { name: String, lower: f64, upper: f64 },

    #[error("noise scale for {gene} must be positive and finite, found {sigma}")]
    NoiseScale { gene: String, sigma: f64 },
}

/// The forward simulation of one track could not produce finite values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error(
        "integration failed in track {track} between observations {observation} and {}: {reason}",
        .observation + 1
    )]
    Integration {
        track: String,
        observation: usize,
        reason: String,
    },

    #[error(
        "non-finite state {state:?} in track {track} at observation {observation} (biological time {bio_time})"
    )]
    NonFinite {
        track: String,
        observation: usize,
        bio_time: f64,
        state: [f64; 3],
    },
}

/// A posterior evaluation that failed for numerical reasons. An out-of-support
/// parameter vector is not an error, it is a log-posterior of minus infinity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error(transparent)]
    Parameters(#[from] ParameterError),

    #[error("simulation failed for parameters {parameters:?}")]
    Simulation {
        parameters: Vec<f64>,
        #[source]
        source: SimulationError,
    },

    #[error("non-finite log-likelihood {value} for parameters {parameters:?}")]
    NonFiniteLikelihood { parameters: Vec<f64>, value: f64 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read the configuration from {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse the configuration")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Parameters(#[from] ParameterError),

    #[error("steps_per_unit must be at least 1")]
    NoSteps,
}

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("invalid sampler setup: {0}")]
    Setup(String),

    #[error("cannot build the worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("evaluation of walker {walker} failed at step {step}")]
    Evaluation {
        walker: usize,
        step: usize,
        #[source]
        source: EvaluationError,
    },
}
