//! Bayesian inference of a three-gene regulatory network from single-cell
//! expression tracks.
//!
//! The network is a system of three ODEs driven by two boundary signals (Wnt
//! and FGF) and by 24 parameters. There are two ways of using this library:
//!
//! 1. simulate the expression of the genes along observed tracks for a given
//! parameter vector, see [`simulation`]
//!
//! 2. sample the posterior of the parameters given the tracks with an affine
//! invariant ensemble sampler, see [`sampler`]
//!
//! # Inference example
//! ```no_run
//! use grn_mcmc::config::InferenceConfig;
//! use grn_mcmc::dataset::TrackDataset;
//! use grn_mcmc::posterior::Posterior;
//! use grn_mcmc::sampler::{EnsembleSampler, SamplerOptionsBuilder};
//! use rand::SeedableRng;
//! use rand_pcg::Pcg64Mcg;
//! use std::path::Path;
//!
//! let config = InferenceConfig::default();
//! let dataset = TrackDataset::load(Path::new("tracks.csv"), &config.time_scale)
//!     .unwrap()
//!     .select(&config.selection)
//!     .unwrap();
//! let prior = config.prior().unwrap();
//! let posterior =
//!     Posterior::new(&dataset, config.simulator(), prior.clone(), config.noise().unwrap());
//!
//! let options = SamplerOptionsBuilder::default().steps(1000).build().unwrap();
//! let initial = prior.sample_ensemble(options.walkers, &mut Pcg64Mcg::seed_from_u64(26));
//! let chain = EnsembleSampler::new(&posterior, options).run(initial).unwrap();
//! println!("best fit {:?}", chain.best());
//! ```
pub mod chain;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod parameters;
pub mod posterior;
pub mod sampler;
pub mod simulation;

#[doc(inline)]
pub use crate::parameters::{GrnParameters, NB_PARAMETERS, PARAMETER_NAMES};
#[doc(inline)]
pub use crate::posterior::{LogPosterior, Posterior};

#[macro_use]
extern crate derive_builder;
