use clap::{ArgAction, Parser};
use grn_mcmc::config::InferenceConfig;
use grn_mcmc::sampler::{FailurePolicy, SamplerOptionsBuilder};
use std::path::PathBuf;

use crate::app::Mcmc;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "mcmc")]
#[command(
    about = "Sample the posterior of the parameters of the three-gene network given the expression tracks"
)]
pub struct Cli {
    /// the tracks: a long csv with columns track,Time,Wnt,FGF,g1,g2,g3 or a
    /// json list of column tables
    #[arg(value_name = "FILE", value_parser = |path: &str| { let path_b = PathBuf::from(path); match path_b.extension().and_then(|ext| ext.to_str()) { Some("csv") | Some("json") => Ok(path_b), _ => Err("must be a csv or a json file") }})]
    data: PathBuf,
    /// dir where to save the chain, created when missing
    #[arg(value_name = "DIR")]
    path: PathBuf,
    /// toml file overriding the prior bounds, the noise scales, the selected
    /// tracks and the time scale
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// index of the first track used for the inference, overrides the config
    #[arg(long)]
    offset: Option<usize>,
    /// number of tracks used for the inference, overrides the config
    #[arg(long)]
    count: Option<usize>,
    /// number of ensemble updates
    #[arg(long, default_value_t = 2000)]
    steps: usize,
    /// number of walkers, even and at least twice the number of parameters
    #[arg(short, long, default_value_t = 48)]
    walkers: usize,
    /// scale of the stretch move
    #[arg(long, default_value_t = 2.)]
    stretch: f64,
    /// seed for reproducibility
    #[arg(long, default_value_t = 26)]
    seed: u64,
    /// number of threads evaluating the posterior, all cores by default
    #[arg(short, long, conflicts_with = "sequential")]
    threads: Option<usize>,
    /// triggers sequential mode
    #[arg(short, long, action = ArgAction::SetTrue, default_value_t = false)]
    sequential: bool,
    /// stop at the first failed simulation instead of rejecting the proposal
    #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
    abort_on_failure: bool,
    #[arg(short, long, action = clap::ArgAction::Count, default_value_t = 0)]
    verbose: u8,
}

impl Cli {
    pub fn build() -> anyhow::Result<Mcmc> {
        let cli = Cli::parse();

        let mut config = match &cli.config {
            Some(path2config) => InferenceConfig::load(path2config)?,
            None => InferenceConfig::default(),
        };
        if let Some(offset) = cli.offset {
            config.selection.offset = offset;
        }
        if let Some(count) = cli.count {
            config.selection.count = count;
        }

        let mut builder = SamplerOptionsBuilder::default();
        builder
            .walkers(cli.walkers)
            .steps(cli.steps)
            .seed(cli.seed)
            .stretch(cli.stretch)
            .progress(cli.verbose == 0);
        if cli.abort_on_failure {
            builder.failure(FailurePolicy::Abort);
        }
        if cli.sequential {
            builder.threads(1);
        } else if let Some(threads) = cli.threads {
            builder.threads(threads);
        }

        Ok(Mcmc {
            path2data: cli.data,
            path2dir: cli.path,
            config,
            options: builder.build()?,
            verbose: cli.verbose,
        })
    }
}
