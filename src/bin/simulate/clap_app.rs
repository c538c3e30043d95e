use clap::Parser;
use grn_mcmc::config::InferenceConfig;
use std::path::PathBuf;

use crate::app::Simulate;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "simulate")]
#[command(
    about = "Simulate the expression tracks for one parameter vector and compare them against the data"
)]
pub struct Cli {
    /// the tracks: a long csv with columns track,Time,Wnt,FGF,g1,g2,g3 or a
    /// json list of column tables
    #[arg(value_name = "FILE", value_parser = |path: &str| { let path_b = PathBuf::from(path); match path_b.extension().and_then(|ext| ext.to_str()) { Some("csv") | Some("json") => Ok(path_b), _ => Err("must be a csv or a json file") }})]
    data: PathBuf,
    /// the parameters: the best_fit.json saved by mcmc or a json array of 24
    /// numbers
    #[arg(value_name = "FILE", value_parser = |path: &str| { let path_b = PathBuf::from(path); if path_b.extension() == Some(std::ffi::OsStr::new("json")) { Ok(path_b) } else { Err("must be json file: extension must be .json)") }} ) ]
    parameters: PathBuf,
    /// csv file where to save the observed and simulated tracks
    #[arg(short, long, value_name = "FILE", default_value = "simulated.csv")]
    output: PathBuf,
    /// toml file overriding the prior bounds, the noise scales, the selected
    /// tracks and the time scale
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// index of the first track to simulate, overrides the config
    #[arg(long)]
    offset: Option<usize>,
    /// number of tracks to simulate, overrides the config
    #[arg(long)]
    count: Option<usize>,
    #[arg(short, long, action = clap::ArgAction::Count, default_value_t = 0)]
    verbose: u8,
}

impl Cli {
    pub fn build() -> anyhow::Result<Simulate> {
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

        Ok(Simulate {
            path2data: cli.data,
            path2parameters: cli.parameters,
            path2output: cli.output,
            config,
            verbose: cli.verbose,
        })
    }
}
